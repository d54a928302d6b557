//! Sphere mean value kernel.
//!
//! Uniform averaging over a sphere of physical radius `r`, the kernel
//! consumed by SMV-based background field removal. The spatial support is
//! a voxel cube bounded by the radius, normalized to unit sum, and
//! converted with psf2otf.
//!
//! Reference:
//! Schweser, F., Deistung, A., Lehr, B.W., Reichenbach, J.R. (2011).
//! "Quantitative imaging of intrinsic magnetic tissue properties using
//! MRI signal phase." NeuroImage, 54:2789-2807.

use crate::error::QsmError;
use crate::kernels::psf2otf::psf2otf;
use crate::validate::{check_shape, check_voxel_size};

/// Build the sphere-mean-value transfer function for a real volume of
/// `shape` on the half-complex grid `(nx/2 + 1, ny, nz)`.
///
/// `radius` is in the same physical units as `vsz`. The spatial kernel
/// weights every voxel whose center lies within the radius equally and
/// sums to one.
pub fn smv_kernel(shape: [usize; 3], vsz: [f64; 3], radius: f64) -> Result<Vec<f64>, QsmError> {
    check_shape("smv_kernel", shape)?;
    check_voxel_size(vsz)?;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(QsmError::invalid_value("radius", radius));
    }

    // Odd support cube covering the sphere, capped at the output shape.
    let mut psf_shape = [0usize; 3];
    for i in 0..3 {
        let half = (radius / vsz[i]).floor() as usize;
        psf_shape[i] = (2 * half + 1).min(shape[i]);
    }
    let [sx, sy, sz] = psf_shape;
    let (cx, cy, cz) = (sx / 2, sy / 2, sz / 2);

    let mut psf = vec![0.0; sx * sy * sz];
    let r2 = radius * radius;
    let mut count = 0usize;
    for k in 0..sz {
        let z = (k as f64 - cz as f64) * vsz[2];
        for j in 0..sy {
            let y = (j as f64 - cy as f64) * vsz[1];
            for i in 0..sx {
                let x = (i as f64 - cx as f64) * vsz[0];
                if x * x + y * y + z * z <= r2 {
                    psf[i + j * sx + k * sx * sy] = 1.0;
                    count += 1;
                }
            }
        }
    }
    let w = 1.0 / count as f64;
    for v in psf.iter_mut() {
        *v *= w;
    }

    Ok(psf2otf(&psf, psf_shape, shape, true)?.into_real())
}
