//! Unit magnetic dipole kernel.
//!
//! Relates a susceptibility distribution to the tissue field perturbation
//! it induces at the given main-field direction. The kernel can be built
//! directly in k-space or synthesized as a spatial point spread function
//! and transformed.
//!
//! Reference:
//! Salomir, R., de Senneville, B.D., Moonen, C.T. (2003). "A fast
//! calculation method for magnetic field inhomogeneity due to an arbitrary
//! distribution of bulk susceptibility."
//! Concepts in Magnetic Resonance Part B, 19B:26-34.

use std::f64::consts::PI;

use crate::error::QsmError;
use crate::fft::{fftfreq, rfftfreq};
use crate::kernels::psf2otf::psf2otf;
use crate::parallel;
use crate::validate::{check_direction, check_shape, check_voxel_size};

/// How the dipole kernel is synthesized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DipoleMethod {
    /// Analytic k-space expression evaluated on the spectral grid.
    KSpace,
    /// Spatial point spread function transformed to k-space.
    ISpace,
}

impl DipoleMethod {
    /// Parse a method name. Accepts `k`, `kspace`, `i`, and `ispace`.
    pub fn from_str(s: &str) -> Result<Self, QsmError> {
        match s {
            "k" | "kspace" => Ok(DipoleMethod::KSpace),
            "i" | "ispace" => Ok(DipoleMethod::ISpace),
            _ => Err(QsmError::invalid_option("Dkernel", s)),
        }
    }
}

/// Build the dipole kernel for a real volume of `shape` on the
/// half-complex grid `(nx/2 + 1, ny, nz)`.
///
/// `vsz` is the voxel size in mm and `bdir` the main-field direction,
/// normalized internally.
pub fn dipole_kernel(
    shape: [usize; 3],
    vsz: [f64; 3],
    bdir: [f64; 3],
    method: DipoleMethod,
) -> Result<Vec<f64>, QsmError> {
    check_shape("dipole_kernel", shape)?;
    check_voxel_size(vsz)?;
    let b = check_direction(bdir)?;

    match method {
        DipoleMethod::KSpace => Ok(dipole_k(shape, vsz, b)),
        DipoleMethod::ISpace => dipole_i(shape, vsz, b),
    }
}

/// k-space form: `D(K) = 1/3 - (K.b)^2 / |K|^2`, zero at the origin.
/// The frequency spacing along axis i is `1/(vsz[i] * shape[i])`.
fn dipole_k(shape: [usize; 3], vsz: [f64; 3], b: [f64; 3]) -> Vec<f64> {
    let [nx, ny, nz] = shape;
    let hx = nx / 2 + 1;
    let fx = rfftfreq(nx, vsz[0]);
    let fy = fftfreq(ny, vsz[1]);
    let fz = fftfreq(nz, vsz[2]);

    let mut d = vec![0.0; hx * ny * nz];
    parallel::for_each_slab(&mut d, hx * ny, |k, slab| {
        let kz = fz[k];
        for j in 0..ny {
            let ky = fy[j];
            for i in 0..hx {
                let kx = fx[i];
                let k2 = kx * kx + ky * ky + kz * kz;
                slab[i + j * hx] = if k2 == 0.0 {
                    0.0
                } else {
                    let kb = kx * b[0] + ky * b[1] + kz * b[2];
                    1.0 / 3.0 - (kb * kb) / k2
                };
            }
        }
    });
    d
}

/// i-space form: the spatial unit dipole response
/// `d(r) = (3 (r.b)^2 - |r|^2) / (4 pi |r|^5)` sampled on the centered
/// voxel grid, zero at the origin, then converted with [`psf2otf`].
fn dipole_i(shape: [usize; 3], vsz: [f64; 3], b: [f64; 3]) -> Result<Vec<f64>, QsmError> {
    let [nx, ny, nz] = shape;
    let (cx, cy, cz) = (nx / 2, ny / 2, nz / 2);

    let mut psf = vec![0.0; nx * ny * nz];
    parallel::for_each_slab(&mut psf, nx * ny, |k, slab| {
        let z = (k as f64 - cz as f64) * vsz[2];
        for j in 0..ny {
            let y = (j as f64 - cy as f64) * vsz[1];
            for i in 0..nx {
                let x = (i as f64 - cx as f64) * vsz[0];
                let r2 = x * x + y * y + z * z;
                if r2 > 0.0 {
                    let rb = x * b[0] + y * b[1] + z * b[2];
                    slab[i + j * nx] = (3.0 * rb * rb - r2) / (4.0 * PI * r2 * r2 * r2.sqrt());
                }
            }
        }
    });

    Ok(psf2otf(&psf, shape, shape, true)?.into_real())
}
