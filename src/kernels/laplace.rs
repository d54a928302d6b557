//! Discrete Laplacian transfer function.
//!
//! Built from the 7-point finite difference stencil `{1, -2, 1} / vsz^2`
//! along each axis and converted with psf2otf. The negated variant is the
//! regularizer used by gradient-penalized Tikhonov inversion.

use crate::error::QsmError;
use crate::kernels::psf2otf::psf2otf;
use crate::validate::{check_shape, check_voxel_size};

/// Build the Laplacian transfer function for a real volume of `shape` on
/// the half-complex grid `(nx/2 + 1, ny, nz)`.
///
/// With `negative` the stencil is negated before transforming, producing
/// the nonnegative spectrum `sum_i 2 (1 - cos(2 pi k_i / n_i)) / vsz_i^2`.
pub fn laplace_kernel(
    shape: [usize; 3],
    vsz: [f64; 3],
    negative: bool,
) -> Result<Vec<f64>, QsmError> {
    check_shape("laplace_kernel", shape)?;
    check_voxel_size(vsz)?;

    let hx = 1.0 / (vsz[0] * vsz[0]);
    let hy = 1.0 / (vsz[1] * vsz[1]);
    let hz = 1.0 / (vsz[2] * vsz[2]);
    let sign = if negative { -1.0 } else { 1.0 };

    // 3x3x3 stencil, center at (1,1,1): index = i + 3j + 9k.
    let mut psf = vec![0.0; 27];
    psf[13] = sign * -2.0 * (hx + hy + hz);
    psf[12] = sign * hx;
    psf[14] = sign * hx;
    psf[10] = sign * hy;
    psf[16] = sign * hy;
    psf[4] = sign * hz;
    psf[22] = sign * hz;

    Ok(psf2otf(&psf, [3, 3, 3], shape, true)?.into_real())
}
