//! Squared-magnitude gradient transfer function.
//!
//! Forward first differences `{-1, 1} / vsz` along each axis, transformed
//! and combined as `sum_i |G_i|^2` on the spectral grid. By the
//! divergence-of-gradient identity this equals the negated Laplacian
//! spectrum; both constructions are exposed and the solvers use whichever
//! fits the regularizer.

use crate::error::QsmError;
use crate::kernels::psf2otf::{psf2otf, Otf};
use crate::parallel;
use crate::validate::{check_shape, check_voxel_size};

/// Build `sum_i |G_i|^2` for a real volume of `shape` on the half-complex
/// grid `(nx/2 + 1, ny, nz)`, where `G_i` is the forward first difference
/// along axis `i` scaled by `1/vsz[i]`.
pub fn grad_kernel(shape: [usize; 3], vsz: [f64; 3]) -> Result<Vec<f64>, QsmError> {
    check_shape("grad_kernel", shape)?;
    check_voxel_size(vsz)?;

    let hx = shape[0] / 2 + 1;
    let mut acc = vec![0.0; hx * shape[1] * shape[2]];

    for axis in 0..3 {
        let h = 1.0 / vsz[axis];
        let mut psf_shape = [1usize; 3];
        psf_shape[axis] = 2;
        let psf = [-h, h];

        match psf2otf(&psf, psf_shape, shape, true)? {
            Otf::Complex(g) => {
                parallel::zip_map_inplace(&mut acc, &g, |a, c| a + c.norm_sqr());
            }
            Otf::Real(g) => {
                parallel::zip_map_inplace(&mut acc, &g, |a, r| a + r * r);
            }
        }
    }
    Ok(acc)
}
