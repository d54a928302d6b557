//! qsm-core: numerical core for Quantitative Susceptibility Mapping
//!
//! Given an unwrapped tissue field map, a region-of-interest mask, and the
//! physical voxel size, this crate computes susceptibility maps by solving
//! the ill-posed dipole deconvolution in the Fourier domain.
//!
//! # Modules
//! - `fft`: FFT plans and 3D transforms (half-complex real pipeline)
//! - `kernels`: dipole, Laplacian, gradient, and SMV kernel builders
//! - `inversion`: direct dipole inversion (TKD, TSVD, Tikhonov)
//! - `utils`: fast FFT sizing, padding, cropping, mask erosion
//! - `parallel`: worker pool and parallel array primitives
//! - `error`: typed failures carrying the offending parameter
//!
//! Volumes are flat slices in Fortran (column-major) order, matching the
//! NIfTI voxel layout: `index = i + j*nx + k*nx*ny`. Multi-echo data
//! appends the echo axis last; each echo is a contiguous sub-slice.

pub mod error;
pub mod fft;
pub mod inversion;
pub mod kernels;
pub mod parallel;
pub mod utils;

pub(crate) mod validate;

pub use error::QsmError;
pub use inversion::{tikh, tkd, tsvd, TikhOpts, TikhReg, TkdOpts, TsvdOpts};
pub use kernels::{dipole_kernel, DipoleMethod};
