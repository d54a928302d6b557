//! Convolution kernel builders for the dipole inversion pipeline.
//!
//! Every builder produces a transfer function in the layout consumed by
//! the real-FFT pipeline at the given shape: a real tensor on the
//! half-complex grid `(nx/2 + 1, ny, nz)`. Builders are pure functions of
//! shape, voxel size, and direction; callers arrange any reuse.

pub mod dipole;
pub mod gradient;
pub mod laplace;
pub mod psf2otf;
pub mod smv;

pub use dipole::{dipole_kernel, DipoleMethod};
pub use gradient::grad_kernel;
pub use laplace::laplace_kernel;
pub use psf2otf::{psf2otf, Otf};
pub use smv::smv_kernel;
