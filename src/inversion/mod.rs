//! Dipole inversion: recover susceptibility from the tissue field.

pub mod direct;

pub use direct::{tikh, tkd, tsvd, TikhOpts, TikhReg, TkdOpts, TsvdOpts};
