//! Shared array utilities: FFT sizing, padding, and mask operations.

pub mod fftsize;
pub mod mask;
pub mod pad;

pub use fftsize::fast_fft_size;
pub use mask::{crop, crop_indices, erode_mask, sphere_mask};
pub use pad::{pad, pad_into, unpad, unpad_into, PadMode};
