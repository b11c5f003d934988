//! Numerical kernels: window tables and the radix-2 transform.

pub mod fft;
pub mod window;

pub use fft::{FftDirection, FftEngine};
pub use window::WindowKind;
