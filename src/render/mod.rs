//! Consumer side: sweep images, the compositor and its composition backends.

pub mod compositor;
pub mod gpu;
pub mod gpu_sweep;
pub mod image;
pub mod sweep;

pub use compositor::{CompositorConfig, SpectrogramCompositor};
pub use gpu::GpuContext;
pub use gpu_sweep::GpuSweep;
pub use image::{InputColumn, SpectrogramImage};
pub use sweep::{CpuSweep, SweepComposer};
