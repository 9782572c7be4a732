//! Filter design and rational resampling

pub mod windows;
pub mod design;
pub mod resampler;

pub use design::{design_lowpass, LowpassSpec};
pub use resampler::Resampler;
pub use windows::{atom_window, kaiser_window, KaiserParameters};
