//! Constant-Q analysis and synthesis

pub mod fft;
pub mod sparse;
pub mod kernel;
pub mod forward;
pub mod inverse;
pub mod interpolate;

pub use fft::FftEngine;
pub use forward::{Column, ForwardTransform};
pub use interpolate::{Spectrogram, SpectrogramInterpolator};
pub use inverse::InverseTransform;
pub use kernel::{CqKernel, KernelProperties};
pub use sparse::{SparseKernel, SparseRow};
