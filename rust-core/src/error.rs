//! Error type shared by every fallible operation in the engine

use crate::params::Window;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CqError {
    #[error("Sample rate must be positive and finite (found: {0})")]
    InvalidSampleRate(f64),

    #[error("Frequency range must satisfy 0 < min < max <= Nyquist (found: min {min} Hz, max {max} Hz, Nyquist {nyquist} Hz)")]
    InvalidFrequencyRange { min: f64, max: f64, nyquist: f64 },

    #[error("Bins per octave must be at least 1")]
    InvalidBinsPerOctave,

    #[error("Parameter {name} out of range: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Window {0:?} is not supported for kernel atoms (only SqrtBlackmanHarris is)")]
    UnsupportedWindow(Window),

    #[error("Kernel atom for bin {bin} has non-positive length {length}")]
    InvalidAtomLength { bin: usize, length: i64 },

    #[error("Resampler rates must be non-zero (found: {source_rate} -> {target_rate})")]
    InvalidRate { source_rate: usize, target_rate: usize },

    #[error("Resampler filter length {0} is too short (need at least 2 taps)")]
    FilterTooShort(usize),

    #[error("Inverse block width {width} must be a multiple of {block}")]
    BlockWidth { width: usize, block: usize },

    #[error("Expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),

    #[error("Column stream ended inside a column ({read} of {height} values read)")]
    TruncatedColumn { read: usize, height: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pipeline worker thread panicked")]
    WorkerPanicked,
}
