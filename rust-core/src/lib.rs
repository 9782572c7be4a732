//! Constant-Q - streaming constant-Q transform engine
//!
//! Forward analysis into geometrically spaced frequency bins, resynthesis
//! from those bins, and temporal interpolation of the ragged forward output.
//! Optional Python bindings behind the `python` feature.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod error;
pub mod filters;
pub mod params;
pub mod persist;
pub mod spectrum;
pub mod stream;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use error::CqError;
pub use filters::Resampler;
pub use params::{CqParams, Window};
pub use persist::{read_columns, write_columns, ColumnHeights};
pub use spectrum::{
    Column, CqKernel, ForwardTransform, InverseTransform, KernelProperties, Spectrogram,
    SpectrogramInterpolator,
};
