//! PyO3 bindings for Python integration

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::CqError;
use crate::params::CqParams;

mod spectrogram_bindings;
mod transform_bindings;

impl From<CqError> for PyErr {
    fn from(err: CqError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

fn build_params(
    sample_rate: f64,
    min_frequency: f64,
    max_frequency: f64,
    bins_per_octave: usize,
    q: f64,
    atom_hop_factor: f64,
    threshold: f64,
) -> Result<CqParams, CqError> {
    CqParams::new(sample_rate, min_frequency, max_frequency, bins_per_octave)?
        .with_q(q)?
        .with_atom_hop_factor(atom_hop_factor)?
        .with_threshold(threshold)
}

/// Python module definition
#[pymodule]
fn constant_q(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<transform_bindings::PyConstantQ>()?;
    m.add_class::<transform_bindings::PyInverseConstantQ>()?;
    m.add_class::<spectrogram_bindings::PySpectrogram>()?;
    Ok(())
}
