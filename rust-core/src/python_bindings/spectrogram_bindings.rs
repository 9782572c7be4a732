//! Python bindings for the interpolated spectrogram

use numpy::{Complex64, PyArray2, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use super::build_params;
use crate::spectrum::{Column, Spectrogram};

/// Dense constant-Q spectrogram exposed to Python
#[pyclass(name = "Spectrogram")]
pub struct PySpectrogram {
    spectrogram: Spectrogram,
}

fn columns_to_py<'py>(py: Python<'py>, columns: Vec<Column>) -> PyResult<&'py PyArray2<Complex64>> {
    PyArray2::from_vec2(py, &columns).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pymethods]
impl PySpectrogram {
    #[new]
    #[pyo3(signature = (sample_rate, min_frequency, max_frequency, bins_per_octave=12, q=1.0, atom_hop_factor=0.25, threshold=0.0005, dilation=0.5))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        sample_rate: f64,
        min_frequency: f64,
        max_frequency: f64,
        bins_per_octave: usize,
        q: f64,
        atom_hop_factor: f64,
        threshold: f64,
        dilation: f64,
    ) -> PyResult<Self> {
        let params = build_params(
            sample_rate,
            min_frequency,
            max_frequency,
            bins_per_octave,
            q,
            atom_hop_factor,
            threshold,
        )?;
        Ok(Self {
            spectrogram: Spectrogram::new(&params)?.with_dilation(dilation),
        })
    }

    /// Analyse samples
    ///
    /// Returns:
    ///     Complex array of shape (columns, bin_count)
    fn process<'py>(
        &mut self,
        py: Python<'py>,
        samples: PyReadonlyArray1<f64>,
    ) -> PyResult<&'py PyArray2<Complex64>> {
        let columns = self.spectrogram.process(samples.as_slice()?)?;
        columns_to_py(py, columns)
    }

    /// Drain and complete the remaining columns
    fn flush<'py>(&mut self, py: Python<'py>) -> PyResult<&'py PyArray2<Complex64>> {
        let columns = self.spectrogram.flush()?;
        columns_to_py(py, columns)
    }

    #[getter]
    fn bin_count(&self) -> usize {
        self.spectrogram.forward().bin_count()
    }
}
