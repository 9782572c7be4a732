//! Python bindings for the forward and inverse transforms

use numpy::{Complex64, PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;

use super::build_params;
use crate::spectrum::{Column, ForwardTransform, InverseTransform};

/// Forward constant-Q transform exposed to Python
#[pyclass(name = "ConstantQ")]
pub struct PyConstantQ {
    transform: ForwardTransform,
}

fn columns_to_py<'py>(py: Python<'py>, columns: Vec<Column>) -> Vec<&'py PyArray1<Complex64>> {
    columns
        .into_iter()
        .map(|column| PyArray1::from_vec(py, column))
        .collect()
}

#[pymethods]
impl PyConstantQ {
    /// Create a forward transform
    ///
    /// Args:
    ///     sample_rate: Input sample rate in Hz
    ///     min_frequency: Lowest frequency of interest in Hz
    ///     max_frequency: Highest bin centre in Hz
    ///     bins_per_octave: Bins per octave
    #[new]
    #[pyo3(signature = (sample_rate, min_frequency, max_frequency, bins_per_octave=12, q=1.0, atom_hop_factor=0.25, threshold=0.0005))]
    fn new(
        sample_rate: f64,
        min_frequency: f64,
        max_frequency: f64,
        bins_per_octave: usize,
        q: f64,
        atom_hop_factor: f64,
        threshold: f64,
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
            transform: ForwardTransform::new(&params)?,
        })
    }

    /// Analyse samples
    ///
    /// Returns:
    ///     List of complex columns (ragged: lower octaves appear on fewer columns)
    fn process<'py>(
        &mut self,
        py: Python<'py>,
        samples: PyReadonlyArray1<f64>,
    ) -> PyResult<Vec<&'py PyArray1<Complex64>>> {
        let columns = self.transform.process(samples.as_slice()?)?;
        Ok(columns_to_py(py, columns))
    }

    /// Drain the remaining columns
    fn flush<'py>(&mut self, py: Python<'py>) -> PyResult<Vec<&'py PyArray1<Complex64>>> {
        let columns = self.transform.flush()?;
        Ok(columns_to_py(py, columns))
    }

    /// Centre frequency of a row in Hz
    fn bin_frequency(&self, row: usize) -> f64 {
        self.transform.bin_frequency(row)
    }

    #[getter]
    fn output_latency(&self) -> usize {
        self.transform.output_latency()
    }

    #[getter]
    fn bin_count(&self) -> usize {
        self.transform.bin_count()
    }

    #[getter]
    fn octaves(&self) -> usize {
        self.transform.octaves()
    }

    #[getter]
    fn block_width(&self) -> usize {
        self.transform.block_width()
    }
}

/// Inverse constant-Q transform exposed to Python
#[pyclass(name = "InverseConstantQ")]
pub struct PyInverseConstantQ {
    transform: InverseTransform,
}

#[pymethods]
impl PyInverseConstantQ {
    #[new]
    #[pyo3(signature = (sample_rate, min_frequency, max_frequency, bins_per_octave=12, q=1.0, atom_hop_factor=0.25, threshold=0.0005))]
    fn new(
        sample_rate: f64,
        min_frequency: f64,
        max_frequency: f64,
        bins_per_octave: usize,
        q: f64,
        atom_hop_factor: f64,
        threshold: f64,
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
            transform: InverseTransform::new(&params)?,
        })
    }

    /// Resynthesize whole blocks of columns
    ///
    /// Args:
    ///     columns: List of complex columns, a multiple of block_width long
    ///
    /// Returns:
    ///     Reconstructed samples as numpy array
    fn process<'py>(
        &mut self,
        py: Python<'py>,
        columns: Vec<PyReadonlyArray1<Complex64>>,
    ) -> PyResult<&'py PyArray1<f64>> {
        let columns: Vec<Column> = columns
            .iter()
            .map(|column| column.as_array().to_vec())
            .collect();
        let samples = self.transform.process(&columns)?;
        Ok(PyArray1::from_vec(py, samples))
    }

    /// Drain the remaining samples
    fn flush<'py>(&mut self, py: Python<'py>) -> PyResult<&'py PyArray1<f64>> {
        let samples = self.transform.flush()?;
        Ok(PyArray1::from_vec(py, samples))
    }

    #[getter]
    fn output_latency(&self) -> usize {
        self.transform.output_latency()
    }

    #[getter]
    fn block_width(&self) -> usize {
        self.transform.block_width()
    }
}
