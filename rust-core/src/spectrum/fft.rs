//! FFT engine for kernel frames
//!
//! Real-input frames go through realfft; atom construction and synthesis need
//! full complex transforms and go through rustfft. All buffers are reused.

use crate::error::CqError;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Planned FFTs of one fixed size
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (half spectrum)
    half_spectrum: Vec<Complex64>,

    scratch: Vec<Complex64>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut real_planner = RealFftPlanner::<f64>::new();
        let r2c = real_planner.plan_fft_forward(fft_size);

        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            fft_size,
            input_buffer: vec![0.0; fft_size],
            half_spectrum: r2c.make_output_vec(),
            scratch: vec![Complex64::new(0.0, 0.0); scratch_len],
            r2c,
            forward,
            inverse,
        }
    }

    /// Full spectrum of a real frame
    ///
    /// # Arguments
    /// * `frame` - Exactly `fft_size` samples
    ///
    /// # Returns
    /// All `fft_size` bins; the upper half mirrors the lower as conjugates
    pub fn forward_real(&mut self, frame: &[f64]) -> Result<Vec<Complex64>, CqError> {
        self.check_len(frame.len())?;
        self.input_buffer.copy_from_slice(frame);
        self.r2c
            .process(&mut self.input_buffer, &mut self.half_spectrum)?;

        let n = self.fft_size;
        let mut spectrum = Vec::with_capacity(n);
        spectrum.extend_from_slice(&self.half_spectrum);
        spectrum.extend((n / 2 + 1..n).map(|k| self.half_spectrum[n - k].conj()));
        Ok(spectrum)
    }

    /// Unnormalized complex forward FFT in place
    pub fn forward_complex(&mut self, buffer: &mut [Complex64]) -> Result<(), CqError> {
        self.check_len(buffer.len())?;
        self.forward.process_with_scratch(buffer, &mut self.scratch);
        Ok(())
    }

    /// Inverse FFT normalized by 1/N, keeping the real part
    ///
    /// The spectrum is consumed as scratch space.
    pub fn inverse_real(&mut self, spectrum: &mut [Complex64]) -> Result<Vec<f64>, CqError> {
        self.check_len(spectrum.len())?;
        self.inverse.process_with_scratch(spectrum, &mut self.scratch);

        let scale = 1.0 / self.fft_size as f64;
        Ok(spectrum.iter().map(|c| c.re * scale).collect())
    }

    fn check_len(&self, found: usize) -> Result<(), CqError> {
        if found != self.fft_size {
            return Err(CqError::LengthMismatch {
                expected: self.fft_size,
                found,
            });
        }
        Ok(())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}
