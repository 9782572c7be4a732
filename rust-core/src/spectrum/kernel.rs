//! Constant-Q spectral kernel
//!
//! One octave's worth of windowed complex exponentials ("atoms"), several
//! time-shifted copies per frame, transformed to the frequency domain and
//! stored sparse. Applying the kernel to a frame spectrum yields the CQ
//! coefficients of that octave; applying its adjoint resynthesizes.

use super::fft::FftEngine;
use super::sparse::{SparseKernel, SparseRow};
use crate::error::CqError;
use crate::filters::windows::atom_window;
use crate::params::CqParams;
use ndarray::{s, Array2, ArrayView1, Axis};
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::debug;

/// Frame geometry derived from the parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelProperties {
    pub sample_rate: f64,
    pub max_frequency: f64,

    /// Lowest bin of the kernel's octave (the top octave)
    pub min_frequency: f64,

    pub bins_per_octave: usize,
    pub fft_size: usize,
    pub fft_hop: usize,
    pub atoms_per_frame: usize,
    pub atom_spacing: usize,
    pub first_centre: usize,
    pub last_centre: usize,

    /// Effective quality factor (centre frequency over bandwidth)
    pub q: f64,
}

impl KernelProperties {
    /// Derive the frame geometry
    pub fn derive(params: &CqParams) -> Result<Self, CqError> {
        let bpo = params.bins_per_octave() as f64;
        let semitone = 2f64.powf(1.0 / bpo);
        let sample_rate = params.sample_rate();
        let max_frequency = params.max_frequency();

        let min_frequency = semitone * max_frequency / 2.0;
        let q = params.q() / (semitone - 1.0);

        let max_atom = (q * sample_rate / min_frequency + 0.5).floor();
        let min_atom =
            (q * sample_rate / (min_frequency * 2f64.powf((bpo - 1.0) / bpo)) + 0.5).floor();
        if max_atom < 1.0 {
            return Err(CqError::InvalidAtomLength {
                bin: 0,
                length: max_atom as i64,
            });
        }
        if min_atom < 1.0 {
            return Err(CqError::InvalidAtomLength {
                bin: params.bins_per_octave() - 1,
                length: min_atom as i64,
            });
        }

        let atom_spacing = (min_atom * params.atom_hop_factor() + 0.5) as usize;
        if atom_spacing == 0 {
            return Err(CqError::InvalidParameter {
                name: "atom_hop_factor",
                value: params.atom_hop_factor(),
            });
        }

        let half_atom = (max_atom / 2.0).ceil() as usize;
        let first_centre = atom_spacing * half_atom.div_ceil(atom_spacing);
        let fft_size = (first_centre + half_atom).next_power_of_two();
        let atoms_per_frame = 1 + (fft_size - half_atom - first_centre) / atom_spacing;
        let last_centre = first_centre + (atoms_per_frame - 1) * atom_spacing;
        let fft_hop = last_centre + atom_spacing - first_centre;

        Ok(Self {
            sample_rate,
            max_frequency,
            min_frequency,
            bins_per_octave: params.bins_per_octave(),
            fft_size,
            fft_hop,
            atoms_per_frame,
            atom_spacing,
            first_centre,
            last_centre,
            q,
        })
    }

    /// Centre frequency of bin `k` of the kernel octave, ascending from 0
    pub fn bin_frequency(&self, k: usize) -> f64 {
        self.min_frequency * 2f64.powf(k as f64 / self.bins_per_octave as f64)
    }

    /// Atom length in samples for bin `k`
    fn atom_length(&self, k: usize) -> i64 {
        (self.q * self.sample_rate / self.bin_frequency(k) + 0.5) as i64
    }
}

/// Sparse constant-Q kernel for one octave
pub struct CqKernel {
    properties: KernelProperties,
    kernel: SparseKernel,
}

impl CqKernel {
    /// Build and normalize the kernel
    pub fn new(params: &CqParams) -> Result<Self, CqError> {
        let properties = KernelProperties::derive(params)?;
        debug!(
            fft_size = properties.fft_size,
            fft_hop = properties.fft_hop,
            atoms_per_frame = properties.atoms_per_frame,
            atom_spacing = properties.atom_spacing,
            first_centre = properties.first_centre,
            q = properties.q,
            "kernel geometry"
        );

        let mut dense = Self::dense_atoms(params, &properties)?;
        let weight = Self::normalization_weight(&dense, params.q(), &properties);
        debug!(weight, "kernel normalization");

        // Forward application uses the adjoint, so store conjugates
        dense.mapv_inplace(|c| c.conj() * weight);
        let rows = dense
            .axis_iter(Axis(0))
            .map(|row| SparseRow::from_dense(row.iter().copied()))
            .collect();
        let kernel = SparseKernel::new(rows, properties.fft_size);

        debug!(
            rows = kernel.row_count(),
            stored = kernel.stored(),
            density = kernel.stored() as f64 / (kernel.row_count() * properties.fft_size) as f64,
            "kernel compressed"
        );

        Ok(Self { properties, kernel })
    }

    /// Frequency-domain atoms, one row per (bin, atom), bin-major
    fn dense_atoms(
        params: &CqParams,
        p: &KernelProperties,
    ) -> Result<Array2<Complex64>, CqError> {
        let mut fft = FftEngine::new(p.fft_size);
        let mut dense = Array2::zeros((p.bins_per_octave * p.atoms_per_frame, p.fft_size));
        let scale = 1.0 / p.fft_size as f64;
        let threshold = params.threshold();

        for k in 0..p.bins_per_octave {
            let length = p.atom_length(k);
            if length < 2 {
                return Err(CqError::InvalidAtomLength { bin: k, length });
            }
            let length = length as usize;

            let window = atom_window(params.window(), length)?;
            let step = 2.0 * PI * p.bin_frequency(k) / p.sample_rate;
            let atom: Vec<Complex64> = window
                .iter()
                .enumerate()
                .map(|(i, &w)| Complex64::from_polar(w, step * i as f64))
                .collect();

            let offset = p.first_centre - length.div_ceil(2);
            for a in 0..p.atoms_per_frame {
                let shift = offset + a * p.atom_spacing;
                let mut frame = vec![Complex64::new(0.0, 0.0); p.fft_size];
                frame[shift..shift + length].copy_from_slice(&atom);
                fft.forward_complex(&mut frame)?;

                let mut row = dense.row_mut(k * p.atoms_per_frame + a);
                for (dst, x) in row.iter_mut().zip(frame) {
                    if x.norm() >= threshold {
                        *dst = x * scale;
                    }
                }
            }
        }

        Ok(dense)
    }

    /// Weight making the kernel approximately a tight frame
    ///
    /// Averages the diagonal of S^H S over the band between the peaks of the
    /// lowest and highest atoms, away from the edges.
    fn normalization_weight(dense: &Array2<Complex64>, q_scale: f64, p: &KernelProperties) -> f64 {
        let last = dense.nrows() - 1;
        let wx1 = argmax_norm(dense.row(0));
        let wx2 = argmax_norm(dense.row(last));

        let mut weight = p.fft_hop as f64 / p.fft_size as f64;
        if wx1 <= wx2 {
            let energies = dense
                .slice(s![.., wx1..=wx2])
                .mapv(|c| c.norm_sqr())
                .sum_axis(Axis(0));

            let margin = (1.0 / q_scale + 0.5) as usize;
            let end = energies.len().saturating_sub(margin + 2);
            if margin < end {
                weight /= energies.slice(s![margin..end]).mean().unwrap_or(1.0);
            }
        }
        weight.sqrt()
    }

    /// CQ coefficients of one frame spectrum
    ///
    /// # Arguments
    /// * `spectrum` - Full `fft_size`-bin spectrum
    ///
    /// # Returns
    /// `bins_per_octave * atoms_per_frame` values, bin-major, ascending bins
    pub fn apply_forward(&self, spectrum: &[Complex64]) -> Result<Vec<Complex64>, CqError> {
        self.kernel.multiply(spectrum)
    }

    /// Frame spectrum from CQ coefficients
    ///
    /// # Arguments
    /// * `coefficients` - `bins_per_octave * atoms_per_frame` values laid out
    ///   as `apply_forward` returns them
    pub fn apply_inverse(&self, coefficients: &[Complex64]) -> Result<Vec<Complex64>, CqError> {
        self.kernel.multiply_adjoint(coefficients)
    }

    pub fn properties(&self) -> &KernelProperties {
        &self.properties
    }

    pub fn sparse(&self) -> &SparseKernel {
        &self.kernel
    }
}

fn argmax_norm(row: ArrayView1<Complex64>) -> usize {
    let mut best = (0, f64::MIN);
    for (i, c) in row.iter().enumerate() {
        let norm = c.norm();
        if norm > best.1 {
            best = (i, norm);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_params() -> CqParams {
        CqParams::new(44100.0, 110.0, 14080.0, 24).unwrap()
    }

    #[test]
    fn test_example_geometry() {
        let p = KernelProperties::derive(&example_params()).unwrap();
        assert_eq!(p.fft_size, 256);
        assert_eq!(p.fft_hop, 54);
        assert_eq!(p.atoms_per_frame, 2);
        assert_eq!(p.atom_spacing, 27);
        assert_eq!(p.first_centre, 108);
        assert_eq!(p.last_centre, 135);
        assert!((p.q - 34.127).abs() < 1e-3);

        // Top bin lands on the maximum frequency
        assert!((p.bin_frequency(23) - 14080.0).abs() < 1e-6);
        assert!((p.bin_frequency(0) - 7246.29).abs() < 0.01);
    }

    #[test]
    fn test_geometry_invariants() {
        for (sr, max, bpo) in [(44100.0, 14080.0, 24), (48000.0, 20000.0, 12), (8000.0, 2000.0, 36)] {
            let params = CqParams::new(sr, max / 64.0, max, bpo).unwrap();
            let p = KernelProperties::derive(&params).unwrap();
            assert!(p.fft_size.is_power_of_two());
            assert_eq!(p.fft_hop, p.last_centre + p.atom_spacing - p.first_centre);
            assert_eq!(p.first_centre % p.atom_spacing, 0);
            assert!(p.atoms_per_frame >= 1);
        }
    }

    #[test]
    fn test_kernel_shape() {
        let kernel = CqKernel::new(&example_params()).unwrap();
        let sparse = kernel.sparse();
        assert_eq!(sparse.row_count(), 48);
        assert_eq!(sparse.column_count(), 256);
        assert!(sparse.rows().iter().all(|row| !row.values.is_empty()));
        assert!(sparse.stored() < 48 * 256);
    }

    #[test]
    fn test_forward_picks_matching_bin() {
        let kernel = CqKernel::new(&example_params()).unwrap();
        let p = *kernel.properties();
        let mut fft = FftEngine::new(p.fft_size);

        for bin in [3, 12, 20] {
            let f = p.bin_frequency(bin);
            let frame: Vec<f64> = (0..p.fft_size)
                .map(|t| (2.0 * PI * f * t as f64 / p.sample_rate).cos())
                .collect();
            let spectrum = fft.forward_real(&frame).unwrap();
            let coefficients = kernel.apply_forward(&spectrum).unwrap();
            assert_eq!(coefficients.len(), 48);

            let loudest = argmax_norm(ndarray::aview1(&coefficients));
            assert_eq!(loudest / p.atoms_per_frame, bin);
        }
    }

    #[test]
    fn test_inverse_spectrum_length() {
        let kernel = CqKernel::new(&example_params()).unwrap();
        let coefficients = vec![Complex64::new(1.0, 0.0); 48];
        assert_eq!(kernel.apply_inverse(&coefficients).unwrap().len(), 256);

        assert!(matches!(
            kernel.apply_inverse(&coefficients[..10]),
            Err(CqError::LengthMismatch { expected: 48, found: 10 })
        ));
        assert!(matches!(
            kernel.apply_forward(&coefficients),
            Err(CqError::LengthMismatch { expected: 256, found: 48 })
        ));
    }

    #[test]
    fn test_degenerate_atoms_rejected() {
        let params = CqParams::new(100.0, 1.0, 50.0, 1).unwrap().with_q(0.1).unwrap();
        assert!(matches!(
            CqKernel::new(&params),
            Err(CqError::InvalidAtomLength { .. })
        ));
    }
}
