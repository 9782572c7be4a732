//! Streaming multi-octave inverse constant-Q transform
//!
//! Each octave's coefficients are mapped back to a frame spectrum through the
//! kernel adjoint, inverse transformed and overlap-added at the octave's own
//! rate, then upsampled to the input rate. The octaves are summed into one
//! waveform.

use super::fft::FftEngine;
use super::forward::{octave_drops, Column, RESAMPLER_ATTENUATION, RESAMPLER_BANDWIDTH};
use super::kernel::{CqKernel, KernelProperties};
use crate::error::CqError;
use crate::filters::Resampler;
use crate::params::CqParams;
use crate::stream::buffer::SampleQueue;
use num_complex::Complex64;
use tracing::{debug, trace};

/// Extra samples of safety margin in the alignment latency
const LATENCY_MARGIN: usize = 10;

/// Inverse constant-Q transform
pub struct InverseTransform {
    kernel: CqKernel,
    fft: FftEngine,
    octaves: usize,
    output_latency: usize,

    /// Reconstructed samples per octave, at the input rate
    buffers: Vec<SampleQueue>,

    /// Overlap-add accumulators, one frame long, at each octave's rate
    overlap: Vec<Vec<f64>>,

    /// Upsampler for octave i is at index i - 1
    upsamplers: Vec<Resampler>,
}

impl InverseTransform {
    pub fn new(params: &CqParams) -> Result<Self, CqError> {
        let octaves = params.octaves();
        let kernel = CqKernel::new(params)?;
        let p = *kernel.properties();

        let target_rate = 1usize << octaves;
        let upsamplers = (1..octaves)
            .map(|i| {
                Resampler::new(
                    target_rate >> i,
                    target_rate,
                    RESAMPLER_ATTENUATION,
                    RESAMPLER_BANDWIDTH,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Upsampler latency is already at the output rate; add one hop of
        // overlap-add delay per octave
        let latencies: Vec<usize> = (0..octaves)
            .map(|i| {
                let resampler = if i == 0 { 0 } else { upsamplers[i - 1].latency() };
                resampler + (p.fft_hop << i)
            })
            .collect();
        let pushes = octave_drops(&p, octaves);

        let total = latencies
            .iter()
            .zip(&pushes)
            .map(|(&l, &push)| l.saturating_sub(push))
            .max()
            .unwrap_or(0)
            + LATENCY_MARGIN;
        let output_latency = total + (p.first_centre << (octaves - 1));

        let buffers = latencies
            .iter()
            .zip(&pushes)
            .map(|(l, push)| SampleQueue::zeros(total + push - l))
            .collect();

        debug!(octaves, total_latency = total, output_latency, "inverse transform configured");

        Ok(Self {
            fft: FftEngine::new(p.fft_size),
            overlap: vec![vec![0.0; p.fft_size]; octaves],
            kernel,
            octaves,
            output_latency,
            buffers,
            upsamplers,
        })
    }

    /// Resynthesize whole blocks of columns
    ///
    /// # Arguments
    /// * `columns` - A multiple of `block_width()` columns, in the layout
    ///   `ForwardTransform` emits; may be empty
    ///
    /// # Returns
    /// Whatever output every octave has ready, clamped to [-1, 1]
    pub fn process(&mut self, columns: &[Column]) -> Result<Vec<f64>, CqError> {
        if columns.is_empty() {
            return Ok(self.draw_output());
        }

        let block = self.block_width();
        if columns.len() % block != 0 {
            return Err(CqError::BlockWidth {
                width: columns.len(),
                block,
            });
        }

        // Validate every octave before touching any state
        let groups = (0..self.octaves)
            .map(|octave| self.octave_group(columns, octave))
            .collect::<Result<Vec<_>, _>>()?;

        for (octave, group) in groups.iter().enumerate() {
            for frame in group.chunks(self.properties().atoms_per_frame) {
                let tall = self.stack_frame(frame);
                self.synthesize_frame(octave, &tall)?;
            }
        }

        trace!(columns = columns.len(), "inverse block");
        Ok(self.draw_output())
    }

    /// The octave's slice of every column tall enough to carry it
    fn octave_group<'a>(
        &self,
        columns: &'a [Column],
        octave: usize,
    ) -> Result<Vec<&'a [Complex64]>, CqError> {
        let p = self.properties();
        let bpo = p.bins_per_octave;
        let range = bpo * octave..bpo * (octave + 1);

        let group: Vec<&[Complex64]> = columns
            .iter()
            .filter(|column| column.len() >= range.end)
            .map(|column| &column[range.clone()])
            .collect();

        if group.len() % p.atoms_per_frame != 0 {
            return Err(CqError::LengthMismatch {
                expected: group.len().next_multiple_of(p.atoms_per_frame),
                found: group.len(),
            });
        }
        Ok(group)
    }

    /// Interleave one frame's atoms back into kernel layout (ascending bins)
    fn stack_frame(&self, frame: &[&[Complex64]]) -> Vec<Complex64> {
        let p = self.properties();
        let (bpo, apf) = (p.bins_per_octave, p.atoms_per_frame);
        let mut tall = vec![Complex64::new(0.0, 0.0); bpo * apf];
        for b in 0..bpo {
            for (a, column) in frame.iter().enumerate() {
                tall[b * apf + a] = column[bpo - 1 - b];
            }
        }
        tall
    }

    fn synthesize_frame(&mut self, octave: usize, coefficients: &[Complex64]) -> Result<(), CqError> {
        let n = self.properties().fft_size;
        let mut spectrum = self.kernel.apply_inverse(coefficients)?;

        // Real output needs a Hermitian spectrum
        for i in n / 2 + 1..n {
            spectrum[i] = spectrum[n - i].conj();
        }

        let frame = self.fft.inverse_real(&mut spectrum)?;
        self.overlap_add(octave, &frame)
    }

    /// Emit the settled head of the accumulator, then add the new frame
    fn overlap_add(&mut self, octave: usize, frame: &[f64]) -> Result<(), CqError> {
        let p = *self.properties();
        if frame.len() != p.fft_size {
            return Err(CqError::LengthMismatch {
                expected: p.fft_size,
                found: frame.len(),
            });
        }

        let accumulator = &mut self.overlap[octave];
        let settled = &accumulator[..p.fft_hop];
        if octave == 0 {
            self.buffers[0].push(settled);
        } else {
            let upsampled = self.upsamplers[octave - 1].process(settled);
            self.buffers[octave].push(&upsampled);
        }

        accumulator.copy_within(p.fft_hop.., 0);
        accumulator[p.fft_size - p.fft_hop..].fill(0.0);
        for (acc, x) in accumulator.iter_mut().zip(frame) {
            *acc += x;
        }
        Ok(())
    }

    /// Sum and remove the samples every octave has ready
    pub fn draw_output(&mut self) -> Vec<f64> {
        let available = self.buffers.iter().map(SampleQueue::len).min().unwrap_or(0);
        if available == 0 {
            return Vec::new();
        }

        let mut output = vec![0.0; available];
        for buffer in &mut self.buffers {
            for (out, x) in output.iter_mut().zip(buffer.peek(available)) {
                *out += x;
            }
            buffer.drop_front(available);
        }

        for sample in &mut output {
            *sample = sample.clamp(-1.0, 1.0);
        }
        output
    }

    /// Push silence through every overlap-add stage and upsampler, then draw
    pub fn flush(&mut self) -> Result<Vec<f64>, CqError> {
        let p = *self.properties();
        let silence = vec![0.0; p.fft_size];

        for octave in 0..self.octaves {
            let resampler_latency = if octave == 0 {
                0
            } else {
                self.upsamplers[octave - 1].latency() >> octave
            };
            let frames = (p.fft_size + resampler_latency).div_ceil(p.fft_hop);
            for _ in 0..frames {
                self.overlap_add(octave, &silence)?;
            }
        }

        Ok(self.draw_output())
    }

    /// Output samples between a column entering and its samples leaving
    pub fn output_latency(&self) -> usize {
        self.output_latency
    }

    /// Columns per accepted block
    pub fn block_width(&self) -> usize {
        self.properties().atoms_per_frame << (self.octaves - 1)
    }

    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn bin_count(&self) -> usize {
        self.octaves * self.properties().bins_per_octave
    }

    pub fn properties(&self) -> &KernelProperties {
        self.kernel.properties()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> InverseTransform {
        let params = CqParams::new(44100.0, 110.0, 14080.0, 24).unwrap();
        InverseTransform::new(&params).unwrap()
    }

    fn zero_block(width: usize, octaves: usize, bpo: usize) -> Vec<Column> {
        (0..width)
            .map(|t| {
                let height = if t == 0 {
                    octaves
                } else {
                    (t.trailing_zeros() as usize).min(octaves - 1) + 1
                };
                vec![Complex64::new(0.0, 0.0); height * bpo]
            })
            .collect()
    }

    #[test]
    fn test_example_latency() {
        let cqi = example();
        assert_eq!(cqi.block_width(), 128);
        assert_eq!(cqi.output_latency(), 12254);
    }

    #[test]
    fn test_rejects_partial_block() {
        let mut cqi = example();
        let columns = zero_block(100, 7, 24);
        assert!(matches!(
            cqi.process(&columns),
            Err(CqError::BlockWidth { width: 100, block: 128 })
        ));
    }

    #[test]
    fn test_empty_input_only_draws() {
        let mut cqi = example();
        let first = cqi.process(&[]).unwrap();
        assert!(first.iter().all(|&x| x == 0.0));
        assert!(cqi.process(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut cqi = example();
        let mut output = Vec::new();
        for _ in 0..4 {
            output.extend(cqi.process(&zero_block(128, 7, 24)).unwrap());
        }
        output.extend(cqi.flush().unwrap());
        assert!(output.len() > 4 * 128 * 27);
        assert!(output.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_output_is_clamped() {
        let mut cqi = example();
        let mut block = zero_block(128, 7, 24);
        for column in &mut block {
            for value in column.iter_mut() {
                *value = Complex64::new(1.0e4, 0.0);
            }
        }

        let mut output = cqi.process(&block).unwrap();
        output.extend(cqi.flush().unwrap());
        assert!(output.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert!(output.iter().any(|x| x.abs() == 1.0));
    }
}
