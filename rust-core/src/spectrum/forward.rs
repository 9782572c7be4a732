//! Streaming multi-octave forward constant-Q transform
//!
//! The input is decimated by successive powers of two so that one kernel,
//! built for the top octave, serves every octave. Lower octaves run fewer,
//! longer frames; their coefficients land on every 2^octave-th column, which
//! gives the output its ragged shape.

use super::fft::FftEngine;
use super::kernel::{CqKernel, KernelProperties};
use crate::error::CqError;
use crate::filters::Resampler;
use crate::params::CqParams;
use crate::stream::buffer::SampleQueue;
use num_complex::Complex64;
use tracing::{debug, trace};

/// One column of CQ output: octave-major groups, highest frequency first
pub type Column = Vec<Complex64>;

pub(crate) const RESAMPLER_ATTENUATION: f64 = 50.0;
pub(crate) const RESAMPLER_BANDWIDTH: f64 = 0.05;

/// Per-octave sample drops that align atom centres across octaves
///
/// Shared with the inverse, which pushes the same amounts.
pub(crate) fn octave_drops(p: &KernelProperties, octaves: usize) -> Vec<usize> {
    let empty_hops = p.first_centre / p.atom_spacing;
    (0..octaves)
        .map(|i| {
            let drop_hops = empty_hops * (1 << (octaves - 1 - i)) - empty_hops;
            (drop_hops * p.fft_hop * (1 << i)) / p.atoms_per_frame
        })
        .collect()
}

/// Forward constant-Q transform
pub struct ForwardTransform {
    kernel: CqKernel,
    fft: FftEngine,
    octaves: usize,
    big_block: usize,
    output_latency: usize,

    /// Octave 0 holds raw input; octave i holds input decimated by 2^i
    buffers: Vec<SampleQueue>,

    /// Decimator for octave i is at index i - 1
    decimators: Vec<Resampler>,
}

impl ForwardTransform {
    pub fn new(params: &CqParams) -> Result<Self, CqError> {
        let octaves = params.octaves();
        let kernel = CqKernel::new(params)?;
        let p = *kernel.properties();

        // Exact powers of two: only the ratio matters to the resampler
        let source_rate = 1usize << octaves;
        let decimators = (1..octaves)
            .map(|i| {
                Resampler::new(
                    source_rate,
                    source_rate >> i,
                    RESAMPLER_ATTENUATION,
                    RESAMPLER_BANDWIDTH,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Decimator latencies in undecimated samples
        let latencies: Vec<usize> = std::iter::once(0)
            .chain(decimators.iter().enumerate().map(|(i, r)| r.latency() << (i + 1)))
            .collect();
        let drops = octave_drops(&p, octaves);

        let max_latency = latencies
            .iter()
            .zip(&drops)
            .map(|(l, d)| l + d)
            .max()
            .unwrap_or(0);

        // Top octave slack must be a whole number of hops...
        let top = latencies[0] + drops[0];
        let total = (max_latency - top).div_ceil(p.fft_hop) * p.fft_hop + top;

        // ...and the bottom octave's slack a whole number of its samples
        let last_factor = 1usize << (octaves - 1);
        let last_latency = latencies[octaves - 1];
        let total = last_latency + (total - last_latency).div_ceil(last_factor) * last_factor;

        let big_block = p.fft_size * last_factor;
        let output_latency = total + big_block - p.first_centre * last_factor;

        let buffers = (0..octaves)
            .map(|i| {
                let fill = (total - latencies[i] - drops[i] + big_block) as f64 / (1 << i) as f64;
                SampleQueue::zeros((fill + 0.5) as usize)
            })
            .collect();

        debug!(
            octaves,
            total_latency = total,
            output_latency,
            big_block,
            "forward transform configured"
        );

        Ok(Self {
            fft: FftEngine::new(p.fft_size),
            kernel,
            octaves,
            big_block,
            output_latency,
            buffers,
            decimators,
        })
    }

    /// Analyse a chunk of samples
    ///
    /// # Arguments
    /// * `samples` - Mono samples, any chunk size
    ///
    /// # Returns
    /// Zero or more whole blocks of `block_width()` columns
    pub fn process(&mut self, samples: &[f64]) -> Result<Vec<Column>, CqError> {
        self.buffers[0].push(samples);
        for (decimator, buffer) in self.decimators.iter_mut().zip(&mut self.buffers[1..]) {
            buffer.push(&decimator.process(samples));
        }

        let mut output = Vec::new();
        while self.has_full_block() {
            output.extend(self.process_block()?);
        }
        Ok(output)
    }

    /// Drain the transform by padding with enough silence to cover the latency
    pub fn flush(&mut self) -> Result<Vec<Column>, CqError> {
        let pad = self.output_latency.div_ceil(self.big_block) * self.big_block;
        self.process(&vec![0.0; pad])
    }

    fn has_full_block(&self) -> bool {
        let fft_size = self.kernel.properties().fft_size;
        self.buffers
            .iter()
            .enumerate()
            .all(|(i, buffer)| buffer.len() >= fft_size << (self.octaves - 1 - i))
    }

    fn process_block(&mut self) -> Result<Vec<Column>, CqError> {
        let p = *self.kernel.properties();
        let bpo = p.bins_per_octave;
        let apf = p.atoms_per_frame;
        let mut block: Vec<Column> = vec![Vec::new(); self.block_width()];

        for octave in 0..self.octaves {
            let stride = 1 << octave;
            for frame in 0..1 << (self.octaves - 1 - octave) {
                let coefficients = self.process_frame(octave)?;

                for atom in 0..apf {
                    let column = &mut block[(frame * apf + atom) * stride];
                    column.resize(bpo * (octave + 1), Complex64::new(0.0, 0.0));
                    // Kernel bins ascend; columns descend
                    for i in 0..bpo {
                        column[bpo * octave + i] = coefficients[(bpo - 1 - i) * apf + atom];
                    }
                }
            }
        }

        trace!(columns = block.len(), "forward block");
        Ok(block)
    }

    /// Kernel coefficients of the oldest frame of one octave
    fn process_frame(&mut self, octave: usize) -> Result<Vec<Complex64>, CqError> {
        let p = self.kernel.properties();
        let buffer = &mut self.buffers[octave];
        let spectrum = self.fft.forward_real(buffer.peek(p.fft_size))?;
        buffer.drop_front(p.fft_hop);
        self.kernel.apply_forward(&spectrum)
    }

    /// Input samples between a sample entering and its column leaving
    pub fn output_latency(&self) -> usize {
        self.output_latency
    }

    /// Rows in a full-height column
    pub fn bin_count(&self) -> usize {
        self.octaves * self.kernel.properties().bins_per_octave
    }

    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn bins_per_octave(&self) -> usize {
        self.kernel.properties().bins_per_octave
    }

    /// Columns per emitted block
    pub fn block_width(&self) -> usize {
        self.kernel.properties().atoms_per_frame << (self.octaves - 1)
    }

    /// Input samples between consecutive columns
    pub fn column_hop(&self) -> f64 {
        let p = self.kernel.properties();
        p.fft_hop as f64 / p.atoms_per_frame as f64
    }

    /// Centre frequency of `row`, counted from the top of a column
    pub fn bin_frequency(&self, row: usize) -> f64 {
        let p = self.kernel.properties();
        p.max_frequency * 2f64.powf(-(row as f64) / p.bins_per_octave as f64)
    }

    pub fn properties(&self) -> &KernelProperties {
        self.kernel.properties()
    }
}
