//! Polyphase rational resampler
//!
//! Streams between two integer rates related by an exact rational factor.
//! The Kaiser-windowed sinc is split into one sub-filter per input phase so
//! each output sample is a short dot product over real input samples only.

use super::design::{design_lowpass, LowpassSpec};
use crate::error::CqError;
use crate::stream::buffer::SampleQueue;
use tracing::debug;

#[derive(Debug, Clone)]
struct Phase {
    taps: Vec<f64>,
    drop: usize,
    next: usize,
}

/// Streaming rational resampler with fixed, declared latency
pub struct Resampler {
    source_rate: usize,
    target_rate: usize,
    filter_length: usize,

    /// Output scale restoring unity passband gain
    scale: f64,

    phases: Vec<Phase>,
    phase: usize,

    /// Output samples emitted before the first real input sample reaches
    /// the centre tap
    latency: usize,

    backlog: SampleQueue,

    /// Input a phase stepped past before it arrived; skipped on the next call
    pending_drop: usize,
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl Resampler {
    /// Create a new resampler
    ///
    /// # Arguments
    /// * `source_rate` - Input rate (any unit, only the ratio matters)
    /// * `target_rate` - Output rate
    /// * `attenuation` - Stopband attenuation in dB
    /// * `bandwidth` - Transition bandwidth as a fraction of the lower band
    pub fn new(
        source_rate: usize,
        target_rate: usize,
        attenuation: f64,
        bandwidth: f64,
    ) -> Result<Self, CqError> {
        if source_rate == 0 || target_rate == 0 {
            return Err(CqError::InvalidRate {
                source_rate,
                target_rate,
            });
        }

        let higher = source_rate.max(target_rate);
        let lower = source_rate.min(target_rate);
        let common = gcd(lower, higher);

        let spec = LowpassSpec {
            attenuation,
            bandwidth,
            ratio: higher / common,
            downsampling: target_rate < source_rate,
        };
        let filter = design_lowpass(&spec)?;
        let filter_length = filter.len();

        // Source sample i sits at i * input_spacing on the filter grid,
        // target sample j at j * output_spacing.
        let input_spacing = target_rate / common;
        let output_spacing = source_rate / common;

        let phases = (0..input_spacing)
            .map(|p| {
                let taps = filter.iter().skip(p).step_by(input_spacing).copied().collect();
                let drop = output_spacing.saturating_sub(p).div_ceil(input_spacing);
                let next = (p + input_spacing - output_spacing % input_spacing) % input_spacing;
                Phase { taps, drop, next }
            })
            .collect();

        // Pick the initial phase and zero fill so the first real input
        // sample lands on the centre tap after `latency` outputs.
        let centre = filter_length / 2;
        let latency = (filter_length - centre).div_ceil(output_spacing);
        let offset = centre + latency * output_spacing;
        let phase = offset % input_spacing;
        let fill = offset / input_spacing;

        debug!(
            source_rate,
            target_rate,
            filter_length,
            input_spacing,
            output_spacing,
            latency,
            "resampler configured"
        );

        Ok(Self {
            source_rate,
            target_rate,
            filter_length,
            scale: input_spacing as f64 / spec.peak_to_pole(),
            phases,
            phase,
            latency,
            backlog: SampleQueue::zeros(fill),
            pending_drop: 0,
        })
    }

    /// Resample a chunk of input
    ///
    /// Returns at most ceil(len * target / source) samples; anything the
    /// backlog cannot yet support is produced by later calls.
    pub fn process(&mut self, input: &[f64]) -> Vec<f64> {
        self.backlog.push(input);
        let skip = self.pending_drop.min(self.backlog.len());
        self.backlog.drop_front(skip);
        self.pending_drop -= skip;

        let max_out = (input.len() * self.target_rate).div_ceil(self.source_rate);
        let mut output = Vec::with_capacity(max_out);

        while output.len() < max_out && self.pending_drop == 0 {
            let phase = &self.phases[self.phase];
            if self.backlog.len() < phase.taps.len() {
                break;
            }

            let value: f64 = self
                .backlog
                .peek(phase.taps.len())
                .iter()
                .zip(&phase.taps)
                .map(|(x, h)| x * h)
                .sum();
            output.push(value * self.scale);

            // Wide transition bands give phases that step past the backlog
            self.pending_drop = phase.drop.saturating_sub(self.backlog.len());
            self.backlog.drop_front(phase.drop);
            self.phase = phase.next;
        }

        output
    }

    /// Latency in output samples
    pub fn latency(&self) -> usize {
        self.latency
    }

    pub fn filter_length(&self) -> usize {
        self.filter_length
    }

    pub fn source_rate(&self) -> usize {
        self.source_rate
    }

    pub fn target_rate(&self) -> usize {
        self.target_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response(resampler: &mut Resampler, len: usize) -> Vec<f64> {
        let mut input = vec![0.0; len];
        input[0] = 1.0;
        resampler.process(&input)
    }

    fn argmax(values: &[f64]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    #[test]
    fn test_half_band_latency() {
        let resampler = Resampler::new(128, 64, 50.0, 0.05).unwrap();
        assert_eq!(resampler.filter_length(), 119);
        assert_eq!(resampler.latency(), 30);
    }

    #[test]
    fn test_decimator_impulse_peaks_at_latency() {
        for factor in [2, 4, 8] {
            let mut resampler = Resampler::new(64, 64 / factor, 50.0, 0.05).unwrap();
            let output = impulse_response(&mut resampler, 4096);
            assert_eq!(argmax(&output), resampler.latency(), "factor {}", factor);
        }
    }

    #[test]
    fn test_interpolator_impulse_peaks_at_latency() {
        for factor in [2, 4] {
            let mut resampler = Resampler::new(64 / factor, 64, 50.0, 0.05).unwrap();
            let output = impulse_response(&mut resampler, 1024);
            assert_eq!(argmax(&output), resampler.latency(), "factor {}", factor);
        }
    }

    #[test]
    fn test_dc_gain_is_unity() {
        for (source, target) in [(128, 64), (64, 128), (3, 2), (2, 3)] {
            let mut resampler = Resampler::new(source, target, 50.0, 0.05).unwrap();
            let output = resampler.process(&vec![1.0; 8000]);
            let settled = &output[output.len() / 2..];
            for &v in settled {
                assert!((v - 1.0).abs() < 0.01, "{} -> {}: {}", source, target, v);
            }
        }
    }

    #[test]
    fn test_output_count_tracks_ratio() {
        let mut resampler = Resampler::new(4, 1, 50.0, 0.05).unwrap();
        let mut total = 0;
        for _ in 0..100 {
            total += resampler.process(&[0.25; 37]).len();
        }
        let expected = 3700 / 4;
        assert!(total.abs_diff(expected) <= 2, "total {}", total);
    }

    #[test]
    fn test_backlog_persists_across_calls() {
        let signal: Vec<f64> = (0..2000).map(|i| (i as f64 * 0.01).sin()).collect();

        let mut whole = Resampler::new(2, 1, 50.0, 0.05).unwrap();
        let expected = whole.process(&signal);

        let mut chunked = Resampler::new(2, 1, 50.0, 0.05).unwrap();
        let mut output = Vec::new();
        for chunk in signal.chunks(33) {
            output.extend(chunked.process(chunk));
        }

        let n = expected.len().min(output.len());
        assert!(n > 900);
        for i in 0..n {
            assert!((expected[i] - output[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_drop_beyond_backlog_carries_over() {
        let signal: Vec<f64> = (0..20000).map(|i| (i as f64 * 0.003).sin()).collect();

        let mut whole = Resampler::new(100, 1, 10.0, 1.0).unwrap();
        assert!(whole.phases.iter().any(|p| p.drop > p.taps.len()));
        let expected = whole.process(&signal);

        let mut chunked = Resampler::new(100, 1, 10.0, 1.0).unwrap();
        let mut output = Vec::new();
        for chunk in signal.chunks(37) {
            output.extend(chunked.process(chunk));
        }

        let n = expected.len().min(output.len());
        assert!(n > 150, "only {} outputs", n);
        for i in 0..n {
            assert!((expected[i] - output[i]).abs() < 1e-12, "sample {}", i);
        }
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            Resampler::new(0, 1, 50.0, 0.05),
            Err(CqError::InvalidRate { .. })
        ));
    }
}
