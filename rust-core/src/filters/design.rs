//! Lowpass FIR design for rational resampling
//!
//! Windowing method: an ideal sinc lowpass multiplied by a Kaiser window.

use super::windows::{kaiser_window, sinc_window, KaiserParameters};
use crate::error::CqError;

/// Longest filter the designer will produce
pub const MAX_FILTER_LENGTH: usize = 200_001;

/// Design specification for a resampling lowpass
#[derive(Debug, Clone, Copy)]
pub struct LowpassSpec {
    /// Stopband attenuation in dB
    pub attenuation: f64,

    /// Transition bandwidth as a fraction of the lower rate's band
    pub bandwidth: f64,

    /// Higher rate divided by the rates' gcd
    pub ratio: usize,

    /// True when the filter guards a rate reduction
    pub downsampling: bool,
}

impl LowpassSpec {
    /// Distance in taps from the sinc peak to its first zero
    ///
    /// Antialiasing filters move the cutoff slightly below Nyquist.
    pub fn peak_to_pole(&self) -> f64 {
        let ratio = self.ratio as f64;
        if self.downsampling {
            ratio / (1.0 - self.bandwidth / 2.0)
        } else {
            ratio
        }
    }

    /// Odd filter length, capped at `MAX_FILTER_LENGTH`
    pub fn filter_length(&self) -> usize {
        let kaiser =
            KaiserParameters::for_bandwidth(self.attenuation, self.bandwidth, self.ratio as f64);
        let odd = kaiser.length | 1;
        odd.min(MAX_FILTER_LENGTH)
    }
}

/// Design the lowpass taps
///
/// # Arguments
/// * `spec` - Filter specification
///
/// # Returns
/// Odd-length symmetric taps h[n], peak 1.0 at the centre tap
pub fn design_lowpass(spec: &LowpassSpec) -> Result<Vec<f64>, CqError> {
    let kaiser =
        KaiserParameters::for_bandwidth(spec.attenuation, spec.bandwidth, spec.ratio as f64);
    let length = spec.filter_length();

    let sinc = sinc_window(length, spec.peak_to_pole())?;
    let window = kaiser_window(KaiserParameters {
        length,
        beta: kaiser.beta,
    });

    Ok(sinc.iter().zip(&window).map(|(s, w)| s * w).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_band() -> LowpassSpec {
        LowpassSpec {
            attenuation: 50.0,
            bandwidth: 0.05,
            ratio: 2,
            downsampling: true,
        }
    }

    #[test]
    fn test_filter_length_is_odd() {
        assert_eq!(half_band().filter_length(), 119);

        for ratio in [3, 4, 8, 64] {
            let spec = LowpassSpec { ratio, ..half_band() };
            assert_eq!(spec.filter_length() % 2, 1);
        }
    }

    #[test]
    fn test_length_cap() {
        let spec = LowpassSpec {
            attenuation: 120.0,
            bandwidth: 0.0001,
            ratio: 1000,
            downsampling: false,
        };
        assert_eq!(spec.filter_length(), MAX_FILTER_LENGTH);
    }

    #[test]
    fn test_antialias_moves_cutoff_down() {
        let up = LowpassSpec {
            downsampling: false,
            ..half_band()
        };
        assert_eq!(up.peak_to_pole(), 2.0);
        assert!(half_band().peak_to_pole() > 2.0);
    }

    #[test]
    fn test_lowpass_taps_symmetric() {
        let taps = design_lowpass(&half_band()).unwrap();
        let len = taps.len();
        assert_eq!(len, 119);
        assert_eq!(taps[len / 2], 1.0);
        for i in 0..len {
            assert!((taps[i] - taps[len - 1 - i]).abs() < 1e-12);
        }

        // DC gain of a half-band lowpass is close to the peak-to-pole ratio
        let dc: f64 = taps.iter().sum();
        let expected = half_band().peak_to_pole();
        assert!((dc - expected).abs() / expected < 0.02, "dc gain {}", dc);
    }
}
