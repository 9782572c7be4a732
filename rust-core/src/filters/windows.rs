//! Window functions for resampler filter design and kernel atoms
//!
//! Kaiser windows shape the polyphase lowpass; the root-Blackman-Harris
//! window shapes every constant-Q atom.

use crate::error::CqError;
use crate::params::Window;
use std::f64::consts::PI;

/// Kaiser window length and shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KaiserParameters {
    pub length: usize,
    pub beta: f64,
}

impl KaiserParameters {
    /// Kaiser's empirical design formulas
    ///
    /// # Arguments
    /// * `attenuation` - Stopband attenuation in dB
    /// * `bandwidth` - Transition bandwidth as a fraction of the band
    /// * `ratio` - Filter resolution relative to the lower rate
    ///
    /// # Returns
    /// Unadjusted length (may be even) and beta
    pub fn for_bandwidth(attenuation: f64, bandwidth: f64, ratio: f64) -> Self {
        let transition = bandwidth * 2.0 * PI / ratio;

        if attenuation > 21.0 {
            let length = 1 + ((attenuation - 7.95) / (2.285 * transition)).ceil() as usize;
            let beta = if attenuation > 50.0 {
                0.1102 * (attenuation - 8.7)
            } else {
                0.5842 * (attenuation - 21.0).powf(0.4) + 0.07886 * (attenuation - 21.0)
            };
            Self { length, beta }
        } else {
            Self {
                length: 1 + (5.79 / transition).ceil() as usize,
                beta: 0.0,
            }
        }
    }
}

/// Zeroth-order modified Bessel function of the first kind (20-term series)
pub fn bessel0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut factorial = 1.0;
    for i in 1..20 {
        factorial *= i as f64;
        sum += (x / 2.0).powi(2 * i) / (factorial * factorial);
    }
    sum
}

/// Generate a symmetric Kaiser window
///
/// w[i] = I0(beta * sqrt(1 - k^2)) / I0(beta), k = 2i/(L-1) - 1
pub fn kaiser_window(params: KaiserParameters) -> Vec<f64> {
    let length = params.length;
    if length < 2 {
        return vec![1.0; length];
    }

    let denominator = bessel0(params.beta);
    let half = (length + 1) / 2;
    let mut window = vec![0.0; length];

    for i in 0..half {
        let k = (2 * i) as f64 / (length - 1) as f64 - 1.0;
        window[i] = bessel0(params.beta * (1.0 - k * k).sqrt()) / denominator;
    }
    // Mirror so the window is exactly symmetric
    for i in half..length {
        window[i] = window[length - 1 - i];
    }
    window
}

/// Generate a centred sinc with zero crossings every `peak_to_pole` taps
///
/// # Arguments
/// * `length` - Number of taps (at least 2)
/// * `peak_to_pole` - Distance in taps from the peak to the first zero
pub fn sinc_window(length: usize, peak_to_pole: f64) -> Result<Vec<f64>, CqError> {
    if length < 2 {
        return Err(CqError::FilterTooShort(length));
    }

    let centre = length / 2;
    let m = PI / peak_to_pole;

    let window = (0..length)
        .map(|i| {
            let distance = i.abs_diff(centre) as f64;
            if distance == 0.0 {
                1.0
            } else {
                let x = distance * m;
                x.sin() / x
            }
        })
        .collect();

    Ok(window)
}

/// Window for one kernel atom of `length` samples
///
/// Periodic Blackman-Harris over `length - 1` points with the first value
/// repeated at the end, square-rooted and divided by `length`.
pub fn atom_window(window: Window, length: usize) -> Result<Vec<f64>, CqError> {
    if window != Window::SqrtBlackmanHarris {
        return Err(CqError::UnsupportedWindow(window));
    }
    if length < 2 {
        return Err(CqError::InvalidAtomLength {
            bin: 0,
            length: length as i64,
        });
    }

    let n = (length - 1) as f64;
    let scale = length as f64;
    let mut values: Vec<f64> = (0..length - 1)
        .map(|i| {
            let x = i as f64 / n;
            0.35875 - 0.48829 * (2.0 * PI * x).cos() + 0.14128 * (4.0 * PI * x).cos()
                - 0.01168 * (6.0 * PI * x).cos()
        })
        .collect();
    values.push(values[0]);

    Ok(values.into_iter().map(|v| v.max(0.0).sqrt() / scale).collect())
}
