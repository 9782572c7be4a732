//! Transform configuration
//!
//! One validated parameter set drives the kernel, both transforms and the
//! interpolator. Octave count is derived from the frequency range.

use crate::error::CqError;

/// Window shapes for kernel atoms
///
/// Only `SqrtBlackmanHarris` has a calibrated normalization; the others are
/// named so configurations can be rejected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    SqrtBlackmanHarris,
    SqrtBlackman,
    SqrtHann,
    BlackmanHarris,
    Blackman,
    Hann,
}

/// Constant-Q transform parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CqParams {
    sample_rate: f64,
    min_frequency: f64,
    max_frequency: f64,
    bins_per_octave: usize,

    /// Spectral atom bandwidth scaling. 1.0 is optimal for reconstruction;
    /// smaller values smear in frequency but sharpen in time.
    q: f64,

    /// Hop between temporal atoms, relative to the shortest atom.
    atom_hop_factor: f64,

    /// Kernel coefficients below this magnitude are zeroed.
    threshold: f64,

    window: Window,
}

impl CqParams {
    pub const DEFAULT_Q: f64 = 1.0;
    pub const DEFAULT_ATOM_HOP_FACTOR: f64 = 0.25;
    pub const DEFAULT_THRESHOLD: f64 = 0.0005;

    /// Widest supported range; the lowest octave's block grows as 2^octaves
    pub const MAX_OCTAVES: usize = 16;

    /// Create a validated parameter set with default tunables
    ///
    /// # Arguments
    /// * `sample_rate` - Input sample rate in Hz
    /// * `min_frequency` - Lowest frequency of interest in Hz
    /// * `max_frequency` - Highest bin centre in Hz (at most Nyquist)
    /// * `bins_per_octave` - Bins per octave (12 = semitones, 24 = quarter tones)
    pub fn new(
        sample_rate: f64,
        min_frequency: f64,
        max_frequency: f64,
        bins_per_octave: usize,
    ) -> Result<Self, CqError> {
        let params = Self {
            sample_rate,
            min_frequency,
            max_frequency,
            bins_per_octave,
            q: Self::DEFAULT_Q,
            atom_hop_factor: Self::DEFAULT_ATOM_HOP_FACTOR,
            threshold: Self::DEFAULT_THRESHOLD,
            window: Window::SqrtBlackmanHarris,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_q(mut self, q: f64) -> Result<Self, CqError> {
        self.q = q;
        self.validate()?;
        Ok(self)
    }

    pub fn with_atom_hop_factor(mut self, atom_hop_factor: f64) -> Result<Self, CqError> {
        self.atom_hop_factor = atom_hop_factor;
        self.validate()?;
        Ok(self)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, CqError> {
        self.threshold = threshold;
        self.validate()?;
        Ok(self)
    }

    pub fn with_window(mut self, window: Window) -> Result<Self, CqError> {
        self.window = window;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), CqError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(CqError::InvalidSampleRate(self.sample_rate));
        }

        let nyquist = self.sample_rate / 2.0;
        let ordered = self.min_frequency > 0.0
            && self.min_frequency < self.max_frequency
            && self.max_frequency <= nyquist;
        if !ordered {
            return Err(CqError::InvalidFrequencyRange {
                min: self.min_frequency,
                max: self.max_frequency,
                nyquist,
            });
        }

        let octaves = (self.max_frequency / self.min_frequency).log2().ceil();
        if !(octaves <= Self::MAX_OCTAVES as f64) {
            return Err(CqError::InvalidParameter {
                name: "octaves",
                value: octaves,
            });
        }

        if self.bins_per_octave == 0 {
            return Err(CqError::InvalidBinsPerOctave);
        }
        if !(self.q.is_finite() && self.q > 0.0) {
            return Err(CqError::InvalidParameter { name: "q", value: self.q });
        }
        if !(self.atom_hop_factor > 0.0 && self.atom_hop_factor <= 1.0) {
            return Err(CqError::InvalidParameter {
                name: "atom_hop_factor",
                value: self.atom_hop_factor,
            });
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(CqError::InvalidParameter {
                name: "threshold",
                value: self.threshold,
            });
        }
        if self.window != Window::SqrtBlackmanHarris {
            return Err(CqError::UnsupportedWindow(self.window));
        }
        Ok(())
    }

    /// Number of octaves: ceil(log2(max / min)), never below one
    pub fn octaves(&self) -> usize {
        let octaves = (self.max_frequency / self.min_frequency).log2().ceil() as usize;
        octaves.max(1)
    }

    /// Total bins in a full-height column
    pub fn bin_count(&self) -> usize {
        self.octaves() * self.bins_per_octave
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn min_frequency(&self) -> f64 {
        self.min_frequency
    }

    pub fn max_frequency(&self) -> f64 {
        self.max_frequency
    }

    pub fn bins_per_octave(&self) -> usize {
        self.bins_per_octave
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn atom_hop_factor(&self) -> f64 {
        self.atom_hop_factor
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn window(&self) -> Window {
        self.window
    }
}
