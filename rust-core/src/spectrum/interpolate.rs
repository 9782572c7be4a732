//! Temporal interpolation of ragged forward output
//!
//! Lower octaves are only sampled on every 2^octave-th column. Between two
//! full-height columns the gaps are filled with values whose magnitude is
//! interpolated in the log domain and whose phase follows the already
//! resolved octave above, dilated to the lower octave's rate.

use super::forward::{Column, ForwardTransform};
use crate::error::CqError;
use crate::params::CqParams;
use num_complex::Complex64;
use std::f64::consts::TAU;

/// Phase-trajectory changes below this are treated as no motion
const MIN_TRAJECTORY: f64 = 1e-5;

/// The angle congruent to `modulo` (mod 2pi) closest to `target`
fn make_closer(target: f64, modulo: f64) -> f64 {
    let modulo = if modulo.is_nan() { 0.0 } else { modulo };
    modulo + ((target - modulo) / TAU).round() * TAU
}

/// |a|^(1-p) |b|^p, zero if either end is zero
fn geometric_magnitude(a: f64, b: f64, proportion: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        return 0.0;
    }
    (a.ln() * (1.0 - proportion) + b.ln() * proportion).exp()
}

/// Fills ragged columns to full height
pub struct SpectrogramInterpolator {
    height: usize,
    bins_per_octave: usize,
    dilation: f64,

    /// Columns not yet emitted; once a full column arrives it sits at index 0
    pending: Vec<Column>,

    /// Last emitted column, source for hold fill
    previous: Column,
}

impl SpectrogramInterpolator {
    /// Ratio of a lower octave's phase advance to the octave above it
    pub const DEFAULT_DILATION: f64 = 0.5;

    /// # Arguments
    /// * `height` - Rows in a full column
    /// * `bins_per_octave` - Rows per octave group
    pub fn new(height: usize, bins_per_octave: usize) -> Self {
        Self {
            height,
            bins_per_octave,
            dilation: Self::DEFAULT_DILATION,
            pending: Vec::new(),
            previous: Vec::new(),
        }
    }

    pub fn with_dilation(mut self, dilation: f64) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn dilation(&self) -> f64 {
        self.dilation
    }

    /// Buffer columns and return every column that can now be completed
    ///
    /// Output lags input by up to one span between full-height columns.
    ///
    /// Every column must hold a whole number of octave groups, and the
    /// columns between two full ones must follow the forward height pattern.
    /// Rejected input leaves the interpolator as it was.
    pub fn push_columns(&mut self, columns: Vec<Column>) -> Result<Vec<Column>, CqError> {
        let bpo = self.bins_per_octave;
        if let Some(column) = columns
            .iter()
            .find(|c| c.is_empty() || bpo == 0 || c.len() % bpo != 0 || c.len() > self.height)
        {
            return Err(CqError::LengthMismatch {
                expected: self.height,
                found: column.len(),
            });
        }

        let buffered = self.pending.len();
        self.pending.extend(columns);
        if let Err(e) = self.check_spans() {
            self.pending.truncate(buffered);
            return Err(e);
        }

        let mut output = Vec::new();
        loop {
            let Some(first) = self.pending.iter().position(|c| c.len() == self.height) else {
                break;
            };

            if first > 0 {
                // Nothing to interpolate from yet
                let leading: Vec<Column> = self.pending.drain(..first).collect();
                for column in leading {
                    output.push(self.hold(column));
                }
                continue;
            }

            let Some(second) = self.pending[1..]
                .iter()
                .position(|c| c.len() == self.height)
                .map(|i| i + 1)
            else {
                break;
            };

            let span = self.interpolate_span(&self.pending[..=second]);
            self.pending.drain(..second);
            if let Some(last) = span.last() {
                self.previous.clone_from(last);
            }
            output.extend(span);
        }

        Ok(output)
    }

    /// Check every complete span between two full columns
    fn check_spans(&self) -> Result<(), CqError> {
        let full: Vec<usize> = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, c)| c.len() == self.height)
            .map(|(i, _)| i)
            .collect();
        for pair in full.windows(2) {
            self.check_span(&self.pending[pair[0]..=pair[1]])?;
        }
        Ok(())
    }

    /// Each row must appear on exactly the columns at multiples of its
    /// spacing, counted from the span start
    fn check_span(&self, values: &[Column]) -> Result<(), CqError> {
        let width = values.len() - 1;
        for y in 0..self.height {
            let spacing = (1..=width).find(|&i| values[i].len() > y).unwrap_or(width);
            for (i, column) in values.iter().enumerate() {
                let expected = i % spacing == 0;
                if (column.len() > y) != expected {
                    return Err(CqError::LengthMismatch {
                        expected: if expected { y + 1 } else { y },
                        found: column.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Complete whatever is still buffered by holding previous values
    pub fn finish(&mut self) -> Vec<Column> {
        let pending = std::mem::take(&mut self.pending);
        pending.into_iter().map(|column| self.hold(column)).collect()
    }

    fn hold(&mut self, mut column: Column) -> Column {
        let zero = Complex64::new(0.0, 0.0);
        for row in column.len()..self.height {
            column.push(self.previous.get(row).copied().unwrap_or(zero));
        }
        self.previous.clone_from(&column);
        column
    }

    /// Interpolate `values[..len - 1]`; the last column is the right boundary
    fn interpolate_span(&self, values: &[Column]) -> Vec<Column> {
        let width = values.len() - 1;
        let zero = Complex64::new(0.0, 0.0);

        let mut result: Vec<Column> = values[..width]
            .iter()
            .map(|column| {
                let mut column = column.clone();
                column.resize(self.height, zero);
                column
            })
            .collect();

        for y in 0..self.height {
            // Distance to the next column that carries this row
            let spacing = (1..width).find(|&i| values[i].len() > y).unwrap_or(width);
            if spacing < 2 {
                continue;
            }
            let Some(upper) = y.checked_sub(self.bins_per_octave) else {
                continue;
            };

            let mut i = 0;
            while i + spacing <= width {
                let start = values[i][y];
                let end = values[i + spacing][y];

                // Unwrap the octave above across the gap, boundary included
                let upper_start = values[i][upper].arg();
                let mut at = upper_start;
                let trajectory: Vec<f64> = (1..=spacing)
                    .map(|j| {
                        let value = if j < spacing {
                            result[i + j][upper]
                        } else {
                            values[i + spacing][upper]
                        };
                        at = make_closer(at, value.arg());
                        at
                    })
                    .collect();

                let total = at - upper_start;
                let target = make_closer(self.dilation * total, end.arg() - start.arg());
                let scale = if total.abs() > MIN_TRAJECTORY {
                    target / total
                } else {
                    0.0
                };

                for j in 1..spacing {
                    let proportion = j as f64 / spacing as f64;
                    let phase = start.arg() + (trajectory[j - 1] - upper_start) * scale;
                    let magnitude = geometric_magnitude(start.norm(), end.norm(), proportion);
                    result[i + j][y] = Complex64::from_polar(magnitude, phase);
                }
                i += spacing;
            }
        }

        result
    }
}

/// Forward transform with dense, interpolated output
pub struct Spectrogram {
    forward: ForwardTransform,
    interpolator: SpectrogramInterpolator,
}

impl Spectrogram {
    pub fn new(params: &CqParams) -> Result<Self, CqError> {
        let forward = ForwardTransform::new(params)?;
        let interpolator =
            SpectrogramInterpolator::new(forward.bin_count(), forward.bins_per_octave());
        Ok(Self {
            forward,
            interpolator,
        })
    }

    pub fn with_dilation(mut self, dilation: f64) -> Self {
        self.interpolator = self.interpolator.with_dilation(dilation);
        self
    }

    /// Analyse samples; every returned column is full height
    pub fn process(&mut self, samples: &[f64]) -> Result<Vec<Column>, CqError> {
        let columns = self.forward.process(samples)?;
        self.interpolator.push_columns(columns)
    }

    /// Flush the transform and complete every buffered column
    pub fn flush(&mut self) -> Result<Vec<Column>, CqError> {
        let columns = self.forward.flush()?;
        let mut output = self.interpolator.push_columns(columns)?;
        output.extend(self.interpolator.finish());
        Ok(output)
    }

    pub fn forward(&self) -> &ForwardTransform {
        &self.forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(magnitude: f64, phase: f64) -> Complex64 {
        Complex64::from_polar(magnitude, phase)
    }

    #[test]
    fn test_make_closer() {
        assert!((make_closer(0.0, TAU + 0.1) - 0.1).abs() < 1e-12);
        assert!((make_closer(10.0, 0.5) - (0.5 + 2.0 * TAU)).abs() < 1e-12);
        assert!((make_closer(-3.0, 3.0) - (3.0 - TAU)).abs() < 1e-12);
        assert_eq!(make_closer(0.2, f64::NAN), 0.0);
    }

    #[test]
    fn test_geometric_magnitude() {
        assert!((geometric_magnitude(1.0, 4.0, 0.5) - 2.0).abs() < 1e-12);
        assert!((geometric_magnitude(8.0, 1.0, 1.0 / 3.0) - 4.0).abs() < 1e-12);
        assert_eq!(geometric_magnitude(0.0, 4.0, 0.5), 0.0);
    }

    #[test]
    fn test_full_columns_unchanged() {
        let mut interpolator = SpectrogramInterpolator::new(4, 2);
        let columns: Vec<Column> = (0..6)
            .map(|t| (0..4).map(|r| c(1.0 + r as f64, 0.1 * t as f64)).collect())
            .collect();

        let mut output = interpolator.push_columns(columns.clone()).unwrap();
        output.extend(interpolator.finish());
        assert_eq!(output, columns);

        // Feeding the result back is a no-op
        let mut again = SpectrogramInterpolator::new(4, 2);
        let mut second = again.push_columns(output.clone()).unwrap();
        second.extend(again.finish());
        assert_eq!(second, output);
    }

    #[test]
    fn test_gap_follows_upper_octave() {
        let mut interpolator = SpectrogramInterpolator::new(2, 1);
        let columns = vec![
            vec![c(1.0, 0.0), c(1.0, 0.0)],
            vec![c(1.0, 1.0)],
            vec![c(1.0, 2.0), c(4.0, 0.9)],
        ];

        let output = interpolator.push_columns(columns).unwrap();
        assert_eq!(output.len(), 2);

        // Upper octave moves by 2.0 rad; dilated to 1.0, nearest to the
        // endpoint difference 0.9 is 0.9 itself, so the scale is 0.45
        let filled = output[1][1];
        assert!((filled.norm() - 2.0).abs() < 1e-12);
        assert!((filled.arg() - 0.45).abs() < 1e-12);
        assert_eq!(output[1][0], c(1.0, 1.0));
    }

    #[test]
    fn test_zero_endpoint_gives_zero() {
        let mut interpolator = SpectrogramInterpolator::new(2, 1);
        let columns = vec![
            vec![c(1.0, 0.0), c(0.0, 0.0)],
            vec![c(1.0, 0.3)],
            vec![c(1.0, 0.6), c(3.0, 0.0)],
        ];
        let output = interpolator.push_columns(columns).unwrap();
        assert_eq!(output[1][1].norm(), 0.0);
    }

    #[test]
    fn test_hold_fill() {
        let mut interpolator = SpectrogramInterpolator::new(2, 1);

        // Leading partial column with nothing before it fills with zeros
        let output = interpolator
            .push_columns(vec![vec![c(1.0, 0.0)], vec![c(2.0, 0.0), c(5.0, 0.0)]])
            .unwrap();
        assert_eq!(output, vec![vec![c(1.0, 0.0), Complex64::new(0.0, 0.0)]]);

        // Trailing columns hold the last full values
        interpolator.push_columns(vec![vec![c(3.0, 0.0)]]).unwrap();
        let rest = interpolator.finish();
        assert_eq!(
            rest,
            vec![
                vec![c(2.0, 0.0), c(5.0, 0.0)],
                vec![c(3.0, 0.0), c(5.0, 0.0)],
            ]
        );
    }

    #[test]
    fn test_rejects_tall_column() {
        let mut interpolator = SpectrogramInterpolator::new(2, 1);
        assert!(interpolator.push_columns(vec![vec![c(1.0, 0.0); 3]]).is_err());
    }

    #[test]
    fn test_rejects_irregular_heights() {
        let mut interpolator = SpectrogramInterpolator::new(3, 1);
        let column = |height: usize| vec![c(1.0, 0.0); height];

        // Row 1 shows up every other column, so column 4 must carry it
        let irregular = [3, 1, 2, 1, 1, 3].map(column).to_vec();
        assert!(matches!(
            interpolator.push_columns(irregular),
            Err(CqError::LengthMismatch { expected: 2, found: 1 })
        ));

        // Not a whole number of octave groups
        let mut grouped = SpectrogramInterpolator::new(4, 2);
        assert!(grouped.push_columns(vec![column(4), column(3)]).is_err());
        assert!(grouped.push_columns(vec![Vec::new()]).is_err());

        // Nothing from the rejected call was kept
        let regular = [3, 1, 2, 1, 3].map(column).to_vec();
        let output = interpolator.push_columns(regular).unwrap();
        assert_eq!(output.len(), 4);
        assert!(output.iter().all(|c| c.len() == 3));
    }

    #[test]
    fn test_dilation_override() {
        let interpolator = SpectrogramInterpolator::new(2, 1);
        assert_eq!(interpolator.dilation(), SpectrogramInterpolator::DEFAULT_DILATION);
        assert_eq!(interpolator.with_dilation(0.75).dilation(), 0.75);
    }

    #[test]
    fn test_spectrogram_columns_are_full() {
        let params = CqParams::new(8000.0, 250.0, 4000.0, 12).unwrap();
        let mut spectrogram = Spectrogram::new(&params).unwrap();
        let height = spectrogram.forward().bin_count();

        let signal: Vec<f64> = (0..8000)
            .map(|n| 0.5 * (2.0 * std::f64::consts::PI * 1000.0 * n as f64 / 8000.0).sin())
            .collect();
        let mut columns = spectrogram.process(&signal).unwrap();
        columns.extend(spectrogram.flush().unwrap());

        assert!(!columns.is_empty());
        assert_eq!(columns.len() % spectrogram.forward().block_width(), 0);
        assert!(columns.iter().all(|column| column.len() == height));
        assert!(columns.iter().flatten().all(|v| v.re.is_finite() && v.im.is_finite()));
    }
}
