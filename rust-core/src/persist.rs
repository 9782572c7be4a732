//! Raw column persistence
//!
//! Columns are stored as consecutive little-endian f32 pairs (real,
//! imaginary) with no header or length prefix. Reading them back needs the
//! column heights, which `ColumnHeights` regenerates from the octave count.

use crate::error::CqError;
use crate::spectrum::Column;
use num_complex::Complex64;
use std::io::{self, Read, Write};

const VALUE_BYTES: usize = 8;

/// Octave count of each forward column, in stream order
///
/// Column 0 of every block of 2^(octaves-1) is full height; column t after it
/// carries tz(t) + 1 octaves.
#[derive(Debug, Clone)]
pub struct ColumnHeights {
    period: usize,
    at: usize,
}

impl ColumnHeights {
    pub fn new(octaves: usize) -> Self {
        Self {
            period: 1 << octaves.saturating_sub(1),
            at: 0,
        }
    }
}

impl Iterator for ColumnHeights {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let height = if self.at == 0 {
            self.period.trailing_zeros() as usize + 1
        } else {
            self.at.trailing_zeros() as usize + 1
        };
        self.at = (self.at + 1) % self.period;
        Some(height)
    }
}

/// Write columns back to back
pub fn write_columns<W: Write>(writer: &mut W, columns: &[Column]) -> Result<(), CqError> {
    let mut bytes = Vec::with_capacity(columns.iter().map(Vec::len).sum::<usize>() * VALUE_BYTES);
    for value in columns.iter().flatten() {
        bytes.extend_from_slice(&(value.re as f32).to_le_bytes());
        bytes.extend_from_slice(&(value.im as f32).to_le_bytes());
    }
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read columns until the input ends
///
/// # Arguments
/// * `reader` - Source of bytes written by `write_columns`
/// * `bins_per_octave` - Rows per octave
/// * `heights` - Octave count of each column, usually `ColumnHeights`
///
/// # Returns
/// Every complete column; input ending inside a column is an error
pub fn read_columns<R: Read>(
    mut reader: R,
    bins_per_octave: usize,
    heights: impl IntoIterator<Item = usize>,
) -> Result<Vec<Column>, CqError> {
    let mut columns = Vec::new();
    let mut bytes = Vec::new();

    for octaves in heights {
        let height = octaves * bins_per_octave;
        bytes.resize(height * VALUE_BYTES, 0);

        let read = fill(&mut reader, &mut bytes)?;
        if read == 0 {
            break;
        }
        if read < bytes.len() {
            return Err(CqError::TruncatedColumn {
                read: read / VALUE_BYTES,
                height,
            });
        }

        columns.push(
            bytes
                .chunks_exact(VALUE_BYTES)
                .map(|chunk| {
                    let re = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    let im = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
                    Complex64::new(re as f64, im as f64)
                })
                .collect(),
        );
    }

    Ok(columns)
}

/// Read until `buffer` is full or the input ends, returning bytes read
fn fill<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
