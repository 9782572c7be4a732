//! Threaded streaming front ends
//!
//! A worker thread owns one transform. Samples reach it through a bounded
//! ring (the producer yields while the ring is full); results leave through
//! zero-capacity channels, so a worker never runs ahead of its consumer.
//! Closing the input makes the worker flush and hang up.

use super::buffer::{SampleConsumer, SampleProducer, SampleRing};
use crate::error::CqError;
use crate::spectrum::{Column, ForwardTransform, InverseTransform, Spectrogram};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::debug;

/// Samples the worker takes from the ring per transform call
const READ_CHUNK: usize = 4096;

/// Anything that turns samples into columns
pub trait ColumnAnalyzer: Send {
    fn process(&mut self, samples: &[f64]) -> Result<Vec<Column>, CqError>;
    fn flush(&mut self) -> Result<Vec<Column>, CqError>;
}

impl ColumnAnalyzer for ForwardTransform {
    fn process(&mut self, samples: &[f64]) -> Result<Vec<Column>, CqError> {
        ForwardTransform::process(self, samples)
    }

    fn flush(&mut self) -> Result<Vec<Column>, CqError> {
        ForwardTransform::flush(self)
    }
}

impl ColumnAnalyzer for Spectrogram {
    fn process(&mut self, samples: &[f64]) -> Result<Vec<Column>, CqError> {
        Spectrogram::process(self, samples)
    }

    fn flush(&mut self) -> Result<Vec<Column>, CqError> {
        Spectrogram::flush(self)
    }
}

/// Handle on a running worker and its output channel
pub struct Worker<T> {
    output: Receiver<T>,
    handle: JoinHandle<Result<(), CqError>>,
}

impl<T> Worker<T> {
    /// Blocking iterator over results; ends when the worker hangs up
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, T> {
        self.output.iter()
    }

    pub fn receiver(&self) -> &Receiver<T> {
        &self.output
    }

    /// Wait for the worker and surface its error, if any
    ///
    /// Dropping the results first is cooperative cancellation: the worker
    /// stops at its next send.
    pub fn join(self) -> Result<(), CqError> {
        drop(self.output);
        self.handle.join().map_err(|_| CqError::WorkerPanicked)?
    }
}

/// Send every item; false once the receiver is gone
fn send_all<T>(sender: &Sender<T>, items: Vec<T>) -> bool {
    items.into_iter().all(|item| sender.send(item).is_ok())
}

/// Run an analyzer on its own thread
///
/// # Arguments
/// * `analyzer` - Transform to move onto the worker
/// * `ring_capacity` - Sample ring size
///
/// # Returns
/// The producer to write samples into and the worker handle yielding columns
pub fn spawn_analysis<A>(analyzer: A, ring_capacity: usize) -> (SampleProducer, Worker<Column>)
where
    A: ColumnAnalyzer + 'static,
{
    let (producer, consumer) = SampleRing::new(ring_capacity).split();
    let (sender, output) = bounded(0);
    let handle = std::thread::spawn(move || run_analysis(analyzer, consumer, sender));
    (producer, Worker { output, handle })
}

fn run_analysis<A: ColumnAnalyzer>(
    mut analyzer: A,
    mut input: SampleConsumer,
    output: Sender<Column>,
) -> Result<(), CqError> {
    let mut chunk = vec![0.0; READ_CHUNK];
    let mut consumed = 0usize;

    while let Some(n) = input.read_blocking(&mut chunk) {
        consumed += n;
        if !send_all(&output, analyzer.process(&chunk[..n])?) {
            debug!(consumed, "analysis output dropped, stopping");
            return Ok(());
        }
    }

    debug!(consumed, "analysis input closed, flushing");
    send_all(&output, analyzer.flush()?);
    Ok(())
}

/// Run an inverse transform on its own thread
///
/// Columns are gathered into whole blocks before synthesis. Returns the
/// column sender and the worker handle yielding sample chunks.
pub fn spawn_inverse(transform: InverseTransform) -> (Sender<Column>, Worker<Vec<f64>>) {
    let (column_sender, columns) = bounded(0);
    let (sender, output) = bounded(0);
    let handle = std::thread::spawn(move || run_inverse(transform, columns, sender));
    (column_sender, Worker { output, handle })
}

fn run_inverse(
    mut transform: InverseTransform,
    columns: Receiver<Column>,
    output: Sender<Vec<f64>>,
) -> Result<(), CqError> {
    let block = transform.block_width();
    let mut pending = Vec::with_capacity(block);

    for column in columns.iter() {
        pending.push(column);
        if pending.len() == block {
            let samples = transform.process(&pending)?;
            pending.clear();
            if !samples.is_empty() && output.send(samples).is_err() {
                return Ok(());
            }
        }
    }

    if !pending.is_empty() {
        return Err(CqError::BlockWidth {
            width: pending.len(),
            block,
        });
    }

    let tail = transform.flush()?;
    if !tail.is_empty() {
        let _ = output.send(tail);
    }
    Ok(())
}
