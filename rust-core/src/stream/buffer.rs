//! Sample buffers
//!
//! `SampleQueue` is the growable backlog used inside the engine (resampler
//! input, per-octave buffers). `SampleRing` is the bounded lock-free hand-off
//! used at the stream boundary between a producer thread and a worker.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Growable FIFO of samples with a logical read cursor
///
/// Dropping from the front only moves the cursor; consumed storage is
/// reclaimed in bulk once it outweighs the live samples.
#[derive(Debug, Clone, Default)]
pub struct SampleQueue {
    storage: Vec<f64>,
    head: usize,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue pre-filled with `len` zeros
    pub fn zeros(len: usize) -> Self {
        Self {
            storage: vec![0.0; len],
            head: 0,
        }
    }

    /// Append samples at the back
    pub fn push(&mut self, samples: &[f64]) {
        self.storage.extend_from_slice(samples);
    }

    /// Append `len` zeros at the back
    pub fn push_zeros(&mut self, len: usize) {
        self.storage.resize(self.storage.len() + len, 0.0);
    }

    /// Borrow the oldest `len` samples
    ///
    /// # Panics
    /// If fewer than `len` samples are queued
    pub fn peek(&self, len: usize) -> &[f64] {
        &self.storage[self.head..self.head + len]
    }

    /// All live samples, oldest first
    pub fn as_slice(&self) -> &[f64] {
        &self.storage[self.head..]
    }

    /// Discard up to `len` samples from the front
    pub fn drop_front(&mut self, len: usize) {
        self.head += len.min(self.len());
        if self.head == self.storage.len() {
            self.storage.clear();
            self.head = 0;
        } else if self.head >= self.storage.len() - self.head {
            self.compact();
        }
    }

    /// Remove and return the oldest `len` samples
    pub fn take_front(&mut self, len: usize) -> Vec<f64> {
        let len = len.min(self.len());
        let taken = self.peek(len).to_vec();
        self.drop_front(len);
        taken
    }

    fn compact(&mut self) {
        self.storage.drain(..self.head);
        self.head = 0;
    }

    pub fn len(&self) -> usize {
        self.storage.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded single-producer single-consumer sample ring
pub struct SampleRing {
    producer: HeapProducer<f64>,
    consumer: HeapConsumer<f64>,
    capacity: usize,
}

impl SampleRing {
    /// Create new ring buffer with given capacity
    ///
    /// # Arguments
    /// * `capacity` - Buffer capacity in samples
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<f64>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends sharing one end-of-input flag
    pub fn split(self) -> (SampleProducer, SampleConsumer) {
        let closed = Arc::new(AtomicBool::new(false));
        (
            SampleProducer {
                producer: self.producer,
                closed: Arc::clone(&closed),
                capacity: self.capacity,
            },
            SampleConsumer {
                consumer: self.consumer,
                closed,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Writing end of a `SampleRing`
pub struct SampleProducer {
    producer: HeapProducer<f64>,
    closed: Arc<AtomicBool>,
    capacity: usize,
}

impl SampleProducer {
    /// Write as many samples as fit without waiting
    ///
    /// # Returns
    /// Number of samples actually written
    pub fn write(&mut self, samples: &[f64]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Write every sample, yielding while the ring is full
    ///
    /// This is the backpressure point: a producer that outruns the worker
    /// stalls here instead of growing memory.
    pub fn write_all(&mut self, samples: &[f64]) {
        let mut written = 0;
        while written < samples.len() {
            let n = self.producer.push_slice(&samples[written..]);
            written += n;
            if n == 0 {
                std::thread::yield_now();
            }
        }
    }

    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mark the end of input; the consumer drains what is left and stops
    pub fn close(self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Drop for SampleProducer {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Reading end of a `SampleRing`
pub struct SampleConsumer {
    consumer: HeapConsumer<f64>,
    closed: Arc<AtomicBool>,
}

impl SampleConsumer {
    /// Read whatever is available into `buffer`
    ///
    /// # Returns
    /// Number of samples read (may be zero)
    pub fn read(&mut self, buffer: &mut [f64]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Wait until samples arrive or the producer closes
    ///
    /// # Returns
    /// `None` once the producer has closed and the ring is drained,
    /// otherwise the number of samples read (always non-zero)
    pub fn read_blocking(&mut self, buffer: &mut [f64]) -> Option<usize> {
        loop {
            // Load the flag before popping so samples pushed just before close
            // are never missed.
            let closed = self.closed.load(Ordering::Acquire);
            let n = self.consumer.pop_slice(buffer);
            if n > 0 {
                return Some(n);
            }
            if closed {
                return None;
            }
            std::thread::sleep(std::time::Duration::from_micros(100));
        }
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_push_peek_drop() {
        let mut queue = SampleQueue::zeros(2);
        queue.push(&[1.0, 2.0, 3.0]);
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.peek(3), &[0.0, 0.0, 1.0]);

        queue.drop_front(3);
        assert_eq!(queue.as_slice(), &[2.0, 3.0]);

        queue.push_zeros(1);
        assert_eq!(queue.take_front(2), vec![2.0, 3.0]);
        assert_eq!(queue.as_slice(), &[0.0]);
    }

    #[test]
    fn test_queue_drop_past_end_empties() {
        let mut queue = SampleQueue::new();
        queue.push(&[1.0, 2.0]);
        queue.drop_front(10);
        assert!(queue.is_empty());

        queue.push(&[4.0]);
        assert_eq!(queue.as_slice(), &[4.0]);
    }

    #[test]
    fn test_queue_survives_many_compactions() {
        let mut queue = SampleQueue::new();
        let mut next = 0.0;
        let mut expected_front = 0.0;
        for _ in 0..100 {
            let chunk: Vec<f64> = (0..7).map(|i| next + i as f64).collect();
            next += 7.0;
            queue.push(&chunk);
            queue.drop_front(5);
            expected_front += 5.0;
            assert_eq!(queue.peek(1)[0], expected_front);
        }
        assert_eq!(queue.len(), 200);
    }

    #[test]
    fn test_ring_write_read() {
        let (mut producer, mut consumer) = SampleRing::new(1024).split();

        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(producer.write(&data), 5);

        let mut output = vec![0.0; 5];
        assert_eq!(consumer.read(&mut output), 5);
        assert_eq!(output, data);
    }

    #[test]
    fn test_ring_overflow_is_bounded() {
        let (mut producer, mut consumer) = SampleRing::new(10).split();

        let written = producer.write(&[1.0; 20]);
        assert!(written <= 10);

        let mut output = vec![0.0; 20];
        assert_eq!(consumer.read(&mut output), written);
    }

    #[test]
    fn test_ring_close_ends_blocking_reads() {
        let (mut producer, mut consumer) = SampleRing::new(16).split();
        producer.write_all(&[0.5; 4]);
        producer.close();

        let mut output = vec![0.0; 16];
        assert_eq!(consumer.read_blocking(&mut output), Some(4));
        assert_eq!(consumer.read_blocking(&mut output), None);
    }

    #[test]
    fn test_ring_backpressure_across_threads() {
        let (mut producer, mut consumer) = SampleRing::new(8).split();
        let total = 1000;

        let writer = std::thread::spawn(move || {
            let samples: Vec<f64> = (0..total).map(|i| i as f64).collect();
            producer.write_all(&samples);
        });

        let mut received = Vec::new();
        let mut buffer = vec![0.0; 8];
        while let Some(n) = consumer.read_blocking(&mut buffer) {
            received.extend_from_slice(&buffer[..n]);
        }
        writer.join().unwrap();

        assert_eq!(received.len(), total);
        assert!(received.iter().enumerate().all(|(i, &v)| v == i as f64));
    }
}
