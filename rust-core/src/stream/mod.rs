//! Sample buffering and threaded streaming

pub mod buffer;
pub mod pipeline;

pub use buffer::{SampleConsumer, SampleProducer, SampleQueue, SampleRing};
pub use pipeline::{spawn_analysis, spawn_inverse, ColumnAnalyzer, Worker};
