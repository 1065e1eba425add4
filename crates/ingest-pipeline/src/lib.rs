//! Concurrent processor graphs for the ingestion core.
//!
//! A [`Pipeline`] is a tree of [`Processor`]s. Each node runs in its own
//! task, reads what its parent writes and tees its own output to every
//! child through a bounded channel. A run ends when the source is drained,
//! when a processor fails (the first error wins and cancels the rest), or
//! when [`Pipeline::shutdown`] is called.
//!
//! # Quick Start
//!
//! ```rust
//! use ingest_pipeline::{IterReader, Pipeline, PipelineNode, RootProcessor};
//!
//! # tokio_test_block(async {
//! let pipeline: Pipeline<u32> = Pipeline::new(PipelineNode::new(RootProcessor));
//! pipeline.process(Box::new(IterReader::new(vec![1, 2, 3]))).await.unwrap();
//! assert_eq!(pipeline.stats()[0].read_entries, 3);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod node;
pub mod pipeline;
pub mod processor;
pub mod signal;
pub mod store;

// Re-exports for convenience.
pub use config::PipelineConfig;
pub use error::{BoxError, PipelineError, PipelineResult};
pub use io::{IterReader, ReadCloser, WriteCloser};
pub use node::{NodeStats, PipelineNode};
pub use pipeline::{Completion, Pipeline, PostProcessingHook, PreProcessingHook};
pub use processor::{NodeContext, Processor, RootProcessor};
pub use signal::ShutdownSignal;
pub use store::Store;
