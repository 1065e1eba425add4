//! Ingestion session engine.
//!
//! A [`LiveSession`] bootstraps from the history archive's latest
//! checkpoint: it checks that archive and ledger backend agree on the
//! checkpoint's bucket list hash, streams the checkpoint state through a
//! [`StatePipeline`], then replicates every following ledger from the
//! backend through a [`LedgerPipeline`], advancing a progress cursor after
//! each one. [`LiveSession::resume`] skips the bootstrap and starts at a
//! given ledger.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ingest_io::{MemoryArchive, MemoryLedgerBackend};
//! use ingest_pipeline::{PipelineNode, RootProcessor};
//! use ingest_session::{
//!     LedgerPipeline, LiveSession, SessionConfig, StatePipeline, SuccessfulTransactionFilter,
//! };
//!
//! # async fn example() -> ingest_session::SessionResult<()> {
//! let state = StatePipeline::new(PipelineNode::new(RootProcessor));
//! let ledgers = LedgerPipeline::new(
//!     PipelineNode::new(RootProcessor).pipe([PipelineNode::new(SuccessfulTransactionFilter)]),
//! );
//! let session = LiveSession::new(SessionConfig::default())
//!     .with_archive(Arc::new(MemoryArchive::new()))
//!     .with_ledger_backend(Arc::new(MemoryLedgerBackend::new()))
//!     .with_state_pipeline(Arc::new(state))
//!     .with_ledger_pipeline(Arc::new(ledgers));
//! session.run().await
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod pipelines;
pub mod processors;
pub mod reporter;
pub mod session;

pub use config::{SessionConfig, DEFAULT_CURSOR_NAME};
pub use cursor::{CursorClient, MemoryCursorClient};
pub use error::{SessionError, SessionResult};
pub use pipelines::{LedgerPipeline, LedgerSource, StatePipeline, StateSource};
pub use processors::{EntryTypeFilter, StatusLogger, SuccessfulTransactionFilter};
pub use reporter::{LedgerReporter, LoggingLedgerReporter, LoggingStateReporter, StateReporter};
pub use session::LiveSession;
