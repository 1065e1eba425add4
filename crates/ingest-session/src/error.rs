use ingest_io::IoError;
use ingest_pipeline::PipelineError;
use ingest_types::Hash;
use thiserror::Error;

/// Errors that end a session run.
///
/// Every variant names the stage that failed in its message.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("session is already running")]
    AlreadyRunning,

    #[error("{stage}: {source}")]
    Adapter {
        stage: &'static str,
        #[source]
        source: IoError,
    },

    #[error(
        "bucket list validation: cannot find checkpoint ledger {0} in the ledger backend; \
         the backend is not in sync with the history archive, make sure it is configured \
         to start at or before ledger {0}"
    )]
    CheckpointNotFound(u32),

    #[error(
        "bucket list validation: bucket list hash of the history archive and the ledger \
         header of ledger {sequence} do not match: {archive:#x} {backend:#x}"
    )]
    BucketListMismatch {
        sequence: u32,
        archive: Hash,
        backend: Hash,
    },

    #[error("resume: gap detected (ledger {sequence} does not exist but {latest} is latest)")]
    Gap { sequence: u32, latest: u32 },

    #[error("state pipeline: {0}")]
    StatePipeline(#[source] PipelineError),

    #[error("resume: ledger pipeline errored at ledger {sequence}: {source}")]
    LedgerPipeline {
        sequence: u32,
        #[source]
        source: PipelineError,
    },

    #[error("cursor update: {0}")]
    Cursor(#[source] IoError),
}

impl SessionError {
    pub(crate) fn adapter(stage: &'static str) -> impl FnOnce(IoError) -> Self {
        move |source| Self::Adapter { stage, source }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
