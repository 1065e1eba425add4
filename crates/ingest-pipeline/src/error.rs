/// Boxed error carried through the pipeline from sources and processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The run finished because [`crate::Pipeline::shutdown`] was called.
    /// Not a failure.
    #[error("pipeline shut down")]
    Shutdown,

    /// Every downstream input of a node has been closed.
    ///
    /// A processor that gets this from a write can simply return it: the node
    /// treats it as a successful finish. This lets a child stop consuming
    /// early without failing the run, at the cost of also hiding a child that
    /// exits prematurely by mistake.
    #[error("write to a closed pipe")]
    ClosedPipe,

    /// `process` was called while a previous run was still active.
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// A processor returned an error.
    #[error("processor {name} errored: {source}")]
    Processor {
        name: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// A processor panicked.
    #[error("processor {name} panicked")]
    Panicked { name: String },

    /// The source feeding the pipeline failed.
    #[error("read error: {0}")]
    Read(#[source] BoxError),

    /// A pre- or post-processing hook failed.
    #[error("hook error: {0}")]
    Hook(String),

    /// The run ended without reporting a result.
    #[error("pipeline run aborted")]
    Aborted,

    #[error("{0}")]
    Other(#[source] BoxError),
}

impl PipelineError {
    /// Wrap an error raised while reading from a source.
    pub fn read(err: impl Into<BoxError>) -> Self {
        Self::Read(err.into())
    }

    /// Wrap an arbitrary processor error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    pub fn is_closed_pipe(&self) -> bool {
        matches!(self, Self::ClosedPipe)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
