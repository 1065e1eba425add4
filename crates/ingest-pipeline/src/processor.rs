use async_trait::async_trait;

use crate::error::{PipelineError, PipelineResult};
use crate::io::{ReadCloser, WriteCloser};
use crate::signal::ShutdownSignal;
use crate::store::Store;

// ---------------------------------------------------------------------------
// NodeContext
// ---------------------------------------------------------------------------

/// Per-run context handed to every processor.
///
/// Cancellation is advisory: the pipeline never interrupts a processor, it
/// only makes `is_cancelled` return `true` and ends every node's input
/// stream. Long-running processors should check between units of work.
#[derive(Clone, Debug)]
pub struct NodeContext {
    signal: ShutdownSignal,
}

impl NodeContext {
    pub(crate) fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_triggered()
    }

    /// Resolves once the run is being cancelled.
    pub async fn cancelled(&self) {
        self.signal.triggered().await
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// A unit of work in a pipeline graph.
///
/// `process` pulls records from `reader` until it is exhausted and pushes
/// whatever it wants downstream through `writer`. The node closes both when
/// `process` returns, so implementations need not. Returning
/// [`PipelineError::ClosedPipe`] (typically straight from a failed write)
/// counts as a normal finish.
#[async_trait]
pub trait Processor<T: Send + 'static>: Send + Sync {
    /// Stable, human-readable name used in logs, errors and stats.
    fn name(&self) -> &str;

    async fn process(
        &self,
        ctx: &NodeContext,
        store: &Store,
        reader: &mut dyn ReadCloser<T>,
        writer: &mut dyn WriteCloser<T>,
    ) -> PipelineResult<()>;

    /// Clear any per-run state. Called before each run.
    fn reset(&self) {}
}

/// Passes every record through unchanged.
///
/// Used as the root of a graph: it drains the source into the children and
/// stops at end of stream, when every child has stopped reading, or when
/// the run is cancelled.
#[derive(Clone, Copy, Debug, Default)]
pub struct RootProcessor;

#[async_trait]
impl<T: Send + 'static> Processor<T> for RootProcessor {
    fn name(&self) -> &str {
        "RootProcessor"
    }

    async fn process(
        &self,
        ctx: &NodeContext,
        _store: &Store,
        reader: &mut dyn ReadCloser<T>,
        writer: &mut dyn WriteCloser<T>,
    ) -> PipelineResult<()> {
        while let Some(item) = reader.read().await? {
            match writer.write(item).await {
                Ok(()) => {}
                Err(PipelineError::ClosedPipe) => return Ok(()),
                Err(err) => return Err(err),
            }
            if ctx.is_cancelled() {
                break;
            }
        }
        Ok(())
    }
}
