use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PipelineError, PipelineResult};
use crate::node::NodeCounters;
use crate::signal::ShutdownSignal;

/// Source side of a node: yields records until `None` (end of stream).
#[async_trait]
pub trait ReadCloser<T: Send + 'static>: Send {
    async fn read(&mut self) -> PipelineResult<Option<T>>;

    /// Release the source. Must be safe to call more than once.
    fn close(&mut self) -> PipelineResult<()>;
}

/// Sink side of a node.
#[async_trait]
pub trait WriteCloser<T: Send + 'static>: Send {
    /// Deliver a record downstream. Returns [`PipelineError::ClosedPipe`]
    /// once there is nobody left to deliver to.
    async fn write(&mut self, item: T) -> PipelineResult<()>;

    fn close(&mut self) -> PipelineResult<()>;
}

/// Reads the records a parent node wrote to this node.
///
/// Reports end of stream once the parent closes its writer or the run's
/// shutdown signal fires.
pub(crate) struct ChannelReader<T> {
    rx: mpsc::Receiver<T>,
    signal: ShutdownSignal,
}

impl<T> ChannelReader<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, signal: ShutdownSignal) -> Self {
        Self { rx, signal }
    }
}

#[async_trait]
impl<T: Send + 'static> ReadCloser<T> for ChannelReader<T> {
    async fn read(&mut self) -> PipelineResult<Option<T>> {
        if self.signal.is_triggered() {
            return Ok(None);
        }
        tokio::select! {
            biased;
            _ = self.signal.triggered() => Ok(None),
            item = self.rx.recv() => Ok(item),
        }
    }

    fn close(&mut self) -> PipelineResult<()> {
        // Parents writing after this see a failed send.
        self.rx.close();
        Ok(())
    }
}

/// Tees every record to each child that is still reading.
///
/// A child whose input has been closed is skipped from then on. The write
/// fails with [`PipelineError::ClosedPipe`] only when no child is left. A
/// node without children is a sink and every write succeeds.
pub(crate) struct MultiWriter<T> {
    outputs: Vec<Option<mpsc::Sender<T>>>,
    counters: Arc<NodeCounters>,
    closed: bool,
}

impl<T> MultiWriter<T> {
    pub(crate) fn new(outputs: Vec<mpsc::Sender<T>>, counters: Arc<NodeCounters>) -> Self {
        Self {
            outputs: outputs.into_iter().map(Some).collect(),
            counters,
            closed: false,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> WriteCloser<T> for MultiWriter<T> {
    async fn write(&mut self, item: T) -> PipelineResult<()> {
        if self.closed {
            return Err(PipelineError::ClosedPipe);
        }
        if self.outputs.is_empty() {
            self.counters.record_write();
            return Ok(());
        }

        let mut delivered = false;
        for slot in self.outputs.iter_mut() {
            let Some(tx) = slot else { continue };
            if tx.send(item.clone()).await.is_ok() {
                delivered = true;
            } else {
                *slot = None;
            }
        }

        if delivered {
            self.counters.record_write();
            Ok(())
        } else {
            Err(PipelineError::ClosedPipe)
        }
    }

    fn close(&mut self) -> PipelineResult<()> {
        // Dropping the senders ends the children's streams.
        self.outputs.clear();
        self.closed = true;
        Ok(())
    }
}

/// Counts records pulled through the wrapped reader.
pub(crate) struct CountingReader<T: Send + 'static> {
    inner: Box<dyn ReadCloser<T>>,
    counters: Arc<NodeCounters>,
}

impl<T: Send + 'static> CountingReader<T> {
    pub(crate) fn new(inner: Box<dyn ReadCloser<T>>, counters: Arc<NodeCounters>) -> Self {
        Self { inner, counters }
    }
}

#[async_trait]
impl<T: Send + 'static> ReadCloser<T> for CountingReader<T> {
    async fn read(&mut self) -> PipelineResult<Option<T>> {
        let item = self.inner.read().await?;
        if item.is_some() {
            self.counters.record_read();
        }
        Ok(item)
    }

    fn close(&mut self) -> PipelineResult<()> {
        self.inner.close()
    }
}

/// Adapts any in-memory iterator into a pipeline source.
pub struct IterReader<I> {
    iter: Option<I>,
}

impl<I> IterReader<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: Some(iter.into_iter()),
        }
    }
}

#[async_trait]
impl<T, I> ReadCloser<T> for IterReader<I>
where
    T: Send + 'static,
    I: Iterator<Item = T> + Send,
{
    async fn read(&mut self) -> PipelineResult<Option<T>> {
        Ok(self.iter.as_mut().and_then(Iterator::next))
    }

    fn close(&mut self) -> PipelineResult<()> {
        self.iter = None;
        Ok(())
    }
}
