use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::processor::Processor;

/// A processor plus the nodes its output is teed to.
///
/// Build graphs bottom-up with [`PipelineNode::pipe`]:
///
/// ```rust
/// use ingest_pipeline::{PipelineNode, RootProcessor};
///
/// let graph: PipelineNode<u32> = PipelineNode::new(RootProcessor)
///     .pipe([PipelineNode::new(RootProcessor), PipelineNode::new(RootProcessor)]);
/// assert_eq!(graph.children().count(), 2);
/// ```
pub struct PipelineNode<T: Send + 'static> {
    pub(crate) processor: Arc<dyn Processor<T>>,
    pub(crate) children: Vec<Arc<PipelineNode<T>>>,
    pub(crate) counters: Arc<NodeCounters>,
}

impl<T: Send + 'static> PipelineNode<T> {
    pub fn new(processor: impl Processor<T> + 'static) -> Self {
        Self::from_arc(Arc::new(processor))
    }

    /// Wrap a processor the caller keeps a handle to.
    pub fn from_arc(processor: Arc<dyn Processor<T>>) -> Self {
        Self {
            processor,
            children: Vec::new(),
            counters: Arc::new(NodeCounters::default()),
        }
    }

    /// Attach children. Every record this node writes goes to each of them.
    pub fn pipe(mut self, children: impl IntoIterator<Item = PipelineNode<T>>) -> Self {
        self.children.extend(children.into_iter().map(Arc::new));
        self
    }

    pub fn name(&self) -> &str {
        self.processor.name()
    }

    pub fn children(&self) -> impl Iterator<Item = &PipelineNode<T>> {
        self.children.iter().map(|child| child.as_ref())
    }

    pub fn is_sink(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in the subtree rooted here.
    pub fn node_count(&self) -> usize {
        1 + self.children().map(PipelineNode::node_count).sum::<usize>()
    }

    pub(crate) fn reset(&self) {
        self.processor.reset();
        self.counters.reset();
        for child in &self.children {
            child.reset();
        }
    }

    pub(crate) fn collect_stats(&self, out: &mut Vec<NodeStats>) {
        let (read, wrote, elapsed) = self.counters.snapshot();
        out.push(NodeStats {
            name: self.name().to_owned(),
            read_entries: read,
            wrote_entries: wrote,
            elapsed,
        });
        for child in &self.children {
            child.collect_stats(out);
        }
    }
}

/// Counters for one node during the most recent run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub name: String,
    pub read_entries: u64,
    pub wrote_entries: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct NodeCounters {
    read: AtomicU64,
    wrote: AtomicU64,
    elapsed_micros: AtomicU64,
}

impl NodeCounters {
    pub(crate) fn record_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.wrote.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_elapsed(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_micros.store(micros, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.read.store(0, Ordering::Relaxed);
        self.wrote.store(0, Ordering::Relaxed);
        self.elapsed_micros.store(0, Ordering::Relaxed);
    }

    /// `(read, wrote, elapsed)`
    pub(crate) fn snapshot(&self) -> (u64, u64, Duration) {
        (
            self.read.load(Ordering::Relaxed),
            self.wrote.load(Ordering::Relaxed),
            Duration::from_micros(self.elapsed_micros.load(Ordering::Relaxed)),
        )
    }
}
