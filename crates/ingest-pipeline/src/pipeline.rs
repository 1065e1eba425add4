use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::io::{ChannelReader, CountingReader, MultiWriter, ReadCloser, WriteCloser};
use crate::node::{NodeStats, PipelineNode};
use crate::processor::NodeContext;
use crate::signal::ShutdownSignal;
use crate::store::Store;

/// Runs before any node starts. An error aborts the run.
pub type PreProcessingHook = Arc<dyn Fn(&Store) -> PipelineResult<()> + Send + Sync>;

/// Runs after every node has finished, with the run's error if any. An
/// error returned here becomes the run's result.
pub type PostProcessingHook =
    Arc<dyn Fn(&Store, Option<&PipelineError>) -> PipelineResult<()> + Send + Sync>;

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Resolves with the result of one pipeline run.
///
/// `Ok(())` when every node finished cleanly, `Err(PipelineError::Shutdown)`
/// when the run was stopped by [`Pipeline::shutdown`], otherwise the first
/// node or hook error.
#[must_use = "a pipeline run reports its result through the completion"]
pub struct Completion {
    rx: oneshot::Receiver<PipelineResult<()>>,
}

impl Completion {
    fn ready(result: PipelineResult<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for Completion {
    type Output = PipelineResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PipelineError::Aborted)))
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// State shared by every node of a single run.
struct RunState {
    ctx: NodeContext,
    signal: ShutdownSignal,
    store: Store,
    failure: Mutex<Option<PipelineError>>,
}

impl RunState {
    /// Keep the first failure and cancel the rest of the graph.
    fn fail(&self, err: PipelineError) {
        {
            let mut failure = self.failure.lock().expect("run state lock poisoned");
            if failure.is_none() {
                *failure = Some(err);
            }
        }
        self.signal.trigger();
    }

    fn take_failure(&self) -> Option<PipelineError> {
        self.failure.lock().expect("run state lock poisoned").take()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A tree of processors run concurrently, one task per node.
///
/// The root reads from the source handed to [`Pipeline::process`]; every
/// other node reads what its parent writes. Channels between nodes are
/// bounded (see [`PipelineConfig`]), so a slow consumer slows its producer.
/// A pipeline runs at most once at a time but can be reused for any number
/// of sequential runs.
pub struct Pipeline<T: Send + 'static> {
    root: Arc<PipelineNode<T>>,
    config: PipelineConfig,
    signal: ShutdownSignal,
    running: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
    pre_hooks: Vec<PreProcessingHook>,
    post_hooks: Vec<PostProcessingHook>,
}

impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    pub fn new(root: PipelineNode<T>) -> Self {
        Self::with_config(root, PipelineConfig::default())
    }

    pub fn with_config(root: PipelineNode<T>, config: PipelineConfig) -> Self {
        Self {
            root: Arc::new(root),
            config,
            signal: ShutdownSignal::new(),
            running: Arc::new(AtomicBool::new(false)),
            shut_down: Arc::new(AtomicBool::new(false)),
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    pub fn add_pre_processing_hook<F>(&mut self, hook: F)
    where
        F: Fn(&Store) -> PipelineResult<()> + Send + Sync + 'static,
    {
        self.pre_hooks.push(Arc::new(hook));
    }

    pub fn add_post_processing_hook<F>(&mut self, hook: F)
    where
        F: Fn(&Store, Option<&PipelineError>) -> PipelineResult<()> + Send + Sync + 'static,
    {
        self.post_hooks.push(Arc::new(hook));
    }

    pub fn root(&self) -> &PipelineNode<T> {
        &self.root
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Start a run fed by `reader` and return immediately.
    ///
    /// Must be called from within a tokio runtime. If a run is already
    /// active the completion resolves at once with
    /// [`PipelineError::AlreadyRunning`].
    pub fn process(&self, reader: Box<dyn ReadCloser<T>>) -> Completion {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Completion::ready(Err(PipelineError::AlreadyRunning));
        }

        self.shut_down.store(false, Ordering::Release);
        self.signal.reset();
        self.root.reset();

        let run = Arc::new(RunState {
            ctx: NodeContext::new(self.signal.clone()),
            signal: self.signal.clone(),
            store: Store::new(),
            failure: Mutex::new(None),
        });

        for hook in &self.pre_hooks {
            if let Err(err) = hook(&run.store) {
                warn!(error = %err, "pre-processing hook failed");
                self.running.store(false, Ordering::Release);
                return Completion::ready(Err(err));
            }
        }

        let (tx, rx) = oneshot::channel();
        let mut handles = Vec::with_capacity(self.root.node_count());
        self.spawn_node(self.root.clone(), reader, &run, &mut handles);

        let running = self.running.clone();
        let shut_down = self.shut_down.clone();
        let post_hooks = self.post_hooks.clone();
        let started = Instant::now();
        debug!(nodes = handles.len(), "pipeline run started");

        tokio::spawn(async move {
            for handle in handles {
                let _ = handle.await;
            }

            let mut result = match run.take_failure() {
                Some(err) => Err(err),
                None if shut_down.load(Ordering::Acquire) => Err(PipelineError::Shutdown),
                None => Ok(()),
            };

            for hook in &post_hooks {
                if let Err(err) = hook(&run.store, result.as_ref().err()) {
                    warn!(error = %err, "post-processing hook failed");
                    result = Err(err);
                }
            }

            running.store(false, Ordering::Release);
            match &result {
                Ok(()) => debug!(elapsed = ?started.elapsed(), "pipeline run finished"),
                Err(PipelineError::Shutdown) => info!("pipeline run stopped by shutdown"),
                Err(err) => warn!(error = %err, "pipeline run failed"),
            }
            let _ = tx.send(result);
        });

        Completion { rx }
    }

    fn spawn_node(
        &self,
        node: Arc<PipelineNode<T>>,
        reader: Box<dyn ReadCloser<T>>,
        run: &Arc<RunState>,
        handles: &mut Vec<JoinHandle<()>>,
    ) {
        let capacity = self.config.effective_capacity();
        let mut outputs = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let (tx, rx) = mpsc::channel(capacity);
            outputs.push(tx);
            let child_reader = ChannelReader::new(rx, run.signal.clone());
            self.spawn_node(child.clone(), Box::new(child_reader), run, handles);
        }

        let writer = MultiWriter::new(outputs, node.counters.clone());
        let name = node.name().to_owned();
        let task = tokio::spawn(run_node(node, reader, writer, run.clone()));
        handles.push(tokio::spawn(watch_node(name, task, run.clone())));
    }

    /// Ask the active run to stop.
    ///
    /// Processors see the request through [`NodeContext::is_cancelled`] and
    /// every node's input ends early; nothing is forcibly interrupted. The
    /// run's completion then resolves with [`PipelineError::Shutdown`]
    /// unless a node failed first. Idempotent.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            info!(running = self.is_running(), "pipeline shutdown requested");
        }
        self.signal.trigger();
    }

    /// Whether a run is in progress. Stays `true` until post-processing
    /// hooks have finished.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Per-node counters for the current or most recent run, root first.
    pub fn stats(&self) -> Vec<NodeStats> {
        let mut out = Vec::with_capacity(self.root.node_count());
        self.root.collect_stats(&mut out);
        out
    }
}

/// Fails the run as soon as a node task dies without returning.
async fn watch_node(name: String, task: JoinHandle<()>, run: Arc<RunState>) {
    let Err(join_err) = task.await else {
        return;
    };
    if join_err.is_panic() {
        warn!(processor = %name, "processor panicked");
        run.fail(PipelineError::Panicked { name });
    } else {
        warn!(processor = %name, "processor task cancelled");
        run.fail(PipelineError::Aborted);
    }
}

async fn run_node<T: Clone + Send + Sync + 'static>(
    node: Arc<PipelineNode<T>>,
    reader: Box<dyn ReadCloser<T>>,
    mut writer: MultiWriter<T>,
    run: Arc<RunState>,
) {
    let started = Instant::now();
    let mut reader = CountingReader::new(reader, node.counters.clone());

    let mut result = node
        .processor
        .process(&run.ctx, &run.store, &mut reader, &mut writer)
        .await;

    let _ = writer.close();
    let close_result = reader.close();
    if matches!(result, Ok(()) | Err(PipelineError::ClosedPipe)) {
        if let Err(err) = close_result {
            result = Err(err);
        }
    }
    node.counters.record_elapsed(started.elapsed());

    match result {
        Ok(()) | Err(PipelineError::ClosedPipe) => {
            debug!(processor = node.name(), "processor finished");
        }
        Err(err) => {
            warn!(processor = node.name(), error = %err, "processor errored");
            run.fail(PipelineError::Processor {
                name: node.name().to_owned(),
                source: Box::new(err),
            });
        }
    }
}
