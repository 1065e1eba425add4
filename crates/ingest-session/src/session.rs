use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ingest_io::{HistoryArchive, LedgerBackend, MemoryTempSet, TempSet};
use ingest_pipeline::{PipelineError, ShutdownSignal};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::cursor::CursorClient;
use crate::error::{SessionError, SessionResult};
use crate::pipelines::{LedgerPipeline, LedgerSource, StatePipeline, StateSource};
use crate::reporter::{LedgerReporter, StateReporter};

/// Ingests a checkpoint's state from the history archive, then follows the
/// ledger backend one ledger at a time.
///
/// Build it with [`LiveSession::new`] and the `with_*` setters, then drive
/// it with [`LiveSession::run`] or [`LiveSession::resume`]. Only one of
/// those may be active at a time. [`LiveSession::shutdown`] may be called
/// concurrently from another task.
///
/// Cancellation is cooperative: a processor that never returns keeps its
/// pipeline, and therefore `shutdown`, waiting indefinitely.
pub struct LiveSession {
    config: SessionConfig,
    archive: Option<Arc<dyn HistoryArchive>>,
    ledger_backend: Option<Arc<dyn LedgerBackend>>,
    state_pipeline: Option<Arc<StatePipeline>>,
    ledger_pipeline: Option<Arc<LedgerPipeline>>,
    temp_set: Option<Arc<dyn TempSet>>,
    cursor_client: Option<Arc<dyn CursorClient>>,
    state_reporter: Option<Arc<dyn StateReporter>>,
    ledger_reporter: Option<Arc<dyn LedgerReporter>>,

    shutdown: ShutdownSignal,
    running: AtomicBool,
    latest_processed: Mutex<Option<u32>>,
}

/// Collaborators required by both entry points, checked up front.
struct Ready<'a> {
    archive: &'a dyn HistoryArchive,
    backend: &'a dyn LedgerBackend,
    state_pipeline: &'a StatePipeline,
    ledger_pipeline: &'a LedgerPipeline,
}

/// Clears the running flag however a run ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LiveSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            archive: None,
            ledger_backend: None,
            state_pipeline: None,
            ledger_pipeline: None,
            temp_set: None,
            cursor_client: None,
            state_reporter: None,
            ledger_reporter: None,
            shutdown: ShutdownSignal::new(),
            running: AtomicBool::new(false),
            latest_processed: Mutex::new(None),
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn HistoryArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_ledger_backend(mut self, backend: Arc<dyn LedgerBackend>) -> Self {
        self.ledger_backend = Some(backend);
        self
    }

    pub fn with_state_pipeline(mut self, pipeline: Arc<StatePipeline>) -> Self {
        self.state_pipeline = Some(pipeline);
        self
    }

    pub fn with_ledger_pipeline(mut self, pipeline: Arc<LedgerPipeline>) -> Self {
        self.ledger_pipeline = Some(pipeline);
        self
    }

    /// Working set used to de-duplicate state entries. Without one, each
    /// bootstrap gets a fresh [`MemoryTempSet`].
    pub fn with_temp_set(mut self, temp_set: Arc<dyn TempSet>) -> Self {
        self.temp_set = Some(temp_set);
        self
    }

    /// Without a cursor client, progress is not reported to the backend.
    pub fn with_cursor_client(mut self, client: Arc<dyn CursorClient>) -> Self {
        self.cursor_client = Some(client);
        self
    }

    pub fn with_state_reporter(mut self, reporter: Arc<dyn StateReporter>) -> Self {
        self.state_reporter = Some(reporter);
        self
    }

    pub fn with_ledger_reporter(mut self, reporter: Arc<dyn LedgerReporter>) -> Self {
        self.ledger_reporter = Some(reporter);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn archive(&self) -> Option<&Arc<dyn HistoryArchive>> {
        self.archive.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bootstrap from the archive's latest checkpoint, then replicate every
    /// following ledger until shutdown or failure.
    pub async fn run(&self) -> SessionResult<()> {
        let ready = self.ready()?;
        let _running = self.start()?;

        let checkpoint = ready
            .archive
            .latest_checkpoint_sequence()
            .await
            .map_err(SessionError::adapter("bootstrap: getting latest checkpoint sequence"))?;
        info!(checkpoint, "starting ingestion from checkpoint");

        self.update_cursor(checkpoint).await?;
        self.validate_bucket_list(&ready, checkpoint).await?;
        self.process_state(&ready, checkpoint).await?;
        self.set_latest_processed(checkpoint);

        if self.shutdown.is_triggered() {
            info!(checkpoint, "shutdown requested after state bootstrap");
            return Ok(());
        }

        self.resume_from(&ready, checkpoint + 1).await
    }

    /// Replicate ledgers starting at `sequence`, skipping the bootstrap.
    ///
    /// Nothing about earlier runs is consulted. To continue where a previous
    /// run stopped, pass one past
    /// [`LiveSession::latest_successfully_processed_ledger`].
    pub async fn resume(&self, sequence: u32) -> SessionResult<()> {
        let ready = self.ready()?;
        let _running = self.start()?;
        info!(ledger = sequence, "resuming ingestion");
        self.resume_from(&ready, sequence).await
    }

    /// The last ledger (or checkpoint) fully processed, or `None` if nothing
    /// has been yet.
    pub fn latest_successfully_processed_ledger(&self) -> Option<u32> {
        *self.latest_processed.lock().expect("session lock poisoned")
    }

    /// Ask the active run to stop and wait until both pipelines are idle.
    ///
    /// Safe to call repeatedly and while no run is active.
    pub async fn shutdown(&self) {
        info!("shutting down session");
        self.shutdown.trigger();
        if let Some(pipeline) = &self.state_pipeline {
            pipeline.shutdown();
        }
        if let Some(pipeline) = &self.ledger_pipeline {
            pipeline.shutdown();
        }

        while self.pipelines_running() {
            debug!("waiting for pipelines to drain");
            tokio::time::sleep(self.config.shutdown_poll_interval).await;
        }
        info!("session shut down");
    }

    fn pipelines_running(&self) -> bool {
        self.state_pipeline.as_ref().is_some_and(|p| p.is_running())
            || self.ledger_pipeline.as_ref().is_some_and(|p| p.is_running())
    }

    fn ready(&self) -> SessionResult<Ready<'_>> {
        self.config.validate()?;
        let missing = |what: &str| SessionError::Config(format!("{what} not set"));
        Ok(Ready {
            archive: self.archive.as_deref().ok_or_else(|| missing("history archive"))?,
            backend: self
                .ledger_backend
                .as_deref()
                .ok_or_else(|| missing("ledger backend"))?,
            state_pipeline: self
                .state_pipeline
                .as_deref()
                .ok_or_else(|| missing("state pipeline"))?,
            ledger_pipeline: self
                .ledger_pipeline
                .as_deref()
                .ok_or_else(|| missing("ledger pipeline"))?,
        })
    }

    fn start(&self) -> SessionResult<RunningGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyRunning);
        }
        self.shutdown.reset();
        Ok(RunningGuard(&self.running))
    }

    fn set_latest_processed(&self, sequence: u32) {
        *self.latest_processed.lock().expect("session lock poisoned") = Some(sequence);
    }

    async fn update_cursor(&self, sequence: u32) -> SessionResult<()> {
        let Some(client) = &self.cursor_client else {
            return Ok(());
        };
        client
            .set_cursor(&self.config.cursor_name, sequence)
            .await
            .map_err(SessionError::Cursor)?;
        debug!(cursor = %self.config.cursor_name, ledger = sequence, "cursor updated");
        Ok(())
    }

    async fn validate_bucket_list(&self, ready: &Ready<'_>, sequence: u32) -> SessionResult<()> {
        let archive_hash = ready
            .archive
            .bucket_list_hash(sequence)
            .await
            .map_err(SessionError::adapter("bucket list validation: getting bucket list hash"))?;

        let backend_hash = match ready.backend.ledger_header_hash(sequence).await {
            Ok(hash) => hash,
            Err(err) if err.is_not_found() => return Err(SessionError::CheckpointNotFound(sequence)),
            Err(source) => {
                return Err(SessionError::Adapter {
                    stage: "bucket list validation: getting ledger header",
                    source,
                })
            }
        };

        if archive_hash != backend_hash {
            return Err(SessionError::BucketListMismatch {
                sequence,
                archive: archive_hash,
                backend: backend_hash,
            });
        }
        debug!(ledger = sequence, hash = %archive_hash, "bucket list hash validated");
        Ok(())
    }

    async fn process_state(&self, ready: &Ready<'_>, sequence: u32) -> SessionResult<()> {
        let temp_set = self
            .temp_set
            .clone()
            .unwrap_or_else(|| Arc::new(MemoryTempSet::new()));
        let reader = ready
            .archive
            .open_state_stream(sequence, temp_set, self.config.max_state_stream_retries)
            .await
            .map_err(SessionError::adapter("state pipeline: opening state stream"))?;

        if let Some(reporter) = &self.state_reporter {
            reporter.on_start_state(sequence);
        }
        let source = StateSource::new(reader).with_reporter(self.state_reporter.clone());
        let result = ready.state_pipeline.process(Box::new(source)).await;

        let shutdown = matches!(result, Err(PipelineError::Shutdown));
        let failure = match result {
            Ok(()) | Err(PipelineError::Shutdown) => None,
            Err(err) => Some(err),
        };
        if let Some(reporter) = &self.state_reporter {
            reporter.on_end_state(failure.as_ref(), shutdown);
        }
        if let Some(err) = failure {
            warn!(ledger = sequence, error = %err, "state pipeline failed");
            return Err(SessionError::StatePipeline(err));
        }
        info!(ledger = sequence, shutdown, "state pipeline finished");
        Ok(())
    }

    async fn resume_from(&self, ready: &Ready<'_>, mut sequence: u32) -> SessionResult<()> {
        loop {
            let mut reader = match ready.backend.get_ledger(sequence).await {
                Ok(reader) => reader,
                Err(err) if err.is_not_found() => {
                    let latest = ready
                        .backend
                        .latest_ledger_sequence()
                        .await
                        .map_err(SessionError::adapter("resume: getting latest ledger sequence"))?;
                    if latest > sequence {
                        return Err(SessionError::Gap { sequence, latest });
                    }

                    debug!(ledger = sequence, latest, "ledger not closed yet, waiting");
                    tokio::select! {
                        _ = self.shutdown.triggered() => {
                            info!(ledger = sequence, "shutdown requested while waiting for ledger");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(self.config.idle_retry_interval) => continue,
                    }
                }
                Err(source) => {
                    return Err(SessionError::Adapter {
                        stage: "resume: getting ledger",
                        source,
                    })
                }
            };

            if let Some(reporter) = &self.ledger_reporter {
                reporter.on_new_ledger(sequence);
            }
            // Upgrade changes are not transaction changes.
            reader.ignore_upgrade_changes();
            let source = LedgerSource::new(reader).with_reporter(self.ledger_reporter.clone());

            match ready.ledger_pipeline.process(Box::new(source)).await {
                Ok(()) => {}
                Err(PipelineError::Shutdown) => {
                    if let Some(reporter) = &self.ledger_reporter {
                        reporter.on_end_ledger(None, true);
                    }
                    info!(ledger = sequence, "ledger pipeline stopped by shutdown");
                    return Ok(());
                }
                Err(err) => {
                    if let Some(reporter) = &self.ledger_reporter {
                        reporter.on_end_ledger(Some(&err), false);
                    }
                    warn!(ledger = sequence, error = %err, "ledger pipeline failed");
                    return Err(SessionError::LedgerPipeline {
                        sequence,
                        source: err,
                    });
                }
            }

            if let Some(reporter) = &self.ledger_reporter {
                reporter.on_end_ledger(None, false);
            }
            // Recorded before the cursor moves so a crash in between
            // under-reports progress.
            self.set_latest_processed(sequence);
            self.update_cursor(sequence).await?;
            debug!(ledger = sequence, "ledger processed");

            sequence += 1;
            if self.shutdown.is_triggered() {
                info!(next = sequence, "shutdown requested, stopping replication");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursorClient;
    use async_trait::async_trait;
    use ingest_io::{
        BucketEntry, LedgerCloseData, LedgerTransaction, MemoryArchive, MemoryCheckpoint,
        MemoryLedgerBackend,
    };
    use ingest_pipeline::{
        NodeContext, PipelineNode, PipelineResult, Processor, ReadCloser, RootProcessor, Store,
        WriteCloser,
    };
    use ingest_types::{
        AccountEntry, Hash, LedgerEntry, LedgerEntryChange, LedgerEntryData, LedgerHeader,
        TransactionEnvelope, TransactionMeta, TransactionResultPair,
    };
    use std::time::Duration;

    const CHECKPOINT: u32 = 63;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn config() -> SessionConfig {
        SessionConfig {
            cursor_name: "TESTCURSOR".into(),
            idle_retry_interval: Duration::from_millis(10),
            shutdown_poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn bucket_hash() -> Hash {
        Hash::from_bytes([0x11; 32])
    }

    fn account(address: &str) -> LedgerEntry {
        LedgerEntry::new(CHECKPOINT, LedgerEntryData::Account(AccountEntry::new(address)))
    }

    /// One transaction whose sequence number is its ledger's.
    fn transaction(ledger: u32, successful: bool) -> LedgerTransaction {
        LedgerTransaction {
            index: 1,
            envelope: TransactionEnvelope {
                source_account: "GA".into(),
                fee: 100,
                seq_num: i64::from(ledger),
                operation_count: 0,
                memo: None,
            },
            result: TransactionResultPair {
                transaction_hash: Hash::digest(&ledger.to_be_bytes()),
                fee_charged: 100,
                successful,
            },
            fee_meta: Vec::new(),
            meta: TransactionMeta::new(Vec::new()),
        }
    }

    fn ledger(sequence: u32) -> LedgerCloseData {
        LedgerCloseData::new(LedgerHeader::new(sequence, bucket_hash()))
            .with_transactions(vec![transaction(sequence, true)])
    }

    struct Collect<T>(Arc<Mutex<Vec<T>>>);

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> Processor<T> for Collect<T> {
        fn name(&self) -> &str {
            "Collect"
        }

        async fn process(
            &self,
            _ctx: &NodeContext,
            _store: &Store,
            reader: &mut dyn ReadCloser<T>,
            _writer: &mut dyn WriteCloser<T>,
        ) -> PipelineResult<()> {
            while let Some(item) = reader.read().await? {
                self.0.lock().unwrap().push(item);
            }
            Ok(())
        }
    }

    /// Fails on the transactions of one ledger.
    struct FailAtLedger(u32);

    #[async_trait]
    impl Processor<LedgerTransaction> for FailAtLedger {
        fn name(&self) -> &str {
            "FailAtLedger"
        }

        async fn process(
            &self,
            _ctx: &NodeContext,
            _store: &Store,
            reader: &mut dyn ReadCloser<LedgerTransaction>,
            _writer: &mut dyn WriteCloser<LedgerTransaction>,
        ) -> PipelineResult<()> {
            while let Some(transaction) = reader.read().await? {
                if transaction.envelope.seq_num == i64::from(self.0) {
                    return Err(PipelineError::other("cannot apply transaction"));
                }
            }
            Ok(())
        }
    }

    /// Holds its node open until the pipeline is shut down.
    struct WaitForShutdown;

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> Processor<T> for WaitForShutdown {
        fn name(&self) -> &str {
            "WaitForShutdown"
        }

        async fn process(
            &self,
            ctx: &NodeContext,
            _store: &Store,
            _reader: &mut dyn ReadCloser<T>,
            _writer: &mut dyn WriteCloser<T>,
        ) -> PipelineResult<()> {
            ctx.cancelled().await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl Recording {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl StateReporter for Recording {
        fn on_start_state(&self, sequence: u32) {
            self.push(format!("start state {sequence}"));
        }

        fn on_state_entry(&self) {
            self.push("entry".into());
        }

        fn on_end_state(&self, err: Option<&PipelineError>, shutdown: bool) {
            self.push(format!("end state err={} shutdown={shutdown}", err.is_some()));
        }
    }

    impl LedgerReporter for Recording {
        fn on_new_ledger(&self, sequence: u32) {
            self.push(format!("ledger {sequence}"));
        }

        fn on_ledger_transaction(&self, transaction: &LedgerTransaction) {
            self.push(format!("tx {}", transaction.envelope.seq_num));
        }

        fn on_end_ledger(&self, err: Option<&PipelineError>, shutdown: bool) {
            self.push(format!("end ledger err={} shutdown={shutdown}", err.is_some()));
        }
    }

    /// Memory adapters plus collecting pipelines.
    struct Fixture {
        archive: Arc<MemoryArchive>,
        backend: Arc<MemoryLedgerBackend>,
        cursor: Arc<MemoryCursorClient>,
        states: Arc<Mutex<Vec<LedgerEntryChange>>>,
        transactions: Arc<Mutex<Vec<LedgerTransaction>>>,
        state_pipeline: Arc<StatePipeline>,
        ledger_pipeline: Arc<LedgerPipeline>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_ledger_processor(None)
        }

        fn with_ledger_processor(extra: Option<PipelineNode<LedgerTransaction>>) -> Self {
            init_tracing();
            let states = Arc::new(Mutex::new(Vec::new()));
            let transactions = Arc::new(Mutex::new(Vec::new()));

            let state_pipeline = Arc::new(StatePipeline::new(
                PipelineNode::new(RootProcessor).pipe([PipelineNode::new(Collect(states.clone()))]),
            ));
            let mut ledger_children = vec![PipelineNode::new(Collect(transactions.clone()))];
            ledger_children.extend(extra);
            let ledger_pipeline = Arc::new(LedgerPipeline::new(
                PipelineNode::new(RootProcessor).pipe(ledger_children),
            ));

            Self {
                archive: Arc::new(MemoryArchive::new()),
                backend: Arc::new(MemoryLedgerBackend::new()),
                cursor: Arc::new(MemoryCursorClient::new()),
                states,
                transactions,
                state_pipeline,
                ledger_pipeline,
            }
        }

        fn with_checkpoint(self, sequence: u32, hash: Hash, entries: Vec<LedgerEntry>) -> Self {
            self.archive.add_checkpoint(
                sequence,
                MemoryCheckpoint {
                    bucket_list_hash: hash,
                    buckets: vec![entries.into_iter().map(BucketEntry::Live).collect()],
                },
            );
            self
        }

        fn session(&self) -> LiveSession {
            LiveSession::new(config())
                .with_archive(self.archive.clone())
                .with_ledger_backend(self.backend.clone())
                .with_state_pipeline(self.state_pipeline.clone())
                .with_ledger_pipeline(self.ledger_pipeline.clone())
                .with_cursor_client(self.cursor.clone())
        }

        fn cursor_sequences(&self) -> Vec<u32> {
            self.cursor
                .updates()
                .into_iter()
                .map(|(name, sequence)| {
                    assert_eq!(name, "TESTCURSOR");
                    sequence
                })
                .collect()
        }

        fn ledgers_seen(&self) -> Vec<i64> {
            self.transactions
                .lock()
                .unwrap()
                .iter()
                .map(|t| t.envelope.seq_num)
                .collect()
        }
    }

    async fn wait_for_latest(session: &LiveSession, sequence: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.latest_successfully_processed_ledger() != Some(sequence) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ledger was not processed in time");
    }

    async fn join(
        handle: tokio::task::JoinHandle<SessionResult<()>>,
    ) -> SessionResult<()> {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session did not stop in time")
            .expect("session task panicked")
    }

    // -----------------------------------------------------------------------
    // 1. Bootstrap from the checkpoint, then replicate following ledgers
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_bootstraps_then_replicates() {
        let fixture = Fixture::new().with_checkpoint(
            CHECKPOINT,
            bucket_hash(),
            vec![account("GA"), account("GB")],
        );
        for sequence in CHECKPOINT..=CHECKPOINT + 2 {
            fixture.backend.add_ledger(ledger(sequence));
        }
        let session = Arc::new(fixture.session());
        assert_eq!(session.latest_successfully_processed_ledger(), None);

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };
        wait_for_latest(&session, CHECKPOINT + 2).await;
        assert!(session.is_running());

        session.shutdown().await;
        join(handle).await.unwrap();

        assert!(!session.is_running());
        assert_eq!(fixture.states.lock().unwrap().len(), 2);
        assert_eq!(fixture.ledgers_seen(), vec![64, 65]);
        assert_eq!(fixture.cursor_sequences(), vec![63, 64, 65]);
        assert_eq!(session.latest_successfully_processed_ledger(), Some(65));
    }

    // -----------------------------------------------------------------------
    // 2. Archive and backend disagree on the checkpoint state
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn run_fails_on_bucket_list_mismatch() {
        let fixture = Fixture::new().with_checkpoint(1000, Hash::from_bytes([0xAA; 32]), vec![account("GA")]);
        fixture
            .backend
            .add_ledger(LedgerCloseData::new(LedgerHeader::new(1000, Hash::from_bytes([0xBB; 32]))));
        let session = fixture.session();

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::BucketListMismatch { sequence: 1000, .. }));
        let message = err.to_string();
        assert!(message.contains(&"aa".repeat(32)), "{message}");
        assert!(message.contains(&"bb".repeat(32)), "{message}");
        assert!(message.starts_with("bucket list validation"));

        assert!(!session.is_running());
        assert!(fixture.states.lock().unwrap().is_empty());
        assert_eq!(session.latest_successfully_processed_ledger(), None);
    }

    // -----------------------------------------------------------------------
    // 3. Backend does not have the checkpoint ledger
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn run_fails_when_backend_lacks_checkpoint() {
        let fixture = Fixture::new().with_checkpoint(1000, bucket_hash(), Vec::new());
        let session = fixture.session();

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::CheckpointNotFound(1000)));
        assert!(err.to_string().contains("ledger 1000"));
        assert!(!session.is_running());
    }

    // -----------------------------------------------------------------------
    // 4. A missing ledger behind the backend's latest is a gap
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn resume_detects_gap() {
        let fixture = Fixture::new();
        fixture.backend.set_latest_sequence(105);
        let session = fixture.session();

        let err = session.resume(100).await.unwrap_err();
        assert!(matches!(err, SessionError::Gap { sequence: 100, latest: 105 }));
        assert!(err
            .to_string()
            .contains("gap detected (ledger 100 does not exist but 105 is latest)"));
        assert!(fixture.ledgers_seen().is_empty());
        assert_eq!(fixture.ledger_pipeline.stats()[0].read_entries, 0);
        assert!(!session.is_running());
    }

    // -----------------------------------------------------------------------
    // 5. Shutdown while waiting for a ledger that is not closed yet
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_while_idle_returns_cleanly() {
        let fixture = Fixture::new();
        fixture.backend.set_latest_sequence(99);
        let session = Arc::new(fixture.session());

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.resume(100).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(session.is_running());

        session.shutdown().await;
        join(handle).await.unwrap();

        assert!(fixture.ledgers_seen().is_empty());
        assert!(!fixture.state_pipeline.is_running());
        assert!(!fixture.ledger_pipeline.is_running());
        assert_eq!(session.latest_successfully_processed_ledger(), None);
        assert!(fixture.cursor_sequences().is_empty());
    }

    // -----------------------------------------------------------------------
    // 6. A ledger closed while idle is picked up on the next retry
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn idle_loop_retries_until_ledger_arrives() {
        let fixture = Fixture::new();
        fixture.backend.set_latest_sequence(99);
        let session = Arc::new(fixture.session());

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.resume(100).await })
        };
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(fixture.ledgers_seen().is_empty());

        fixture.backend.add_ledger(ledger(100));
        wait_for_latest(&session, 100).await;
        session.shutdown().await;
        join(handle).await.unwrap();

        assert_eq!(fixture.ledgers_seen(), vec![100]);
        assert_eq!(fixture.cursor_sequences(), vec![100]);
    }

    // -----------------------------------------------------------------------
    // 7. Progress advances one ledger at a time, cursor in lockstep
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn resume_advances_cursor_per_ledger() {
        let fixture = Fixture::new();
        for sequence in 10..=14 {
            fixture.backend.add_ledger(ledger(sequence));
        }
        let session = Arc::new(fixture.session());

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.resume(10).await })
        };
        wait_for_latest(&session, 14).await;
        session.shutdown().await;
        join(handle).await.unwrap();

        assert_eq!(fixture.ledgers_seen(), vec![10, 11, 12, 13, 14]);
        assert_eq!(fixture.cursor_sequences(), vec![10, 11, 12, 13, 14]);
    }

    // -----------------------------------------------------------------------
    // 8. A processor failure stops replication before the cursor moves
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ledger_pipeline_failure_is_fatal() {
        let fixture = Fixture::with_ledger_processor(Some(PipelineNode::new(FailAtLedger(12))));
        for sequence in 10..=14 {
            fixture.backend.add_ledger(ledger(sequence));
        }
        let session = fixture.session();

        let err = session.resume(10).await.unwrap_err();
        match &err {
            SessionError::LedgerPipeline { sequence, source } => {
                assert_eq!(*sequence, 12);
                assert!(source.to_string().contains("FailAtLedger"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("ledger 12"));
        assert_eq!(fixture.cursor_sequences(), vec![10, 11]);
        assert_eq!(session.latest_successfully_processed_ledger(), Some(11));
        assert!(!session.is_running());
    }

    // -----------------------------------------------------------------------
    // 9. Cursor failures are fatal, but only after progress is recorded
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cursor_failure_is_fatal() {
        let fixture = Fixture::new();
        for sequence in 10..=12 {
            fixture.backend.add_ledger(ledger(sequence));
        }
        fixture.cursor.fail_at(11);
        let session = fixture.session();

        let err = session.resume(10).await.unwrap_err();
        assert!(matches!(err, SessionError::Cursor(_)));
        assert!(err.to_string().starts_with("cursor update"));
        assert_eq!(session.latest_successfully_processed_ledger(), Some(11));
        assert_eq!(fixture.cursor_sequences(), vec![10]);
    }

    // -----------------------------------------------------------------------
    // 10. Missing collaborators are rejected before anything starts
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn missing_collaborators_are_config_errors() {
        let session = LiveSession::new(config());
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert!(err.to_string().contains("history archive"));
        assert!(!session.is_running());

        let fixture = Fixture::new();
        let session = LiveSession::new(config())
            .with_archive(fixture.archive.clone())
            .with_ledger_backend(fixture.backend.clone())
            .with_state_pipeline(fixture.state_pipeline.clone());
        let err = session.resume(1).await.unwrap_err();
        assert!(err.to_string().contains("ledger pipeline"));

        let bad = SessionConfig {
            cursor_name: String::new(),
            ..config()
        };
        let session = LiveSession::new(bad)
            .with_archive(fixture.archive.clone())
            .with_ledger_backend(fixture.backend.clone())
            .with_state_pipeline(fixture.state_pipeline.clone())
            .with_ledger_pipeline(fixture.ledger_pipeline.clone());
        assert!(matches!(session.resume(1).await, Err(SessionError::Config(_))));
    }

    // -----------------------------------------------------------------------
    // 11. Only one run per session at a time
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_runs_are_rejected() {
        let fixture = Fixture::new();
        fixture.backend.set_latest_sequence(0);
        let session = Arc::new(fixture.session());

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.resume(1).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(session.resume(1).await, Err(SessionError::AlreadyRunning)));

        session.shutdown().await;
        join(handle).await.unwrap();
    }

    // -----------------------------------------------------------------------
    // 12. Reporters see every stage, and upgrade changes are skipped
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reporters_observe_bootstrap_and_ledgers() {
        let fixture = Fixture::new().with_checkpoint(CHECKPOINT, bucket_hash(), vec![account("GA")]);
        fixture.backend.add_ledger(ledger(CHECKPOINT));
        fixture.backend.add_ledger(
            ledger(CHECKPOINT + 1).with_upgrade_changes(vec![ingest_io::Change::created(account("GZ"))]),
        );
        let recording = Arc::new(Recording::default());
        let session = Arc::new(
            fixture
                .session()
                .with_state_reporter(recording.clone())
                .with_ledger_reporter(recording.clone()),
        );

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };
        wait_for_latest(&session, CHECKPOINT + 1).await;
        session.shutdown().await;
        join(handle).await.unwrap();

        assert_eq!(
            recording.events(),
            vec![
                "start state 63",
                "entry",
                "end state err=false shutdown=false",
                "ledger 64",
                "tx 64",
                "end ledger err=false shutdown=false",
            ]
        );
    }

    // -----------------------------------------------------------------------
    // 13. State pipeline failures are wrapped and stop the run
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn state_pipeline_failure_is_fatal() {
        struct RejectState;

        #[async_trait]
        impl Processor<LedgerEntryChange> for RejectState {
            fn name(&self) -> &str {
                "RejectState"
            }

            async fn process(
                &self,
                _ctx: &NodeContext,
                _store: &Store,
                reader: &mut dyn ReadCloser<LedgerEntryChange>,
                _writer: &mut dyn WriteCloser<LedgerEntryChange>,
            ) -> PipelineResult<()> {
                match reader.read().await? {
                    Some(_) => Err(PipelineError::other("unexpected entry")),
                    None => Ok(()),
                }
            }
        }

        let fixture = Fixture::new().with_checkpoint(CHECKPOINT, bucket_hash(), vec![account("GA")]);
        fixture.backend.add_ledger(ledger(CHECKPOINT));
        let state_pipeline = Arc::new(StatePipeline::new(
            PipelineNode::new(RootProcessor).pipe([PipelineNode::new(RejectState)]),
        ));
        let session = LiveSession::new(config())
            .with_archive(fixture.archive.clone())
            .with_ledger_backend(fixture.backend.clone())
            .with_state_pipeline(state_pipeline)
            .with_ledger_pipeline(fixture.ledger_pipeline.clone());

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::StatePipeline(_)));
        assert!(err.to_string().starts_with("state pipeline"));
        assert_eq!(session.latest_successfully_processed_ledger(), None);
        assert!(fixture.ledgers_seen().is_empty());
    }

    // -----------------------------------------------------------------------
    // 14. Shutdown without an active run returns at once
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn shutdown_without_run_is_a_no_op() {
        let fixture = Fixture::new();
        let session = fixture.session();
        tokio::time::timeout(Duration::from_secs(1), session.shutdown())
            .await
            .unwrap();
        session.shutdown().await;
        assert!(!session.is_running());
    }

    // -----------------------------------------------------------------------
    // 15. Shutdown during a ledger leaves it unprocessed
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_mid_ledger_returns_cleanly() {
        let fixture =
            Fixture::with_ledger_processor(Some(PipelineNode::new(WaitForShutdown)));
        fixture.backend.add_ledger(ledger(10));
        fixture.backend.add_ledger(ledger(11));
        let recording = Arc::new(Recording::default());
        let session = Arc::new(fixture.session().with_ledger_reporter(recording.clone()));

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.resume(10).await })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while fixture.ledgers_seen().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("ledger 10 was not read");
        assert!(fixture.ledger_pipeline.is_running());

        session.shutdown().await;
        join(handle).await.unwrap();

        assert_eq!(session.latest_successfully_processed_ledger(), None);
        assert!(fixture.cursor_sequences().is_empty());
        assert_eq!(fixture.ledgers_seen(), vec![10]);
        assert_eq!(
            recording.events(),
            vec!["ledger 10", "tx 10", "end ledger err=false shutdown=true"]
        );
        assert!(!session.is_running());
    }

    // -----------------------------------------------------------------------
    // 16. Shutdown during the state bootstrap skips replication
    // -----------------------------------------------------------------------
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_mid_state_skips_resume() {
        let fixture = Fixture::new().with_checkpoint(CHECKPOINT, bucket_hash(), vec![account("GA")]);
        fixture.backend.add_ledger(ledger(CHECKPOINT));
        fixture.backend.add_ledger(ledger(CHECKPOINT + 1));
        let state_pipeline = Arc::new(StatePipeline::new(
            PipelineNode::new(RootProcessor).pipe([PipelineNode::new(WaitForShutdown)]),
        ));
        let recording = Arc::new(Recording::default());
        let session = Arc::new(
            LiveSession::new(config())
                .with_archive(fixture.archive.clone())
                .with_ledger_backend(fixture.backend.clone())
                .with_state_pipeline(state_pipeline.clone())
                .with_ledger_pipeline(fixture.ledger_pipeline.clone())
                .with_cursor_client(fixture.cursor.clone())
                .with_state_reporter(recording.clone())
                .with_ledger_reporter(recording.clone()),
        );

        let handle = {
            let session = session.clone();
            tokio::spawn(async move { session.run().await })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while !recording.events().iter().any(|e| e == "entry") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("state entry was not read");
        assert!(state_pipeline.is_running());

        session.shutdown().await;
        join(handle).await.unwrap();

        assert_eq!(
            recording.events(),
            vec!["start state 63", "entry", "end state err=false shutdown=true"]
        );
        assert!(fixture.ledgers_seen().is_empty());
        assert_eq!(fixture.cursor_sequences(), vec![CHECKPOINT]);
        assert_eq!(session.latest_successfully_processed_ledger(), Some(CHECKPOINT));
        assert!(!state_pipeline.is_running());
        assert!(!fixture.ledger_pipeline.is_running());
    }
}
