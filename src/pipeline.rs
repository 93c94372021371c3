//! The long-running consume, decode, filter and emit loop, and the state
//! machine around it.
//!
//! A [`Pipeline`] goes `Configured → Cleaned → Running → Closing → Closed`.
//! A worker task pulls records from a [`RecordSource`] and hands each one to a
//! [`Processor`]. The owner of the pipeline supervises the worker through
//! [`Pipeline::run_until`]: an error escaping the worker moves the pipeline to
//! `Failed`, the shutdown future resolving moves it through `Closing` to
//! `Closed`. Nothing is restarted automatically.

use std::{fmt, future::Future, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use tokio::{
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    configuration::DecodeErrorPolicy,
    filter::UsernameFilter,
    local_state::{LocalState, StateLock},
    record::{self, BrokerRecord},
    sink::Sink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Configured,
    Cleaned,
    Running,
    Closing,
    Closed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A stream of records from a single topic.
///
/// Dropping the source must release its broker connection.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    async fn subscribe(&self, topic: &str) -> anyhow::Result<()>;

    /// Waits for the next record. Must be safe to cancel.
    async fn recv(&self) -> anyhow::Result<BrokerRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Matched and handed to the sink.
    Emitted,
    /// Decoded but rejected by the filter.
    Filtered,
    /// Failed to decode and skipped.
    Skipped,
}

/// Decodes, filters and emits a single record.
pub struct Processor {
    filter: UsernameFilter,
    sink: Arc<dyn Sink>,
    decode_error_policy: DecodeErrorPolicy,
}

impl Processor {
    pub fn new(
        filter: UsernameFilter,
        sink: Arc<dyn Sink>,
        decode_error_policy: DecodeErrorPolicy,
    ) -> Self {
        Self {
            filter,
            sink,
            decode_error_policy,
        }
    }

    /// Fails only when a record cannot be decoded and the policy says so.
    pub fn process(&self, record: &BrokerRecord) -> anyhow::Result<RecordOutcome> {
        let (key, message) = match record::decode(record) {
            Ok(decoded) => decoded,
            Err(error) => {
                return match self.decode_error_policy {
                    DecodeErrorPolicy::LogAndContinue => {
                        warn!(
                            topic = %record.topic,
                            partition = record.partition,
                            offset = record.offset,
                            %error,
                            "Skipping record that failed to deserialize"
                        );
                        Ok(RecordOutcome::Skipped)
                    }
                    DecodeErrorPolicy::LogAndFail => {
                        Err::<RecordOutcome, _>(error).with_context(|| {
                            format!(
                                "failed to deserialize record at {}[{}]@{}",
                                record.topic, record.partition, record.offset
                            )
                        })
                    }
                };
            }
        };

        if !self.filter.matches(key.as_deref(), &message) {
            return Ok(RecordOutcome::Filtered);
        }

        self.sink.emit(key.as_deref(), &message);
        Ok(RecordOutcome::Emitted)
    }
}

/// Error that escaped the worker, with the thread it ran on.
#[derive(Debug)]
pub struct WorkerFailure {
    pub thread: String,
    pub error: anyhow::Error,
}

type WorkerHandle = JoinHandle<Result<(), WorkerFailure>>;

pub struct Pipeline<S> {
    topic: String,
    source: Option<S>,
    processor: Arc<Processor>,
    local_state: LocalState,
    state: watch::Sender<PipelineState>,
    cancel: CancellationToken,
    worker: Option<WorkerHandle>,
    lock: Option<StateLock>,
}

impl<S: RecordSource> Pipeline<S> {
    pub fn new(
        topic: impl Into<String>,
        source: S,
        processor: Processor,
        local_state: LocalState,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Configured);

        Self {
            topic: topic.into(),
            source: Some(source),
            processor: Arc::new(processor),
            local_state,
            state,
            cancel: CancellationToken::new(),
            worker: None,
            lock: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Removes local state left over by a previous run under the same
    /// application id. Refused while the pipeline is running.
    pub fn clean_up(&mut self) -> anyhow::Result<()> {
        let state = self.state();
        if matches!(state, PipelineState::Running | PipelineState::Closing) {
            anyhow::bail!("cannot clean up local state while the pipeline is {state}");
        }

        let path = self.local_state.path().display();
        let removed = self
            .local_state
            .clean_up()
            .with_context(|| format!("failed to remove {path}"))?;
        if removed {
            info!(%path, "Removed stale local state");
        } else {
            debug!(%path, "No local state to remove");
        }

        if state == PipelineState::Configured {
            self.transition(PipelineState::Cleaned);
        }

        Ok(())
    }

    /// Spawns the worker and returns right away.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let state = self.state();
        if !matches!(state, PipelineState::Configured | PipelineState::Cleaned) {
            anyhow::bail!("cannot start a pipeline that is {state}");
        }
        let lock = self.local_state.lock().with_context(|| {
            format!("failed to lock {}", self.local_state.path().display())
        })?;
        let source = self.source.take().context("pipeline source already taken")?;
        self.lock = Some(lock);

        info!(topic = %self.topic, "Starting pipeline");
        self.worker = Some(tokio::spawn(run_worker(
            source,
            self.topic.clone(),
            self.processor.clone(),
            self.cancel.clone(),
        )));
        self.transition(PipelineState::Running);

        Ok(())
    }

    /// Supervises a running pipeline until `shutdown` resolves or the worker
    /// dies, and returns the state it ended in.
    pub async fn run_until<F>(&mut self, shutdown: F) -> PipelineState
    where
        F: Future<Output = ()>,
    {
        if self.state() != PipelineState::Running {
            return self.state();
        }
        let Some(mut worker) = self.worker.take() else {
            return self.state();
        };

        // A worker that already died wins over a pending shutdown.
        let finished = tokio::select! {
            biased;
            result = &mut worker => Some(result),
            _ = shutdown => None,
        };

        match finished {
            None => {
                self.worker = Some(worker);
                self.close().await;
            }
            Some(result) => self.worker_finished(result),
        }

        self.state()
    }

    /// Stops the worker, waits for the record in hand to finish and releases
    /// the broker connection. Calling it more than once is harmless.
    ///
    /// Ends in `Failed` rather than `Closed` if the worker turns out to have
    /// died with an error.
    pub async fn close(&mut self) {
        match self.state() {
            PipelineState::Closing | PipelineState::Closed | PipelineState::Failed => return,
            PipelineState::Configured | PipelineState::Cleaned => {
                self.source = None;
                self.transition(PipelineState::Closed);
                info!("Pipeline closed before it was started");
                return;
            }
            PipelineState::Running => {}
        }

        self.transition(PipelineState::Closing);
        info!(topic = %self.topic, "Closing pipeline");
        self.cancel.cancel();

        let mut next = PipelineState::Closed;
        if let Some(worker) = self.worker.take() {
            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => {
                    error!(
                        thread = %failure.thread,
                        error = ?failure.error,
                        "Uncaught error in pipeline worker"
                    );
                    next = PipelineState::Failed;
                }
                Err(error) => {
                    error!(%error, "Pipeline worker panicked");
                    next = PipelineState::Failed;
                }
            }
        }

        self.lock = None;
        self.transition(next);
        info!(topic = %self.topic, state = %next, "Pipeline closed");
    }

    fn worker_finished(&mut self, result: Result<Result<(), WorkerFailure>, JoinError>) {
        self.lock = None;

        match result {
            Ok(Ok(())) => {
                info!(topic = %self.topic, "Pipeline worker stopped");
                self.transition(PipelineState::Closed);
            }
            Ok(Err(failure)) => {
                error!(
                    thread = %failure.thread,
                    error = ?failure.error,
                    "Uncaught error in pipeline worker"
                );
                self.transition(PipelineState::Failed);
            }
            Err(error) => {
                error!(%error, "Pipeline worker panicked");
                self.transition(PipelineState::Failed);
            }
        }
    }

    fn transition(&self, next: PipelineState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Pipeline state changed");
    }
}

impl<S> Drop for Pipeline<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker<S: RecordSource>(
    source: S,
    topic: String,
    processor: Arc<Processor>,
    cancel: CancellationToken,
) -> Result<(), WorkerFailure> {
    let result = consume(&source, &topic, &processor, &cancel).await;
    drop(source);

    result.map_err(|error| WorkerFailure {
        thread: current_thread(),
        error,
    })
}

async fn consume<S: RecordSource>(
    source: &S,
    topic: &str,
    processor: &Processor,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        subscribed = source.subscribe(topic) => {
            subscribed.with_context(|| format!("failed to subscribe to {topic}"))?
        }
    }
    info!(topic, "Subscribed");

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = source.recv() => record?,
        };

        processor.process(&record)?;
    }

    debug!(topic, "Worker cancelled");
    Ok(())
}

fn current_thread() -> String {
    let thread = std::thread::current();
    format!("{} ({:?})", thread.name().unwrap_or("unnamed"), thread.id())
}
