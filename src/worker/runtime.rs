// SPDX-License-Identifier: MPL-2.0
//! The isolated worker context.
//!
//! [`Worker::spawn`] starts a dedicated OS thread running a current-thread
//! Tokio runtime. The caller talks to it only through [`WorkerHandle`]:
//! messages go in over one channel and events come back over another, so
//! no mutable state is shared across the boundary.
//!
//! Jobs run strictly one at a time, in submission order.

use super::protocol::{ImagePayload, Inbound, Outbound, ProcessOptions};
use crate::application::model_cache::ModelCache;
use crate::application::orchestrator::{Job, PipelineOrchestrator, PipelineSettings};
use crate::application::port::ModelProvider;
use crate::application::progress::ProgressChannel;
use crate::config::Config;
use crate::domain::processing::{JobId, ModelId, NeuralTier, Tool};
use crate::error::{Error, Result};
use crate::infrastructure::onnx::OnnxModelProvider;
use crate::media::{new_cancellation_token, CancellationToken};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const THREAD_NAME: &str = "lens-refine-worker";

/// A message with the cancellation token of the job it may start.
struct Envelope {
    message: Inbound,
    cancel: CancellationToken,
}

/// Caller-side reference to a submitted job.
#[derive(Debug, Clone)]
pub struct JobTicket {
    cancel: CancellationToken,
}

impl JobTicket {
    /// Requests cancellation. Honored at the next tier boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`JobTicket::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Caller side of a running worker.
///
/// Dropping the handle stops the worker after its current message.
#[derive(Debug)]
pub struct WorkerHandle {
    inbox: Option<UnboundedSender<Envelope>>,
    events: UnboundedReceiver<Outbound>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").finish_non_exhaustive()
    }
}

impl WorkerHandle {
    fn post(&self, message: Inbound, cancel: CancellationToken) -> Result<()> {
        self.inbox
            .as_ref()
            .ok_or_else(|| Error::Worker("worker is shut down".to_string()))?
            .send(Envelope { message, cancel })
            .map_err(|_| Error::Worker("worker thread has stopped".to_string()))
    }

    /// Queues a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the worker thread has stopped.
    pub fn send(&self, message: Inbound) -> Result<()> {
        self.post(message, new_cancellation_token())
    }

    /// Queues a job and returns a ticket that can cancel it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the worker thread has stopped.
    pub fn process(&self, file: Vec<u8>, tool: Tool, options: ProcessOptions) -> Result<JobTicket> {
        let cancel = new_cancellation_token();
        self.post(
            Inbound::Process {
                file,
                tool: tool.into(),
                options,
            },
            Arc::clone(&cancel),
        )?;
        Ok(JobTicket { cancel })
    }

    /// Waits for the next event. `None` once the worker has stopped and
    /// every event was read.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.events.recv().await
    }

    /// Blocking variant of [`WorkerHandle::recv`] for synchronous callers.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Outbound> {
        self.events.blocking_recv()
    }

    /// Stops the worker and waits for its thread. Cached models are
    /// released before the thread exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the worker thread panicked.
    pub fn shutdown(mut self) -> Result<()> {
        self.inbox.take();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Worker("worker thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.inbox.take();
    }
}

/// State owned by the worker thread.
pub struct Worker {
    orchestrator: PipelineOrchestrator,
    base_settings: PipelineSettings,
    events: ProgressChannel<Outbound>,
    next_job: u64,
}

impl Worker {
    /// Starts a worker loading models through `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the thread cannot be created.
    pub fn spawn(provider: Arc<dyn ModelProvider>, settings: PipelineSettings) -> Result<WorkerHandle> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let cache = Arc::new(ModelCache::new(provider));
        let worker = Worker {
            orchestrator: PipelineOrchestrator::new(cache, settings),
            base_settings: settings,
            events: ProgressChannel::new(events_tx),
            next_job: 1,
        };

        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(worker.run(inbox_rx)))?;

        tracing::debug!("worker started");
        Ok(WorkerHandle {
            inbox: Some(inbox_tx),
            events: events_rx,
            thread: Some(thread),
        })
    }

    /// Starts a worker backed by ONNX Runtime with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the thread cannot be created.
    pub fn from_config(config: &Config, models_dir: PathBuf) -> Result<WorkerHandle> {
        let provider = OnnxModelProvider::from_config(config, models_dir);
        Self::spawn(Arc::new(provider), config.pipeline_settings())
    }

    async fn run(mut self, mut inbox: UnboundedReceiver<Envelope>) {
        while let Some(Envelope { message, cancel }) = inbox.recv().await {
            match message {
                Inbound::Init { tool } => self.init(tool.into()).await,
                Inbound::Process {
                    file,
                    tool,
                    options,
                } => self.process(&file, tool.into(), options, &cancel).await,
                Inbound::Cleanup => {
                    let released = self.orchestrator.cache().clear();
                    tracing::debug!(released, "model cache cleared");
                }
            }
        }

        self.orchestrator.cache().clear();
        tracing::debug!("worker stopped");
    }

    /// Loads both learned tiers of `tool` concurrently. Failures are left
    /// for the pipeline to fall back from.
    async fn init(&mut self, tool: Tool) {
        let cache = self.orchestrator.cache();
        let (primary, secondary) = futures_util::future::join(
            cache.get_or_load(ModelId::new(tool, NeuralTier::Primary)),
            cache.get_or_load(ModelId::new(tool, NeuralTier::Secondary)),
        )
        .await;
        tracing::info!(
            %tool,
            primary = primary.is_ok(),
            secondary = secondary.is_ok(),
            "warm-up finished"
        );
        let backend = cache.backend();
        self.events.send(Outbound::initialized(backend));
    }

    async fn process(
        &mut self,
        file: &[u8],
        tool: Tool,
        options: ProcessOptions,
        cancel: &CancellationToken,
    ) {
        let id = JobId(self.next_job);
        self.next_job += 1;
        self.events.begin(id);

        let mut job = match Job::from_bytes(id, tool, file) {
            Ok(job) => job,
            Err(err) => {
                tracing::warn!(job = %id, %err, "rejecting job");
                self.events.send(Outbound::refused(err));
                return;
            }
        };

        self.orchestrator
            .set_settings(options.apply(self.base_settings));

        let outcome = self
            .orchestrator
            .run(&mut job, &mut self.events, Some(cancel))
            .await;

        let reply = match outcome {
            Ok(tier) => {
                tracing::info!(job = %id, %tier, "job done");
                match job.into_parts() {
                    (original, Some(result)) => Outbound::Complete {
                        result: ImagePayload::from(result),
                        original: ImagePayload::from(original),
                    },
                    (_, None) => Outbound::Error {
                        error: "job finished without output".to_string(),
                    },
                }
            }
            Err(err) => Outbound::refused(err),
        };
        self.events.send(reply);
    }
}
