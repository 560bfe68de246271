//! Flow session - runs a [`FlowCore`] against its collaborators.
//!
//! Engine statuses, discovery outcomes and user commands are funnelled into
//! one mailbox and applied by a single processing loop, so the observable
//! state always reflects whichever of them arrived last.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::collab::{Navigator, ResultStream, StatusStream, UpdateRepository};
use crate::error::FlowError;
use crate::events::{FlowEvent, FlowObserver, TracingObserver};
use crate::model::{DFU_SERVICE_UUID, DestinationId, SCANNER_DESTINATION};
use crate::scope::{CancelSignal, SessionScope, until_cancelled};
use crate::state::{FlowCore, FlowState, Inbound, UserCommand};

/// Configuration for a flow session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Destination hosting device discovery.
    pub discovery_destination: String,
    /// Service the discovery screen filters on.
    pub service_uuid: Uuid,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            discovery_destination: SCANNER_DESTINATION.to_string(),
            service_uuid: DFU_SERVICE_UUID,
        }
    }
}

impl FlowConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FlowConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Flow controller, not yet running.
pub struct FlowController<O: FlowObserver = TracingObserver> {
    config: FlowConfig,
    repository: Arc<dyn UpdateRepository>,
    navigator: Arc<dyn Navigator>,
    observer: Arc<O>,
}

impl FlowController<TracingObserver> {
    /// Create a controller with the default tracing observer.
    pub fn new(
        config: FlowConfig,
        repository: Arc<dyn UpdateRepository>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_observer(config, repository, navigator, Arc::new(TracingObserver))
    }
}

impl<O: FlowObserver + 'static> FlowController<O> {
    /// Create a controller with a custom observer.
    pub fn with_observer(
        config: FlowConfig,
        repository: Arc<dyn UpdateRepository>,
        navigator: Arc<dyn Navigator>,
        observer: Arc<O>,
    ) -> Self {
        Self {
            config,
            repository,
            navigator,
            observer,
        }
    }

    /// Start the session. Must be called from within a tokio runtime.
    #[instrument(skip(self), fields(destination = %self.config.discovery_destination))]
    pub fn spawn(self) -> FlowHandle<O> {
        let core = FlowCore::new(
            self.repository.clone(),
            self.navigator.clone(),
            self.observer.clone(),
            DestinationId::new(self.config.discovery_destination.clone()),
            self.config.service_uuid,
        );
        let state = core.subscribe();
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let mut scope = SessionScope::new();

        // Subscribed here, before any task runs, so nothing the engine
        // reports after `spawn` returns is lost.
        let statuses = self.repository.status_stream();
        scope.spawn("engine-status", forward_statuses(statuses, mailbox.clone()));
        scope.spawn_cooperative(run_loop(core, inbox, mailbox.clone(), scope.signal()));

        info!("Flow session started");
        FlowHandle {
            mailbox,
            state,
            scope,
            repository: self.repository,
            observer: self.observer,
            released: false,
        }
    }
}

/// Handle to a running flow session.
///
/// Dropping the handle cancels the session and releases its resources;
/// [`FlowHandle::dispose`] does the same and also waits for the session's
/// tasks to finish.
pub struct FlowHandle<O: FlowObserver = TracingObserver> {
    mailbox: mpsc::UnboundedSender<Inbound>,
    state: watch::Receiver<FlowState>,
    scope: SessionScope,
    repository: Arc<dyn UpdateRepository>,
    observer: Arc<O>,
    released: bool,
}

impl<O: FlowObserver> FlowHandle<O> {
    /// Current state.
    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.clone()
    }

    /// Queue a user command.
    pub fn submit(&self, command: UserCommand) -> Result<(), FlowError> {
        if self.scope.is_cancelled() {
            return Err(FlowError::Closed);
        }
        self.mailbox
            .send(Inbound::Command(command))
            .map_err(|_| FlowError::Closed)
    }

    pub fn is_disposed(&self) -> bool {
        self.released
    }

    /// Tear the session down: cancel every subscription, wait for the
    /// session's tasks, then release the repository. Calling it again is a
    /// no-op. Commands already handed to collaborators are not retracted.
    #[instrument(skip(self))]
    pub async fn dispose(&mut self) {
        if self.released {
            debug!("Session already disposed");
            return;
        }
        self.scope.cancel();
        self.scope.join().await;
        self.release();
    }

    fn release(&mut self) {
        self.released = true;
        self.repository.release();
        self.observer.on_event(&FlowEvent::Released);
    }
}

impl<O: FlowObserver> Drop for FlowHandle<O> {
    fn drop(&mut self) {
        if !self.released {
            self.scope.cancel();
            self.release();
        }
    }
}

async fn forward_statuses(mut statuses: StatusStream, mailbox: mpsc::UnboundedSender<Inbound>) {
    while let Some(status) = statuses.next().await {
        if mailbox.send(Inbound::Engine(status)).is_err() {
            break;
        }
    }
    debug!("Engine status stream ended");
}

async fn forward_results(
    mut results: ResultStream,
    destination: DestinationId,
    mailbox: mpsc::UnboundedSender<Inbound>,
) {
    while let Some(result) = results.next().await {
        if result.destination != destination {
            continue;
        }
        if mailbox.send(Inbound::Discovery(result.outcome)).is_err() {
            break;
        }
    }
    debug!("Navigation result stream ended");
}

/// The session's processing loop; sole driver of `core`.
async fn run_loop<O: FlowObserver>(
    mut core: FlowCore<O>,
    mut inbox: mpsc::UnboundedReceiver<Inbound>,
    mailbox: mpsc::UnboundedSender<Inbound>,
    mut signal: CancelSignal,
) {
    let mut listeners = JoinSet::new();
    loop {
        let message = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            message = inbox.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if let Err(e) = core.apply(message) {
            error!(error = %e, "Flow contract violated");
        }

        if let Some(results) = core.take_result_stream() {
            let forward = forward_results(results, core.destination().clone(), mailbox.clone());
            listeners.spawn(until_cancelled(signal.clone(), forward));
        }
    }
    listeners.shutdown().await;
    debug!("Flow loop stopped");
}
