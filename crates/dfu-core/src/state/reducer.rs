//! Transition logic for a flow session.
//!
//! `FlowCore` is the single writer of the observable state. It is driven by
//! exactly one task (see [`crate::session`]), which feeds it engine statuses,
//! user commands and discovery outcomes in arrival order.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::collab::{Navigator, ResultStream, UpdateRepository};
use crate::error::FlowError;
use crate::events::{FlowEvent, FlowObserver};
use crate::model::{DestinationId, DestinationOutcome, EngineStatus, NavArgs, UpdateRequest};
use crate::state::command::UserCommand;
use crate::state::view::FlowState;

/// Messages funnelled into the session's processing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(UserCommand),
    Engine(EngineStatus),
    Discovery(DestinationOutcome),
}

/// Lifecycle of the navigator result subscription.
enum ResultSubscription {
    Unsubscribed,
    /// Subscribed, waiting for the loop to attach a listener.
    Ready(ResultStream),
    Attached,
}

pub struct FlowCore<O: FlowObserver> {
    repository: Arc<dyn UpdateRepository>,
    navigator: Arc<dyn Navigator>,
    observer: Arc<O>,
    state: watch::Sender<FlowState>,
    destination: DestinationId,
    filter: NavArgs,
    results: ResultSubscription,
    /// A discovery was issued and has not resolved yet.
    awaiting_device: bool,
    /// Navigations issued for the current discovery.
    attempt: u32,
}

impl<O: FlowObserver> FlowCore<O> {
    pub fn new(
        repository: Arc<dyn UpdateRepository>,
        navigator: Arc<dyn Navigator>,
        observer: Arc<O>,
        destination: DestinationId,
        service: Uuid,
    ) -> Self {
        let (state, _) = watch::channel(FlowState::default());
        Self {
            repository,
            navigator,
            observer,
            state,
            destination,
            filter: NavArgs::ServiceFilter(service),
            results: ResultSubscription::Unsubscribed,
            awaiting_device: false,
            attempt: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn destination(&self) -> &DestinationId {
        &self.destination
    }

    pub fn is_awaiting_device(&self) -> bool {
        self.awaiting_device
    }

    /// Hand over a freshly opened result subscription, once.
    pub fn take_result_stream(&mut self) -> Option<ResultStream> {
        match std::mem::replace(&mut self.results, ResultSubscription::Attached) {
            ResultSubscription::Ready(stream) => Some(stream),
            previous => {
                self.results = previous;
                None
            }
        }
    }

    /// Apply one inbound message.
    pub fn apply(&mut self, message: Inbound) -> Result<(), FlowError> {
        match message {
            Inbound::Command(command) => {
                self.on_command(command);
                Ok(())
            }
            Inbound::Engine(status) => {
                self.on_engine_status(status);
                Ok(())
            }
            Inbound::Discovery(outcome) => self.on_discovery(outcome),
        }
    }

    pub fn on_engine_status(&mut self, status: EngineStatus) {
        if status.is_idle() {
            self.observer.on_event(&FlowEvent::StatusSuppressed);
            return;
        }
        self.observer.on_event(&FlowEvent::StatusApplied {
            status: status.clone(),
        });
        self.transition(FlowState::InProgress { status });
    }

    pub fn on_command(&mut self, command: UserCommand) {
        self.observer.on_event(&FlowEvent::CommandReceived {
            command: command.clone(),
        });
        match command {
            UserCommand::Disconnect => self.navigator.navigate_up(),
            UserCommand::Install => self.install(),
            UserCommand::Pause => self.repository.pause(),
            UserCommand::Stop => self.repository.stop(),
            UserCommand::SelectArchive(uri) => self.select_archive(uri),
            UserCommand::NavigateUp => self.navigator.navigate_up(),
        }
    }

    /// Resolve a discovery outcome.
    ///
    /// Outcomes that arrive while no discovery is pending are stale and
    /// dropped.
    pub fn on_discovery(&mut self, outcome: DestinationOutcome) -> Result<(), FlowError> {
        if !self.awaiting_device {
            debug!(?outcome, "Discovery outcome with no pending request");
            return Ok(());
        }
        match outcome {
            DestinationOutcome::Cancelled => {
                self.awaiting_device = false;
                self.observer.on_event(&FlowEvent::DiscoveryCancelled);
            }
            DestinationOutcome::Succeeded(device) => {
                self.awaiting_device = false;
                let archive = self.repository.archive().ok_or(FlowError::ArchiveNotSet)?;
                self.repository.set_device(Some(device.clone()));
                self.observer.on_event(&FlowEvent::DeviceSelected {
                    device: device.clone(),
                });
                self.transition(FlowState::FileSummary {
                    archive,
                    target: device,
                });
            }
            DestinationOutcome::Absent => self.navigate_to_discovery(),
        }
        Ok(())
    }

    fn select_archive(&mut self, uri: String) {
        match self.repository.set_archive(&uri) {
            None => {
                self.observer.on_event(&FlowEvent::ArchiveRejected { uri });
                self.transition(FlowState::AwaitingFile {
                    invalid_selection: true,
                });
            }
            Some(archive) => {
                self.observer.on_event(&FlowEvent::ArchiveAccepted { archive });
                self.request_device();
            }
        }
    }

    fn request_device(&mut self) {
        // Subscribe before navigating so a synchronous reply is not missed.
        if matches!(self.results, ResultSubscription::Unsubscribed) {
            self.results = ResultSubscription::Ready(self.navigator.recent_results());
        }
        self.awaiting_device = true;
        self.attempt = 0;
        self.navigate_to_discovery();
    }

    fn navigate_to_discovery(&mut self) {
        self.attempt += 1;
        self.observer.on_event(&FlowEvent::DiscoveryRequested {
            attempt: self.attempt,
        });
        self.navigator.navigate_to(&self.destination, Some(self.filter));
    }

    fn install(&self) {
        match (self.repository.archive(), self.repository.device()) {
            (Some(archive), Some(device)) => {
                self.repository.start(UpdateRequest { archive, device });
            }
            (archive, _) => {
                let missing = if archive.is_none() { "archive" } else { "device" };
                warn!(missing, "Install requested before selection completed");
                self.observer.on_event(&FlowEvent::InstallSkipped { missing });
            }
        }
    }

    fn transition(&self, next: FlowState) {
        let from = self.state.borrow().phase();
        let to = next.phase();
        self.state.send_replace(next);
        if from != to {
            self.observer.on_event(&FlowEvent::StateChanged { from, to });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{MockNavigator, MockRepository};
    use crate::events::CollectingObserver;
    use crate::model::{DFU_SERVICE_UUID, DeviceHandle, UploadProgress};

    struct Fixture {
        repo: Arc<MockRepository>,
        nav: Arc<MockNavigator>,
        observer: Arc<CollectingObserver>,
        core: FlowCore<CollectingObserver>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MockRepository::new());
        let nav = Arc::new(MockNavigator::new());
        let observer = Arc::new(CollectingObserver::new());
        let core = FlowCore::new(
            repo.clone(),
            nav.clone(),
            observer.clone(),
            DestinationId::scanner(),
            DFU_SERVICE_UUID,
        );
        Fixture {
            repo,
            nav,
            observer,
            core,
        }
    }

    fn uploading(percent: u8) -> EngineStatus {
        EngineStatus::Uploading(UploadProgress::percent(percent))
    }

    fn device_x() -> DeviceHandle {
        DeviceHandle::new("C8:1E:40:2A:91:07").with_name("DeviceX")
    }

    /// Select a valid archive and resolve discovery with `device_x`.
    fn reach_summary(f: &mut Fixture) {
        f.core
            .apply(Inbound::Command(UserCommand::SelectArchive("fw.zip".into())))
            .unwrap();
        f.core
            .apply(Inbound::Discovery(DestinationOutcome::Succeeded(device_x())))
            .unwrap();
    }

    #[test]
    fn test_initial_state() {
        let f = fixture();
        assert_eq!(
            f.core.state(),
            FlowState::AwaitingFile {
                invalid_selection: false
            }
        );
        assert!(!f.core.is_awaiting_device());
    }

    #[test]
    fn test_idle_status_is_suppressed() {
        let mut f = fixture();
        f.core.on_engine_status(EngineStatus::Idle);
        assert_eq!(f.core.state(), FlowState::default());

        reach_summary(&mut f);
        let summary = f.core.state();
        f.core.on_engine_status(EngineStatus::Idle);
        assert_eq!(f.core.state(), summary);

        f.core.on_engine_status(uploading(40));
        f.core.on_engine_status(EngineStatus::Idle);
        assert_eq!(
            f.core.state(),
            FlowState::InProgress {
                status: uploading(40)
            }
        );
        assert_eq!(
            f.observer.count(|e| matches!(e, FlowEvent::StatusSuppressed)),
            3
        );
    }

    #[test]
    fn test_non_idle_status_always_wins() {
        let mut f = fixture();
        f.core.on_engine_status(EngineStatus::Connecting);
        assert_eq!(
            f.core.state(),
            FlowState::InProgress {
                status: EngineStatus::Connecting
            }
        );

        reach_summary(&mut f);
        assert!(matches!(f.core.state(), FlowState::FileSummary { .. }));

        f.core.on_engine_status(uploading(10));
        f.core.on_engine_status(uploading(20));
        assert_eq!(
            f.core.state(),
            FlowState::InProgress {
                status: uploading(20)
            }
        );
    }

    #[test]
    fn test_invalid_archive_flags_selection() {
        let mut f = fixture();
        f.repo.reject("bad.zip");

        f.core.on_command(UserCommand::SelectArchive("bad.zip".into()));
        assert_eq!(
            f.core.state(),
            FlowState::AwaitingFile {
                invalid_selection: true
            }
        );
        assert!(f.nav.navigations().is_empty());

        // Still flagged when rejected again.
        f.core.on_command(UserCommand::SelectArchive("bad.zip".into()));
        assert_eq!(
            f.core.state(),
            FlowState::AwaitingFile {
                invalid_selection: true
            }
        );
    }

    #[test]
    fn test_valid_archive_starts_discovery_without_state_change() {
        let mut f = fixture();
        let rx = f.core.subscribe();

        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));

        assert!(!rx.has_changed().unwrap());
        assert_eq!(f.core.state(), FlowState::default());
        assert!(f.core.is_awaiting_device());
        assert_eq!(
            f.nav.navigations(),
            vec![(
                DestinationId::scanner(),
                Some(NavArgs::ServiceFilter(DFU_SERVICE_UUID))
            )]
        );
        assert!(f.core.take_result_stream().is_some());
        assert!(f.core.take_result_stream().is_none());
    }

    #[test]
    fn test_result_subscription_opened_once() {
        let mut f = fixture();
        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));
        assert!(f.core.take_result_stream().is_some());

        f.core.on_command(UserCommand::SelectArchive("fw2.zip".into()));
        assert!(f.core.take_result_stream().is_none());
        assert_eq!(f.nav.subscription_count(), 1);
        assert_eq!(f.nav.navigations().len(), 2);
    }

    #[test]
    fn test_discovery_cancelled_keeps_state() {
        let mut f = fixture();
        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));
        f.core.on_discovery(DestinationOutcome::Cancelled).unwrap();

        assert_eq!(f.core.state(), FlowState::default());
        assert!(!f.core.is_awaiting_device());
        assert_eq!(f.repo.device(), None);
        assert_eq!(f.nav.navigations().len(), 1);
    }

    #[test]
    fn test_discovery_absent_renavigates_once() {
        let mut f = fixture();
        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));

        f.core.on_discovery(DestinationOutcome::Absent).unwrap();
        assert_eq!(f.nav.navigations().len(), 2);
        f.core.on_discovery(DestinationOutcome::Absent).unwrap();
        assert_eq!(f.nav.navigations().len(), 3);

        assert_eq!(f.core.state(), FlowState::default());
        assert!(f.core.is_awaiting_device());
        for (destination, args) in f.nav.navigations() {
            assert_eq!(destination, DestinationId::scanner());
            assert_eq!(args, Some(NavArgs::ServiceFilter(DFU_SERVICE_UUID)));
        }
        assert!(
            f.observer
                .events()
                .contains(&FlowEvent::DiscoveryRequested { attempt: 3 })
        );
    }

    #[test]
    fn test_discovery_success_uses_latest_archive() {
        let mut f = fixture();
        f.repo.reject("bad.zip");
        f.core.on_command(UserCommand::SelectArchive("old.zip".into()));
        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));
        f.core.on_command(UserCommand::SelectArchive("bad.zip".into()));
        f.core
            .on_discovery(DestinationOutcome::Succeeded(device_x()))
            .unwrap();

        match f.core.state() {
            FlowState::FileSummary { archive, target } => {
                assert_eq!(archive.uri, "fw.zip");
                assert_eq!(target, device_x());
            }
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(f.repo.device(), Some(device_x()));
    }

    #[test]
    fn test_stale_discovery_outcome_ignored() {
        let mut f = fixture();
        f.core
            .on_discovery(DestinationOutcome::Succeeded(device_x()))
            .unwrap();
        f.core.on_discovery(DestinationOutcome::Absent).unwrap();

        assert_eq!(f.core.state(), FlowState::default());
        assert!(f.nav.navigations().is_empty());
        assert_eq!(f.repo.device(), None);
    }

    #[test]
    fn test_device_without_archive_is_contract_violation() {
        let mut f = fixture();
        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));
        f.repo.release();

        let result = f
            .core
            .on_discovery(DestinationOutcome::Succeeded(device_x()));
        assert_eq!(result, Err(FlowError::ArchiveNotSet));
        assert_eq!(f.core.state(), FlowState::default());
        assert_eq!(f.repo.device(), None);
    }

    #[test]
    fn test_install_starts_engine_once() {
        let mut f = fixture();
        reach_summary(&mut f);

        f.core.on_command(UserCommand::Install);

        let started = f.repo.started();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].archive.uri, "fw.zip");
        assert_eq!(started[0].device, device_x());
    }

    #[test]
    fn test_install_without_selection_is_noop() {
        let mut f = fixture();
        f.core.on_command(UserCommand::Install);
        assert!(f.repo.started().is_empty());
        assert_eq!(f.core.state(), FlowState::default());

        f.core.on_command(UserCommand::SelectArchive("fw.zip".into()));
        f.core.on_command(UserCommand::Install);
        assert!(f.repo.started().is_empty());

        let skipped: Vec<_> = f
            .observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                FlowEvent::InstallSkipped { missing } => Some(missing),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec!["archive", "device"]);
    }

    #[test]
    fn test_command_dispatch() {
        let mut f = fixture();
        f.core.on_command(UserCommand::Pause);
        f.core.on_command(UserCommand::Stop);
        f.core.on_command(UserCommand::Stop);
        f.core.on_command(UserCommand::Disconnect);
        f.core.on_command(UserCommand::NavigateUp);

        assert_eq!(f.repo.pause_count(), 1);
        assert_eq!(f.repo.stop_count(), 2);
        assert_eq!(f.nav.navigate_up_count(), 2);
        assert!(f.repo.started().is_empty());
        assert_eq!(f.core.state(), FlowState::default());
    }

    #[test]
    fn test_state_changed_events() {
        let mut f = fixture();
        reach_summary(&mut f);
        f.core.on_engine_status(uploading(10));
        f.core.on_engine_status(uploading(20));

        let changes: Vec<_> = f
            .observer
            .events()
            .into_iter()
            .filter(|e| matches!(e, FlowEvent::StateChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![
                FlowEvent::StateChanged {
                    from: crate::state::FlowPhase::AwaitingFile,
                    to: crate::state::FlowPhase::FileSummary,
                },
                FlowEvent::StateChanged {
                    from: crate::state::FlowPhase::FileSummary,
                    to: crate::state::FlowPhase::InProgress,
                },
            ]
        );
    }
}
