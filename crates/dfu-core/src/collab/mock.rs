//! Mock collaborators for testing flow logic.
//!
//! Both mocks record every call and publish their streams over
//! `tokio::sync::broadcast`, so items sent before a subscriber exists are
//! dropped, just like a hot event source.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::traits::{Navigator, ResultStream, StatusStream, UpdateRepository};
use crate::model::{
    ArchiveHandle, DestinationId, DestinationOutcome, DeviceHandle, EngineStatus, NavArgs,
    NavigationResult, UpdateRequest,
};

const STREAM_CAPACITY: usize = 64;

#[derive(Default)]
struct RepositoryState {
    archive: Option<ArchiveHandle>,
    device: Option<DeviceHandle>,
    /// URIs that fail validation.
    rejected: HashSet<String>,
    started: Vec<UpdateRequest>,
    pauses: usize,
    stops: usize,
    releases: usize,
}

/// Mock repository: every archive is valid unless rejected explicitly.
pub struct MockRepository {
    inner: Mutex<RepositoryState>,
    statuses: broadcast::Sender<EngineStatus>,
}

impl MockRepository {
    pub fn new() -> Self {
        let (statuses, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: Mutex::new(RepositoryState::default()),
            statuses,
        }
    }

    /// Make `uri` fail validation.
    pub fn reject(&self, uri: impl Into<String>) {
        self.inner.lock().rejected.insert(uri.into());
    }

    /// Publish an engine status. Returns the number of live subscribers.
    pub fn emit(&self, status: EngineStatus) -> usize {
        self.statuses.send(status).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.statuses.receiver_count()
    }

    /// Requests passed to `start`.
    pub fn started(&self) -> Vec<UpdateRequest> {
        self.inner.lock().started.clone()
    }

    pub fn pause_count(&self) -> usize {
        self.inner.lock().pauses
    }

    pub fn stop_count(&self) -> usize {
        self.inner.lock().stops
    }

    pub fn release_count(&self) -> usize {
        self.inner.lock().releases
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateRepository for MockRepository {
    fn set_archive(&self, uri: &str) -> Option<ArchiveHandle> {
        let mut inner = self.inner.lock();
        if inner.rejected.contains(uri) {
            return None;
        }
        let archive = ArchiveHandle::new(uri, 0);
        inner.archive = Some(archive.clone());
        Some(archive)
    }

    fn archive(&self) -> Option<ArchiveHandle> {
        self.inner.lock().archive.clone()
    }

    fn device(&self) -> Option<DeviceHandle> {
        self.inner.lock().device.clone()
    }

    fn set_device(&self, device: Option<DeviceHandle>) {
        self.inner.lock().device = device;
    }

    fn status_stream(&self) -> StatusStream {
        Box::pin(BroadcastStream::new(self.statuses.subscribe()).filter_map(Result::ok))
    }

    fn start(&self, request: UpdateRequest) {
        self.inner.lock().started.push(request);
    }

    fn pause(&self) {
        self.inner.lock().pauses += 1;
    }

    fn stop(&self) {
        self.inner.lock().stops += 1;
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        inner.releases += 1;
        inner.archive = None;
        inner.device = None;
    }
}

#[derive(Default)]
struct NavigatorState {
    navigations: Vec<(DestinationId, Option<NavArgs>)>,
    ups: usize,
    subscriptions: usize,
    /// Outcomes replayed, one per `navigate_to`.
    script: VecDeque<DestinationOutcome>,
}

/// Mock navigator with optional scripted replies.
pub struct MockNavigator {
    inner: Mutex<NavigatorState>,
    results: broadcast::Sender<NavigationResult>,
}

impl MockNavigator {
    pub fn new() -> Self {
        let (results, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: Mutex::new(NavigatorState::default()),
            results,
        }
    }

    /// Queue outcomes to report, one per `navigate_to` call.
    pub fn script<I: IntoIterator<Item = DestinationOutcome>>(&self, outcomes: I) {
        self.inner.lock().script.extend(outcomes);
    }

    /// Publish a result. Returns the number of live subscribers.
    pub fn publish(&self, result: NavigationResult) -> usize {
        self.results.send(result).unwrap_or(0)
    }

    pub fn navigations(&self) -> Vec<(DestinationId, Option<NavArgs>)> {
        self.inner.lock().navigations.clone()
    }

    pub fn navigate_up_count(&self) -> usize {
        self.inner.lock().ups
    }

    /// Calls to `recent_results`.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions
    }

    /// Live result subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.results.receiver_count()
    }
}

impl Default for MockNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for MockNavigator {
    fn navigate_to(&self, destination: &DestinationId, args: Option<NavArgs>) {
        let reply = {
            let mut inner = self.inner.lock();
            inner.navigations.push((destination.clone(), args));
            inner.script.pop_front()
        };
        if let Some(outcome) = reply {
            self.publish(NavigationResult::new(destination.clone(), outcome));
        }
    }

    fn navigate_up(&self) {
        self.inner.lock().ups += 1;
    }

    fn recent_results(&self) -> ResultStream {
        self.inner.lock().subscriptions += 1;
        Box::pin(BroadcastStream::new(self.results.subscribe()).filter_map(Result::ok))
    }
}
