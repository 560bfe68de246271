//! Event system for UI decoupling.
//!
//! Front ends and tests can subscribe to flow events without coupling to the
//! controller internals. The observable state itself is published separately
//! through a `watch` channel; these events describe *why* it moved.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::model::{ArchiveHandle, DeviceHandle, EngineStatus};
use crate::state::{FlowPhase, UserCommand};

/// Events emitted by the flow controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// A user command was taken off the mailbox.
    CommandReceived { command: UserCommand },
    /// An idle engine status was dropped.
    StatusSuppressed,
    /// Observable state moved.
    StateChanged { from: FlowPhase, to: FlowPhase },
    /// The repository accepted an archive.
    ArchiveAccepted { archive: ArchiveHandle },
    /// The repository rejected an archive.
    ArchiveRejected { uri: String },
    /// Navigation to the discovery destination was issued.
    DiscoveryRequested { attempt: u32 },
    /// Discovery ended without a device.
    DiscoveryCancelled,
    /// Discovery produced a device.
    DeviceSelected { device: DeviceHandle },
    /// Install was requested before archive and device were both known.
    InstallSkipped { missing: &'static str },
    /// A non-idle engine status was applied.
    StatusApplied { status: EngineStatus },
    /// Session resources were released.
    Released,
}

/// Observer trait for receiving flow events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait FlowObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &FlowEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FlowObserver for NullObserver {
    fn on_event(&self, _event: &FlowEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FlowObserver for TracingObserver {
    fn on_event(&self, event: &FlowEvent) {
        match event {
            FlowEvent::CommandReceived { command } => {
                tracing::debug!(command = %command, "Command received");
            }
            FlowEvent::StatusSuppressed => {
                tracing::trace!("Idle status suppressed");
            }
            FlowEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "State changed");
            }
            FlowEvent::ArchiveAccepted { archive } => {
                tracing::info!(archive = %archive, "Archive accepted");
            }
            FlowEvent::ArchiveRejected { uri } => {
                tracing::warn!(uri = %uri, "Archive rejected");
            }
            FlowEvent::DiscoveryRequested { attempt } => {
                tracing::info!(attempt, "Device discovery requested");
            }
            FlowEvent::DiscoveryCancelled => {
                tracing::info!("Device discovery cancelled");
            }
            FlowEvent::DeviceSelected { device } => {
                tracing::info!(device = %device, "Device selected");
            }
            FlowEvent::InstallSkipped { missing } => {
                tracing::warn!(missing, "Install ignored");
            }
            FlowEvent::StatusApplied { status } => {
                tracing::debug!(status = %status, "Engine status");
            }
            FlowEvent::Released => {
                tracing::info!("Session released");
            }
        }
    }
}

/// Observer that buffers events for later inspection.
pub struct CollectingObserver {
    events: Mutex<VecDeque<FlowEvent>>,
    capacity: usize,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Take all buffered events.
    pub fn drain_events(&self) -> Vec<FlowEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Copy of the buffered events, oldest first.
    pub fn events(&self) -> Vec<FlowEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn count(&self, pred: impl Fn(&FlowEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl Default for CollectingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowObserver for CollectingObserver {
    fn on_event(&self, event: &FlowEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_observer_bounded() {
        let observer = CollectingObserver::with_capacity(2);
        observer.on_event(&FlowEvent::StatusSuppressed);
        observer.on_event(&FlowEvent::DiscoveryCancelled);
        observer.on_event(&FlowEvent::Released);

        assert_eq!(
            observer.drain_events(),
            vec![FlowEvent::DiscoveryCancelled, FlowEvent::Released]
        );
        assert!(observer.events().is_empty());
    }
}
