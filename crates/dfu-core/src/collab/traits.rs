//! Collaborator contracts consumed by the flow controller.
//!
//! Implementations must not block: every call is made from the session's
//! processing loop. Long-running work (the transfer itself, device scanning)
//! belongs on the implementation's own tasks and reports back through the
//! streams.

use futures::stream::BoxStream;

use crate::model::{
    ArchiveHandle, DestinationId, DeviceHandle, EngineStatus, NavArgs, NavigationResult,
    UpdateRequest,
};

/// Ordered, unbounded engine status feed.
pub type StatusStream = BoxStream<'static, EngineStatus>;

/// Ordered feed of results reported by destinations.
pub type ResultStream = BoxStream<'static, NavigationResult>;

/// Archive, device and update engine access for one session.
pub trait UpdateRepository: Send + Sync {
    /// Validate and hold the archive at `uri`. `None` when it is invalid;
    /// the previously held archive is kept in that case.
    fn set_archive(&self, uri: &str) -> Option<ArchiveHandle>;

    /// Currently held archive.
    fn archive(&self) -> Option<ArchiveHandle>;

    /// Currently held target device.
    fn device(&self) -> Option<DeviceHandle>;

    /// Replace the held target device.
    fn set_device(&self, device: Option<DeviceHandle>);

    /// Subscribe to engine statuses. The subscription is live once this
    /// returns.
    fn status_stream(&self) -> StatusStream;

    /// Begin (or resume) a transfer.
    fn start(&self, request: UpdateRequest);

    /// Pause the running transfer.
    fn pause(&self);

    /// Abort the running transfer.
    fn stop(&self);

    /// Drop archive, device and any engine work. Must tolerate repeated
    /// calls.
    fn release(&self);
}

/// Screen navigation.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, destination: &DestinationId, args: Option<NavArgs>);

    fn navigate_up(&self);

    /// Subscribe to results reported by destinations. The subscription is
    /// live once this returns.
    fn recent_results(&self) -> ResultStream;
}
