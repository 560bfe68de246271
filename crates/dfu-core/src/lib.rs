//! DFU-Core: firmware update flow controller.
//!
//! Drives a user-facing update session through package selection, target
//! discovery, transfer progress and teardown, reconciling user commands with
//! the asynchronous status feed of an update engine it does not implement.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Model**: Archive/device handles, engine statuses, navigation results
//! - **State**: Observable state, user commands, transition logic
//! - **Collab**: Collaborator traits (repository, navigator), mock and
//!   simulated implementations
//! - **Events**: Observer pattern for UI decoupling
//! - **Scope**: Cancellation shared by a session's tasks
//! - **Session**: Mailbox loop, handle, configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dfu_core::{FlowConfig, FlowController, MockNavigator, MockRepository, UserCommand};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let repository = Arc::new(MockRepository::new());
//! let navigator = Arc::new(MockNavigator::new());
//!
//! let mut session = FlowController::new(FlowConfig::default(), repository, navigator).spawn();
//! session.submit(UserCommand::SelectArchive("fw.zip".into()))?;
//! // ... render session.subscribe() until done ...
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod collab;
pub mod error;
pub mod events;
pub mod model;
pub mod scope;
pub mod session;
pub mod state;

// Re-exports for convenience
pub use collab::{
    MockNavigator, MockRepository, Navigator, SimulatedRepository, StatusStream, UpdateRepository,
};
pub use error::FlowError;
pub use events::{CollectingObserver, FlowEvent, FlowObserver, NullObserver, TracingObserver};
pub use model::{
    ArchiveHandle, DestinationId, DestinationOutcome, DeviceHandle, EngineStatus, NavArgs,
    NavigationResult, UpdateRequest, UploadProgress,
};
pub use scope::{CancelSignal, SessionScope};
pub use session::{FlowConfig, FlowController, FlowHandle};
pub use state::{FlowPhase, FlowState, UserCommand};
