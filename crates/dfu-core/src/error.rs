//! Flow controller errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// The session was disposed; no more commands are accepted.
    #[error("Flow session closed")]
    Closed,

    /// A device was accepted while no archive is held. Callers must select
    /// an archive before discovery is started.
    #[error("Device selected without an archive")]
    ArchiveNotSet,
}
