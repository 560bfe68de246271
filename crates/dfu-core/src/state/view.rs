//! The state value a display layer renders.

use std::fmt;

use crate::model::{ArchiveHandle, DeviceHandle, EngineStatus};

/// Observable flow state. Exactly one variant is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Waiting for the user to pick a package. `invalid_selection` is set
    /// after a rejected pick.
    AwaitingFile { invalid_selection: bool },
    /// Package and target are known; nothing has been sent yet.
    FileSummary {
        archive: ArchiveHandle,
        target: DeviceHandle,
    },
    /// The engine reported a non-idle status.
    InProgress { status: EngineStatus },
}

impl Default for FlowState {
    fn default() -> Self {
        FlowState::AwaitingFile {
            invalid_selection: false,
        }
    }
}

impl FlowState {
    pub fn phase(&self) -> FlowPhase {
        match self {
            FlowState::AwaitingFile { .. } => FlowPhase::AwaitingFile,
            FlowState::FileSummary { .. } => FlowPhase::FileSummary,
            FlowState::InProgress { .. } => FlowPhase::InProgress,
        }
    }
}

/// Variant tag of [`FlowState`], for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPhase {
    AwaitingFile,
    FileSummary,
    InProgress,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowPhase::AwaitingFile => write!(f, "Awaiting File"),
            FlowPhase::FileSummary => write!(f, "File Summary"),
            FlowPhase::InProgress => write!(f, "In Progress"),
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::AwaitingFile {
                invalid_selection: false,
            } => write!(f, "Awaiting file"),
            FlowState::AwaitingFile {
                invalid_selection: true,
            } => write!(f, "Awaiting file (previous selection invalid)"),
            FlowState::FileSummary { archive, target } => {
                write!(f, "Ready: {} -> {}", archive.name, target)
            }
            FlowState::InProgress { status } => write!(f, "{}", status),
        }
    }
}
