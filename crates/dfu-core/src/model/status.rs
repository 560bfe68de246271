//! Status values reported by the update engine.

use std::fmt;

use super::archive::ArchiveHandle;
use super::device::DeviceHandle;

/// Upload progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    /// 0-100.
    pub percent: u8,
    /// Instantaneous speed in bytes per second.
    pub speed_bps: u32,
    /// Average speed in bytes per second.
    pub avg_speed_bps: u32,
    /// 1-based index of the image being sent.
    pub current_part: u32,
    /// Number of images in the package.
    pub parts_total: u32,
}

impl UploadProgress {
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            current_part: 1,
            parts_total: 1,
            ..Default::default()
        }
    }
}

/// Engine status stream item.
///
/// `Idle` is a quiescent signal and may be reported at any time, including
/// right after subscription. Every other variant describes an active or
/// finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Connecting,
    Connected,
    Starting,
    Started,
    EnablingDfuMode,
    Uploading(UploadProgress),
    Validating,
    Disconnecting,
    Disconnected,
    Completed,
    Aborted,
    Failed { message: String },
}

impl EngineStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, EngineStatus::Idle)
    }

    /// Transfer has ended, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineStatus::Completed | EngineStatus::Aborted | EngineStatus::Failed { .. }
        )
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Idle => write!(f, "Idle"),
            EngineStatus::Connecting => write!(f, "Connecting"),
            EngineStatus::Connected => write!(f, "Connected"),
            EngineStatus::Starting => write!(f, "Starting"),
            EngineStatus::Started => write!(f, "Started"),
            EngineStatus::EnablingDfuMode => write!(f, "Enabling DFU mode"),
            EngineStatus::Uploading(p) => write!(
                f,
                "Uploading {}% (part {}/{})",
                p.percent, p.current_part, p.parts_total
            ),
            EngineStatus::Validating => write!(f, "Validating"),
            EngineStatus::Disconnecting => write!(f, "Disconnecting"),
            EngineStatus::Disconnected => write!(f, "Disconnected"),
            EngineStatus::Completed => write!(f, "Completed"),
            EngineStatus::Aborted => write!(f, "Aborted"),
            EngineStatus::Failed { message } => write!(f, "Failed: {}", message),
        }
    }
}

/// Archive and target passed to the engine when a transfer starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub archive: ArchiveHandle,
    pub device: DeviceHandle,
}
