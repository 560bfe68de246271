//! Data model shared by the flow controller and its collaborators.

pub mod archive;
pub mod device;
pub mod navigation;
pub mod status;

pub use archive::{ArchiveError, ArchiveHandle, probe_archive};
pub use device::DeviceHandle;
pub use navigation::{
    DFU_SERVICE_UUID, DestinationId, DestinationOutcome, NavArgs, NavigationResult,
    SCANNER_DESTINATION,
};
pub use status::{EngineStatus, UpdateRequest, UploadProgress};
