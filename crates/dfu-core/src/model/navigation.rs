//! Navigation destinations and the results they report back.

use std::fmt;

use uuid::Uuid;

use super::device::DeviceHandle;

/// Destination token of the device discovery screen.
pub const SCANNER_DESTINATION: &str = "uiscanner-destination";

/// Nordic Secure DFU service (0xFE59).
pub const DFU_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000FE59_0000_1000_8000_00805F9B34FB);

/// Opaque navigation destination identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn scanner() -> Self {
        Self::new(SCANNER_DESTINATION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Arguments handed to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavArgs {
    /// Only list devices advertising this service.
    ServiceFilter(Uuid),
}

/// What a destination reported when it was left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationOutcome {
    /// User backed out.
    Cancelled,
    /// A device was picked.
    Succeeded(DeviceHandle),
    /// Flow was dismissed without producing any result.
    Absent,
}

/// Result emitted on the navigator's recent-results stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResult {
    pub destination: DestinationId,
    pub outcome: DestinationOutcome,
}

impl NavigationResult {
    pub fn new(destination: DestinationId, outcome: DestinationOutcome) -> Self {
        Self {
            destination,
            outcome,
        }
    }
}
