//! Target device handle produced by the discovery flow.

use std::fmt;

/// A device picked in the discovery flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Link-layer address, e.g. `"C8:1E:40:2A:91:07"`.
    pub address: String,
    /// Advertised name, if any.
    pub name: Option<String>,
}

impl DeviceHandle {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} [{}]", name, self.address),
            None => write!(f, "[{}]", self.address),
        }
    }
}
