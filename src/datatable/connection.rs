//! Handles and the descriptor the grid uses to reach a registered source

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier bound to one registered source
///
/// Fresh UUID v4 per registration, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceHandle(String);

impl SourceHandle {
    pub fn generate() -> Self {
        SourceHandle(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SourceHandle {
    fn from(value: String) -> Self {
        SourceHandle(value)
    }
}

impl From<&str> for SourceHandle {
    fn from(value: &str) -> Self {
        SourceHandle(value.to_string())
    }
}

/// Everything the grid needs to reach a source
///
/// Created once per bound query instance and never mutated; a new descriptor
/// means a new `connection_id`, which the grid treats as a cache reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    port: u16,
    path: String,
    connection_id: String,
    source_id: SourceHandle,
}

impl ConnectionDescriptor {
    pub fn new(port: u16, path: impl Into<String>, source_id: SourceHandle) -> Self {
        ConnectionDescriptor {
            port,
            path: path.into(),
            connection_id: uuid::Uuid::new_v4().to_string(),
            source_id,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn source_id(&self) -> &SourceHandle {
        &self.source_id
    }
}
