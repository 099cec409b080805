//! Store configuration

use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// Object store used when none is configured.
pub const DEFAULT_OBJECT_STORE: &str = "kv";

/// Schema version used when none is configured.
pub const DEFAULT_VERSION: u32 = 1;

/// Identity and schema of one logical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database name; required and non-blank
    pub name: String,
    /// Object store holding the records
    pub object_store: String,
    /// Schema version passed to the engine on open
    pub version: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_store: DEFAULT_OBJECT_STORE.to_string(),
            version: DEFAULT_VERSION,
        }
    }
}

impl StoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn object_store(mut self, object_store: impl Into<String>) -> Self {
        self.object_store = object_store.into();
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Reject configurations a store handle cannot be built from.
    pub fn validate(&self) -> KvResult<()> {
        if self.name.trim().is_empty() {
            return Err(KvError::Construction(
                "a non-empty store name must be supplied".into(),
            ));
        }
        if self.object_store.trim().is_empty() {
            return Err(KvError::Construction(
                "object store name must not be empty".into(),
            ));
        }
        if self.version == 0 {
            return Err(KvError::Construction("version must be at least 1".into()));
        }
        Ok(())
    }
}
