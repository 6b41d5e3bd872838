use serde::{Deserialize, Serialize};

use crate::permissions::TopicPermissions;

/// Describes one remote application: what module it exposes and which bus
/// topics it may use. Read from `remote.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteManifest {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub exposes: String,
    #[serde(default)]
    pub permissions: TopicPermissions,
}

impl RemoteManifest {
    pub fn new(name: &str, exposes: &str, permissions: TopicPermissions) -> Self {
        Self {
            name: name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: None,
            exposes: exposes.to_string(),
            permissions,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}
