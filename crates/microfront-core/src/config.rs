use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 3000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub bus: BusSettings,
    pub remotes: Vec<RemoteConfig>,
    pub manifests_dir: Option<PathBuf>,
    pub notification_ttl_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            remotes: vec![
                RemoteConfig::new("chat", "http://localhost:3001/remoteEntry.js", "./ChatApp"),
                RemoteConfig::new("email", "http://localhost:3002/remoteEntry.js", "./EmailApp"),
            ],
            manifests_dir: None,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
        }
    }
}

impl HostConfig {
    pub async fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let data = tokio::fs::read_to_string(path.as_ref()).await?;
        let cfg: HostConfig = serde_json::from_str(&data)?;
        cfg.validate()?;
        tracing::debug!(
            path = %path.as_ref().display(),
            remotes = cfg.remotes.len(),
            "host config loaded"
        );
        Ok(cfg)
    }

    pub fn validate(&self) -> CoreResult<()> {
        for (i, remote) in self.remotes.iter().enumerate() {
            if remote.name.trim().is_empty() {
                return Err(CoreError::Config(format!("remote #{} has an empty name", i)));
            }
            if self.remotes[..i].iter().any(|r| r.name == remote.name) {
                return Err(CoreError::Config(format!(
                    "remote `{}` is declared twice",
                    remote.name
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_remotes(&self) -> impl Iterator<Item = &RemoteConfig> {
        self.remotes.iter().filter(|r| r.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BusSettings {
    /// Keep delivering to the remaining listeners when one fails, instead of
    /// returning the first failure to the emitter.
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub entry: String,
    pub exposes: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl RemoteConfig {
    pub fn new(name: &str, entry: &str, exposes: &str) -> Self {
        Self {
            name: name.to_string(),
            entry: entry.to_string(),
            exposes: exposes.to_string(),
            enabled: true,
        }
    }

    /// Parses a federation-style remote spec such as
    /// `chat@http://localhost:3001/remoteEntry.js`. The exposed module defaults
    /// to `./<Name>App`.
    pub fn parse_spec(spec: &str) -> CoreResult<Self> {
        let (name, entry) = spec
            .split_once('@')
            .ok_or_else(|| CoreError::Config(format!("remote spec `{}` has no `@`", spec)))?;
        let name = name.trim();
        let entry = entry.trim();
        if name.is_empty() || entry.is_empty() {
            return Err(CoreError::Config(format!("remote spec `{}` is incomplete", spec)));
        }
        let mut chars = name.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Ok(Self::new(name, entry, &format!("./{}App", capitalized)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_chat_and_email() {
        let cfg = HostConfig::default();
        let names: Vec<_> = cfg.enabled_remotes().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["chat", "email"]);
        assert_eq!(cfg.notification_ttl_ms, 3000);
        assert!(!cfg.bus.continue_on_error);
    }

    #[test]
    fn parse_spec_splits_name_and_entry() {
        let remote = RemoteConfig::parse_spec("chat@http://localhost:3001/remoteEntry.js")
            .expect("spec should parse");
        assert_eq!(remote.name, "chat");
        assert_eq!(remote.entry, "http://localhost:3001/remoteEntry.js");
        assert_eq!(remote.exposes, "./ChatApp");
    }

    #[test]
    fn parse_spec_rejects_missing_separator() {
        assert!(RemoteConfig::parse_spec("chat").is_err());
        assert!(RemoteConfig::parse_spec("@http://x").is_err());
    }

    #[test]
    fn duplicate_remote_names_are_rejected() {
        let mut cfg = HostConfig::default();
        cfg.remotes.push(RemoteConfig::new("chat", "http://other", "./ChatApp"));
        assert!(matches!(cfg.validate(), Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn load_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"bus": {{"continue_on_error": true}}, "remotes": [{{"name": "chat", "entry": "http://localhost:3001/remoteEntry.js", "exposes": "./ChatApp"}}]}}"#
        )
        .expect("write config");

        let cfg = HostConfig::load(file.path()).await.expect("config should load");
        assert!(cfg.bus.continue_on_error);
        assert_eq!(cfg.remotes.len(), 1);
        assert!(cfg.remotes[0].enabled);
        assert_eq!(cfg.notification_ttl_ms, DEFAULT_NOTIFICATION_TTL_MS);
    }
}
