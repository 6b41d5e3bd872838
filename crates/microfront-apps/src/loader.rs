use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use microfront_bus::{EventBus, EMAIL_SEND, OPEN_CHAT};
use microfront_core::{format_error_chain, HostConfig, RemoteConfig};

use crate::chat::{ChatApp, CHAT_APP};
use crate::context::{AppContext, MicroApp};
use crate::email::{EmailApp, EMAIL_APP};
use crate::manifest::RemoteManifest;
use crate::permissions::TopicPermissions;

const MANIFEST_FILE: &str = "remote.json";

#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: RemoteManifest,
    pub root_dir: PathBuf,
}

/// Finds `remote.json` manifests one directory level below `root`.
pub struct RemoteLoader {
    root: PathBuf,
}

impl RemoteLoader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn discover(&self) -> anyhow::Result<Vec<LoadedManifest>> {
        let mut items = Vec::new();
        if !self.root.exists() {
            return Ok(items);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if let Some(manifest) = Self::read_manifest(&path)? {
                    items.push(LoadedManifest {
                        manifest,
                        root_dir: path,
                    });
                }
            }
        }
        items.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        Ok(items)
    }

    fn read_manifest(dir: &Path) -> anyhow::Result<Option<RemoteManifest>> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(manifest_path)?;
        let manifest: RemoteManifest = serde_json::from_str(&data)?;
        Ok(Some(manifest))
    }
}

pub type AppFactory = Box<dyn Fn() -> Box<dyn MicroApp> + Send + Sync>;

struct Registered {
    manifest: RemoteManifest,
    factory: AppFactory,
}

/// Remote bundles the host knows how to instantiate, keyed by remote name.
#[derive(Default)]
pub struct RemoteRegistry {
    remotes: HashMap<String, Registered>,
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chat and email with their default topic contracts.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            RemoteManifest::new(
                CHAT_APP,
                "./ChatApp",
                TopicPermissions::new(&[EMAIL_SEND], &[OPEN_CHAT]),
            )
            .with_description("Chat widget"),
            || Box::new(ChatApp::new()),
        );
        registry.register(
            RemoteManifest::new(
                EMAIL_APP,
                "./EmailApp",
                TopicPermissions::new(&[OPEN_CHAT], &[EMAIL_SEND]),
            )
            .with_description("Email inbox"),
            || Box::new(EmailApp::new()),
        );
        registry
    }

    pub fn register<F>(&mut self, manifest: RemoteManifest, factory: F)
    where
        F: Fn() -> Box<dyn MicroApp> + Send + Sync + 'static,
    {
        self.remotes.insert(
            manifest.name.clone(),
            Registered {
                manifest,
                factory: Box::new(factory),
            },
        );
    }

    /// Replaces the manifest of an already registered remote. Returns false
    /// when no bundle with that name is registered.
    pub fn apply_manifest(&mut self, manifest: RemoteManifest) -> bool {
        match self.remotes.get_mut(&manifest.name) {
            Some(registered) => {
                registered.manifest = manifest;
                true
            }
            None => false,
        }
    }

    pub fn manifest(&self, name: &str) -> Option<&RemoteManifest> {
        self.remotes.get(name).map(|r| &r.manifest)
    }

    fn instantiate(
        &self,
        remote: &RemoteConfig,
    ) -> anyhow::Result<(Box<dyn MicroApp>, &RemoteManifest)> {
        let registered = self
            .remotes
            .get(&remote.name)
            .ok_or_else(|| anyhow::anyhow!("no bundle registered for remote `{}`", remote.name))?;
        if registered.manifest.exposes != remote.exposes {
            anyhow::bail!(
                "remote `{}` exposes `{}`, not `{}`",
                remote.name,
                registered.manifest.exposes,
                remote.exposes
            );
        }
        Ok(((registered.factory)(), &registered.manifest))
    }
}

pub enum RemoteState {
    Mounted(Box<dyn MicroApp>),
    /// Loading or mounting failed; the host keeps running and shows the reason.
    Failed(String),
}

pub struct MountedRemote {
    pub config: RemoteConfig,
    pub state: RemoteState,
}

impl MountedRemote {
    pub fn is_mounted(&self) -> bool {
        matches!(self.state, RemoteState::Mounted(_))
    }
}

/// The set of remotes composed into the host page.
pub struct RemoteHost {
    bus: Arc<EventBus>,
    remotes: Vec<MountedRemote>,
}

impl RemoteHost {
    /// Mounts every enabled remote of `config`. A remote that cannot be
    /// resolved or mounted is kept as `RemoteState::Failed`.
    pub fn load(bus: Arc<EventBus>, config: &HostConfig, registry: &RemoteRegistry) -> Self {
        let ttl = Duration::from_millis(config.notification_ttl_ms);
        let mut remotes = Vec::new();
        for remote in config.enabled_remotes() {
            tracing::info!(remote = %remote.name, entry = %remote.entry, "loading remote");
            let state = match Self::mount_one(&bus, remote, registry, ttl) {
                Ok(app) => RemoteState::Mounted(app),
                Err(err) => {
                    let reason = format_error_chain(&*err);
                    tracing::warn!(remote = %remote.name, error = %reason, "remote failed to load");
                    RemoteState::Failed(reason)
                }
            };
            remotes.push(MountedRemote {
                config: remote.clone(),
                state,
            });
        }
        Self { bus, remotes }
    }

    fn mount_one(
        bus: &Arc<EventBus>,
        remote: &RemoteConfig,
        registry: &RemoteRegistry,
        ttl: Duration,
    ) -> anyhow::Result<Box<dyn MicroApp>> {
        let (mut app, manifest) = registry.instantiate(remote)?;
        let ctx = AppContext::new(&remote.name, bus.clone(), manifest.permissions.clone())
            .with_notification_ttl(ttl);
        app.mount(ctx)?;
        Ok(app)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn remotes(&self) -> &[MountedRemote] {
        &self.remotes
    }

    pub fn app_mut(&mut self, name: &str) -> anyhow::Result<&mut dyn MicroApp> {
        let remote = self
            .remotes
            .iter_mut()
            .find(|r| r.config.name == name)
            .ok_or_else(|| anyhow::anyhow!("unknown remote `{}`", name))?;
        match &mut remote.state {
            RemoteState::Mounted(app) => Ok(app.as_mut()),
            RemoteState::Failed(reason) => {
                anyhow::bail!("remote `{}` is not available: {}", name, reason)
            }
        }
    }

    pub fn dispatch(&mut self, name: &str, input: &str) -> anyhow::Result<()> {
        self.app_mut(name)?.handle_command(input)
    }

    pub fn render(&self, now: Instant) -> String {
        let mut out = String::new();
        for remote in &self.remotes {
            let _ = writeln!(out, "── {}@{} ──", remote.config.name, remote.config.entry);
            match &remote.state {
                RemoteState::Mounted(app) => {
                    let _ = writeln!(out, "{}", app.render(now));
                }
                RemoteState::Failed(reason) => {
                    let _ = writeln!(out, "  ⚠ failed to load micro-frontend: {}", reason);
                }
            }
        }
        out
    }

    pub fn unmount_all(&mut self) {
        for remote in &mut self.remotes {
            if let RemoteState::Mounted(app) = &mut remote.state {
                app.unmount();
            }
        }
    }
}

impl Drop for RemoteHost {
    fn drop(&mut self) {
        self.unmount_all();
    }
}
