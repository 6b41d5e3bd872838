//! Remote applications composed by the host: the chat widget, the email
//! inbox, and the manifest/registry machinery that mounts them on the shared
//! bus.

pub mod chat;
pub mod context;
pub mod email;
pub mod loader;
pub mod manifest;
pub mod permissions;

pub use chat::{ChatApp, ChatMessage, Sender};
pub use context::{AppContext, MicroApp, NotificationSlot, Subscriptions};
pub use email::{Email, EmailApp};
pub use loader::{
    LoadedManifest, MountedRemote, RemoteHost, RemoteLoader, RemoteRegistry, RemoteState,
};
pub use manifest::RemoteManifest;
pub use permissions::TopicPermissions;
