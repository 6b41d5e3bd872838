pub mod config;
pub mod error;
pub mod logging;

pub use config::{BusSettings, HostConfig, RemoteConfig};
pub use error::{format_error_chain, CoreError, CoreResult};
