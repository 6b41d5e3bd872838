use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    /// A listener failed while an emission was being delivered.
    #[error("listener #{position} on `{topic}` failed")]
    Listener {
        topic: String,
        position: usize,
        #[source]
        source: anyhow::Error,
    },
    /// The detail supplied for a known topic does not match its shape.
    #[error("invalid `{topic}` payload")]
    Payload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{app}` is not allowed to {action} `{topic}`")]
    Forbidden {
        app: String,
        topic: String,
        action: &'static str,
    },
}
