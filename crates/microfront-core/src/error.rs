use std::error::Error;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

/// Flattens an error and its `source()` chain into one log-friendly string.
pub fn format_error_chain(error: &(dyn Error + 'static)) -> String {
    let mut chain = vec![error.to_string()];
    let mut source = error.source();

    while let Some(err) = source {
        chain.push(format!("caused by: {}", err));
        source = err.source();
    }

    chain.join("\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "host.json missing");
        let err = CoreError::from(inner);
        let text = format_error_chain(&err);
        assert!(text.starts_with("io error: host.json missing"));
        assert!(text.contains("caused by: host.json missing"));
    }

    #[test]
    fn chain_without_source_is_single_line() {
        let err = CoreError::Config("remote `chat` has no entry".to_string());
        assert_eq!(format_error_chain(&err), "config error: remote `chat` has no entry");
    }
}
