use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Command `{0}` is not handled by the backend")]
    UnknownCommand(String),
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Backend is unreachable")]
    Unreachable,
}

/// Request/response side of the backend. Every command is a name plus a JSON argument object;
/// the answer is JSON text, or `None` when the backend resolved with nothing.
#[async_trait::async_trait]
pub trait Backend {
    async fn invoke(&self, command: &str, args: Value) -> Result<Option<String>, BackendError>;
}
