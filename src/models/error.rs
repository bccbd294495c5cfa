use serde::Serialize;
use std::fmt;

/// What kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Entity {
    Node,
    Job,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Entity::Node => write!(f, "Node"),
            Entity::Job => write!(f, "Job"),
        }
    }
}

/// Errors raised while reconciling backend state. None of these are fatal; they are logged and
/// handed to the presentation layer as diagnostics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("{entity} `{id}` does not exist in the registry")]
    NotFound { entity: Entity, id: String },
    #[error("Malformed payload for `{context}`: {reason}")]
    MalformedPayload { context: String, reason: String },
    #[error("Backend refused `{command}`: {reason}")]
    BackendRefusal { command: String, reason: String },
    #[error("Reconciler is no longer running")]
    Disconnected,
    #[error("Poison error: {0}")]
    PoisonError(String),
}

impl ReconcileError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        ReconcileError::MalformedPayload {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn refused(command: impl Into<String>, reason: impl ToString) -> Self {
        ReconcileError::BackendRefusal {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}

impl Serialize for ReconcileError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ReconcileError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ReconcileError::PoisonError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_message() {
        let err = ReconcileError::not_found(Entity::Job, "j9");
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#""Job `j9` does not exist in the registry""#
        );
    }
}
