use crate::domains::backend::{Backend, BackendError};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

type Reply = Result<Option<String>, BackendError>;

/// A backend that answers from canned replies. Used to replay recorded sessions offline and to
/// drive the reconciler in tests. Every invocation is recorded.
#[derive(Debug, Default)]
pub struct StaticBackend {
    // one-shot replies are consumed before the standing reply for the same command
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    standing: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Value)>>,
}

// a poisoned lock only means a test panicked mid-call; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StaticBackend {
    /// Answer every call to `command` with `payload` until replaced.
    pub fn respond(&self, command: &str, payload: Option<&str>) {
        lock(&self.standing).insert(command.to_owned(), Ok(payload.map(str::to_owned)));
    }

    /// Answer the next call to `command` with `payload`.
    pub fn respond_once(&self, command: &str, payload: Option<&str>) {
        lock(&self.queued)
            .entry(command.to_owned())
            .or_default()
            .push_back(Ok(payload.map(str::to_owned)));
    }

    pub fn fail(&self, command: &str, error: BackendError) {
        lock(&self.standing).insert(command.to_owned(), Err(error));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.calls).clone()
    }

    /// Arguments of every call made to `command`, oldest first.
    pub fn calls_for(&self, command: &str) -> Vec<Value> {
        lock(&self.calls)
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl Backend for StaticBackend {
    async fn invoke(&self, command: &str, args: Value) -> Result<Option<String>, BackendError> {
        lock(&self.calls).push((command.to_owned(), args));

        if let Some(reply) = lock(&self.queued)
            .get_mut(command)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        lock(&self.standing)
            .get(command)
            .cloned()
            .unwrap_or_else(|| Err(BackendError::UnknownCommand(command.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn queued_replies_come_before_standing_ones() {
        let backend = StaticBackend::default();
        backend.respond("list_job", Some("[]"));
        backend.respond_once("list_job", None);

        assert_eq!(backend.invoke("list_job", json!({})).await, Ok(None));
        assert_eq!(backend.invoke("list_job", json!({})).await, Ok(Some("[]".to_owned())));
        assert_eq!(backend.invoke("list_job", json!({})).await, Ok(Some("[]".to_owned())));
        assert_eq!(backend.calls_for("list_job").len(), 3);
    }

    #[tokio::test]
    async fn unknown_commands_fail() {
        let backend = StaticBackend::default();
        let reply = backend.invoke("launch_rocket", json!({"id": 1})).await;
        assert_eq!(reply, Err(BackendError::UnknownCommand("launch_rocket".to_owned())));
        assert_eq!(backend.calls()[0].1["id"], 1);
    }
}
