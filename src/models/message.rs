use super::{computer_spec::ComputerSpec, error::ReconcileError, job::Frame};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, path::PathBuf, str::FromStr};

/// Names of the push events the backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "node_discover")]
    NodeDiscover,
    #[serde(rename = "node_disconnect")]
    NodeDisconnect,
    #[serde(rename = "node_status")]
    NodeStatus,
    #[serde(rename = "job_image_complete")]
    JobImageComplete,
    #[serde(rename = "file-drop")]
    FileDrop,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::NodeDiscover,
        EventKind::NodeDisconnect,
        EventKind::NodeStatus,
        EventKind::JobImageComplete,
        EventKind::FileDrop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NodeDiscover => "node_discover",
            EventKind::NodeDisconnect => "node_disconnect",
            EventKind::NodeStatus => "node_status",
            EventKind::JobImageComplete => "job_image_complete",
            EventKind::FileDrop => "file-drop",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ReconcileError::malformed("event", format!("unknown event `{s}`")))
    }
}

/// An event exactly as the transport delivered it: a name and an untyped JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl RawEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            event: kind.as_str().to_owned(),
            payload,
        }
    }
}

/// Push events after decoding. These are the only inputs besides command responses that change
/// the registries.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NodeDiscover {
        id: String,
        spec: Option<ComputerSpec>,
    },
    NodeDisconnect {
        id: String,
    },
    NodeStatus {
        id: String,
        message: String,
    },
    JobImageComplete {
        job_id: String,
        /// not every backend revision reports which frame the image belongs to
        frame: Option<Frame>,
        path: PathBuf,
    },
    FileDrop {
        paths: Vec<PathBuf>,
    },
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::NodeDiscover { .. } => EventKind::NodeDiscover,
            PushEvent::NodeDisconnect { .. } => EventKind::NodeDisconnect,
            PushEvent::NodeStatus { .. } => EventKind::NodeStatus,
            PushEvent::JobImageComplete { .. } => EventKind::JobImageComplete,
            PushEvent::FileDrop { .. } => EventKind::FileDrop,
        }
    }

    /// Decode a payload for a known event kind. Anything we cannot make sense of is reported as
    /// [ReconcileError::MalformedPayload] so the caller can drop it.
    pub fn decode(kind: EventKind, payload: &Value) -> Result<Self, ReconcileError> {
        let malformed = |e: serde_json::Error| ReconcileError::malformed(kind.as_str(), e);
        let event = match kind {
            EventKind::NodeDiscover => {
                match DiscoverPayload::deserialize(payload).map_err(malformed)? {
                    DiscoverPayload::Record { id, spec } | DiscoverPayload::Pair(id, spec) => {
                        PushEvent::NodeDiscover { id, spec }
                    }
                    DiscoverPayload::Bare(id) => PushEvent::NodeDiscover { id, spec: None },
                }
            }
            EventKind::NodeDisconnect => {
                match DisconnectPayload::deserialize(payload).map_err(malformed)? {
                    DisconnectPayload::Record { id } | DisconnectPayload::Bare(id) => {
                        PushEvent::NodeDisconnect { id }
                    }
                }
            }
            EventKind::NodeStatus => {
                match StatusPayload::deserialize(payload).map_err(malformed)? {
                    StatusPayload::Record { id, message } | StatusPayload::Pair(id, message) => {
                        PushEvent::NodeStatus { id, message }
                    }
                }
            }
            EventKind::JobImageComplete => {
                let ImageCompletePayload {
                    job_id,
                    frame,
                    path,
                } = ImageCompletePayload::deserialize(payload).map_err(malformed)?;
                PushEvent::JobImageComplete {
                    job_id,
                    frame,
                    path,
                }
            }
            EventKind::FileDrop => match FileDropPayload::deserialize(payload).map_err(malformed)? {
                FileDropPayload::Record { paths } | FileDropPayload::List(paths) => {
                    PushEvent::FileDrop { paths }
                }
                FileDropPayload::Single(path) => PushEvent::FileDrop { paths: vec![path] },
            },
        };

        match &event {
            PushEvent::NodeDiscover { id, .. }
            | PushEvent::NodeDisconnect { id }
            | PushEvent::NodeStatus { id, .. }
            | PushEvent::JobImageComplete { job_id: id, .. }
                if id.trim().is_empty() =>
            {
                Err(ReconcileError::malformed(kind.as_str(), "empty identifier"))
            }
            _ => Ok(event),
        }
    }
}

impl TryFrom<&RawEvent> for PushEvent {
    type Error = ReconcileError;

    fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
        let kind = raw.event.parse::<EventKind>()?;
        PushEvent::decode(kind, &raw.payload)
    }
}

// The backend has emitted both keyed objects and positional tuples for the node events,
// depending on which revision is running.
#[derive(Deserialize)]
#[serde(untagged)]
enum DiscoverPayload {
    Record {
        id: String,
        #[serde(default)]
        spec: Option<ComputerSpec>,
    },
    Pair(String, Option<ComputerSpec>),
    Bare(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DisconnectPayload {
    Record { id: String },
    Bare(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusPayload {
    Record {
        id: String,
        #[serde(alias = "status")]
        message: String,
    },
    Pair(String, String),
}

#[derive(Deserialize)]
struct ImageCompletePayload {
    #[serde(rename = "jobId", alias = "job_id")]
    job_id: String,
    #[serde(default)]
    frame: Option<Frame>,
    #[serde(alias = "file_name")]
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileDropPayload {
    Record { paths: Vec<PathBuf> },
    List(Vec<PathBuf>),
    Single(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("node_vanished".parse::<EventKind>().is_err());
    }

    #[test]
    fn discover_accepts_record_and_tuple() {
        let record = PushEvent::decode(EventKind::NodeDiscover, &json!({"id": "a"})).unwrap();
        let tuple = PushEvent::decode(EventKind::NodeDiscover, &json!(["a", null])).unwrap();
        assert_eq!(record, tuple);
        assert_eq!(record, PushEvent::NodeDiscover { id: "a".into(), spec: None });
    }

    #[test]
    fn disconnect_accepts_bare_id() {
        let event = PushEvent::decode(EventKind::NodeDisconnect, &json!("peer-7")).unwrap();
        assert_eq!(event, PushEvent::NodeDisconnect { id: "peer-7".into() });
    }

    #[test]
    fn image_complete_uses_camel_case_job_id() {
        let payload = json!({"jobId": "j1", "frame": 1, "path": "/out/0001.png"});
        let event = PushEvent::decode(EventKind::JobImageComplete, &payload).unwrap();
        assert_eq!(
            event,
            PushEvent::JobImageComplete {
                job_id: "j1".into(),
                frame: Some(1),
                path: PathBuf::from("/out/0001.png"),
            }
        );
        let legacy = json!({"job_id": "j1", "frame": 1, "file_name": "/out/0001.png"});
        assert_eq!(PushEvent::decode(EventKind::JobImageComplete, &legacy).unwrap(), event);
    }

    #[test]
    fn image_complete_frame_is_optional() {
        let payload = json!({"jobId": "j1", "path": "/out/0001.png"});
        let event = PushEvent::decode(EventKind::JobImageComplete, &payload).unwrap();
        assert!(matches!(event, PushEvent::JobImageComplete { frame: None, .. }));
    }

    #[test]
    fn malformed_payloads_are_reported() {
        let err =
            PushEvent::decode(EventKind::JobImageComplete, &json!({"frame": "x"})).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedPayload { .. }));
        let err = PushEvent::decode(EventKind::NodeDisconnect, &json!({"id": " "})).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedPayload { .. }));
        assert!(PushEvent::decode(EventKind::NodeStatus, &Value::Null).is_err());
    }

    #[test]
    fn raw_event_with_unknown_name_is_malformed() {
        let raw = RawEvent {
            event: "heartbeat".into(),
            payload: Value::Null,
        };
        assert!(PushEvent::try_from(&raw).is_err());
    }

    #[test]
    fn file_drop_shapes() {
        let payload = json!({"paths": ["/a.blend"], "position": {"x": 1, "y": 2}});
        let event = PushEvent::decode(EventKind::FileDrop, &payload).unwrap();
        assert_eq!(event, PushEvent::FileDrop { paths: vec![PathBuf::from("/a.blend")] });
        let event = PushEvent::decode(EventKind::FileDrop, &json!("/b.blend")).unwrap();
        assert_eq!(event, PushEvent::FileDrop { paths: vec![PathBuf::from("/b.blend")] });
    }
}
