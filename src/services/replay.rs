/*
    Offline driver for the reconciler. Seeds a static backend with recorded list responses,
    mounts a view, then feeds a recorded event log (one `{"event", "payload"}` object per line)
    through the same subscriptions a live window would use.

    Feature request:
        - follow mode that tails the log while it is still being written
*/
use super::{
    backend_client::{BackendClient, LIST_JOB},
    event_hub::{EventHub, MountedView},
    reconciler::{self, Notification, Snapshot},
    static_backend::StaticBackend,
};
use crate::{
    config::Config,
    models::{error::ReconcileError, message::RawEvent},
};
use anyhow::Context;
use std::{path::Path, sync::Arc};

#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub snapshot: Snapshot,
    pub notifications: Vec<Notification>,
    /// events nobody was subscribed to
    pub unhandled: usize,
}

pub struct ReplayApp {
    config: Config,
    backend: Arc<StaticBackend>,
}

impl ReplayApp {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            backend: Arc::new(StaticBackend::default()),
        }
    }

    /// Recorded `list_node` response, served under whichever command the config names.
    pub fn with_nodes(self, payload: &str) -> Self {
        self.backend
            .respond(&self.config.node_list_command, Some(payload));
        self
    }

    pub fn with_jobs(self, payload: &str) -> Self {
        self.backend.respond(LIST_JOB, Some(payload));
        self
    }

    pub async fn run_file(self, events: impl AsRef<Path>) -> anyhow::Result<ReplayReport> {
        let path = events.as_ref();
        let log = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Unable to read event log {}", path.display()))?;
        self.run(&log).await
    }

    pub async fn run(self, log: &str) -> anyhow::Result<ReplayReport> {
        let client = BackendClient::new(self.backend.clone())
            .with_node_list_command(self.config.node_list_command.clone());
        let (service, controller, mut notifications) = reconciler::new(&self.config, client);
        let handle = tokio::spawn(service.run());

        // a recording without list responses simply starts empty
        for refresh in [controller.refresh_nodes().await, controller.refresh_jobs().await] {
            if let Err(e) = refresh {
                tracing::debug!("Initial refresh skipped: {e}");
            }
        }

        let hub = EventHub::new();
        let view = MountedView::mount(&hub, &controller)?;
        let mut unhandled = 0;

        for (number, line) in log.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let delivered = serde_json::from_str::<RawEvent>(line)
                .map_err(|e| ReconcileError::malformed(format!("line {}", number + 1), e))
                .and_then(|event| hub.dispatch(&event));
            match delivered {
                Ok(true) => {}
                Ok(false) => unhandled += 1,
                Err(e) => controller.report(e)?,
            }
        }

        let snapshot = controller.snapshot().await?;
        view.unmount();
        drop(controller);
        handle.await.context("Reconciler task panicked")?;

        let mut report = ReplayReport {
            snapshot,
            unhandled,
            ..Default::default()
        };
        while let Ok(notification) = notifications.try_recv() {
            report.notifications.push(notification);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_a_session() {
        let log = r#"
# recorded from a two node farm
{"event":"node_discover","payload":{"id":"c","spec":{"host":"render-c","os":"linux","arch":"x86_64","memory":0,"cpu":"Ryzen","cores":16}}}
{"event":"node_disconnect","payload":"a"}
{"event":"job_image_complete","payload":{"job_id":"j1","frame":1,"file_name":"/out/0001.png"}}
{"event":"file-drop","payload":["/projects/shot.blend"]}
{"event":"file-drop","payload":["/projects/shot.blend"]}
not even json
"#;
        let report = ReplayApp::new(Config::default())
            .with_nodes(r#"[{"id":"a"},{"id":"b"}]"#)
            .with_jobs(r#"[{"id":"j1","start_frame":1,"end_frame":10}]"#)
            .run(log)
            .await
            .unwrap();

        let ids: Vec<&str> = report.snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(report.snapshot.node("c").unwrap().name, "render-c");
        assert_eq!(report.snapshot.job("j1").unwrap().renders().len(), 1);
        assert_eq!(report.unhandled, 0);

        let imports = report
            .notifications
            .iter()
            .filter(|n| matches!(n, Notification::ImportRequested(_)))
            .count();
        assert_eq!(imports, 1);
        assert!(report.notifications.iter().any(|n| matches!(
            n,
            Notification::Diagnostic(ReconcileError::MalformedPayload { .. })
        )));
    }

    #[tokio::test]
    async fn empty_log_without_recordings() {
        let report = ReplayApp::new(Config::default()).run("").await.unwrap();
        assert!(report.snapshot.nodes.is_empty());
        assert!(report.notifications.is_empty());
    }
}
