/*
    The reconciler owns every registry. Nothing else mutates them: push events, command
    responses and selection changes are all posted to one queue and applied in order, so a
    handler always works on the latest committed state instead of a copy it captured earlier.

    The tuple returned by `new` mirrors the network service:
    - the ReconcileService holds the loop and must be spawned,
    - the ReconcileController is the cheap, cloneable handle the views use,
    - the receiver yields notifications for the presentation layer.
*/
use super::{
    backend_client::BackendClient, dedup::DedupGuard, job_registry::JobRegistry,
    node_registry::NodeRegistry, selection::Selection,
};
use crate::{
    config::Config,
    models::{
        error::{Entity, ReconcileError},
        job::Job,
        message::PushEvent,
        node::{Node, NodeStatus},
    },
};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot, watch,
};

/// Read-only view of everything the reconciler knows. Cloning is cheap.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub nodes: Arc<Vec<Node>>,
    pub jobs: Arc<Vec<Job>>,
    pub selected_job: Option<String>,
    pub selected_nodes: Arc<Vec<Node>>,
}

impl Snapshot {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }
}

/// Things the presentation layer should react to besides snapshot changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A project file was dropped on the window and survived deduplication.
    ImportRequested(PathBuf),
    /// Something was dropped or refused. Never fatal.
    Diagnostic(ReconcileError),
}

#[derive(Debug)]
enum ReconcileMsg {
    Event(PushEvent),
    Report(ReconcileError),
    ReplaceNodes(Vec<Node>),
    UpsertNode(Node),
    RemoveNode(String),
    ReplaceJobs(Vec<Job>),
    AppendJob(Job),
    RemoveJob(String),
    ToggleNode(String),
    SelectAllNodes(bool),
    ClearNodeSelection,
    SelectJob(Option<String>),
    Snapshot(oneshot::Sender<Snapshot>),
}

// The state half of the service, kept apart so the handlers can be exercised synchronously.
#[derive(Debug)]
struct ReconcileState {
    nodes: NodeRegistry,
    jobs: JobRegistry,
    selection: Selection,
    dedup: DedupGuard,
}

impl ReconcileState {
    fn new(dedup: DedupGuard) -> Self {
        Self {
            nodes: NodeRegistry::new(),
            jobs: JobRegistry::new(),
            selection: Selection::default(),
            dedup,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.nodes.snapshot(),
            jobs: self.jobs.snapshot(),
            selected_job: self.selection.selected_job().map(str::to_owned),
            selected_nodes: self.selection.selected_nodes(),
        }
    }

    fn prune_selection(&mut self) {
        let jobs = &self.jobs;
        self.selection
            .retain_known(&self.nodes.snapshot(), |id| jobs.get(id).is_some());
    }

    fn handle_event(&mut self, event: PushEvent, out: &mut Vec<Notification>) {
        match event {
            PushEvent::NodeDiscover { id, spec } => {
                let node = self.nodes.upsert_by_discovery(&id, spec);
                tracing::info!(id = %node.id, name = %node.name, "Node discovered");
                self.prune_selection();
            }
            PushEvent::NodeDisconnect { id } => match self.nodes.remove(&id) {
                Some(node) => {
                    tracing::info!(id = %node.id, name = %node.name, "Node disconnected");
                    self.prune_selection();
                }
                None => tracing::debug!(%id, "Disconnect for a node we never saw"),
            },
            PushEvent::NodeStatus { id, message } => {
                let result = match message.parse::<NodeStatus>() {
                    Ok(status) => self.nodes.mark_status(&id, status),
                    Err(()) => self.nodes.mark_activity(&id, &message),
                };
                match result {
                    Ok(()) => self.prune_selection(),
                    // workers can report before their discovery reaches us
                    Err(e) => tracing::info!("Ignoring status \"{message}\": {e}"),
                }
            }
            PushEvent::JobImageComplete {
                job_id,
                frame,
                path,
            } => {
                let result = self
                    .jobs
                    .append_render_artifact(&job_id, path.clone())
                    .and_then(|()| match frame {
                        Some(frame) => self.jobs.advance_frame(&job_id, frame),
                        None => Ok(()),
                    });
                match result {
                    Ok(()) => tracing::debug!(%job_id, ?frame, ?path, "Frame completed"),
                    Err(e) => {
                        tracing::warn!(?frame, ?path, "Dropping completed frame: {e}");
                        out.push(Notification::Diagnostic(e));
                    }
                }
            }
            PushEvent::FileDrop { paths } => {
                for path in paths {
                    let key = path.to_string_lossy().into_owned();
                    if self.dedup.should_process(&key) {
                        tracing::info!(?path, "Import requested from file drop");
                        out.push(Notification::ImportRequested(path));
                    } else {
                        tracing::trace!(?path, "Duplicate file drop suppressed");
                    }
                }
            }
        }
    }

    fn handle(&mut self, msg: ReconcileMsg, out: &mut Vec<Notification>) {
        match msg {
            ReconcileMsg::Event(event) => self.handle_event(event, out),
            ReconcileMsg::Report(error) => {
                tracing::warn!("{error}");
                out.push(Notification::Diagnostic(error));
            }
            ReconcileMsg::ReplaceNodes(nodes) => {
                self.nodes.replace_all(nodes);
                self.prune_selection();
            }
            ReconcileMsg::UpsertNode(node) => {
                self.nodes.upsert(node);
                self.prune_selection();
            }
            ReconcileMsg::RemoveNode(id) => {
                if self.nodes.remove(&id).is_some() {
                    self.prune_selection();
                }
            }
            ReconcileMsg::ReplaceJobs(jobs) => {
                self.jobs.replace_all(jobs);
                self.prune_selection();
            }
            ReconcileMsg::AppendJob(job) => {
                tracing::info!(id = %job.id, file = job.get_file_name(), "Job added");
                self.jobs.append(job);
            }
            ReconcileMsg::RemoveJob(id) => {
                if self.jobs.remove(&id).is_some() {
                    self.prune_selection();
                }
            }
            ReconcileMsg::ToggleNode(id) => {
                if self.selection.is_selected(&id) {
                    let selected = self.selection.selected_nodes();
                    if let Some(node) = selected.iter().find(|n| n.id == id) {
                        self.selection.toggle_node(node);
                    }
                } else if let Some(node) = self.nodes.get(&id) {
                    self.selection.toggle_node(node);
                } else {
                    let error = ReconcileError::not_found(Entity::Node, id);
                    tracing::warn!("Cannot select node: {error}");
                    out.push(Notification::Diagnostic(error));
                }
            }
            ReconcileMsg::SelectAllNodes(selected) => {
                self.selection.set_all(selected, &self.nodes.snapshot());
            }
            ReconcileMsg::ClearNodeSelection => self.selection.clear_nodes(),
            ReconcileMsg::SelectJob(Some(id)) if self.jobs.get(&id).is_none() => {
                let error = ReconcileError::not_found(Entity::Job, id);
                tracing::warn!("Cannot select job: {error}");
                out.push(Notification::Diagnostic(error));
            }
            ReconcileMsg::SelectJob(id) => self.selection.select_job(id),
            ReconcileMsg::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

pub struct ReconcileService {
    state: ReconcileState,
    receiver: UnboundedReceiver<ReconcileMsg>,
    snapshot: watch::Sender<Snapshot>,
    notifications: UnboundedSender<Notification>,
}

impl ReconcileService {
    /// Apply queued messages until every controller is dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            let publishes = !matches!(msg, ReconcileMsg::Snapshot(_) | ReconcileMsg::Report(_));
            let mut out = Vec::new();
            self.state.handle(msg, &mut out);
            if publishes {
                self.snapshot.send_replace(self.state.snapshot());
            }
            for notification in out {
                // nobody listening is fine
                let _ = self.notifications.send(notification);
            }
        }
        tracing::debug!("Reconciler stopped, all controllers dropped");
    }
}

#[derive(Clone, Debug)]
pub struct ReconcileController {
    sender: UnboundedSender<ReconcileMsg>,
    snapshot: watch::Receiver<Snapshot>,
    client: BackendClient,
}

pub fn new(
    config: &Config,
    client: BackendClient,
) -> (
    ReconcileService,
    ReconcileController,
    UnboundedReceiver<Notification>,
) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let (notification_sender, notification_receiver) = mpsc::unbounded_channel();
    let state = ReconcileState::new(DedupGuard::new(config.dedup_window));
    let (snapshot_sender, snapshot_receiver) = watch::channel(state.snapshot());

    (
        ReconcileService {
            state,
            receiver,
            snapshot: snapshot_sender,
            notifications: notification_sender,
        },
        ReconcileController {
            sender,
            snapshot: snapshot_receiver,
            client,
        },
        notification_receiver,
    )
}

impl ReconcileController {
    fn send(&self, msg: ReconcileMsg) -> Result<(), ReconcileError> {
        self.sender
            .send(msg)
            .map_err(|_| ReconcileError::Disconnected)
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    /// Feed a decoded push event into the queue.
    pub fn push_event(&self, event: PushEvent) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::Event(event))
    }

    /// Surface an error that happened outside the reconciler, e.g. an undecodable event.
    pub fn report(&self, error: ReconcileError) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::Report(error))
    }

    /// Last published snapshot. May not include messages still sitting in the queue.
    pub fn latest(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that wakes whenever a new snapshot is published.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Snapshot taken after every message sent before this call has been applied.
    pub async fn snapshot(&self) -> Result<Snapshot, ReconcileError> {
        let (sender, receiver) = oneshot::channel();
        self.send(ReconcileMsg::Snapshot(sender))?;
        receiver.await.map_err(|_| ReconcileError::Disconnected)
    }

    /// Fetch the node list. A null answer leaves the registry as it is.
    pub async fn refresh_nodes(&self) -> Result<(), ReconcileError> {
        match self.client.list_nodes().await? {
            Some(nodes) => self.send(ReconcileMsg::ReplaceNodes(nodes)),
            None => {
                tracing::debug!("Node list came back empty, keeping current nodes");
                Ok(())
            }
        }
    }

    pub async fn refresh_jobs(&self) -> Result<(), ReconcileError> {
        match self.client.list_jobs().await? {
            Some(jobs) => self.send(ReconcileMsg::ReplaceJobs(jobs)),
            None => {
                tracing::debug!("Job list came back empty, keeping current jobs");
                Ok(())
            }
        }
    }

    pub async fn create_node(&self, name: &str, host: &str) -> Result<Node, ReconcileError> {
        let node = self.client.create_node(name, host).await?;
        self.send(ReconcileMsg::UpsertNode(node.clone()))?;
        Ok(node)
    }

    /// The node stays visible unless the backend confirms the deletion.
    pub async fn delete_node(&self, id: &str) -> Result<(), ReconcileError> {
        self.client.delete_node(id).await?;
        self.send(ReconcileMsg::RemoveNode(id.to_owned()))
    }

    pub async fn delete_job(&self, id: &str) -> Result<(), ReconcileError> {
        let snapshot = self.snapshot().await?;
        let job = snapshot
            .job(id)
            .ok_or_else(|| ReconcileError::not_found(Entity::Job, id))?;
        self.client.delete_job(job).await?;
        self.send(ReconcileMsg::RemoveJob(id.to_owned()))
    }

    pub(crate) fn append_job(&self, job: Job) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::AppendJob(job))
    }

    pub fn toggle_node(&self, id: &str) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::ToggleNode(id.to_owned()))
    }

    pub fn select_all_nodes(&self, selected: bool) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::SelectAllNodes(selected))
    }

    pub fn clear_node_selection(&self) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::ClearNodeSelection)
    }

    pub fn select_job(&self, id: Option<&str>) -> Result<(), ReconcileError> {
        self.send(ReconcileMsg::SelectJob(id.map(str::to_owned)))
    }
}
