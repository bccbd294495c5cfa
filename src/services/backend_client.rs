/*
    Typed wrappers over the command interface. The backend answers with JSON text; anything
    null or empty means "nothing to report" and must leave the registries alone, so list
    commands hand back `Option<Vec<_>>` instead of an empty list.
*/
use crate::{
    domains::backend::Backend,
    models::{
        blend_info::BlendInfo,
        blender_installation::BlenderInstallation,
        error::ReconcileError,
        job::{Job, NewJobDto},
        node::Node,
        project_file::ProjectFile,
        server_setting::ServerSetting,
    },
};
use semver::Version;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{cmp::Ordering, fmt, sync::Arc};

pub const LIST_NODE: &str = "list_node";
pub const LIST_WORKERS: &str = "list_workers";
pub const CREATE_NODE: &str = "create_node";
pub const DELETE_NODE: &str = "delete_node";
pub const LIST_JOB: &str = "list_job";
pub const CREATE_JOB: &str = "create_job";
pub const DELETE_JOB: &str = "delete_job";
pub const IMPORT_PROJECT: &str = "import_project";
pub const IMPORT_BLEND: &str = "import_blend";
pub const LIST_PROJECTS: &str = "list_projects";
pub const DELETE_PROJECT: &str = "delete_project";
pub const LIST_VERSIONS: &str = "list_versions";
pub const LIST_BLENDER_INSTALLATION: &str = "list_blender_installation";
pub const ADD_BLENDER_INSTALLATION: &str = "add_blender_installation";
pub const FETCH_BLENDER_INSTALLATION: &str = "fetch_blender_installation";
pub const GET_SERVER_SETTINGS: &str = "get_server_settings";

pub type SafeBackend = Arc<dyn Backend + Send + Sync>;

#[derive(Clone)]
pub struct BackendClient {
    backend: SafeBackend,
    node_list_command: String,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("node_list_command", &self.node_list_command)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    pub fn new(backend: SafeBackend) -> Self {
        Self {
            backend,
            node_list_command: LIST_NODE.to_owned(),
        }
    }

    /// Older backends call the node listing `list_workers`.
    pub fn with_node_list_command(mut self, command: impl Into<String>) -> Self {
        self.node_list_command = command.into();
        self
    }

    async fn call(&self, command: &str, args: Value) -> Result<Option<String>, ReconcileError> {
        tracing::trace!(command, %args, "Invoking backend command");
        self.backend
            .invoke(command, args)
            .await
            .map_err(|e| ReconcileError::refused(command, e))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
    ) -> Result<Option<T>, ReconcileError> {
        let payload = self.call(command, args).await?;
        decode(command, payload)
    }

    /// Like [BackendClient::fetch], but a null answer counts as a refusal.
    async fn fetch_required<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
    ) -> Result<T, ReconcileError> {
        self.fetch(command, args)
            .await?
            .ok_or_else(|| ReconcileError::refused(command, "backend returned nothing"))
    }

    pub async fn list_nodes(&self) -> Result<Option<Vec<Node>>, ReconcileError> {
        self.fetch(&self.node_list_command, json!({})).await
    }

    pub async fn create_node(&self, name: &str, host: &str) -> Result<Node, ReconcileError> {
        self.fetch_required(CREATE_NODE, json!({ "name": name, "host": host }))
            .await
    }

    pub async fn delete_node(&self, id: &str) -> Result<(), ReconcileError> {
        self.call(DELETE_NODE, json!({ "id": id })).await.map(|_| ())
    }

    pub async fn list_jobs(&self) -> Result<Option<Vec<Job>>, ReconcileError> {
        self.fetch(LIST_JOB, json!({})).await
    }

    /// `Ok(None)` means the backend resolved with null; the caller decides what that means.
    pub async fn create_job(&self, job: &NewJobDto) -> Result<Option<Job>, ReconcileError> {
        let args = serde_json::to_value(job).map_err(|e| ReconcileError::malformed(CREATE_JOB, e))?;
        self.fetch(CREATE_JOB, args).await
    }

    pub async fn delete_job(&self, target_job: &Job) -> Result<(), ReconcileError> {
        let target_job =
            serde_json::to_value(target_job).map_err(|e| ReconcileError::malformed(DELETE_JOB, e))?;
        self.call(DELETE_JOB, json!({ "targetJob": target_job }))
            .await
            .map(|_| ())
    }

    pub async fn import_project(&self, path: &str) -> Result<Option<ProjectFile>, ReconcileError> {
        self.fetch(IMPORT_PROJECT, json!({ "path": path })).await
    }

    pub async fn import_blend(&self, path: &str) -> Result<Option<BlendInfo>, ReconcileError> {
        self.fetch(IMPORT_BLEND, json!({ "path": path })).await
    }

    pub async fn list_projects(&self) -> Result<Option<Vec<ProjectFile>>, ReconcileError> {
        self.fetch(LIST_PROJECTS, json!({})).await
    }

    pub async fn delete_project(&self, project_file: &ProjectFile) -> Result<(), ReconcileError> {
        self.call(DELETE_PROJECT, json!({ "projectFile": project_file }))
            .await
            .map(|_| ())
    }

    /// Available blender versions, newest first. The backend already sorts them, but the
    /// list feeds a drop-down so we do not rely on it.
    pub async fn list_versions(&self) -> Result<Vec<String>, ReconcileError> {
        let mut versions: Vec<String> = self
            .fetch(LIST_VERSIONS, json!({}))
            .await?
            .unwrap_or_default();
        sort_versions_descending(&mut versions);
        versions.dedup();
        Ok(versions)
    }

    pub async fn list_blender_installations(
        &self,
    ) -> Result<Option<Vec<BlenderInstallation>>, ReconcileError> {
        self.fetch(LIST_BLENDER_INSTALLATION, json!({})).await
    }

    pub async fn add_blender_installation(
        &self,
        path: &str,
    ) -> Result<BlenderInstallation, ReconcileError> {
        self.fetch_required(ADD_BLENDER_INSTALLATION, json!({ "path": path }))
            .await
    }

    pub async fn fetch_blender_installation(
        &self,
        version: &Version,
    ) -> Result<BlenderInstallation, ReconcileError> {
        self.fetch_required(
            FETCH_BLENDER_INSTALLATION,
            json!({ "version": version.to_string() }),
        )
        .await
    }

    pub async fn get_server_settings(&self) -> Result<ServerSetting, ReconcileError> {
        self.fetch_required(GET_SERVER_SETTINGS, json!({})).await
    }
}

fn decode<T: DeserializeOwned>(
    command: &str,
    payload: Option<String>,
) -> Result<Option<T>, ReconcileError> {
    let Some(text) = payload else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| ReconcileError::malformed(command, e))
}

// semver aware, newest first. Anything that is not a version goes to the end.
fn sort_versions_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => b.cmp(&a),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => b.cmp(a),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domains::backend::BackendError,
        models::mode::Mode,
        services::static_backend::StaticBackend,
    };
    use std::path::PathBuf;

    fn client(backend: &Arc<StaticBackend>) -> BackendClient {
        BackendClient::new(backend.clone())
    }

    #[tokio::test]
    async fn null_and_empty_lists_are_nothing() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(LIST_NODE, None);
        assert_eq!(client(&backend).list_nodes().await.unwrap(), None);

        backend.respond(LIST_NODE, Some("  "));
        assert_eq!(client(&backend).list_nodes().await.unwrap(), None);

        backend.respond(LIST_NODE, Some("null"));
        assert_eq!(client(&backend).list_nodes().await.unwrap(), None);

        backend.respond(LIST_NODE, Some("[]"));
        assert_eq!(client(&backend).list_nodes().await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(LIST_JOB, Some("{not json"));
        let err = client(&backend).list_jobs().await.unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn backend_failures_are_refusals() {
        let backend = Arc::new(StaticBackend::default());
        backend.fail(DELETE_NODE, BackendError::Rejected("node busy".into()));
        let err = client(&backend).delete_node("a").await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::BackendRefusal { ref command, .. } if command == DELETE_NODE
        ));
    }

    #[tokio::test]
    async fn node_listing_command_is_configurable() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(LIST_WORKERS, Some(r#"[{"id":"a"}]"#));
        let nodes = client(&backend)
            .with_node_list_command(LIST_WORKERS)
            .list_nodes()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(nodes[0].id, "a");
    }

    #[tokio::test]
    async fn versions_are_sorted_newest_first() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(
            LIST_VERSIONS,
            Some(r#"["3.6.5","4.10.0","nightly","4.2.1","4.2.1","4.9.0"]"#),
        );
        let versions = client(&backend).list_versions().await.unwrap();
        assert_eq!(versions, vec!["4.10.0", "4.9.0", "4.2.1", "3.6.5", "nightly"]);
    }

    #[tokio::test]
    async fn create_job_sends_the_form_arguments() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(
            CREATE_JOB,
            Some(r#"{"id":"j1","start_frame":1,"end_frame":10,"renders":[]}"#),
        );
        let request = NewJobDto {
            path: "/projects/shot.blend".into(),
            version: "4.2.0".into(),
            mode: Mode::Section { start: 1, end: 10 },
            output: PathBuf::from("/out"),
            start: None,
            end: None,
            nodes: Some(vec!["a".into()]),
        };
        let job = client(&backend).create_job(&request).await.unwrap().unwrap();
        assert_eq!(job.id, "j1");

        let calls = backend.calls_for(CREATE_JOB);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0]["mode"]["Section"]["end"], 10);
        assert_eq!(calls[0]["nodes"][0], "a");
        assert!(calls[0].get("start").is_none());
    }

    #[tokio::test]
    async fn missing_settings_are_a_refusal() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(GET_SERVER_SETTINGS, None);
        let err = client(&backend).get_server_settings().await.unwrap_err();
        assert!(matches!(err, ReconcileError::BackendRefusal { .. }));

        backend.respond(
            GET_SERVER_SETTINGS,
            Some(
                r#"{
                    "install_path": "/opt/blender",
                    "render_dir": "/tmp/RenderData",
                    "blend_dir": "/tmp/BlendFiles"
                }"#,
            ),
        );
        let settings = client(&backend).get_server_settings().await.unwrap();
        assert_eq!(settings.cache_path, PathBuf::from("/tmp/BlendFiles"));
    }

    #[tokio::test]
    async fn blender_installations_decode() {
        let backend = Arc::new(StaticBackend::default());
        backend.respond(
            FETCH_BLENDER_INSTALLATION,
            Some(r#"{"executable":"/opt/blender-4.2/blender","version":"4.2.0"}"#),
        );
        let blender = client(&backend)
            .fetch_blender_installation(&Version::new(4, 2, 0))
            .await
            .unwrap();
        assert_eq!(blender.version, Version::new(4, 2, 0));
        assert_eq!(backend.calls_for(FETCH_BLENDER_INSTALLATION)[0]["version"], "4.2.0");
    }
}
