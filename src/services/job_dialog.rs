/*
    Dialog controller for "Create new Render Job".
    Idle -> Importing -> Editing -> Submitting -> Idle

    Input values are always text, exactly as typed into the form, and are validated here
    rather than trusted. The job only reaches the registry once the backend answered
    `create_job` with the canonical record (server assigned id, frames and version).
*/
use super::{event_hub::Liveness, reconciler::ReconcileController};
use crate::models::{
    blend_info::BlendInfo,
    error::ReconcileError,
    job::{Frame, Job, NewJobDto},
    mode::Mode,
    project_file::ProjectFile,
};
use std::{fmt, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{field} must be a whole number, got {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("Start frame {start} is after end frame {end}")]
    InvalidRange { start: Frame, end: Frame },
    #[error("Output destination is required")]
    MissingOutput,
    #[error("Blender version is required")]
    MissingVersion,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Cannot {action} while the dialog is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// What the operator picked to start a job from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    /// A `.blend` file; the backend peeks into it for version and frame range.
    Blend(String),
    /// A project the backend already manages.
    Project(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeKind {
    Frame,
    Section,
    #[default]
    Animation,
}

/// Editable fields of the form, as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobForm {
    pub project_file: ProjectFile,
    pub mode: ModeKind,
    /// used by [ModeKind::Frame]
    pub frame: String,
    /// used by [ModeKind::Section] and [ModeKind::Animation]
    pub start: String,
    pub end: String,
    pub version: String,
    pub output: String,
}

impl JobForm {
    // same defaults the dialog starts with when nothing was extracted
    fn blank(project_file: ProjectFile) -> Self {
        Self {
            project_file,
            mode: ModeKind::Animation,
            frame: "1".to_owned(),
            start: "1".to_owned(),
            end: "1".to_owned(),
            version: String::new(),
            output: String::new(),
        }
    }

    pub fn from_blend_info(info: &BlendInfo) -> Self {
        Self {
            project_file: ProjectFile::new(info.path.clone()),
            mode: ModeKind::Animation,
            frame: info.start.to_string(),
            start: info.start.to_string(),
            end: info.end.to_string(),
            version: info.blend_version.clone(),
            output: info.output.to_string_lossy().into_owned(),
        }
    }

    fn parse(field: &'static str, value: &str) -> Result<Frame, FormError> {
        value.trim().parse::<Frame>().map_err(|_| FormError::NotANumber {
            field,
            value: value.to_owned(),
        })
    }

    fn range(&self) -> Result<(Frame, Frame), FormError> {
        let start = Self::parse("start", &self.start)?;
        let end = Self::parse("end", &self.end)?;
        if start > end {
            return Err(FormError::InvalidRange { start, end });
        }
        Ok((start, end))
    }

    /// Validate the form and build the `create_job` arguments. `nodes` empty means every node.
    pub fn to_request(&self, nodes: &[String]) -> Result<NewJobDto, FormError> {
        let (mode, start, end) = match self.mode {
            ModeKind::Frame => (Mode::Frame(Self::parse("frame", &self.frame)?), None, None),
            ModeKind::Section => {
                let (start, end) = self.range()?;
                (Mode::Section { start, end }, None, None)
            }
            ModeKind::Animation => {
                let (start, end) = self.range()?;
                (Mode::Animation, Some(start), Some(end))
            }
        };

        let version = self.version.trim();
        if version.is_empty() {
            return Err(FormError::MissingVersion);
        }
        let output = self.output.trim();
        if output.is_empty() {
            return Err(FormError::MissingOutput);
        }

        Ok(NewJobDto {
            path: self.project_file.path().to_owned(),
            version: version.to_owned(),
            mode,
            output: PathBuf::from(output),
            start,
            end,
            nodes: (!nodes.is_empty()).then(|| nodes.to_vec()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Importing(ImportSource),
    Editing(JobForm),
    Submitting,
}

impl WorkflowState {
    fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Importing(_) => "importing",
            WorkflowState::Editing(_) => "editing",
            WorkflowState::Submitting => "submitting",
        }
    }
}

pub type JobCreated = Box<dyn Fn(&Job) + Send + Sync>;

/// Owns the open/close state of the new job dialog. `on_job_created` is kept beside the data,
/// never attached to it.
pub struct JobDialog {
    controller: ReconcileController,
    liveness: Liveness,
    state: WorkflowState,
    on_job_created: JobCreated,
}

impl fmt::Debug for JobDialog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDialog")
            .field("state", &self.state)
            .field("liveness", &self.liveness)
            .finish_non_exhaustive()
    }
}

impl JobDialog {
    pub fn new(
        controller: ReconcileController,
        liveness: Liveness,
        on_job_created: impl Fn(&Job) + Send + Sync + 'static,
    ) -> Self {
        Self {
            controller,
            liveness,
            state: WorkflowState::Idle,
            on_job_created: Box::new(on_job_created),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, WorkflowState::Editing(_))
    }

    pub fn form(&self) -> Option<&JobForm> {
        match &self.state {
            WorkflowState::Editing(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut JobForm> {
        match &mut self.state {
            WorkflowState::Editing(form) => Some(form),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidState {
            action,
            state: self.state.name(),
        }
    }

    /// Ask the backend about the picked file and open the form pre-filled with the answer.
    /// A null or failed answer returns to idle without a form.
    pub async fn import(&mut self, source: ImportSource) -> Result<(), WorkflowError> {
        if self.state != WorkflowState::Idle {
            return Err(self.invalid("import"));
        }
        self.state = WorkflowState::Importing(source.clone());

        let client = self.controller.client();
        let result = match &source {
            ImportSource::Blend(path) => client
                .import_blend(path)
                .await
                .map(|info| info.map(|info| JobForm::from_blend_info(&info))),
            ImportSource::Project(path) => client
                .import_project(path)
                .await
                .map(|project| project.map(JobForm::blank)),
        };

        if !self.liveness.is_alive() {
            tracing::debug!(?source, "Import finished after the view unmounted, ignoring");
            self.state = WorkflowState::Idle;
            return Ok(());
        }

        match result {
            Ok(Some(form)) => {
                tracing::info!(file = form.project_file.file_name(), "Opening new job form");
                self.state = WorkflowState::Editing(form);
                Ok(())
            }
            Ok(None) => {
                self.state = WorkflowState::Idle;
                let command = match source {
                    ImportSource::Blend(_) => "import_blend",
                    ImportSource::Project(_) => "import_project",
                };
                tracing::warn!(?source, "Backend could not import the file");
                Err(ReconcileError::refused(command, "nothing was imported").into())
            }
            Err(e) => {
                self.state = WorkflowState::Idle;
                tracing::warn!(?source, "Import failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Cancel button. Also clears the node selection the form was using.
    pub fn close(&mut self) {
        if self.state != WorkflowState::Idle {
            tracing::debug!(state = self.state.name(), "Closing job dialog");
        }
        self.state = WorkflowState::Idle;
        if let Err(e) = self.controller.clear_node_selection() {
            tracing::debug!("Unable to clear selection: {e}");
        }
    }

    /// Validate and send `create_job` once. The dialog closes before the answer arrives; the
    /// registry only changes when the backend returns a job. Validation errors keep the form
    /// open so it can be corrected. No automatic retry. `Ok(None)` means the answer came back
    /// after the view unmounted and was ignored.
    pub async fn submit(&mut self) -> Result<Option<Job>, WorkflowError> {
        let WorkflowState::Editing(form) = &self.state else {
            return Err(self.invalid("submit"));
        };
        let selected = self.controller.snapshot().await?.selected_nodes;
        let nodes: Vec<String> = selected.iter().map(|n| n.id.clone()).collect();
        let request = form.to_request(&nodes)?;

        self.close();
        self.state = WorkflowState::Submitting;
        let response = self.controller.client().create_job(&request).await;
        self.state = WorkflowState::Idle;

        if !self.liveness.is_alive() {
            tracing::debug!(
                path = %request.path,
                "create_job answered after the view unmounted, ignoring"
            );
            return Ok(None);
        }

        let job = match response {
            Ok(Some(job)) => job,
            Ok(None) => {
                let error = ReconcileError::refused("create_job", "backend returned no job");
                tracing::warn!(path = %request.path, "{error}");
                return Err(error.into());
            }
            Err(e) => {
                tracing::warn!(path = %request.path, "Job was not created: {e}");
                return Err(e.into());
            }
        };

        self.controller.append_job(job.clone())?;
        (self.on_job_created)(&job);
        Ok(Some(job))
    }
}
