/*
    - Job ids are assigned by the backend when the job is created. Render completion events
      reference the same id, so the registry never makes one up locally.
    - renders are kept most recent first, in the order the completion events arrived.
*/
use super::{error::ReconcileError, mode::Mode, project_file::ProjectFile};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, hash::Hash, path::PathBuf};

pub type Frame = i32;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "JobRecord")]
pub struct Job {
    /// Backend assigned job identifier
    pub id: String,
    /// Path to blender files
    pub project_file: ProjectFile,
    /// contains the information to specify the kind of job to render
    pub mode: Mode,
    pub start_frame: Frame,
    pub end_frame: Frame,
    /// last frame reported complete, or `start_frame` when nothing finished yet
    pub current_frame: Frame,
    // target output destination
    pub output: PathBuf,
    // target blender version
    pub version: String,
    // completed render images, most recent first
    renders: VecDeque<PathBuf>,
}

impl Job {
    /// Create a job entry with all information intact. Rejects inverted frame ranges.
    pub fn new(
        id: impl Into<String>,
        project_file: ProjectFile,
        mode: Mode,
        start_frame: Frame,
        end_frame: Frame,
        output: PathBuf,
        version: impl Into<String>,
    ) -> Result<Self, ReconcileError> {
        let id = id.into();
        if start_frame > end_frame {
            return Err(ReconcileError::malformed(
                format!("job {id}"),
                format!("start frame {start_frame} is after end frame {end_frame}"),
            ));
        }
        if !mode.is_valid() {
            return Err(ReconcileError::malformed(
                format!("job {id}"),
                format!("invalid render mode {mode:?}"),
            ));
        }
        Ok(Self {
            id,
            project_file,
            mode,
            start_frame,
            end_frame,
            current_frame: start_frame,
            output,
            version: version.into(),
            renders: VecDeque::new(),
        })
    }

    pub fn get_file_name(&self) -> &str {
        self.project_file.file_name()
    }

    pub fn renders(&self) -> &VecDeque<PathBuf> {
        &self.renders
    }

    pub(crate) fn prepend_render(&mut self, path: PathBuf) {
        self.renders.push_front(path);
    }

    /// Take the metadata of a newer record for the same job. Renders and frame progress are
    /// only ever advanced by completion events, so the ones recorded here are kept.
    pub(crate) fn merge_record(&mut self, record: Job) {
        let renders = std::mem::take(&mut self.renders);
        let current_frame = self.current_frame.max(record.current_frame);
        *self = record;
        self.renders = renders;
        self.current_frame = current_frame.clamp(self.start_frame, self.end_frame);
    }
}

impl AsRef<str> for Job {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Arguments of the `create_job` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJobDto {
    pub path: String,
    pub version: String,
    pub mode: Mode,
    pub output: PathBuf,
    /// frame range of the animation, only sent for [Mode::Animation]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Frame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Frame>,
    /// ids of the nodes to render on; `None` lets the backend use every node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,
}

// What the backend actually sends. Older command handlers used `start`/`end` and
// `blender_version`, and a freshly created job may omit most fields.
#[derive(Deserialize)]
struct JobRecord {
    id: String,
    #[serde(default)]
    project_file: ProjectFile,
    #[serde(default)]
    mode: Mode,
    #[serde(alias = "start")]
    start_frame: Frame,
    #[serde(alias = "end")]
    end_frame: Frame,
    #[serde(default)]
    current_frame: Option<Frame>,
    #[serde(default)]
    output: PathBuf,
    #[serde(default, alias = "blender_version")]
    version: String,
    #[serde(default)]
    renders: Option<VecDeque<PathBuf>>,
}

impl TryFrom<JobRecord> for Job {
    type Error = ReconcileError;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        if record.id.trim().is_empty() {
            return Err(ReconcileError::malformed("job", "missing job id"));
        }
        let mut job = Job::new(
            record.id,
            record.project_file,
            record.mode,
            record.start_frame,
            record.end_frame,
            record.output,
            record.version,
        )?;
        if let Some(frame) = record.current_frame {
            job.current_frame = frame;
        }
        job.renders = record.renders.unwrap_or_default();
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_decodes() {
        let job: Job =
            serde_json::from_str(r#"{"id":"j1","start_frame":1,"end_frame":10,"renders":[]}"#)
                .unwrap();
        assert_eq!(job.id, "j1");
        assert_eq!(job.current_frame, 1);
        assert_eq!(job.mode, Mode::Animation);
        assert!(job.renders().is_empty());
    }

    #[test]
    fn legacy_field_names() {
        let json = r#"{
            "id": "j2",
            "project_file": "C:\\shots\\intro.blend",
            "mode": {"Animation": {"start": 1, "end": 5}},
            "start": 1,
            "end": 5,
            "output": "/out",
            "blender_version": "4.1.0"
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.version, "4.1.0");
        assert_eq!(job.get_file_name(), "intro.blend");
        assert_eq!(job.end_frame, 5);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = serde_json::from_str::<Job>(r#"{"id":"j3","start_frame":9,"end_frame":2}"#);
        assert!(result.is_err());
    }

    #[test]
    fn renders_serialize_most_recent_first() {
        let mut job = Job::new(
            "j4",
            ProjectFile::new("/a.blend"),
            Mode::Animation,
            1,
            3,
            PathBuf::from("/out"),
            "4.2.0",
        )
        .unwrap();
        job.prepend_render(PathBuf::from("/out/0001.png"));
        job.prepend_render(PathBuf::from("/out/0002.png"));
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["renders"][0], "/out/0002.png");
    }

    #[test]
    fn merged_record_keeps_progress() {
        let mut live: Job =
            serde_json::from_str(r#"{"id":"j5","start_frame":1,"end_frame":10,"version":"4.1.0"}"#)
                .unwrap();
        live.prepend_render(PathBuf::from("/out/0004.png"));
        live.current_frame = 4;

        let late: Job = serde_json::from_str(
            r#"{"id":"j5","start_frame":1,"end_frame":10,"version":"4.2.0","renders":[]}"#,
        )
        .unwrap();
        live.merge_record(late);

        assert_eq!(live.version, "4.2.0");
        assert_eq!(live.current_frame, 4);
        assert_eq!(live.renders().len(), 1);
    }
}
