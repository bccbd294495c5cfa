use crate::models::{
    error::{Entity, ReconcileError},
    job::{Frame, Job},
};
use std::{path::PathBuf, sync::Arc};

/// Canonical list of render jobs in the order they were created.
#[derive(Debug, Default, Clone)]
pub struct JobRegistry {
    jobs: Arc<Vec<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Job>> {
        Arc::clone(&self.jobs)
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn replace_all(&mut self, jobs: Vec<Job>) {
        let mut unique: Vec<Job> = Vec::with_capacity(jobs.len());
        for job in jobs {
            match unique.iter_mut().find(|j| j.id == job.id) {
                Some(existing) => {
                    tracing::warn!(id = %job.id, "Job listed twice, keeping the last entry");
                    *existing = job;
                }
                None => unique.push(job),
            }
        }
        self.jobs = Arc::new(unique);
    }

    /// Add a job confirmed by the backend at the end of the list. A job we already know keeps
    /// its position, renders and progress; only its metadata is refreshed.
    pub fn append(&mut self, job: Job) {
        let jobs = Arc::make_mut(&mut self.jobs);
        match jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => {
                tracing::debug!(id = %job.id, "Job already present, merging");
                existing.merge_record(job);
            }
            None => jobs.push(job),
        }
    }

    /// Put a finished frame at the front of the job's renders.
    /// Fails with NotFound, leaving the registry untouched, when the job is unknown.
    pub fn append_render_artifact(
        &mut self,
        job_id: &str,
        path: PathBuf,
    ) -> Result<(), ReconcileError> {
        let index = self.position(job_id)?;
        Arc::make_mut(&mut self.jobs)[index].prepend_render(path);
        Ok(())
    }

    /// Move `current_frame` forward to `frame`, clamped to the job's range. Frames can finish
    /// out of order on different workers, so an older frame never moves it back.
    pub fn advance_frame(&mut self, job_id: &str, frame: Frame) -> Result<(), ReconcileError> {
        let index = self.position(job_id)?;
        let job = &self.jobs[index];
        let frame = frame.clamp(job.start_frame, job.end_frame);
        if frame > job.current_frame {
            Arc::make_mut(&mut self.jobs)[index].current_frame = frame;
        }
        Ok(())
    }

    /// Remove by id after the backend accepted `delete_job`. Unknown ids are a no-op.
    pub fn remove(&mut self, job_id: &str) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.id == job_id)?;
        Some(Arc::make_mut(&mut self.jobs).remove(index))
    }

    fn position(&self, job_id: &str) -> Result<usize, ReconcileError> {
        self.jobs
            .iter()
            .position(|j| j.id == job_id)
            .ok_or_else(|| ReconcileError::not_found(Entity::Job, job_id))
    }
}
