use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use super::{Job, JobOutput};
use crate::error::Error;
use crate::background::worker::{Worker, WorkerStatus};

/// Drains the shared one-off job queue. Several of these run concurrently
/// (see `BackgroundRunner::N_JOB_WORKERS`); each one picks up and awaits
/// whatever job is next in line.
pub(crate) struct JobWorker {
	pub(crate) index: usize,
	pub(crate) job_chan: Arc<Mutex<mpsc::UnboundedReceiver<(Job, bool)>>>,
	pub(crate) next_job: Option<Job>,
}

#[async_trait]
impl Worker for JobWorker {
	fn name(&self) -> String {
		format!("Job worker #{}", self.index)
	}

	async fn work(&mut self, _must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		if let Some(job) = self.next_job.take() {
			job.await?;
		}
		Ok(WorkerStatus::Idle)
	}

	async fn wait_for_work(&mut self, _must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		let job = self.job_chan.lock().await.recv().await;
		match job {
			Some((job, _)) => {
				self.next_job = Some(job);
				WorkerStatus::Busy
			}
			None => WorkerStatus::Done,
		}
	}
}
