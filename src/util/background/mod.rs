//! Job runner for futures and recurring background tasks.

pub mod job_worker;
pub mod worker;

use core::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::error::Error;
use worker::{Worker, WorkerProcessor};

pub(crate) type JobOutput = Result<(), Error>;
pub(crate) type Job = Pin<Box<dyn Future<Output = JobOutput> + Send>>;

/// Runs one-off jobs and long-lived workers (the re-replication scan, the
/// worker heartbeat loop) under a shared shutdown signal.
pub struct BackgroundRunner {
	send_job: mpsc::UnboundedSender<(Job, bool)>,
	send_worker: mpsc::UnboundedSender<Box<dyn Worker>>,
}

impl BackgroundRunner {
	/// Number of generic job workers draining the one-off job queue.
	const N_JOB_WORKERS: usize = 4;

	/// Create a new BackgroundRunner
	pub fn new(stop_signal: watch::Receiver<bool>) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
		let (send_worker, worker_out) = mpsc::unbounded_channel::<Box<dyn Worker>>();

		let await_all_done = tokio::spawn({
			let stop_signal = stop_signal.clone();
			async move { WorkerProcessor::new(worker_out, stop_signal).run().await }
		});

		let (send_job, queue_out) = mpsc::unbounded_channel();
		let queue_out = Arc::new(Mutex::new(queue_out));

		for i in 0..Self::N_JOB_WORKERS {
			send_worker
				.send(Box::new(job_worker::JobWorker {
					index: i,
					job_chan: queue_out.clone(),
					next_job: None,
				}))
				.ok()
				.expect("Could not put job worker in queue");
		}

		let bgrunner = Arc::new(Self {
			send_job,
			send_worker,
		});
		(bgrunner, await_all_done)
	}

	/// Spawn a task to be run in background
	pub fn spawn<T>(&self, job: T)
	where
		T: Future<Output = JobOutput> + Send + 'static,
	{
		let boxed: Job = Box::pin(job);
		self.send_job
			.send((boxed, false))
			.ok()
			.expect("Could not put job in queue");
	}

	/// Spawn a recurring worker (one unit of work per iteration, driven
	/// by the WorkerProcessor's scheduling loop).
	pub fn spawn_worker<W>(&self, worker: W)
	where
		W: Worker + 'static,
	{
		self.send_worker
			.send(Box::new(worker))
			.ok()
			.expect("Could not put worker in queue");
	}
}
