//! Worker registration, heartbeats and liveness.

use std::collections::{BTreeMap, BTreeSet};

use dfs_util::error::Error;
use dfs_util::time::now_sec;

/// Everything the coordinator knows about one worker.
#[derive(Debug, Clone)]
pub struct WorkerEntry {
	pub last_heartbeat: u64,
	pub held_blocks: BTreeSet<String>,
	pub node_id: Vec<u8>,
	pub addr: String,
}

#[derive(Debug, Default)]
pub struct WorkerTable {
	workers: BTreeMap<String, WorkerEntry>,
	dead_timeout_secs: u64,
}

impl WorkerTable {
	pub fn new(dead_timeout_secs: u64) -> Self {
		Self {
			workers: BTreeMap::new(),
			dead_timeout_secs,
		}
	}

	pub fn register(&mut self, worker_id: &str, node_id: Vec<u8>, addr: String) {
		self.workers.insert(
			worker_id.to_string(),
			WorkerEntry {
				last_heartbeat: now_sec(),
				held_blocks: BTreeSet::new(),
				node_id,
				addr,
			},
		);
		info!("worker '{}' registered at {}", worker_id, self.workers[worker_id].addr);
	}

	pub fn heartbeat(&mut self, worker_id: &str) {
		if let Some(entry) = self.workers.get_mut(worker_id) {
			entry.last_heartbeat = now_sec();
		}
	}

	pub fn addr(&self, worker_id: &str) -> Option<String> {
		self.workers.get(worker_id).map(|e| e.addr.clone())
	}

	/// `(node_id, addr)` as last reported at registration time.
	pub fn location(&self, worker_id: &str) -> Option<(Vec<u8>, String)> {
		self.workers.get(worker_id).map(|e| (e.node_id.clone(), e.addr.clone()))
	}

	/// Workers whose last heartbeat is within `T_dead`. Dead-but-registered
	/// workers are never pruned here; they're merely excluded from this
	/// set until a late heartbeat brings them back.
	pub fn live_workers(&self) -> BTreeSet<String> {
		let now = now_sec();
		self.workers
			.iter()
			.filter(|(_, entry)| now.saturating_sub(entry.last_heartbeat) <= self.dead_timeout_secs)
			.map(|(id, _)| id.clone())
			.collect()
	}

	pub fn registered_count(&self) -> usize {
		self.workers.len()
	}

	pub fn holds(&self, worker_id: &str, block_id: &str) -> bool {
		self.workers
			.get(worker_id)
			.map(|e| e.held_blocks.contains(block_id))
			.unwrap_or(false)
	}

	pub fn add_held_block(&mut self, worker_id: &str, block_id: &str) {
		if let Some(entry) = self.workers.get_mut(worker_id) {
			entry.held_blocks.insert(block_id.to_string());
		}
	}

	pub fn remove_held_block(&mut self, worker_id: &str, block_id: &str) {
		if let Some(entry) = self.workers.get_mut(worker_id) {
			entry.held_blocks.remove(block_id);
		}
	}

	pub fn ensure_known(&self, worker_id: &str) -> Result<(), Error> {
		if self.workers.contains_key(worker_id) {
			Ok(())
		} else {
			Err(Error::NotFound(format!("worker '{}'", worker_id)))
		}
	}
}
