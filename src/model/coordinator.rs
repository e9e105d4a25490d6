//! The coordinator's state machine: one coarse mutex guarding the
//! namespace, the block-location map, the worker table and active users.
//! Each RPC takes the lock once and does all of its work in that single
//! critical section.

use std::collections::BTreeMap;
use std::sync::Mutex;

use dfs_util::error::Error;

use crate::active_users::ActiveUsers;
use crate::namespace::Namespace;
use crate::placement::{blocks_needed, choose_replicas, generate_block_id};
use crate::worker_table::WorkerTable;

struct State {
	namespace: Namespace,
	/// `block_id -> ordered replica chain`, primary first. Entries are
	/// only ever appended to (by allocation or re-replication) or removed
	/// wholesale (by RemoveFile); a dead worker's id is never spliced out.
	block_locations: BTreeMap<String, Vec<String>>,
	workers: WorkerTable,
	users: ActiveUsers,
}

/// One block that needs a new replica, as produced by a re-replication
/// scan. The caller (the coordinator binary's background worker) issues
/// the actual `StoreBlock` RPC from `source` to `target`, and only on
/// success calls [`Coordinator::commit_rereplication`] to update metadata
/// — bytes move before metadata is touched.
#[derive(Debug, Clone)]
pub struct RereplicationTask {
	pub block_id: String,
	pub source: String,
	pub target: String,
}

pub struct Coordinator {
	state: Mutex<State>,
	pub replication_factor: usize,
	pub block_size: u64,
}

impl Coordinator {
	pub fn new(replication_factor: usize, block_size: u64, dead_timeout_secs: u64) -> Self {
		Self {
			state: Mutex::new(State {
				namespace: Namespace::new(),
				block_locations: BTreeMap::new(),
				workers: WorkerTable::new(dead_timeout_secs),
				users: ActiveUsers::new(),
			}),
			replication_factor,
			block_size,
		}
	}

	// ---- sessions ----

	pub fn login(&self, username: &str) -> Result<String, Error> {
		self.state.lock().unwrap().users.login(username)
	}

	pub fn logout(&self, username: &str) -> Result<String, Error> {
		self.state.lock().unwrap().users.logout(username)
	}

	// ---- worker liveness ----

	pub fn register_worker(&self, worker_id: &str, node_id: Vec<u8>, addr: String) {
		self.state.lock().unwrap().workers.register(worker_id, node_id, addr);
	}

	pub fn heartbeat(&self, worker_id: &str) {
		self.state.lock().unwrap().workers.heartbeat(worker_id);
	}

	pub fn worker_addr(&self, worker_id: &str) -> Option<String> {
		self.state.lock().unwrap().workers.addr(worker_id)
	}

	/// `(node_id, addr)` as reported when the worker registered.
	pub fn worker_location(&self, worker_id: &str) -> Option<(Vec<u8>, String)> {
		self.state.lock().unwrap().workers.location(worker_id)
	}

	// ---- namespace ----

	pub fn mkdir(&self, username: &str, path: &str) -> Result<(), Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.mkdir(username, path)
	}

	pub fn rmdir(&self, username: &str, path: &str) -> Result<(), Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.rmdir(username, path)
	}

	pub fn ls(&self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.ls(username, path)
	}

	pub fn add_file(&self, username: &str, path: &str, block_ids: Vec<String>) -> Result<String, Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.add_file(username, path, block_ids)
	}

	pub fn get_file_blocks(&self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.file_blocks(username, path)
	}

	pub fn remove_file(&self, username: &str, path: &str) -> Result<(), Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		let blocks = state.namespace.remove_file(username, path)?;
		for block_id in blocks {
			if let Some(holders) = state.block_locations.remove(&block_id) {
				for worker_id in holders {
					state.workers.remove_held_block(&worker_id, &block_id);
				}
			}
		}
		Ok(())
	}

	pub fn mv(&self, username: &str, src: &str, dst: &str) -> Result<String, Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;
		state.namespace.mv(username, src, dst)
	}

	// ---- placement ----

	pub fn allocate_blocks(&self, username: &str, file_size: u64) -> Result<Vec<(String, Vec<String>)>, Error> {
		let mut state = self.state.lock().unwrap();
		state.users.require_active(username)?;

		let live = state.workers.live_workers();
		if live.len() < self.replication_factor {
			return Err(Error::InsufficientReplicas(format!(
				"need {} live workers, have {}",
				self.replication_factor,
				live.len()
			)));
		}
		let n = blocks_needed(file_size, self.block_size);

		let mut allocated = Vec::with_capacity(n as usize);
		for i in 0..n {
			let block_id = generate_block_id(i as usize);
			let replicas = choose_replicas(&live, self.replication_factor)?;
			for worker_id in &replicas {
				state.workers.add_held_block(worker_id, &block_id);
			}
			state.block_locations.insert(block_id.clone(), replicas.clone());
			allocated.push((block_id, replicas));
		}
		Ok(allocated)
	}

	pub fn get_block_locations(&self, block_id: &str) -> Vec<String> {
		self.state
			.lock()
			.unwrap()
			.block_locations
			.get(block_id)
			.cloned()
			.unwrap_or_default()
	}

	// ---- re-replication ----

	/// Scan for under-replicated blocks and decide new placements, without
	/// touching metadata yet. The deficit is computed against the *live*
	/// set only; a dead worker's held copy still counts as an entry in
	/// `block_locations` but not as a live replica.
	pub fn scan_rereplication_candidates(&self) -> Vec<RereplicationTask> {
		let state = self.state.lock().unwrap();
		let live = state.workers.live_workers();

		let mut tasks = Vec::new();
		for (block_id, holders) in state.block_locations.iter() {
			let live_holders: Vec<&String> = holders.iter().filter(|w| live.contains(*w)).collect();
			if live_holders.len() >= self.replication_factor {
				continue;
			}
			let deficit = self.replication_factor - live_holders.len();

			let source = match live_holders.first() {
				Some(w) => (*w).clone(),
				None => {
					warn!(
						"block '{}' has lost all live replicas, cannot re-replicate",
						block_id
					);
					continue;
				}
			};

			let mut candidates: Vec<String> = live
				.iter()
				.filter(|w| !holders.contains(*w))
				.cloned()
				.collect();
			if candidates.is_empty() {
				warn!(
					"block '{}' is under-replicated but no live candidate workers are available",
					block_id
				);
				continue;
			}
			use rand::seq::SliceRandom;
			candidates.shuffle(&mut rand::thread_rng());
			candidates.truncate(deficit);

			for target in candidates {
				tasks.push(RereplicationTask {
					block_id: block_id.clone(),
					source: source.clone(),
					target,
				});
			}
		}
		tasks
	}

	/// Record that `task.target` now holds `task.block_id`, after the
	/// caller has confirmed the worker-to-worker copy succeeded.
	pub fn commit_rereplication(&self, task: &RereplicationTask) {
		let mut state = self.state.lock().unwrap();
		if let Some(holders) = state.block_locations.get_mut(&task.block_id) {
			if !holders.contains(&task.target) {
				holders.push(task.target.clone());
				state.workers.add_held_block(&task.target, &task.block_id);
				info!(
					"re-replicated block '{}' from '{}' to '{}'",
					task.block_id, task.source, task.target
				);
			}
		} else {
			debug!(
				"block '{}' no longer exists, skipping re-replication commit for '{}'",
				task.block_id, task.target
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn coordinator_with_workers(n: usize) -> Coordinator {
		let c = Coordinator::new(3, 1024, 30);
		for i in 0..n {
			c.register_worker(
				&format!("w{}", i + 1),
				vec![i as u8 + 1; 32],
				format!("127.0.0.1:900{}", i + 1),
			);
		}
		c
	}

	#[test]
	fn allocate_blocks_rejects_insufficient_workers() {
		let c = coordinator_with_workers(2);
		c.login("alice").unwrap();
		assert!(matches!(
			c.allocate_blocks("alice", 10),
			Err(Error::InsufficientReplicas(_))
		));
	}

	#[test]
	fn allocate_blocks_returns_distinct_ids_with_distinct_replicas() {
		let c = coordinator_with_workers(4);
		c.login("alice").unwrap();

		let allocated = c.allocate_blocks("alice", 1500).unwrap();
		assert_eq!(allocated.len(), 2); // block_size=1024, ceil(1500/1024) = 2

		let mut seen = std::collections::BTreeSet::new();
		for (block_id, replicas) in &allocated {
			assert_eq!(replicas.len(), 3);
			let unique: std::collections::BTreeSet<&String> = replicas.iter().collect();
			assert_eq!(unique.len(), 3);
			assert!(seen.insert(block_id.clone()));
		}
	}

	#[test]
	fn allocate_blocks_rejects_insufficient_workers_even_for_an_empty_file() {
		let c = coordinator_with_workers(2);
		c.login("alice").unwrap();
		assert!(matches!(
			c.allocate_blocks("alice", 0),
			Err(Error::InsufficientReplicas(_))
		));
	}

	#[test]
	fn allocate_requires_login() {
		let c = coordinator_with_workers(4);
		assert!(matches!(
			c.allocate_blocks("alice", 10),
			Err(Error::NotLoggedIn(_))
		));
	}

	#[test]
	fn rereplication_scan_finds_deficit_after_a_worker_goes_dead() {
		// T_dead=1s: register four workers, allocate a block, then let
		// the clock run past the timeout and heartbeat only three of
		// them, leaving the fourth dead without ever removing it from
		// the worker table.
		let c = Coordinator::new(3, 1024, 1);
		for i in 1..=4 {
			c.register_worker(&format!("w{}", i), vec![i as u8; 32], format!("127.0.0.1:900{}", i));
		}
		c.login("alice").unwrap();

		let allocated = c.allocate_blocks("alice", 10).unwrap();
		let (block_id, original_replicas) = allocated[0].clone();

		std::thread::sleep(std::time::Duration::from_secs(2));

		let all_workers = ["w1", "w2", "w3", "w4"];
		let dead_worker = all_workers
			.iter()
			.find(|w| original_replicas.iter().any(|r| r == *w))
			.unwrap();
		for w in all_workers.iter().filter(|w| *w != dead_worker) {
			c.heartbeat(w);
		}

		let tasks = c.scan_rereplication_candidates();
		assert_eq!(tasks.len(), 1);
		assert_eq!(tasks[0].block_id, block_id);
		assert_ne!(&tasks[0].target, dead_worker);
		assert!(!original_replicas.contains(&tasks[0].target));

		c.commit_rereplication(&tasks[0]);
		let locations = c.get_block_locations(&block_id);
		let live_now = ["w1", "w2", "w3", "w4"]
			.into_iter()
			.filter(|w| w != dead_worker)
			.filter(|w| locations.iter().any(|l| l == w))
			.count();
		assert!(live_now >= 3);
	}

	#[test]
	fn commit_rereplication_updates_location_and_held_blocks() {
		let c = coordinator_with_workers(4);
		c.login("alice").unwrap();
		let allocated = c.allocate_blocks("alice", 10).unwrap();
		let (block_id, replicas) = allocated[0].clone();

		let missing_worker = ["w1", "w2", "w3", "w4"]
			.into_iter()
			.find(|w| !replicas.iter().any(|r| r == w))
			.unwrap()
			.to_string();

		let task = RereplicationTask {
			block_id: block_id.clone(),
			source: replicas[0].clone(),
			target: missing_worker.clone(),
		};
		c.commit_rereplication(&task);

		let locations = c.get_block_locations(&block_id);
		assert!(locations.contains(&missing_worker));
		assert_eq!(locations.len(), 4);
	}

	#[test]
	fn remove_file_releases_block_locations() {
		let c = coordinator_with_workers(4);
		c.login("alice").unwrap();
		let allocated = c.allocate_blocks("alice", 10).unwrap();
		let (block_id, _) = allocated[0].clone();
		c.add_file("alice", "/a.txt", vec![block_id.clone()]).unwrap();

		c.remove_file("alice", "/a.txt").unwrap();
		assert!(c.get_block_locations(&block_id).is_empty());
	}
}
