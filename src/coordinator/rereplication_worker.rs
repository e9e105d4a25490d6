use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use dfs_model::Coordinator;
use dfs_rpc::helper::{RequestStrategy, RpcHelper};
use dfs_rpc::{ClientOnly, Endpoint, NetworkNode, NodeID, NodeLocation, WorkerRpc};
use dfs_util::background::worker::{Worker, WorkerStatus};
use dfs_util::error::Error;

/// Runs the re-replication scan every `scan_interval`. Grounded on the
/// teacher's `RepairWorker`/`ScrubWorker`: a `Worker` that sleeps between
/// passes and does one unit of work (one scan) per `work()` call.
pub struct RereplicationWorker {
	coordinator: Arc<Coordinator>,
	node: Arc<NetworkNode>,
	worker_endpoint: Arc<Endpoint<WorkerRpc, ClientOnly<WorkerRpc>>>,
	scan_interval: Duration,
}

impl RereplicationWorker {
	pub fn new(coordinator: Arc<Coordinator>, node: Arc<NetworkNode>, scan_interval_secs: u64) -> Self {
		let worker_endpoint = node.endpoint("dfs_worker/rpc.rs/WorkerRpc".to_string());
		worker_endpoint.set_handler(Arc::new(ClientOnly::new()));
		Self {
			coordinator,
			node,
			worker_endpoint,
			scan_interval: Duration::from_secs(scan_interval_secs),
		}
	}

	fn resolve(&self, worker_id: &str) -> Option<(NodeID, SocketAddr)> {
		let (node_id, addr) = self.coordinator.worker_location(worker_id)?;
		let addr: SocketAddr = addr.parse().ok()?;
		let location = NodeLocation {
			worker_id: worker_id.to_string(),
			node_id,
			addr,
		};
		let id = RpcHelper::register(&self.node.netapp, &location).ok()?;
		Some((id, addr))
	}

	async fn run_one_scan(&self) -> Result<(), Error> {
		let tasks = self.coordinator.scan_rereplication_candidates();
		if tasks.is_empty() {
			return Ok(());
		}
		debug!("re-replication scan found {} block(s) to repair", tasks.len());

		for task in tasks {
			let (source_id, _) = match self.resolve(&task.source) {
				Some(v) => v,
				None => {
					warn!("re-replication: worker '{}' has no known address", task.source);
					continue;
				}
			};
			let (target_id, _) = match self.resolve(&task.target) {
				Some(v) => v,
				None => {
					warn!("re-replication: worker '{}' has no known address", task.target);
					continue;
				}
			};

			let fetched = RpcHelper::call(
				&self.worker_endpoint,
				source_id,
				WorkerRpc::GetBlock {
					block_id: task.block_id.clone(),
				},
				Duration::from_secs(30),
			)
			.await;

			let data = match fetched {
				Ok(WorkerRpc::BlockData { data }) => data,
				Ok(_) | Err(_) => {
					warn!(
						"re-replication: could not fetch block '{}' from source '{}'",
						task.block_id, task.source
					);
					continue;
				}
			};

			let stored = RpcHelper::try_call_many(
				&self.worker_endpoint,
				&[target_id],
				WorkerRpc::StoreBlock {
					block_id: task.block_id.clone(),
					data,
					replica_nodes: vec![],
				},
				RequestStrategy::with_quorum(1),
			)
			.await;

			match stored {
				Ok(_) => self.coordinator.commit_rereplication(&task),
				Err(e) => warn!(
					"re-replication: failed to store block '{}' on '{}': {}",
					task.block_id, task.target, e
				),
			}
		}

		Ok(())
	}
}

#[async_trait]
impl Worker for RereplicationWorker {
	fn name(&self) -> String {
		"re-replication scan".into()
	}

	async fn work(&mut self, _must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		self.run_one_scan().await?;
		Ok(WorkerStatus::Idle)
	}

	async fn wait_for_work(&mut self, must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		let mut must_exit = must_exit.clone();
		tokio::select! {
			_ = tokio::time::sleep(self.scan_interval) => WorkerStatus::Busy,
			_ = must_exit.changed() => WorkerStatus::Done,
		}
	}
}
