//! Periodic `Heartbeat` RPC to the coordinator. Grounded on the
//! coordinator's `RereplicationWorker`: a [`Worker`] that sleeps between
//! passes and does one unit of work per `work()` call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use dfs_rpc::helper::RpcHelper;
use dfs_rpc::{ClientOnly, CoordinatorRpc, Endpoint, NetworkNode, NodeID, NodeLocation};
use dfs_util::background::worker::{Worker, WorkerStatus};
use dfs_util::error::Error;

/// One-shot `RegisterWorker` call made at startup, before the recurring
/// heartbeat worker is spawned. Creates (or reuses) the same client-only
/// endpoint the heartbeat worker itself uses.
pub async fn register_with_coordinator(
	node: &Arc<NetworkNode>,
	coordinator_id: NodeID,
	location: NodeLocation,
) -> Result<(), Error> {
	let endpoint = node.endpoint("dfs_coordinator/rpc.rs/CoordinatorRpc".to_string());
	endpoint.set_handler(Arc::new(ClientOnly::new()));

	let reply = RpcHelper::call(
		&endpoint,
		coordinator_id,
		CoordinatorRpc::RegisterWorker { location },
		Duration::from_secs(10),
	)
	.await?;

	match reply {
		CoordinatorRpc::Ok => Ok(()),
		CoordinatorRpc::Error(e) => Err(Error::message(e)),
		other => Err(Error::unexpected_rpc_message(other)),
	}
}

pub struct HeartbeatWorker {
	worker_id: String,
	coordinator_id: NodeID,
	endpoint: Arc<Endpoint<CoordinatorRpc, ClientOnly<CoordinatorRpc>>>,
	interval: Duration,
}

impl HeartbeatWorker {
	pub fn new(node: &Arc<NetworkNode>, worker_id: String, coordinator_id: NodeID, interval_secs: u64) -> Self {
		let endpoint = node.endpoint("dfs_coordinator/rpc.rs/CoordinatorRpc".to_string());
		endpoint.set_handler(Arc::new(ClientOnly::new()));
		Self {
			worker_id,
			coordinator_id,
			endpoint,
			interval: Duration::from_secs(interval_secs),
		}
	}

	async fn send_heartbeat(&self) {
		let sent = RpcHelper::call(
			&self.endpoint,
			self.coordinator_id,
			CoordinatorRpc::Heartbeat {
				worker_id: self.worker_id.clone(),
			},
			Duration::from_secs(10),
		)
		.await;

		if let Err(e) = sent {
			warn!("heartbeat to coordinator failed: {}", e);
		}
	}
}

#[async_trait]
impl Worker for HeartbeatWorker {
	fn name(&self) -> String {
		"heartbeat".into()
	}

	async fn work(&mut self, _must_exit: &mut watch::Receiver<bool>) -> Result<WorkerStatus, Error> {
		self.send_heartbeat().await;
		Ok(WorkerStatus::Idle)
	}

	async fn wait_for_work(&mut self, must_exit: &watch::Receiver<bool>) -> WorkerStatus {
		let mut must_exit = must_exit.clone();
		tokio::select! {
			_ = tokio::time::sleep(self.interval) => WorkerStatus::Busy,
			_ = must_exit.changed() => WorkerStatus::Done,
		}
	}
}
