//! Binds a [`BlockStore`] to the `WorkerRpc` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dfs_rpc::helper::RpcHelper;
use dfs_rpc::{Endpoint, EndpointHandler, NetworkNode, NodeID, NodeLocation, WorkerRpc};
use dfs_util::error::Error;

use crate::block_store::BlockStore;

pub struct WorkerRpcHandler {
	block_store: Arc<BlockStore>,
	node: Arc<NetworkNode>,
	pub endpoint: Arc<Endpoint<WorkerRpc, Self>>,
}

impl WorkerRpcHandler {
	pub fn new(node: &Arc<NetworkNode>, block_store: Arc<BlockStore>) -> Arc<Self> {
		let endpoint = node.endpoint("dfs_worker/rpc.rs/WorkerRpc".to_string());

		let handler = Arc::new(Self {
			block_store,
			node: node.clone(),
			endpoint,
		});
		handler.endpoint.set_handler(handler.clone());
		handler
	}

	/// Store locally, then — if we are the primary — forward to each
	/// secondary in turn with an empty replica list, so the fan-out never
	/// goes more than one hop. A secondary's forward failure is logged
	/// and otherwise ignored: the re-replication scan will catch the
	/// resulting deficit on its next pass.
	async fn handle_store_block(&self, block_id: &str, data: &[u8], replica_nodes: &[NodeLocation]) -> WorkerRpc {
		if let Err(e) = self.block_store.store_block(block_id, data).await {
			return WorkerRpc::Error(e.as_message());
		}

		for secondary in replica_nodes {
			let id = match secondary.node_id() {
				Ok(id) => id,
				Err(e) => {
					warn!("re-replication forward: {}", e);
					continue;
				}
			};
			self.node.add_peer(id, secondary.addr);

			let forwarded = RpcHelper::call(
				&self.endpoint,
				id,
				WorkerRpc::StoreBlock {
					block_id: block_id.to_string(),
					data: data.to_vec(),
					replica_nodes: vec![],
				},
				Duration::from_secs(30),
			)
			.await;

			if let Err(e) = forwarded {
				warn!(
					"failed to forward block '{}' to worker '{}': {}",
					block_id, secondary.worker_id, e
				);
			}
		}

		WorkerRpc::Ok
	}

	async fn handle_get_block(&self, block_id: &str) -> WorkerRpc {
		match self.block_store.get_block(block_id).await {
			Ok(data) => WorkerRpc::BlockData { data },
			Err(e) => WorkerRpc::Error(e.as_message()),
		}
	}
}

#[async_trait]
impl EndpointHandler<WorkerRpc> for WorkerRpcHandler {
	async fn handle(self: &Arc<Self>, message: &WorkerRpc, _from: NodeID) -> WorkerRpc {
		match message {
			WorkerRpc::StoreBlock {
				block_id,
				data,
				replica_nodes,
			} => self.handle_store_block(block_id, data, replica_nodes).await,
			WorkerRpc::GetBlock { block_id } => self.handle_get_block(block_id).await,
			m => WorkerRpc::Error(Error::unexpected_rpc_message(m).to_string()),
		}
	}
}
