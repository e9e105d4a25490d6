use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use dfs_model::Coordinator;
use dfs_rpc::{CoordinatorRpc, Endpoint, EndpointHandler, NetworkNode, NodeID, NodeLocation};
use dfs_util::error::Error;

/// Binds a [`Coordinator`] to the `CoordinatorRpc` endpoint. Mirrors the
/// teacher's `K2VRpcHandler`: a thin dispatcher over `handle_*` methods
/// that do the actual work, registered once against the node's `NetApp`.
pub struct CoordinatorRpcHandler {
	coordinator: Arc<Coordinator>,
	pub endpoint: Arc<Endpoint<CoordinatorRpc, Self>>,
}

impl CoordinatorRpcHandler {
	pub fn new(node: &Arc<NetworkNode>, coordinator: Arc<Coordinator>) -> Arc<Self> {
		let endpoint = node.endpoint("dfs_coordinator/rpc.rs/CoordinatorRpc".to_string());

		let handler = Arc::new(Self {
			coordinator,
			endpoint,
		});
		handler.endpoint.set_handler(handler.clone());
		handler
	}

	fn handle_login(&self, username: &str) -> CoordinatorRpc {
		match self.coordinator.login(username) {
			Ok(_) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_logout(&self, username: &str) -> CoordinatorRpc {
		match self.coordinator.logout(username) {
			Ok(_) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_register_worker(&self, location: &NodeLocation) -> CoordinatorRpc {
		self.coordinator.register_worker(
			&location.worker_id,
			location.node_id.clone(),
			format!("{}", location.addr),
		);
		CoordinatorRpc::Ok
	}

	fn handle_heartbeat(&self, worker_id: &str) -> CoordinatorRpc {
		self.coordinator.heartbeat(worker_id);
		CoordinatorRpc::Ok
	}

	fn handle_mkdir(&self, username: &str, path: &str) -> CoordinatorRpc {
		match self.coordinator.mkdir(username, path) {
			Ok(()) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_rmdir(&self, username: &str, path: &str) -> CoordinatorRpc {
		match self.coordinator.rmdir(username, path) {
			Ok(()) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_ls(&self, username: &str, path: &str) -> CoordinatorRpc {
		match self.coordinator.ls(username, path) {
			Ok(entries) => CoordinatorRpc::LsReply { entries },
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_allocate_blocks(&self, username: &str, file_size: u64) -> CoordinatorRpc {
		match self.coordinator.allocate_blocks(username, file_size) {
			Ok(allocated) => {
				let mut block_ids = Vec::with_capacity(allocated.len());
				let mut locations = Vec::with_capacity(allocated.len());
				for (block_id, replicas) in allocated {
					let resolved = replicas
						.into_iter()
						.map(|worker_id| self.resolve_location(worker_id))
						.collect();
					block_ids.push(block_id);
					locations.push(resolved);
				}
				CoordinatorRpc::AllocateBlocksReply { block_ids, locations }
			}
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_add_file(&self, username: &str, path: &str, block_ids: Vec<String>) -> CoordinatorRpc {
		match self.coordinator.add_file(username, path, block_ids) {
			Ok(_) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_get_file_blocks(&self, username: &str, path: &str) -> CoordinatorRpc {
		match self.coordinator.get_file_blocks(username, path) {
			Ok(block_ids) => CoordinatorRpc::GetFileBlocksReply { block_ids },
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_get_block_locations(&self, block_id: &str) -> CoordinatorRpc {
		let worker_ids = self.coordinator.get_block_locations(block_id);
		let locations = worker_ids
			.into_iter()
			.map(|worker_id| self.resolve_location(worker_id))
			.collect();
		CoordinatorRpc::GetBlockLocationsReply { locations }
	}

	/// Looks up a worker's last-reported node id / address. Falls back to an
	/// unreachable placeholder if the worker was never registered, which
	/// should not happen since ids only come from `block_locations`.
	fn resolve_location(&self, worker_id: String) -> NodeLocation {
		let (node_id, addr) = self.coordinator.worker_location(&worker_id).unwrap_or_default();
		let addr = addr.parse::<SocketAddr>().unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap());
		NodeLocation {
			worker_id,
			node_id,
			addr,
		}
	}

	fn handle_rm(&self, username: &str, path: &str) -> CoordinatorRpc {
		match self.coordinator.remove_file(username, path) {
			Ok(()) => CoordinatorRpc::Ok,
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}

	fn handle_mv(&self, username: &str, src: &str, dst: &str) -> CoordinatorRpc {
		match self.coordinator.mv(username, src, dst) {
			Ok(final_path) => CoordinatorRpc::MvReply { final_path },
			Err(e) => CoordinatorRpc::Error(e.as_message()),
		}
	}
}

#[async_trait]
impl EndpointHandler<CoordinatorRpc> for CoordinatorRpcHandler {
	async fn handle(self: &Arc<Self>, message: &CoordinatorRpc, _from: NodeID) -> CoordinatorRpc {
		match message {
			CoordinatorRpc::Login { username } => self.handle_login(username),
			CoordinatorRpc::Logout { username } => self.handle_logout(username),
			CoordinatorRpc::RegisterWorker { location } => self.handle_register_worker(location),
			CoordinatorRpc::Heartbeat { worker_id } => self.handle_heartbeat(worker_id),
			CoordinatorRpc::Mkdir { username, path } => self.handle_mkdir(username, path),
			CoordinatorRpc::Rmdir { username, path } => self.handle_rmdir(username, path),
			CoordinatorRpc::Ls { username, path } => self.handle_ls(username, path),
			CoordinatorRpc::AllocateBlocks { username, file_size } => {
				self.handle_allocate_blocks(username, *file_size)
			}
			CoordinatorRpc::AddFile {
				username,
				path,
				block_ids,
			} => self.handle_add_file(username, path, block_ids.clone()),
			CoordinatorRpc::GetFileBlocks { username, path } => self.handle_get_file_blocks(username, path),
			CoordinatorRpc::GetBlockLocations { block_id } => self.handle_get_block_locations(block_id),
			CoordinatorRpc::Rm { username, path } => self.handle_rm(username, path),
			CoordinatorRpc::Mv { username, src, dst } => self.handle_mv(username, src, dst),
			m => CoordinatorRpc::Error(Error::unexpected_rpc_message(m).to_string()),
		}
	}
}
