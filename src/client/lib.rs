//! Client library: splits files into blocks, drives allocation and
//! placement through the coordinator, and pushes/pulls block payloads
//! directly to/from workers.

#[macro_use]
extern crate tracing;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dfs_rpc::helper::RpcHelper;
use dfs_rpc::{ClientOnly, CoordinatorRpc, Endpoint, NetworkNode, NodeID, NodeLocation, WorkerRpc};
use dfs_util::error::Error;

const RPC_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DfsClient {
	node: Arc<NetworkNode>,
	coordinator_id: NodeID,
	coordinator_ep: Arc<Endpoint<CoordinatorRpc, ClientOnly<CoordinatorRpc>>>,
	worker_ep: Arc<Endpoint<WorkerRpc, ClientOnly<WorkerRpc>>>,
	block_size: u64,
}

impl DfsClient {
	/// Start a local RPC node and wire it up to reach the coordinator.
	/// `coordinator_id` is the coordinator's hex-encoded public key, as
	/// configured for every worker.
	pub async fn connect(
		rpc_secret: &str,
		bind_addr: SocketAddr,
		coordinator_addr: SocketAddr,
		coordinator_id: &str,
		block_size: u64,
	) -> Result<Self, Error> {
		let node = NetworkNode::new(rpc_secret, bind_addr)?;

		let decoded = hex::decode(coordinator_id)
			.map_err(|e| Error::InvalidArgument(format!("invalid coordinator_id: {}", e)))?;
		if decoded.len() != 32 {
			return Err(Error::InvalidArgument(
				"coordinator_id must decode to exactly 32 bytes".into(),
			));
		}
		let mut buf = [0u8; 32];
		buf.copy_from_slice(&decoded);
		let coordinator_id = NodeID::from_slice(&buf).expect("node id is 32 bytes");
		node.add_peer(coordinator_id, coordinator_addr);

		let coordinator_ep = node.endpoint("dfs_coordinator/rpc.rs/CoordinatorRpc".to_string());
		coordinator_ep.set_handler(Arc::new(ClientOnly::new()));

		let worker_ep = node.endpoint("dfs_worker/rpc.rs/WorkerRpc".to_string());
		worker_ep.set_handler(Arc::new(ClientOnly::new()));

		Ok(Self {
			node,
			coordinator_id,
			coordinator_ep,
			worker_ep,
			block_size,
		})
	}

	async fn call_coordinator(&self, msg: CoordinatorRpc) -> Result<CoordinatorRpc, Error> {
		RpcHelper::call(&self.coordinator_ep, self.coordinator_id, msg, RPC_TIMEOUT).await
	}

	// ---- sessions ----

	pub async fn login(&self, username: &str) -> Result<String, Error> {
		match self
			.call_coordinator(CoordinatorRpc::Login {
				username: username.to_string(),
			})
			.await?
		{
			CoordinatorRpc::Ok => Ok("logged in".to_string()),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	pub async fn logout(&self, username: &str) -> Result<(), Error> {
		match self
			.call_coordinator(CoordinatorRpc::Logout {
				username: username.to_string(),
			})
			.await?
		{
			CoordinatorRpc::Ok => Ok(()),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	// ---- namespace ----

	pub async fn mkdir(&self, username: &str, path: &str) -> Result<(), Error> {
		self.simple_namespace_call(CoordinatorRpc::Mkdir {
			username: username.to_string(),
			path: path.to_string(),
		})
		.await
	}

	pub async fn rmdir(&self, username: &str, path: &str) -> Result<(), Error> {
		self.simple_namespace_call(CoordinatorRpc::Rmdir {
			username: username.to_string(),
			path: path.to_string(),
		})
		.await
	}

	pub async fn rm(&self, username: &str, path: &str) -> Result<(), Error> {
		self.simple_namespace_call(CoordinatorRpc::Rm {
			username: username.to_string(),
			path: path.to_string(),
		})
		.await
	}

	async fn simple_namespace_call(&self, msg: CoordinatorRpc) -> Result<(), Error> {
		match self.call_coordinator(msg).await? {
			CoordinatorRpc::Ok => Ok(()),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	pub async fn ls(&self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		match self
			.call_coordinator(CoordinatorRpc::Ls {
				username: username.to_string(),
				path: path.to_string(),
			})
			.await?
		{
			CoordinatorRpc::LsReply { entries } => Ok(entries),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	pub async fn mv(&self, username: &str, src: &str, dst: &str) -> Result<String, Error> {
		match self
			.call_coordinator(CoordinatorRpc::Mv {
				username: username.to_string(),
				src: src.to_string(),
				dst: dst.to_string(),
			})
			.await?
		{
			CoordinatorRpc::MvReply { final_path } => Ok(final_path),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	// ---- data path ----

	/// Splits `local_file` into ≤ `block_size` chunks, allocates a block ID
	/// and placement for each, stores each chunk on its primary (which
	/// fans out to the secondaries), then binds the block list to
	/// `dfs_path`.
	pub async fn put(&self, username: &str, local_file: &Path, dfs_path: &str) -> Result<(), Error> {
		let data = tokio::fs::read(local_file).await?;

		let allocated = match self
			.call_coordinator(CoordinatorRpc::AllocateBlocks {
				username: username.to_string(),
				file_size: data.len() as u64,
			})
			.await?
		{
			CoordinatorRpc::AllocateBlocksReply { block_ids, locations } => (block_ids, locations),
			CoordinatorRpc::Error(e) => return Err(Error::message(e)),
			other => return Err(Error::unexpected_rpc_message(other)),
		};
		let (block_ids, locations) = allocated;

		for (i, block_id) in block_ids.iter().enumerate() {
			let start = i * self.block_size as usize;
			let end = std::cmp::min(start + self.block_size as usize, data.len());
			let chunk = &data[start..end];

			let replicas = locations.get(i).cloned().unwrap_or_default();
			let primary = replicas
				.first()
				.ok_or_else(|| Error::InsufficientReplicas(format!("block '{}' has no placement", block_id)))?
				.clone();
			let secondaries = replicas[1..].to_vec();

			self.store_block(&primary, block_id, chunk, secondaries).await?;
		}

		match self
			.call_coordinator(CoordinatorRpc::AddFile {
				username: username.to_string(),
				path: dfs_path.to_string(),
				block_ids,
			})
			.await?
		{
			CoordinatorRpc::Ok => Ok(()),
			CoordinatorRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	async fn store_block(
		&self,
		primary: &NodeLocation,
		block_id: &str,
		data: &[u8],
		secondaries: Vec<NodeLocation>,
	) -> Result<(), Error> {
		let primary_id = primary.node_id()?;
		self.node.add_peer(primary_id, primary.addr);

		match RpcHelper::call(
			&self.worker_ep,
			primary_id,
			WorkerRpc::StoreBlock {
				block_id: block_id.to_string(),
				data: data.to_vec(),
				replica_nodes: secondaries,
			},
			RPC_TIMEOUT,
		)
		.await?
		{
			WorkerRpc::Ok => Ok(()),
			WorkerRpc::Error(e) => Err(Error::message(e)),
			other => Err(Error::unexpected_rpc_message(other)),
		}
	}

	/// Fetches `dfs_path`'s block list, reads each block from the first
	/// replica that answers, and writes the concatenation to `local_out`.
	pub async fn get(&self, username: &str, dfs_path: &str, local_out: &Path) -> Result<(), Error> {
		let block_ids = match self
			.call_coordinator(CoordinatorRpc::GetFileBlocks {
				username: username.to_string(),
				path: dfs_path.to_string(),
			})
			.await?
		{
			CoordinatorRpc::GetFileBlocksReply { block_ids } => block_ids,
			CoordinatorRpc::Error(e) => return Err(Error::message(e)),
			other => return Err(Error::unexpected_rpc_message(other)),
		};

		let mut out = Vec::new();
		for block_id in block_ids {
			let locations = match self
				.call_coordinator(CoordinatorRpc::GetBlockLocations {
					block_id: block_id.clone(),
				})
				.await?
			{
				CoordinatorRpc::GetBlockLocationsReply { locations } => locations,
				CoordinatorRpc::Error(e) => return Err(Error::message(e)),
				other => return Err(Error::unexpected_rpc_message(other)),
			};

			let data = self.fetch_block(&block_id, &locations).await?;
			out.extend_from_slice(&data);
		}

		tokio::fs::write(local_out, out).await?;
		Ok(())
	}

	async fn fetch_block(&self, block_id: &str, locations: &[NodeLocation]) -> Result<Vec<u8>, Error> {
		for location in locations {
			let id = match location.node_id() {
				Ok(id) => id,
				Err(_) => continue,
			};
			self.node.add_peer(id, location.addr);

			let reply = RpcHelper::call(
				&self.worker_ep,
				id,
				WorkerRpc::GetBlock {
					block_id: block_id.to_string(),
				},
				RPC_TIMEOUT,
			)
			.await;

			match reply {
				Ok(WorkerRpc::BlockData { data }) => return Ok(data),
				Ok(WorkerRpc::Error(e)) => {
					warn!("worker '{}' could not serve block '{}': {}", location.worker_id, block_id, e)
				}
				Ok(_) | Err(_) => warn!("worker '{}' is unavailable for block '{}'", location.worker_id, block_id),
			}
		}
		Err(Error::Unavailable(format!(
			"no live replica answered for block '{}'",
			block_id
		)))
	}
}
