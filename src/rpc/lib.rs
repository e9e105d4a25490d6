//! RPC protocol definitions and network node plumbing shared by the
//! coordinator, the workers and the client.
//!
//! This deliberately does not reuse the cluster membership / gossip /
//! consistent-hashing ring machinery of a peer-to-peer store: the
//! coordinator is a single authority and already tracks worker liveness
//! via heartbeats, so only netapp's raw transport (`NetApp`, `Endpoint`,
//! `NodeID`) is used here, not a `System`-style ring.

#[macro_use]
extern crate tracing;

pub mod helper;

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use netapp::endpoint::{Endpoint, EndpointHandler, StreamingEndpointHandler};
pub use netapp::message::{Message, Req, Resp};
pub use netapp::{NetApp, NodeID};

use dfs_util::error::Error;

pub use helper::{RequestStrategy, RpcHelper};

/// Where a worker can be reached: its logical identity, its node key on
/// the RPC network, and the socket address it listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeLocation {
	pub worker_id: String,
	#[serde(with = "hex::serde")]
	pub node_id: Vec<u8>,
	pub addr: SocketAddr,
}

impl NodeLocation {
	pub fn node_id(&self) -> Result<NodeID, Error> {
		if self.node_id.len() != 32 {
			return Err(Error::InvalidArgument(format!(
				"malformed node id for worker {}",
				self.worker_id
			)));
		}
		let mut buf = [0u8; 32];
		buf.copy_from_slice(&self.node_id);
		Ok(NodeID::from_slice(&buf).expect("node id is 32 bytes"))
	}
}

/// Thin wrapper around a netapp transport: owns the `NetApp` instance and
/// knows how to dial a known peer before issuing RPCs to it.
pub struct NetworkNode {
	pub netapp: Arc<NetApp>,
	pub id: NodeID,
}

impl NetworkNode {
	/// Start listening for RPCs on `bind_addr`, identified by a keypair
	/// derived from a hex-encoded `rpc_secret` shared by every node in the
	/// deployment.
	pub fn new(rpc_secret: &str, bind_addr: SocketAddr) -> Result<Arc<Self>, Error> {
		let mut network_key = [0u8; 32];
		let decoded = hex::decode(rpc_secret)
			.map_err(|e| Error::InvalidArgument(format!("invalid rpc_secret: {}", e)))?;
		if decoded.len() != 32 {
			return Err(Error::InvalidArgument(
				"rpc_secret must decode to exactly 32 bytes".into(),
			));
		}
		network_key.copy_from_slice(&decoded);

		let (pubkey, privkey) = sodiumoxide::crypto::sign::ed25519::gen_keypair();
		let id = NodeID::from_slice(&pubkey[..]).expect("ed25519 public key is 32 bytes");

		let netapp = NetApp::new(network_key, privkey);

		let netapp2 = netapp.clone();
		tokio::spawn(async move {
			netapp2.listen(bind_addr, None, None).await;
		});

		Ok(Arc::new(Self { netapp, id }))
	}

	/// Register a remote peer so it can be dialed by `NodeID`.
	pub fn add_peer(&self, node_id: NodeID, addr: SocketAddr) {
		self.netapp.clone().add_peer_info(node_id, addr);
	}

	pub fn endpoint<M, H>(&self, path: String) -> Arc<Endpoint<M, H>>
	where
		M: Message,
		H: EndpointHandler<M>,
	{
		self.netapp.endpoint(path)
	}
}

/// Messages the coordinator answers. Each variant pairs a request with the
/// response carried back in the same enum, one type per RPC round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorRpc {
	Ok,
	Error(String),

	Login {
		username: String,
	},
	Logout {
		username: String,
	},

	RegisterWorker {
		location: NodeLocation,
	},
	Heartbeat {
		worker_id: String,
	},

	Mkdir {
		username: String,
		path: String,
	},
	Rmdir {
		username: String,
		path: String,
	},
	Ls {
		username: String,
		path: String,
	},
	LsReply {
		entries: Vec<String>,
	},

	AllocateBlocks {
		username: String,
		file_size: u64,
	},
	AllocateBlocksReply {
		block_ids: Vec<String>,
		locations: Vec<Vec<NodeLocation>>,
	},

	AddFile {
		username: String,
		path: String,
		block_ids: Vec<String>,
	},

	GetFileBlocks {
		username: String,
		path: String,
	},
	GetFileBlocksReply {
		block_ids: Vec<String>,
	},

	GetBlockLocations {
		block_id: String,
	},
	GetBlockLocationsReply {
		locations: Vec<NodeLocation>,
	},

	Rm {
		username: String,
		path: String,
	},
	Mv {
		username: String,
		src: String,
		dst: String,
	},
	MvReply {
		final_path: String,
	},
}

impl Message for CoordinatorRpc {
	type Response = CoordinatorRpc;
}

/// Messages exchanged between clients/coordinator and workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerRpc {
	Ok,
	Error(String),

	/// Store a block. `replica_nodes` lists the remaining secondaries the
	/// *primary* must still forward to; a non-primary receiving this
	/// always sees an empty list (single hop, no further fan-out).
	StoreBlock {
		block_id: String,
		data: Vec<u8>,
		replica_nodes: Vec<NodeLocation>,
	},

	GetBlock {
		block_id: String,
	},
	BlockData {
		data: Vec<u8>,
	},
}

impl Message for WorkerRpc {
	type Response = WorkerRpc;
}

/// An RPC enum that carries its own `Error(String)` reply variant, so a
/// generic client-only stub can be built for it.
pub trait RpcMessage: Message<Response = Self> + std::fmt::Debug + Send + Sync + 'static {
	fn error(msg: String) -> Self;
}

impl RpcMessage for CoordinatorRpc {
	fn error(msg: String) -> Self {
		CoordinatorRpc::Error(msg)
	}
}

impl RpcMessage for WorkerRpc {
	fn error(msg: String) -> Self {
		WorkerRpc::Error(msg)
	}
}

/// Handler for an endpoint this node only ever calls, never answers.
/// netapp requires a handler to be registered before an endpoint exists at
/// all, even on a node that is purely a client of that protocol; `handle`
/// here should be unreachable in practice.
pub struct ClientOnly<M>(std::marker::PhantomData<M>);

impl<M> ClientOnly<M> {
	pub fn new() -> Self {
		Self(std::marker::PhantomData)
	}
}

impl<M> Default for ClientOnly<M> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait::async_trait]
impl<M: RpcMessage> EndpointHandler<M> for ClientOnly<M> {
	async fn handle(self: &Arc<Self>, message: &M, _from: NodeID) -> M {
		M::error(format!("this node does not serve this protocol ({:?})", message))
	}
}
