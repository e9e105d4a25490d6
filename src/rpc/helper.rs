//! Fans a request out to several nodes and waits for a quorum of
//! successful replies, without the ring-aware request ordering a full
//! peer-to-peer store needs.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use netapp::endpoint::{Endpoint, EndpointHandler};
use netapp::message::Message as Rpc;
use netapp::NodeID;

use dfs_util::error::Error;

use crate::NodeLocation;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning knobs for a fan-out call. There is no priority queue here (the
/// teacher's `PRIO_NORMAL`/`PRIO_SECONDARY` scheme doesn't apply: every RPC
/// in this protocol is equally urgent), only a quorum and a timeout.
#[derive(Debug, Clone, Copy)]
pub struct RequestStrategy {
	quorum: usize,
	timeout: Duration,
}

impl RequestStrategy {
	pub fn with_quorum(quorum: usize) -> Self {
		Self {
			quorum,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}
}

pub struct RpcHelper;

impl RpcHelper {
	/// Call a single node and wait for its reply.
	pub async fn call<M, H>(
		endpoint: &Arc<Endpoint<M, H>>,
		to: NodeID,
		msg: M,
		timeout: Duration,
	) -> Result<M, Error>
	where
		M: Rpc<Response = M>,
		H: EndpointHandler<M>,
	{
		tokio::time::timeout(timeout, endpoint.call(&to, msg, netapp::proto::PRIO_NORMAL))
			.await
			.map_err(|_| Error::Unavailable(format!("node {:?} timed out", to)))?
			.map_err(|e| Error::Unavailable(format!("node {:?}: {}", to, e)))
	}

	/// Call several nodes concurrently, returning as soon as `quorum` of
	/// them have replied successfully. Remaining in-flight calls are left
	/// to complete or fail in the background rather than being awaited.
	pub async fn try_call_many<M, H>(
		endpoint: &Arc<Endpoint<M, H>>,
		to: &[NodeID],
		msg: M,
		strategy: RequestStrategy,
	) -> Result<Vec<M>, Error>
	where
		M: Rpc<Response = M> + Clone,
		H: EndpointHandler<M>,
	{
		if to.is_empty() {
			return Ok(vec![]);
		}

		let mut futs = to
			.iter()
			.copied()
			.map(|node| {
				let msg = msg.clone();
				let endpoint = endpoint.clone();
				async move { Self::call(&endpoint, node, msg, strategy.timeout).await }
			})
			.collect::<FuturesUnordered<_>>();

		let mut ok = Vec::new();
		let mut errs = Vec::new();
		while let Some(res) = futs.next().await {
			match res {
				Ok(r) => {
					ok.push(r);
					if ok.len() >= strategy.quorum {
						break;
					}
				}
				Err(e) => errs.push(e),
			}
		}

		if ok.len() < strategy.quorum {
			return Err(Error::Unavailable(format!(
				"only {}/{} required replicas responded ({:?})",
				ok.len(),
				strategy.quorum,
				errs
			)));
		}

		Ok(ok)
	}

	/// Resolve a [`NodeLocation`] into a `NodeID`, registering it as a
	/// dialable peer on `netapp` if it wasn't already known.
	pub fn register(netapp: &Arc<netapp::NetApp>, location: &NodeLocation) -> Result<NodeID, Error> {
		let id = location.node_id()?;
		netapp.clone().add_peer_info(id, location.addr);
		Ok(id)
	}
}
