//! Configuration file types for the coordinator and worker binaries.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

/// Configuration for the coordinator (metadata node).
#[derive(Deserialize, Debug, Clone)]
pub struct CoordinatorConfig {
	/// Address to bind the coordinator RPC endpoint on.
	pub rpc_bind_addr: SocketAddr,
	/// Address workers and clients should use to reach this coordinator.
	pub rpc_public_addr: SocketAddr,

	/// Shared secret used to authenticate the RPC network, hex encoded.
	pub rpc_secret: String,

	/// Desired number of live replicas per block.
	#[serde(default = "default_replication_factor")]
	pub replication_factor: usize,

	/// Maximum block size, in bytes.
	#[serde(default = "default_block_size")]
	pub block_size: usize,

	/// Seconds since the last heartbeat after which a worker is no
	/// longer considered live.
	#[serde(default = "default_dead_timeout_secs")]
	pub dead_timeout_secs: u64,

	/// Interval, in seconds, between re-replication scans.
	#[serde(default = "default_scan_interval_secs")]
	pub scan_interval_secs: u64,
}

fn default_replication_factor() -> usize {
	3
}
fn default_block_size() -> usize {
	64 * 1024 * 1024
}
fn default_dead_timeout_secs() -> u64 {
	30
}
fn default_scan_interval_secs() -> u64 {
	10
}

/// Configuration for a worker (storage node).
#[derive(Deserialize, Debug, Clone)]
pub struct WorkerConfig {
	/// This worker's identity, e.g. `worker1`. Assigned by the deployment,
	/// not derived from the bind address.
	pub worker_id: String,

	/// Address to bind the worker RPC endpoint on.
	pub rpc_bind_addr: SocketAddr,
	/// Address the coordinator and clients should use to reach this worker.
	pub rpc_public_addr: SocketAddr,

	/// Shared secret for the RPC network, hex encoded. Must match the
	/// coordinator's.
	pub rpc_secret: String,

	/// Address of the coordinator's RPC endpoint.
	pub coordinator_addr: SocketAddr,
	/// The coordinator's node ID, hex encoded public key.
	pub coordinator_id: String,

	/// Directory in which block files are stored.
	pub data_dir: PathBuf,

	/// Interval, in seconds, between heartbeats sent to the coordinator.
	#[serde(default = "default_heartbeat_interval_secs")]
	pub heartbeat_interval_secs: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
	5
}

/// Configuration for the interactive client shell.
#[derive(Deserialize, Debug, Clone)]
pub struct ClientConfig {
	/// Address to bind this client's own RPC endpoint on.
	pub rpc_bind_addr: SocketAddr,

	/// Shared secret for the RPC network, hex encoded. Must match the
	/// coordinator's.
	pub rpc_secret: String,

	/// Address of the coordinator's RPC endpoint.
	pub coordinator_addr: SocketAddr,
	/// The coordinator's node ID, hex encoded public key.
	pub coordinator_id: String,

	/// Maximum block size, in bytes. Must match the coordinator's.
	#[serde(default = "default_block_size")]
	pub block_size: usize,
}

/// Read and parse a TOML configuration file.
pub fn read_config<T: serde::de::DeserializeOwned>(path: PathBuf) -> Result<T, Error> {
	let mut file = std::fs::OpenOptions::new().read(true).open(path.as_path())?;

	let mut contents = String::new();
	file.read_to_string(&mut contents)?;

	Ok(toml::from_str(&contents)?)
}
