#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;
use tokio::sync::watch;

use dfs_rpc::{NetworkNode, NodeID, NodeLocation};
use dfs_util::background::BackgroundRunner;
use dfs_util::config::{read_config, WorkerConfig};
use dfs_util::error::Error;
use dfs_worker::{heartbeat_worker, BlockStore, HeartbeatWorker, WorkerRpcHandler};

#[derive(StructOpt, Debug)]
#[structopt(name = "dfs-worker")]
struct Opt {
	/// Configuration file
	#[structopt(short = "c", long = "config", default_value = "./worker.toml")]
	config_file: PathBuf,
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt::Subscriber::builder()
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	let opt = Opt::from_args();
	if let Err(e) = run(opt.config_file).await {
		error!("Worker exited with error: {}", e);
		std::process::exit(1);
	}
}

async fn run(config_file: PathBuf) -> Result<(), Error> {
	info!("Loading configuration...");
	let config: WorkerConfig = read_config(config_file)?;

	info!("Starting RPC network node on {}...", config.rpc_bind_addr);
	let node = NetworkNode::new(&config.rpc_secret, config.rpc_bind_addr)?;

	let coordinator_id = decode_node_id(&config.coordinator_id)?;
	node.add_peer(coordinator_id, config.coordinator_addr);

	info!("Opening block store at {}...", config.data_dir.display());
	let block_store = Arc::new(BlockStore::new(config.data_dir.clone()).await?);
	let _rpc_handler = WorkerRpcHandler::new(&node, block_store);

	info!("Registering with coordinator...");
	heartbeat_worker::register_with_coordinator(
		&node,
		coordinator_id,
		NodeLocation {
			worker_id: config.worker_id.clone(),
			node_id: node.id.as_ref().to_vec(),
			addr: config.rpc_public_addr,
		},
	)
	.await?;

	let watch_cancel = watch_shutdown_signal();
	let (background, await_background_done) = BackgroundRunner::new(watch_cancel.clone());

	background.spawn_worker(HeartbeatWorker::new(
		&node,
		config.worker_id.clone(),
		coordinator_id,
		config.heartbeat_interval_secs,
	));

	wait_for_shutdown(watch_cancel).await;

	node.netapp.drop_all_handlers();
	await_background_done.await.map_err(|e| Error::Message(e.to_string()))?;
	info!("Worker shut down cleanly.");

	Ok(())
}

fn decode_node_id(hex_id: &str) -> Result<NodeID, Error> {
	let decoded = hex::decode(hex_id).map_err(|e| Error::InvalidArgument(format!("invalid coordinator_id: {}", e)))?;
	if decoded.len() != 32 {
		return Err(Error::InvalidArgument(
			"coordinator_id must decode to exactly 32 bytes".into(),
		));
	}
	let mut buf = [0u8; 32];
	buf.copy_from_slice(&decoded);
	Ok(NodeID::from_slice(&buf).expect("node id is 32 bytes"))
}

async fn wait_for_shutdown(mut chan: watch::Receiver<bool>) {
	while !*chan.borrow() {
		if chan.changed().await.is_err() {
			return;
		}
	}
}

#[cfg(unix)]
fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::unix::*;

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
		let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
		tokio::select! {
			_ = sigint.recv() => info!("Received SIGINT, shutting down."),
			_ = sigterm.recv() => info!("Received SIGTERM, shutting down."),
		}
		send_cancel.send(true).unwrap();
	});
	watch_cancel
}

#[cfg(windows)]
fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::windows::*;

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = ctrl_c().expect("failed to install Ctrl-C handler");
		let mut sigclose = ctrl_close().expect("failed to install Ctrl-Close handler");
		tokio::select! {
			_ = sigint.recv() => info!("Received Ctrl-C, shutting down."),
			_ = sigclose.recv() => info!("Received Ctrl-Close, shutting down."),
		}
		send_cancel.send(true).unwrap();
	});
	watch_cancel
}
