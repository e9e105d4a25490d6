#[macro_use]
extern crate tracing;

use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;
use tokio::sync::watch;

use dfs_coordinator::{CoordinatorRpcHandler, RereplicationWorker};
use dfs_model::Coordinator;
use dfs_rpc::NetworkNode;
use dfs_util::background::BackgroundRunner;
use dfs_util::config::{read_config, CoordinatorConfig};
use dfs_util::error::Error;

#[derive(StructOpt, Debug)]
#[structopt(name = "dfs-coordinator")]
struct Opt {
	/// Configuration file
	#[structopt(short = "c", long = "config", default_value = "./coordinator.toml")]
	config_file: PathBuf,
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt::Subscriber::builder()
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	let opt = Opt::from_args();
	if let Err(e) = run(opt.config_file).await {
		error!("Coordinator exited with error: {}", e);
		std::process::exit(1);
	}
}

async fn run(config_file: PathBuf) -> Result<(), Error> {
	info!("Loading configuration...");
	let config: CoordinatorConfig = read_config(config_file)?;

	info!("Starting RPC network node on {}...", config.rpc_bind_addr);
	let node = NetworkNode::new(&config.rpc_secret, config.rpc_bind_addr)?;

	let coordinator = Arc::new(Coordinator::new(
		config.replication_factor,
		config.block_size as u64,
		config.dead_timeout_secs,
	));

	info!("Initializing background runner...");
	let watch_cancel = watch_shutdown_signal();
	let (background, await_background_done) = BackgroundRunner::new(watch_cancel.clone());

	let _rpc_handler = CoordinatorRpcHandler::new(&node, coordinator.clone());

	info!("Spawning re-replication worker...");
	background.spawn_worker(RereplicationWorker::new(
		coordinator.clone(),
		node.clone(),
		config.scan_interval_secs,
	));

	wait_for_shutdown(watch_cancel).await;

	node.netapp.drop_all_handlers();
	await_background_done.await.map_err(|e| Error::Message(e.to_string()))?;
	info!("Coordinator shut down cleanly.");

	Ok(())
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
