//! Wires a [`dfs_model::Coordinator`] onto the RPC network: the
//! `CoordinatorRpc` endpoint handler and the re-replication background
//! worker.

#[macro_use]
extern crate tracing;

pub mod rereplication_worker;
pub mod rpc_handler;

pub use rereplication_worker::RereplicationWorker;
pub use rpc_handler::CoordinatorRpcHandler;
