//! Storage worker: holds a single flat directory of block files and
//! answers `WorkerRpc` requests against it.

#[macro_use]
extern crate tracing;

pub mod block_store;
pub mod heartbeat_worker;
pub mod rpc_handler;

pub use block_store::BlockStore;
pub use heartbeat_worker::HeartbeatWorker;
pub use rpc_handler::WorkerRpcHandler;
