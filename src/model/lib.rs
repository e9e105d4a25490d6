//! The coordinator's metadata state machine: namespace, block-location map,
//! worker table, active users, placement policy and the re-replication
//! scan. Pure and synchronous — no networking, no async runtime — so it is
//! exercised directly by unit tests instead of through RPC plumbing.

#[macro_use]
extern crate tracing;

pub mod active_users;
pub mod coordinator;
pub mod namespace;
pub mod placement;
pub mod worker_table;

pub use coordinator::Coordinator;
pub use namespace::Namespace;
pub use worker_table::WorkerTable;
