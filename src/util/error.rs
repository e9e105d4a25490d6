//! Error taxonomy shared by the coordinator, the worker and the client.
//!
//! Variant names follow the taxonomy in the design document §7 exactly;
//! callers match on variants rather than on message text.

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
	/// Empty username, malformed path, or another caller-supplied value
	/// that is structurally wrong.
	#[error(display = "invalid argument: {}", _0)]
	InvalidArgument(String),

	/// Operation required an active session and none was found.
	#[error(display = "user '{}' is not logged in", _0)]
	NotLoggedIn(String),

	/// Namespace lookup miss, or block absent on a worker.
	#[error(display = "not found: {}", _0)]
	NotFound(String),

	/// Mkdir on an existing name, or AddFile atop a directory.
	#[error(display = "already exists: {}", _0)]
	AlreadyExists(String),

	/// Path does not name a directory where one was required.
	#[error(display = "not a directory: {}", _0)]
	NotADirectory(String),

	/// Path names a directory where a file was required.
	#[error(display = "is a directory: {}", _0)]
	IsDirectory(String),

	/// Rmdir on a non-empty directory.
	#[error(display = "directory not empty: {}", _0)]
	NotEmpty(String),

	/// Move would relocate the user root, or a directory into itself.
	#[error(display = "invalid move: {}", _0)]
	InvalidMove(String),

	/// Fewer than R registered (or, for placement, live) workers.
	#[error(display = "insufficient replicas: {}", _0)]
	InsufficientReplicas(String),

	/// Could not reach a worker over the network.
	#[error(display = "worker unavailable: {}", _0)]
	Unavailable(String),

	/// Disk I/O failure, or any other unexpected local failure.
	#[error(display = "internal error: {}", _0)]
	Internal(String),

	/// Catch-all for conditions that don't fit the taxonomy above but
	/// still need a human-readable message (mirrors garage_util's
	/// `Error::Message`).
	#[error(display = "{}", _0)]
	Message(String),

	#[error(display = "I/O error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "config error: {}", _0)]
	Toml(#[error(source)] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	pub fn unexpected_rpc_message(msg: impl std::fmt::Debug) -> Self {
		Error::Message(format!("unexpected RPC message: {:?}", msg))
	}

	pub fn message(msg: impl Into<String>) -> Self {
		Error::Message(msg.into())
	}

	/// Coarse RPC-status mapping used by `dfs-rpc` endpoint handlers:
	/// worker/coordinator errors are sent back over the wire as
	/// `(success=false, message)` pairs rather than as RPC-transport
	/// failures, per spec.md §7 ("not-found signalled via RPC status
	/// plus success=false").
	pub fn as_message(&self) -> String {
		self.to_string()
	}
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
	fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Error {
		Error::Message(e.to_string())
	}
}
