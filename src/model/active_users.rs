//! Login/logout session tracking.

use std::collections::BTreeMap;

use dfs_util::error::Error;
use dfs_util::time::now_sec;

#[derive(Debug, Default)]
pub struct ActiveUsers {
	sessions: BTreeMap<String, u64>,
}

impl ActiveUsers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `username`, refreshing its timestamp if already present.
	/// Re-login is not an error: a second `login("alice")` just refreshes
	/// the session.
	pub fn login(&mut self, username: &str) -> Result<String, Error> {
		if username.is_empty() {
			return Err(Error::InvalidArgument("username cannot be empty".into()));
		}
		let already_active = self.sessions.contains_key(username);
		self.sessions.insert(username.to_string(), now_sec());
		if already_active {
			info!("user '{}' session refreshed", username);
			Ok(format!("user '{}' is already logged in, session refreshed", username))
		} else {
			info!("user '{}' logged in", username);
			Ok(format!("user '{}' logged in successfully", username))
		}
	}

	pub fn logout(&mut self, username: &str) -> Result<String, Error> {
		if self.sessions.remove(username).is_none() {
			return Err(Error::NotLoggedIn(username.to_string()));
		}
		info!("user '{}' logged out", username);
		Ok(format!("user '{}' logged out successfully", username))
	}

	pub fn is_active(&self, username: &str) -> bool {
		self.sessions.contains_key(username)
	}

	pub fn require_active(&self, username: &str) -> Result<(), Error> {
		if self.is_active(username) {
			Ok(())
		} else {
			Err(Error::NotLoggedIn(username.to_string()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn login_then_logout_round_trips() {
		let mut users = ActiveUsers::new();
		assert!(matches!(users.require_active("alice"), Err(Error::NotLoggedIn(_))));
		users.login("alice").unwrap();
		users.require_active("alice").unwrap();
		users.logout("alice").unwrap();
		assert!(matches!(users.require_active("alice"), Err(Error::NotLoggedIn(_))));
	}

	#[test]
	fn relogin_refreshes_without_error() {
		let mut users = ActiveUsers::new();
		users.login("alice").unwrap();
		users.login("alice").unwrap();
		assert!(users.is_active("alice"));
	}

	#[test]
	fn empty_username_is_invalid() {
		let mut users = ActiveUsers::new();
		assert!(matches!(users.login(""), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn logout_without_session_fails() {
		let mut users = ActiveUsers::new();
		assert!(matches!(users.logout("alice"), Err(Error::NotLoggedIn(_))));
	}
}
