//! Per-user path canonicalization and the file/directory namespace.
//!
//! Mirrors `_canonical_dfs_path` from the DataNode/NameNode reference: the
//! root case is special-cased to avoid joining an empty remainder onto the
//! user's home, everything else goes through a `.`/`..`-resolving
//! normalize pass first.

use std::collections::BTreeMap;

use dfs_util::error::Error;

/// A namespace entry. A directory never carries blocks; an empty file is a
/// `File(vec![])`, distinguished from a directory by this tag rather than
/// by emptiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
	File(Vec<String>),
	Directory,
}

impl Entry {
	fn is_directory(&self) -> bool {
		matches!(self, Entry::Directory)
	}
}

/// Resolve `.`/`..` components and collapse redundant separators, the way
/// `posixpath.normpath` does. The result is always absolute (starts with
/// `/`) and has no trailing slash unless it is exactly `/`.
fn normalize(path: &str) -> String {
	let absolute = if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{}", path)
	};

	let mut stack: Vec<&str> = Vec::new();
	for component in absolute.split('/') {
		match component {
			"" | "." => {}
			".." => {
				stack.pop();
			}
			other => stack.push(other),
		}
	}

	if stack.is_empty() {
		"/".to_string()
	} else {
		format!("/{}", stack.join("/"))
	}
}

/// Canonicalize `path` under `/user/<username>`. The root of the
/// normalized input maps to exactly `/user/<username>`, with no trailing
/// join — joining `/user/<username>` with an empty remainder would leave a
/// spurious trailing slash.
pub fn canonicalize(username: &str, path: &str) -> Result<String, Error> {
	if username.is_empty() {
		return Err(Error::InvalidArgument("username cannot be empty".into()));
	}

	let normalized = normalize(path);
	let user_root = format!("/user/{}", username);

	if normalized == "/" {
		Ok(user_root)
	} else {
		Ok(format!("{}{}", user_root, normalized))
	}
}

fn basename(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

fn dirname(path: &str) -> String {
	match path.rfind('/') {
		Some(0) => "/".to_string(),
		Some(idx) => path[..idx].to_string(),
		None => "".to_string(),
	}
}

/// All of a user's files and directories, keyed by canonical path.
#[derive(Debug, Default)]
pub struct Namespace {
	users: BTreeMap<String, BTreeMap<String, Entry>>,
}

impl Namespace {
	pub fn new() -> Self {
		Self::default()
	}

	fn user_map(&mut self, username: &str) -> &mut BTreeMap<String, Entry> {
		self.users.entry(username.to_string()).or_default()
	}

	pub fn mkdir(&mut self, username: &str, path: &str) -> Result<(), Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);
		if let Some(existing) = map.get(&canonical) {
			return Err(Error::AlreadyExists(format!(
				"{} ({})",
				canonical,
				if existing.is_directory() {
					"directory"
				} else {
					"file"
				}
			)));
		}
		map.insert(canonical, Entry::Directory);
		Ok(())
	}

	pub fn rmdir(&mut self, username: &str, path: &str) -> Result<(), Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);

		match map.get(&canonical) {
			None => return Err(Error::NotFound(canonical)),
			Some(entry) if !entry.is_directory() => {
				return Err(Error::NotADirectory(canonical));
			}
			_ => {}
		}

		let children: Vec<&String> = map
			.keys()
			.filter(|item| *item != &canonical && dirname(item) == canonical)
			.collect();
		if !children.is_empty() {
			return Err(Error::NotEmpty(format!(
				"{} contains {}",
				canonical,
				children
					.iter()
					.map(|c| basename(c))
					.collect::<Vec<_>>()
					.join(", ")
			)));
		}

		map.remove(&canonical);
		info!("directory '{}' removed", canonical);
		Ok(())
	}

	pub fn ls(&mut self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);

		let mut results: Vec<String> = map
			.keys()
			.filter(|item| dirname(item) == canonical)
			.map(|item| basename(item).to_string())
			.collect();
		results.sort();
		results.dedup();
		Ok(results)
	}

	pub fn add_file(&mut self, username: &str, path: &str, block_ids: Vec<String>) -> Result<String, Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);
		if let Some(Entry::Directory) = map.get(&canonical) {
			return Err(Error::IsDirectory(canonical));
		}
		map.insert(canonical.clone(), Entry::File(block_ids));
		Ok(canonical)
	}

	/// Strict lookup: fails on a missing path or a directory (matches the
	/// source's `get_file_blocks`, used for `GetFileBlocks`).
	pub fn file_blocks(&mut self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);
		match map.get(&canonical) {
			Some(Entry::File(blocks)) => Ok(blocks.clone()),
			Some(Entry::Directory) => Err(Error::IsDirectory(canonical)),
			None => Err(Error::NotFound(canonical)),
		}
	}

	/// Lenient lookup: returns the empty list for a missing path or a
	/// directory instead of failing (matches the source's
	/// `get_file_content`). Used internally, not exposed as its own RPC.
	pub fn file_blocks_lenient(&mut self, username: &str, path: &str) -> Vec<String> {
		let canonical = match canonicalize(username, path) {
			Ok(c) => c,
			Err(_) => return vec![],
		};
		let map = self.user_map(username);
		match map.get(&canonical) {
			Some(Entry::File(blocks)) => blocks.clone(),
			_ => vec![],
		}
	}

	/// Removes a file entry, returning its former block list so the
	/// caller can release the corresponding BlockLocationMap/held_blocks
	/// entries. Fails on a missing path or a directory.
	pub fn remove_file(&mut self, username: &str, path: &str) -> Result<Vec<String>, Error> {
		let canonical = canonicalize(username, path)?;
		let map = self.user_map(username);
		match map.get(&canonical) {
			Some(Entry::Directory) => return Err(Error::IsDirectory(canonical)),
			None => return Err(Error::NotFound(canonical)),
			Some(Entry::File(_)) => {}
		}
		let blocks = match map.remove(&canonical) {
			Some(Entry::File(blocks)) => blocks,
			_ => unreachable!(),
		};
		info!("file '{}' removed ({} blocks)", canonical, blocks.len());
		Ok(blocks)
	}

	/// Relocate a file or directory subtree. Returns the final resolved
	/// path. Follows the source's two-step target resolution: compute the
	/// naive target, then (if it names an existing directory) re-resolve
	/// onto `target/basename(src)`, and only then check for a collision.
	pub fn mv(&mut self, username: &str, src: &str, dst: &str) -> Result<String, Error> {
		let canonical_source = canonicalize(username, src)?;
		let canonical_dest = canonicalize(username, dst)?;
		let user_root = format!("/user/{}", username);

		if canonical_source == user_root {
			return Err(Error::InvalidMove("cannot move the user root".into()));
		}

		let mut final_target = if canonical_dest == user_root {
			canonicalize(username, &format!("/{}", basename(&canonical_source)))?
		} else {
			canonical_dest
		};

		let map = self.user_map(username);
		let source_entry = map
			.get(&canonical_source)
			.ok_or_else(|| Error::NotFound(canonical_source.clone()))?
			.clone();

		let source_is_dir = source_entry.is_directory();
		if source_is_dir && final_target.starts_with(&format!("{}/", canonical_source)) {
			return Err(Error::InvalidMove(format!(
				"cannot move directory '{}' into its own subdirectory '{}'",
				canonical_source, final_target
			)));
		}

		if let Some(Entry::Directory) = map.get(&final_target) {
			final_target = canonicalize(username, &format!("{}/{}", final_target, basename(&canonical_source)))?;
		}

		if final_target != canonical_source && map.contains_key(&final_target) {
			return Err(Error::AlreadyExists(final_target));
		}

		if source_is_dir {
			map.remove(&canonical_source);
			map.insert(final_target.clone(), Entry::Directory);

			let prefix = format!("{}/", canonical_source);
			let descendants: Vec<String> = map
				.keys()
				.filter(|item| item.starts_with(&prefix))
				.cloned()
				.collect();
			for old_path in descendants {
				let relative = &old_path[prefix.len()..];
				let new_path = format!("{}/{}", final_target, relative);
				if let Some(entry) = map.remove(&old_path) {
					map.insert(new_path, entry);
				}
			}
			info!("directory '{}' moved to '{}'", canonical_source, final_target);
		} else {
			let entry = map.remove(&canonical_source).unwrap();
			map.insert(final_target.clone(), entry);
			info!("file '{}' moved to '{}'", canonical_source, final_target);
		}

		Ok(final_target)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn canonicalize_root_has_no_trailing_join() {
		assert_eq!(canonicalize("alice", "/").unwrap(), "/user/alice");
		assert_eq!(canonicalize("alice", "").unwrap(), "/user/alice");
	}

	#[test]
	fn canonicalize_collapses_dots_and_slashes() {
		let a = canonicalize("alice", "/a/b").unwrap();
		let b = canonicalize("alice", "//a/./b/../b/").unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn canonicalize_is_idempotent() {
		let p = canonicalize("alice", "/a/./b/../c").unwrap();
		let pp = canonicalize("alice", &p).unwrap();
		assert_eq!(p, pp);
	}

	#[test]
	fn mkdir_rejects_duplicate() {
		let mut ns = Namespace::new();
		ns.mkdir("alice", "/d").unwrap();
		assert!(matches!(ns.mkdir("alice", "/d"), Err(Error::AlreadyExists(_))));
	}

	#[test]
	fn directory_lifecycle_rejects_duplicate_mkdir_and_nonempty_rmdir() {
		let mut ns = Namespace::new();
		ns.mkdir("alice", "/d").unwrap();
		assert!(matches!(ns.mkdir("alice", "/d"), Err(Error::AlreadyExists(_))));
		ns.add_file("alice", "/d/f", vec!["b1".into()]).unwrap();
		assert!(matches!(ns.rmdir("alice", "/d"), Err(Error::NotEmpty(_))));
		ns.remove_file("alice", "/d/f").unwrap();
		ns.rmdir("alice", "/d").unwrap();
	}

	#[test]
	fn move_subtree_rewrites_descendants() {
		let mut ns = Namespace::new();
		ns.mkdir("alice", "/a").unwrap();
		ns.mkdir("alice", "/a/b").unwrap();
		ns.add_file("alice", "/a/b/c.txt", vec!["B1".into()]).unwrap();

		let final_path = ns.mv("alice", "/a", "/x").unwrap();
		assert_eq!(final_path, "/user/alice/x");

		assert_eq!(ns.ls("alice", "/user/alice/x/b").unwrap(), vec!["c.txt"]);
		assert_eq!(
			ns.file_blocks("alice", "/x/b/c.txt").unwrap(),
			vec!["B1".to_string()]
		);
	}

	#[test]
	fn move_into_own_subdirectory_is_rejected() {
		let mut ns = Namespace::new();
		ns.mkdir("alice", "/a").unwrap();
		ns.mkdir("alice", "/a/b").unwrap();
		assert!(matches!(
			ns.mv("alice", "/a", "/a/b"),
			Err(Error::InvalidMove(_))
		));
	}

	#[test]
	fn move_onto_existing_directory_targets_basename() {
		let mut ns = Namespace::new();
		ns.mkdir("alice", "/dst").unwrap();
		ns.add_file("alice", "/src.txt", vec!["B1".into()]).unwrap();

		let final_path = ns.mv("alice", "/src.txt", "/dst").unwrap();
		assert_eq!(final_path, "/user/alice/dst/src.txt");
	}

	#[test]
	fn moving_user_root_is_rejected() {
		let mut ns = Namespace::new();
		assert!(matches!(
			ns.mv("alice", "/", "/somewhere"),
			Err(Error::InvalidMove(_))
		));
	}

	#[test]
	fn users_are_isolated_from_each_others_namespaces() {
		let mut ns = Namespace::new();
		ns.add_file("alice", "/a.txt", vec!["A".into()]).unwrap();
		ns.add_file("bob", "/a.txt", vec!["B".into()]).unwrap();

		assert_eq!(ns.ls("alice", "/").unwrap(), vec!["a.txt"]);
		assert_eq!(ns.ls("bob", "/").unwrap(), vec!["a.txt"]);
		assert_eq!(ns.file_blocks("alice", "/a.txt").unwrap(), vec!["A"]);
		assert_eq!(ns.file_blocks("bob", "/a.txt").unwrap(), vec!["B"]);
	}

	#[test]
	fn empty_file_blocklist_is_distinct_from_directory() {
		let mut ns = Namespace::new();
		ns.add_file("alice", "/empty.txt", vec![]).unwrap();
		assert_eq!(ns.file_blocks("alice", "/empty.txt").unwrap(), Vec::<String>::new());
		assert!(matches!(
			ns.file_blocks("alice", "/nonexistent"),
			Err(Error::NotFound(_))
		));
	}
}
