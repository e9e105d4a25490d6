//! On-disk block storage: one flat file per block, named by its id,
//! directly under the worker's data directory.
//!
//! Writes go through a temp-file-then-rename dance so a reader never
//! observes a partially-written block: write to a randomly-named temp
//! file, `sync_all` it, rename it into place, then fsync the containing
//! directory so the rename itself is durable.

use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use dfs_util::error::Error;

pub struct BlockStore {
	root: PathBuf,
}

/// Removes the temp file on drop unless [`cancel`](DeleteOnDrop::cancel)
/// was called, so a failed write never leaves garbage behind.
struct DeleteOnDrop<'a> {
	path: &'a Path,
	armed: bool,
}

impl<'a> DeleteOnDrop<'a> {
	fn new(path: &'a Path) -> Self {
		Self { path, armed: true }
	}
	fn cancel(mut self) {
		self.armed = false;
	}
}

impl<'a> Drop for DeleteOnDrop<'a> {
	fn drop(&mut self) {
		if self.armed {
			let path = self.path.to_path_buf();
			tokio::spawn(async move {
				let _ = fs::remove_file(path).await;
			});
		}
	}
}

impl BlockStore {
	pub async fn new(root: PathBuf) -> Result<Self, Error> {
		fs::create_dir_all(&root).await?;
		Ok(Self { root })
	}

	fn block_path(&self, block_id: &str) -> PathBuf {
		self.root.join(block_id)
	}

	pub async fn store_block(&self, block_id: &str, data: &[u8]) -> Result<(), Error> {
		let path = self.block_path(block_id);
		let tmp_name = format!(".tmp-{}-{}", block_id, hex::encode(rand::thread_rng().gen::<[u8; 4]>()));
		let path_tmp = self.root.join(tmp_name);

		let delete_on_drop = DeleteOnDrop::new(&path_tmp);

		let mut f = fs::File::create(&path_tmp).await?;
		f.write_all(data).await?;
		f.sync_all().await?;
		drop(f);

		fs::rename(&path_tmp, &path).await?;
		delete_on_drop.cancel();

		let dir = fs::File::open(&self.root).await?;
		dir.sync_all().await?;

		Ok(())
	}

	pub async fn get_block(&self, block_id: &str) -> Result<Vec<u8>, Error> {
		fs::read(self.block_path(block_id))
			.await
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::NotFound => Error::NotFound(format!("block '{}'", block_id)),
				_ => Error::Io(e),
			})
	}

	pub async fn has_block(&self, block_id: &str) -> bool {
		fs::metadata(self.block_path(block_id)).await.is_ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn store_then_get_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let store = BlockStore::new(dir.path().to_path_buf()).await.unwrap();

		store.store_block("block_1", b"hello world").await.unwrap();
		let data = store.get_block("block_1").await.unwrap();
		assert_eq!(data, b"hello world");
	}

	#[tokio::test]
	async fn get_missing_block_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let store = BlockStore::new(dir.path().to_path_buf()).await.unwrap();

		let err = store.get_block("nope").await.unwrap_err();
		assert!(matches!(err, Error::NotFound(_)));
	}

	#[tokio::test]
	async fn overwriting_a_block_replaces_its_contents() {
		let dir = tempfile::tempdir().unwrap();
		let store = BlockStore::new(dir.path().to_path_buf()).await.unwrap();

		store.store_block("block_1", b"first").await.unwrap();
		store.store_block("block_1", b"second").await.unwrap();
		let data = store.get_block("block_1").await.unwrap();
		assert_eq!(data, b"second");
	}

	#[tokio::test]
	async fn no_leftover_temp_files_after_a_successful_write() {
		let dir = tempfile::tempdir().unwrap();
		let store = BlockStore::new(dir.path().to_path_buf()).await.unwrap();

		store.store_block("block_1", b"data").await.unwrap();

		let mut entries = fs::read_dir(dir.path()).await.unwrap();
		let mut names = Vec::new();
		while let Some(entry) = entries.next_entry().await.unwrap() {
			names.push(entry.file_name().to_string_lossy().into_owned());
		}
		assert_eq!(names, vec!["block_1".to_string()]);
	}

	#[tokio::test]
	async fn has_block_reflects_presence() {
		let dir = tempfile::tempdir().unwrap();
		let store = BlockStore::new(dir.path().to_path_buf()).await.unwrap();

		assert!(!store.has_block("block_1").await);
		store.store_block("block_1", b"x").await.unwrap();
		assert!(store.has_block("block_1").await);
	}
}
