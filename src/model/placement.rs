//! Block ID generation and replica placement.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use dfs_util::error::Error;
use dfs_util::time::now_msec;

/// `block_{millis}_{index}_{random 0..9999}`, matching the source's
/// generation convention (timestamp + index + random suffix), which is
/// sufficient to avoid collisions within one coordinator lifetime without
/// needing a global counter.
pub fn generate_block_id(index: usize) -> String {
	let suffix: u32 = rand::thread_rng().gen_range(0..10000);
	format!("block_{}_{}_{}", now_msec(), index, suffix)
}

pub fn blocks_needed(file_size: u64, block_size: u64) -> u64 {
	if file_size == 0 {
		0
	} else {
		(file_size + block_size - 1) / block_size
	}
}

/// Choose `replication_factor` workers uniformly at random, without
/// replacement, from `candidates`. Fails with `InsufficientReplicas` if
/// there are fewer candidates than needed.
pub fn choose_replicas(candidates: &BTreeSet<String>, replication_factor: usize) -> Result<Vec<String>, Error> {
	if candidates.len() < replication_factor {
		return Err(Error::InsufficientReplicas(format!(
			"{} available, {} required",
			candidates.len(),
			replication_factor
		)));
	}
	let mut pool: Vec<String> = candidates.iter().cloned().collect();
	pool.shuffle(&mut rand::thread_rng());
	pool.truncate(replication_factor);
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blocks_needed_matches_ceiling_division() {
		assert_eq!(blocks_needed(0, 1024), 0);
		assert_eq!(blocks_needed(10, 64 * 1024 * 1024), 1);
		assert_eq!(blocks_needed(1500, 1024), 2);
		assert_eq!(blocks_needed(1024, 1024), 1);
		assert_eq!(blocks_needed(1025, 1024), 2);
	}

	#[test]
	fn choose_replicas_rejects_insufficient_candidates() {
		let candidates: BTreeSet<String> = ["w1".into(), "w2".into()].into_iter().collect();
		assert!(matches!(
			choose_replicas(&candidates, 3),
			Err(Error::InsufficientReplicas(_))
		));
	}

	#[test]
	fn choose_replicas_returns_distinct_workers() {
		let candidates: BTreeSet<String> = ["w1".into(), "w2".into(), "w3".into(), "w4".into()]
			.into_iter()
			.collect();
		let chosen = choose_replicas(&candidates, 3).unwrap();
		assert_eq!(chosen.len(), 3);
		let unique: BTreeSet<&String> = chosen.iter().collect();
		assert_eq!(unique.len(), 3);
	}

	#[test]
	fn generated_block_ids_are_distinct() {
		let a = generate_block_id(0);
		let b = generate_block_id(1);
		assert_ne!(a, b);
	}
}
