//! Persistent storage: sled-backed, one named tree per concern, with
//! open/get/put/iter helpers per tree and `Storage`/`Serialization` error
//! mapping. This crate stores **opaque bytes** for blocks/headers:
//! `Block` lives in
//! `srishti-chain`, which depends on `srishti-state` for `WorldState` and
//! `apply`/`rebuild` — a reverse dependency would be circular, so the chain
//! manager serialises/deserialises its own `Block` values and this layer
//! only persists and orders the bytes.
//!
//! World state itself is never written here: is explicit that it is
//! "derived, never stored as the source of truth" — only blocks are
//! persisted, and state is rebuilt from them on open.

use std::path::Path;

use srishti_core::{BlockIndex, CoreError};

fn storage_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Storage(e.to_string())
}

fn serialization_err(e: impl std::fmt::Display) -> CoreError {
    CoreError::Serialization(e.to_string())
}

const TREE_NAMES: [&str; 5] = ["blocks", "keys", "metadata", "checkpoints", "headers"];
const STORAGE_VERSION_KEY: &[u8] = b"storage_version";

/// Persistent state database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   blocks      — u64 BE index bytes → opaque serialised `Block` bytes
///   keys        — node id UTF-8 bytes → raw keypair seed bytes
///   metadata    — utf8 key bytes     → raw bytes (incl. `storage_version`)
///   checkpoints — utf8 key bytes     → raw bytes (periodic state snapshots)
///   headers     — u64 BE index bytes → opaque serialised `BlockHeader` bytes
pub struct StateDb {
    _db: sled::Db,
    blocks: sled::Tree,
    keys: sled::Tree,
    metadata: sled::Tree,
    checkpoints: sled::Tree,
    headers: sled::Tree,
}

impl StateDb {
    /// Open (or create) the state database at `path`. If the stored
    /// `storage_version` does not equal `chain_epoch`, every tree is wiped
    /// (blocks, keys, identity, everything) before reopening — an
    /// incompatible-epoch store must never silently mix generations.
    pub fn open<P: AsRef<Path>>(path: P, chain_epoch: u64) -> Result<Self, CoreError> {
        let db = sled::open(path).map_err(storage_err)?;

        let stored_version = {
            let metadata = db.open_tree("metadata").map_err(storage_err)?;
            metadata
                .get(STORAGE_VERSION_KEY)
                .map_err(storage_err)?
                .and_then(|v| v.as_ref().try_into().ok())
                .map(u64::from_be_bytes)
        };

        if stored_version != Some(chain_epoch) {
            tracing::warn!(
                stored = ?stored_version,
                configured = chain_epoch,
                "storage_version mismatch or missing — wiping local store"
            );
            for name in TREE_NAMES {
                db.drop_tree(name).map_err(storage_err)?;
            }
        }

        let blocks = db.open_tree("blocks").map_err(storage_err)?;
        let keys = db.open_tree("keys").map_err(storage_err)?;
        let metadata = db.open_tree("metadata").map_err(storage_err)?;
        let checkpoints = db.open_tree("checkpoints").map_err(storage_err)?;
        let headers = db.open_tree("headers").map_err(storage_err)?;
        metadata
            .insert(STORAGE_VERSION_KEY, &chain_epoch.to_be_bytes())
            .map_err(storage_err)?;

        Ok(Self {
            _db: db,
            blocks,
            keys,
            metadata,
            checkpoints,
            headers,
        })
    }

    fn index_key(index: BlockIndex) -> [u8; 8] {
        index.to_be_bytes()
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    pub fn put_block_bytes(&self, index: BlockIndex, bytes: &[u8]) -> Result<(), CoreError> {
        self.blocks
            .insert(Self::index_key(index), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_block_bytes(&self, index: BlockIndex) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .blocks
            .get(Self::index_key(index))
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// All stored blocks, sorted by index ("reading the chain at
    /// startup returns blocks sorted by index"). sled iterates big-endian
    /// keys in byte order, which is already index order.
    pub fn iter_block_bytes(&self) -> Result<Vec<(BlockIndex, Vec<u8>)>, CoreError> {
        let mut out = Vec::new();
        for item in self.blocks.iter() {
            let (k, v) = item.map_err(storage_err)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&k);
            out.push((u64::from_be_bytes(arr), v.to_vec()));
        }
        Ok(out)
    }

    /// Replace the entire block tree contents with `blocks` (index = position
    /// in the slice) in one atomic sled batch: any index beyond the new
    /// length is removed, every supplied index is (re)written. From the
    /// caller's perspective this is all-or-nothing — `replaceChain` followed
    /// by `saveBlocks` never leaves a half-written chain on disk.
    pub fn replace_blocks_atomic(&self, blocks: &[Vec<u8>]) -> Result<(), CoreError> {
        let mut batch = sled::Batch::default();
        for item in self.blocks.iter() {
            let (k, _) = item.map_err(storage_err)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&k);
            if u64::from_be_bytes(arr) as usize >= blocks.len() {
                batch.remove(k);
            }
        }
        for (i, bytes) in blocks.iter().enumerate() {
            batch.insert(&Self::index_key(i as u64), bytes.as_slice());
        }
        self.blocks.apply_batch(batch).map_err(storage_err)?;
        Ok(())
    }

    // ── Headers (fast chain-length / latest-hash queries) ───────────────────

    pub fn put_header_bytes(&self, index: BlockIndex, bytes: &[u8]) -> Result<(), CoreError> {
        self.headers
            .insert(Self::index_key(index), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_header_bytes(&self, index: BlockIndex) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .headers
            .get(Self::index_key(index))
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub fn replace_headers_atomic(&self, headers: &[Vec<u8>]) -> Result<(), CoreError> {
        let mut batch = sled::Batch::default();
        for item in self.headers.iter() {
            let (k, _) = item.map_err(storage_err)?;
            let mut arr = [0u8; 8];
            arr.copy_from_slice(&k);
            if u64::from_be_bytes(arr) as usize >= headers.len() {
                batch.remove(k);
            }
        }
        for (i, bytes) in headers.iter().enumerate() {
            batch.insert(&Self::index_key(i as u64), bytes.as_slice());
        }
        self.headers.apply_batch(batch).map_err(storage_err)?;
        Ok(())
    }

    // ── Keys (this node's own keypair material) ──────────────────────────────

    pub fn put_key(&self, node_id: &str, seed_bytes: &[u8]) -> Result<(), CoreError> {
        self.keys
            .insert(node_id.as_bytes(), seed_bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_key(&self, node_id: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .keys
            .get(node_id.as_bytes())
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    // ── Metadata ──────────────────────────────────────────────────────────────

    pub fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        self.metadata
            .insert(key.as_bytes(), value)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .metadata
            .get(key.as_bytes())
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    pub fn put_meta_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(value).map_err(serialization_err)?;
        self.put_meta(key, &bytes)
    }

    pub fn get_meta_json<T: for<'de> serde::Deserialize<'de>>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CoreError> {
        match self.get_meta(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(serialization_err)?)),
            None => Ok(None),
        }
    }

    // ── Checkpoints ───────────────────────────────────────────────────────────

    pub fn put_checkpoint(&self, name: &str, value: &[u8]) -> Result<(), CoreError> {
        self.checkpoints
            .insert(name.as_bytes(), value)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_checkpoint(&self, name: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self
            .checkpoints
            .get(name.as_bytes())
            .map_err(storage_err)?
            .map(|v| v.to_vec()))
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), CoreError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_round_trip_sorted_by_index() {
        let dir = tempdir();
        let db = StateDb::open(dir.path(), 1).unwrap();
        db.put_block_bytes(0, b"genesis").unwrap();
        db.put_block_bytes(1, b"second").unwrap();
        let all = db.iter_block_bytes().unwrap();
        assert_eq!(all, vec![(0, b"genesis".to_vec()), (1, b"second".to_vec())]);
    }

    #[test]
    fn mismatched_storage_version_wipes_store() {
        let dir = tempdir();
        {
            let db = StateDb::open(dir.path(), 1).unwrap();
            db.put_block_bytes(0, b"genesis").unwrap();
            db.put_key("node_aaaaaaaaaaaaaaaa", b"seed").unwrap();
        }
        let db = StateDb::open(dir.path(), 2).unwrap();
        assert_eq!(db.block_count(), 0);
        assert_eq!(db.get_key("node_aaaaaaaaaaaaaaaa").unwrap(), None);
    }

    #[test]
    fn matching_storage_version_preserves_store() {
        let dir = tempdir();
        {
            let db = StateDb::open(dir.path(), 7).unwrap();
            db.put_block_bytes(0, b"genesis").unwrap();
        }
        let db = StateDb::open(dir.path(), 7).unwrap();
        assert_eq!(db.block_count(), 1);
    }

    #[test]
    fn replace_blocks_atomic_shrinks_and_grows() {
        let dir = tempdir();
        let db = StateDb::open(dir.path(), 1).unwrap();
        db.replace_blocks_atomic(&[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
            .unwrap();
        assert_eq!(db.block_count(), 3);
        db.replace_blocks_atomic(&[b"x".to_vec()]).unwrap();
        assert_eq!(db.block_count(), 1);
        assert_eq!(db.get_block_bytes(0).unwrap(), Some(b"x".to_vec()));
        assert_eq!(db.get_block_bytes(1).unwrap(), None);
    }

    fn tempdir() -> tempfile::TempDir {
        tempfile::tempdir().expect("create tempdir")
    }
}
