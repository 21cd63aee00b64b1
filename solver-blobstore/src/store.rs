use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::error::{BlobStoreError, BlobStoreResult};

/// gzip's cheapest compression level: store writes favor fast append over a
/// tight byte count.
const GZIP_LEVEL: Compression = Compression::new(1);
const HASH_CHUNK_SIZE: usize = 128 * 1024;

/// A directory-sharded, content-addressed blob store rooted at a single
/// directory. Each `(prefix, key)` pair maps to a 4/2/2-level shard path so
/// that no single directory accumulates more entries than a filesystem can
/// comfortably list.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, prefix: &str, key: &str) -> PathBuf {
        debug_assert!(key.len() >= 8, "blob keys must be at least 8 characters long");
        let mut path = self.root.join(prefix);
        path.push(&key[0..4]);
        path.push(&key[4..6]);
        path.push(&key[6..8]);
        path
    }

    fn plain_path(&self, prefix: &str, key: &str) -> PathBuf {
        self.shard_dir(prefix, key).join(key)
    }

    fn compressed_path(&self, prefix: &str, key: &str) -> PathBuf {
        self.shard_dir(prefix, key).join(format!("{key}.gz"))
    }

    fn ensure_directories_are_created(&self, prefix: &str, key: &str) -> BlobStoreResult<()> {
        fs::create_dir_all(self.shard_dir(prefix, key))?;
        Ok(())
    }

    /// The on-disk path for a stored blob, preferring the compressed form
    /// when both exist.
    pub fn blob_path(&self, prefix: &str, key: &str) -> BlobStoreResult<PathBuf> {
        let compressed = self.compressed_path(prefix, key);
        if compressed.is_file() {
            return Ok(compressed);
        }
        let plain = self.plain_path(prefix, key);
        if plain.is_file() {
            return Ok(plain);
        }
        Err(BlobStoreError::NotFound(key.to_string()))
    }

    pub fn blob_exists(&self, prefix: &str, key: &str) -> bool {
        self.blob_path(prefix, key).is_ok()
    }

    /// All keys stored under `prefix`, derived by walking the shard tree and
    /// keeping only paths whose filename matches the shard its own key would
    /// hash into — guards against stray files someone dropped in by hand.
    pub fn list_keys(&self, prefix: &str) -> BlobStoreResult<Vec<String>> {
        let prefix_dir = self.root.join(prefix);
        if !prefix_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        self.walk_for_keys(prefix, &prefix_dir, &mut keys)?;
        keys.sort();
        Ok(keys)
    }

    fn walk_for_keys(&self, prefix: &str, dir: &Path, out: &mut Vec<String>) -> BlobStoreResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk_for_keys(prefix, &path, out)?;
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            let key = file_name.strip_suffix(".gz").unwrap_or(file_name);
            if key.len() < 8 {
                continue;
            }
            if self.shard_dir(prefix, key) == dir {
                out.push(key.to_string());
            }
        }
        Ok(())
    }

    pub fn get_blob_bytes(&self, prefix: &str, key: &str) -> BlobStoreResult<Vec<u8>> {
        let path = self.blob_path(prefix, key)?;
        let raw = fs::read(&path)?;
        if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            let mut decoder = GzDecoder::new(raw.as_slice());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        } else {
            Ok(raw)
        }
    }

    /// A streaming reader over a blob's decompressed contents, for callers
    /// that want to avoid materializing the whole blob in memory. Picks the
    /// compressed or plain form the same way [`BlobStore::get_blob_bytes`]
    /// does, transparently wrapping the compressed form in a `GzDecoder`.
    pub fn open_read(&self, prefix: &str, key: &str) -> BlobStoreResult<Box<dyn Read>> {
        let path = self.blob_path(prefix, key)?;
        let file = fs::File::open(&path)?;
        if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            Ok(Box::new(GzDecoder::new(file)))
        } else {
            Ok(Box::new(file))
        }
    }

    /// Copy a blob's decompressed contents to `dest_path`, streaming rather
    /// than buffering the whole blob in memory.
    pub fn copy_blob(&self, prefix: &str, key: &str, dest_path: &Path) -> BlobStoreResult<()> {
        let mut reader = self.open_read(prefix, key)?;
        let mut writer = fs::File::create(dest_path)?;
        std::io::copy(&mut reader, &mut writer)?;
        Ok(())
    }

    pub fn add_blob_from_bytes(&self, prefix: &str, key: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        if self.blob_exists(prefix, key) {
            tracing::debug!(prefix, key, "skipping add_blob_from_bytes: already present");
            return Ok(());
        }
        self.ensure_directories_are_created(prefix, key)?;
        fs::write(self.plain_path(prefix, key), bytes)?;
        Ok(())
    }

    pub fn add_compressed_blob_from_bytes(&self, prefix: &str, key: &str, bytes: &[u8]) -> BlobStoreResult<()> {
        if self.blob_exists(prefix, key) {
            tracing::debug!(prefix, key, "skipping add_compressed_blob_from_bytes: already present");
            return Ok(());
        }
        self.ensure_directories_are_created(prefix, key)?;
        let file = fs::File::create(self.compressed_path(prefix, key))?;
        let mut encoder = GzEncoder::new(file, GZIP_LEVEL);
        encoder.write_all(bytes)?;
        encoder.finish()?;
        Ok(())
    }

    pub fn add_blob_from_path(&self, prefix: &str, key: &str, source: &Path) -> BlobStoreResult<()> {
        if self.blob_exists(prefix, key) {
            tracing::debug!(prefix, key, "skipping add_blob_from_path: already present");
            return Ok(());
        }
        self.ensure_directories_are_created(prefix, key)?;
        fs::copy(source, self.plain_path(prefix, key))?;
        Ok(())
    }

    pub fn add_compressed_blob_from_path(&self, prefix: &str, key: &str, source: &Path) -> BlobStoreResult<()> {
        if self.blob_exists(prefix, key) {
            tracing::debug!(prefix, key, "skipping add_compressed_blob_from_path: already present");
            return Ok(());
        }
        self.ensure_directories_are_created(prefix, key)?;
        let mut input = fs::File::open(source)?;
        let output = fs::File::create(self.compressed_path(prefix, key))?;
        let mut encoder = GzEncoder::new(output, GZIP_LEVEL);
        std::io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    pub fn delete_blob(&self, prefix: &str, key: &str) -> BlobStoreResult<()> {
        let plain = self.plain_path(prefix, key);
        let compressed = self.compressed_path(prefix, key);
        let mut removed_any = false;
        if plain.is_file() {
            fs::remove_file(&plain)?;
            removed_any = true;
        }
        if compressed.is_file() {
            fs::remove_file(&compressed)?;
            removed_any = true;
        }
        if !removed_any {
            return Err(BlobStoreError::NotFound(key.to_string()));
        }
        self.remove_empty_dirs_on_path(&self.shard_dir(prefix, key), &self.root.join(prefix))?;
        Ok(())
    }

    fn remove_empty_dirs_on_path(&self, start: &Path, limit: &Path) -> BlobStoreResult<()> {
        let mut current = start.to_path_buf();
        while current != limit {
            if !current.is_dir() {
                return Ok(());
            }
            let mut entries = fs::read_dir(&current)?;
            if entries.next().is_some() {
                return Ok(());
            }
            let parent = match current.parent() {
                Some(p) => p.to_path_buf(),
                None => return Ok(()),
            };
            fs::remove_dir(&current)?;
            current = parent;
        }
        Ok(())
    }

    /// The store root is valid if it exists, is a directory, and every
    /// direct child of it is itself a directory (a prefix directory, never
    /// a loose file dropped at the top level).
    pub fn ensure_valid_store_path(&self) -> BlobStoreResult<()> {
        if !self.root.is_dir() {
            return Err(BlobStoreError::InvalidStore(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                return Err(BlobStoreError::InvalidStore(format!(
                    "{} contains a non-directory entry at the top level",
                    self.root.display()
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> BlobStoreResult<bool> {
        if !self.root.is_dir() {
            return Ok(true);
        }
        Ok(fs::read_dir(&self.root)?.next().is_none())
    }
}

pub fn compute_key_from_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

pub fn compute_key_from_path(path: &Path) -> BlobStoreResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_and_get_round_trip_uncompressed() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"hello world");
        store.add_blob_from_bytes("widgets", &key, b"hello world").unwrap();
        assert!(store.blob_exists("widgets", &key));
        assert_eq!(store.get_blob_bytes("widgets", &key).unwrap(), b"hello world");
    }

    #[test]
    fn add_and_get_round_trip_compressed() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"compressed payload");
        store
            .add_compressed_blob_from_bytes("widgets", &key, b"compressed payload")
            .unwrap();
        let path = store.blob_path("widgets", &key).unwrap();
        assert_eq!(path.extension().unwrap(), "gz");
        assert_eq!(store.get_blob_bytes("widgets", &key).unwrap(), b"compressed payload");
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"x");
        store.add_blob_from_bytes("widgets", &key, b"x").unwrap();
        // A second add with different bytes must be a silent no-op, not an
        // overwrite: the key already names the one true payload.
        store.add_blob_from_bytes("widgets", &key, b"different").unwrap();
        assert_eq!(store.get_blob_bytes("widgets", &key).unwrap(), b"x");
    }

    #[test]
    fn delete_prunes_empty_shard_directories() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"only blob");
        store.add_blob_from_bytes("widgets", &key, b"only blob").unwrap();
        store.delete_blob("widgets", &key).unwrap();
        assert!(!store.blob_exists("widgets", &key));
        // the prefix directory itself should survive; only the now-empty
        // shard directories beneath it are pruned.
        assert!(dir.path().join("widgets").is_dir());
        assert_eq!(fs::read_dir(dir.path().join("widgets")).unwrap().count(), 0);
    }

    #[test]
    fn list_keys_finds_every_stored_key() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let a = compute_key_from_bytes(b"a");
        let b = compute_key_from_bytes(b"b");
        store.add_blob_from_bytes("widgets", &a, b"a").unwrap();
        store.add_compressed_blob_from_bytes("widgets", &b, b"b").unwrap();

        let mut keys = store.list_keys("widgets").unwrap();
        keys.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[test]
    fn ensure_valid_store_path_rejects_loose_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stray.txt"), b"oops").unwrap();
        let store = BlobStore::new(dir.path());
        assert!(store.ensure_valid_store_path().is_err());
    }

    #[test]
    fn open_read_transparently_decompresses() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"streamed payload");
        store
            .add_compressed_blob_from_bytes("widgets", &key, b"streamed payload")
            .unwrap();

        let mut reader = store.open_read("widgets", &key).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"streamed payload");
    }

    #[test]
    fn open_read_passes_through_uncompressed_blobs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"plain payload");
        store.add_blob_from_bytes("widgets", &key, b"plain payload").unwrap();

        let mut reader = store.open_read("widgets", &key).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"plain payload");
    }

    #[test]
    fn copy_blob_writes_decompressed_bytes_to_dest_path() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = compute_key_from_bytes(b"copy me");
        store.add_compressed_blob_from_bytes("widgets", &key, b"copy me").unwrap();

        let dest = dir.path().join("copied.bin");
        store.copy_blob("widgets", &key, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"copy me");
    }

    #[test]
    fn compute_key_from_path_matches_compute_key_from_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, b"hash me").unwrap();
        assert_eq!(
            compute_key_from_path(&path).unwrap(),
            compute_key_from_bytes(b"hash me")
        );
    }
}
