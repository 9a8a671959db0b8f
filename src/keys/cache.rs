//! # Private-Key Cache
//!
//! On-disk cache of fetched PEM keys, one file per `GithubApp` at
//! `<root>/<namespace>/<name>`. The cache survives controller restarts so a
//! pod bounce does not re-fetch every key from its remote source.
//!
//! Files are written at mode 0600 under directories created at 0700. Writers
//! are serialized by the reconciler's process-wide mutex.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// On-disk private-key cache rooted at a configurable directory
#[derive(Debug, Clone)]
pub struct KeyCache {
    root: PathBuf,
}

impl KeyCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the cache entry for a namespaced `GithubApp`
    pub fn entry_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(name)
    }

    /// Read a cached key, returning `None` when no entry exists
    pub fn read(&self, namespace: &str, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let path = self.entry_path(namespace, name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read key cache {}", path.display()))
            }
        }
    }

    /// Write a key to the cache, creating parent directories as needed
    pub fn write(&self, namespace: &str, name: &str, pem: &[u8]) -> Result<PathBuf> {
        let path = self.entry_path(namespace, name);
        let parent = path
            .parent()
            .with_context(|| format!("key cache path {} has no parent", path.display()))?;
        create_private_dir(parent)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .with_context(|| format!("failed to open key cache {}", path.display()))?;
        file.write_all(pem)
            .with_context(|| format!("failed to write key cache {}", path.display()))?;

        Ok(path)
    }

    /// Remove a cache entry; missing entries are not an error
    pub fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        let path = self.entry_path(namespace, name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to remove key cache {}", path.display()))
            }
        }
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .with_context(|| format!("failed to create key cache directory {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn round_trips_key_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KeyCache::new(dir.path());

        assert!(cache.read("default", "my-app").unwrap().is_none());

        let path = cache.write("default", "my-app", b"-----BEGIN KEY-----").unwrap();
        assert_eq!(path, dir.path().join("default").join("my-app"));

        let cached = cache.read("default", "my-app").unwrap().unwrap();
        assert_eq!(&**cached, b"-----BEGIN KEY-----");
    }

    #[test]
    fn entries_are_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KeyCache::new(dir.path());

        let path = cache.write("team-a", "app", b"pem").unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn overwrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KeyCache::new(dir.path());

        cache.write("ns", "app", b"old-key-material").unwrap();
        cache.write("ns", "app", b"new").unwrap();

        let cached = cache.read("ns", "app").unwrap().unwrap();
        assert_eq!(&**cached, b"new");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = KeyCache::new(dir.path());

        cache.write("ns", "app", b"pem").unwrap();
        cache.remove("ns", "app").unwrap();
        assert!(cache.read("ns", "app").unwrap().is_none());

        // second removal of a missing entry is fine
        cache.remove("ns", "app").unwrap();
    }
}
