//! Storage layout
//!
//! `<storage_base>/<saves_dir>/<slot>.json`, one file per slot. Both path
//! derivation and directory enumeration go through the naming helpers here so
//! they always agree.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::slot_id::SlotId;
use crate::consts::{SAVES_DIR, SLOT_EXTENSION};

/// File name for a slot
#[must_use]
pub fn slot_file_name(slot: &SlotId) -> String {
    format!("{slot}.{SLOT_EXTENSION}")
}

/// Reverse of [`slot_file_name`]; `None` for anything that isn't a slot file
#[must_use]
pub fn slot_id_from_file_name(file_name: &str) -> Option<SlotId> {
    let stem = file_name.strip_suffix(SLOT_EXTENSION)?.strip_suffix('.')?;
    SlotId::from_valid(stem)
}

/// Resolves the save root and per-slot files, creating them on demand
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(storage_base: impl AsRef<Path>) -> Self {
        Self::with_saves_dir(storage_base, SAVES_DIR)
    }

    pub fn with_saves_dir(storage_base: impl AsRef<Path>, saves_dir: &str) -> Self {
        Self {
            root: storage_base.as_ref().join(saves_dir),
        }
    }

    /// Root directory path without touching the filesystem
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root directory, created if absent
    ///
    /// Checked on every call, so a directory removed while the engine is
    /// running comes back on the next save. Safe to call concurrently; whoever
    /// loses the creation race still succeeds.
    pub async fn root_path(&self) -> Result<PathBuf, StoreError> {
        if tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(self.root.clone());
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::io("creating save directory", &self.root, source))?;
        log::debug!("Save directory ready at {}", self.root.display());
        Ok(self.root.clone())
    }

    /// Path of a slot file, created empty if it doesn't exist yet
    pub async fn slot_path(&self, slot: &SlotId) -> Result<PathBuf, StoreError> {
        let path = self.root_path().await?.join(slot_file_name(slot));

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => log::debug!("Created save file {}", path.display()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(source) => return Err(StoreError::io("creating save file", &path, source)),
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_round_trip() {
        let slot = SlotId::sanitize("slot 7");
        assert_eq!(slot_file_name(&slot), "slot_7.json");
        assert_eq!(slot_id_from_file_name("slot_7.json"), Some(slot));
    }

    #[test]
    fn test_non_slot_file_names() {
        assert_eq!(slot_id_from_file_name("notes.txt"), None);
        assert_eq!(slot_id_from_file_name(".json"), None);
        assert_eq!(slot_id_from_file_name("json"), None);
        assert_eq!(slot_id_from_file_name("my save.json"), None);
        assert_eq!(slot_id_from_file_name(".slot.json.0b1c.tmp"), None);
        assert_eq!(slot_id_from_file_name("slotjson"), None);
    }

    #[tokio::test]
    async fn test_root_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        assert!(!resolver.root().exists());

        let root = resolver.root_path().await.unwrap();
        assert_eq!(root, dir.path().join("saves"));
        assert!(root.is_dir());

        assert_eq!(resolver.root_path().await.unwrap(), root);
    }

    #[tokio::test]
    async fn test_root_recreated_after_removal() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        let slot = SlotId::sanitize("again");
        resolver.slot_path(&slot).await.unwrap();

        std::fs::remove_dir_all(resolver.root()).unwrap();

        let path = resolver.slot_path(&slot).await.unwrap();
        assert!(resolver.root().is_dir());
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn test_slot_path_creates_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        let path = resolver.slot_path(&SlotId::default_slot()).await.unwrap();

        assert_eq!(path, dir.path().join("saves").join("default.json"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_slot_path_keeps_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path());
        let slot = SlotId::sanitize("kept");
        let path = resolver.slot_path(&slot).await.unwrap();
        std::fs::write(&path, b"{}").unwrap();

        let again = resolver.slot_path(&slot).await.unwrap();
        assert_eq!(std::fs::read(&again).unwrap(), b"{}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let resolver = PathResolver::new(dir.path());
            tasks.push(tokio::spawn(async move {
                resolver.slot_path(&SlotId::sanitize("shared")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(dir.path().join("saves/shared.json").is_file());
    }
}
