use super::error::SaveError;

use std::fs::{remove_file, rename, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Persistent storage keyed by slot name and user index.
///
/// The container format does not care where bytes land; hosts with their own
/// save backends implement this over whatever platform layer they have.
pub trait SlotStorage {
    fn store(&self, slot_name: &str, user_index: i32, bytes: &[u8]) -> Result<(), SaveError>;

    /// `Ok(None)` when the slot has never been written.
    fn retrieve(&self, slot_name: &str, user_index: i32) -> Result<Option<Vec<u8>>, SaveError>;

    fn exists(&self, slot_name: &str, user_index: i32) -> bool;

    fn delete(&self, slot_name: &str, user_index: i32) -> Result<(), SaveError>;
}

/// Filesystem-backed slot storage.
///
/// Writes are atomic: data goes to a temp file, is synced, then renamed over
/// the slot path, so a crash mid-save leaves the previous file intact.
pub struct FileSlotStorage {
    root: PathBuf,
}

impl FileSlotStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn slot_path(&self, slot_name: &str, user_index: i32) -> PathBuf {
        self.root.join(format!("{}_{}.sav", slot_name, user_index))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.flush()?;

            // sync_all ensures data is on disk before the rename (portable fsync)
            file.sync_all()?;
        }

        rename(&temp_path, path)?;
        Ok(())
    }
}

impl SlotStorage for FileSlotStorage {
    fn store(&self, slot_name: &str, user_index: i32, bytes: &[u8]) -> Result<(), SaveError> {
        let path = self.slot_path(slot_name, user_index);
        Self::write_atomic(&path, bytes)?;

        log::debug!("stored {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }

    fn retrieve(&self, slot_name: &str, user_index: i32) -> Result<Option<Vec<u8>>, SaveError> {
        let path = self.slot_path(slot_name, user_index);
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        log::debug!("retrieved {} bytes from {:?}", bytes.len(), path);
        Ok(Some(bytes))
    }

    fn exists(&self, slot_name: &str, user_index: i32) -> bool {
        self.slot_path(slot_name, user_index).exists()
    }

    fn delete(&self, slot_name: &str, user_index: i32) -> Result<(), SaveError> {
        let path = self.slot_path(slot_name, user_index);
        if path.exists() {
            remove_file(&path)?;
            log::info!("deleted save slot {:?}", path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_retrieve_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = FileSlotStorage::new(dir.path());

        storage.store("alpha", 0, b"payload").unwrap();

        assert!(storage.exists("alpha", 0));
        assert_eq!(storage.retrieve("alpha", 0).unwrap().unwrap(), b"payload");
    }

    #[test]
    fn test_missing_slot_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = FileSlotStorage::new(dir.path());

        assert!(storage.retrieve("missing", 0).unwrap().is_none());
        assert!(!storage.exists("missing", 0));
    }

    #[test]
    fn test_user_index_separates_slots() {
        let dir = TempDir::new().unwrap();
        let storage = FileSlotStorage::new(dir.path());

        storage.store("shared", 0, b"first").unwrap();
        storage.store("shared", 1, b"second").unwrap();

        assert_eq!(storage.retrieve("shared", 0).unwrap().unwrap(), b"first");
        assert_eq!(storage.retrieve("shared", 1).unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileSlotStorage::new(dir.path());

        storage.store("atomic", 0, b"data").unwrap();

        let slot_path = storage.slot_path("atomic", 0);
        assert!(slot_path.exists());
        assert!(!slot_path.with_extension("tmp").exists());
    }

    #[test]
    fn test_delete_slot() {
        let dir = TempDir::new().unwrap();
        let storage = FileSlotStorage::new(dir.path());

        storage.store("gone", 2, b"bytes").unwrap();
        storage.delete("gone", 2).unwrap();

        assert!(!storage.exists("gone", 2));
        // Deleting an absent slot is not an error
        storage.delete("gone", 2).unwrap();
    }
}
