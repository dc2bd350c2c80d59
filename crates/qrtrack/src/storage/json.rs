//! Single-file JSON item store.
//!
//! The whole collection is one JSON array. Every mutation loads the array,
//! changes it, and writes it back through a temp file that is renamed over
//! the existing file, so a crash mid-write leaves the previous version intact.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::debug;

use super::{ensure_parent_dir, ItemStore};
use crate::error::{Error, Result};
use crate::item::{self, Item, ItemChanges};

/// Item store backed by one JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes load-modify-save cycles.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Use the file at `path`, creating its parent directory if needed.
    ///
    /// The file itself is only created on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full collection.
    ///
    /// A missing file is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreCorrupt`] if the file is not a JSON array of
    /// items, or an I/O error.
    pub fn load(&self) -> Result<Vec<Item>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No item file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        let items: Vec<Item> =
            serde_json::from_slice(&bytes).map_err(|source| Error::StoreCorrupt {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded {} items from {}", items.len(), self.path.display());
        Ok(items)
    }

    /// Overwrite the file with `items`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    pub fn save(&self, items: &[Item]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;

        let mut serializer =
            serde_json::Serializer::with_formatter(&mut tmp, PrettyFormatter::with_indent(b"    "));
        items.serialize(&mut serializer)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path).map_err(|err| Error::Persist {
            path: self.path.clone(),
            source: err.error,
        })?;
        debug!("Saved {} items to {}", items.len(), self.path.display());
        Ok(())
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::internal("item file lock poisoned"))
    }

    /// Run `mutate` on the loaded collection and save it if it reports a change.
    fn modify<T>(&self, mutate: impl FnOnce(&mut Vec<Item>) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self.guard()?;
        let mut items = self.load()?;
        let (out, changed) = mutate(&mut items)?;
        if changed {
            self.save(&items)?;
        }
        Ok(out)
    }
}

impl ItemStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Item>> {
        let _guard = self.guard()?;
        self.load()
    }

    fn get(&self, id: &str) -> Result<Option<Item>> {
        let _guard = self.guard()?;
        Ok(item::find(&self.load()?, id).cloned())
    }

    fn insert(&self, new_item: &Item) -> Result<()> {
        self.modify(|items| {
            if item::find(items, &new_item.id).is_some() {
                return Err(Error::DuplicateItem {
                    id: new_item.id.clone(),
                });
            }
            items.push(new_item.clone());
            Ok(((), true))
        })
    }

    fn update(&self, id: &str, changes: ItemChanges) -> Result<Option<Item>> {
        self.modify(|items| match item::find_mut(items, id) {
            Some(found) => {
                found.apply(changes);
                Ok((Some(found.clone()), true))
            }
            None => Ok((None, false)),
        })
    }

    fn delete(&self, id: &str) -> Result<Option<Item>> {
        self.modify(|items| {
            let removed = item::remove(items, id);
            let changed = removed.is_some();
            Ok((removed, changed))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::exercise_store;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("items.json")).unwrap()
    }

    #[test]
    fn test_store_behavior() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&store_in(&dir));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt { .. }));
        assert!(store.list().is_err());
    }

    #[test]
    fn test_save_load_round_trip_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .insert(&Item::new("Caja grande".to_string(), "ñ".to_string()))
            .unwrap();
        store
            .insert(&Item::new("Box 2".to_string(), String::new()))
            .unwrap();

        let before = std::fs::read_to_string(store.path()).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        let after = std::fs::read_to_string(store.path()).unwrap();

        assert_eq!(before, after);
        assert!(after.contains("Caja grande"));
        assert!(after.contains('ñ'));
        assert!(after.contains("\n    {"));
    }

    #[test]
    fn test_reads_existing_item_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"[
    {
        "id": "0f8b5a0e-2c1d-4c57-9a8e-1b2f3c4d5e6f",
        "title": "Box 1",
        "description": "",
        "created_at": "2024-05-01 10:00:00"
    }
]"#,
        )
        .unwrap();

        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Box 1");
        assert_eq!(items[0].created_at_display(), "2024-05-01 10:00:00");
    }

    #[test]
    fn test_noop_mutations_do_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.delete("missing").unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("items.json");
        let store = JsonFileStore::open(&path).unwrap();

        assert!(path.parent().unwrap().is_dir());
        store
            .insert(&Item::new("x".to_string(), String::new()))
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert(&Item::new(format!("item {i}"), String::new()))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count().unwrap(), 8);
    }
}
