//! Storage layer for qrtrack.
//!
//! Items live either in a single JSON array file ([`JsonFileStore`]) or in an
//! embedded `SQLite` database ([`SqliteStore`]). Both expose the same
//! point operations through [`ItemStore`], and both serialize their own
//! operations so concurrent requests in one process cannot lose updates.

pub mod json;
pub mod migrations;
pub mod schema;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::{Error, Result};
use crate::item::{Item, ItemChanges};

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

/// Point operations over the item collection.
///
/// Implementations keep items in insertion order and never hold item state
/// between calls; the backing file or database is the source of truth.
pub trait ItemStore: Send + Sync + std::fmt::Debug {
    /// All items in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn list(&self) -> Result<Vec<Item>>;

    /// Look up a single item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, id: &str) -> Result<Option<Item>>;

    /// Append a new item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateItem`] if an item with the same id exists,
    /// or a storage error.
    fn insert(&self, item: &Item) -> Result<()>;

    /// Change title and description of an item.
    ///
    /// Returns the updated item, or `None` if no item has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn update(&self, id: &str, changes: ItemChanges) -> Result<Option<Item>>;

    /// Remove an item.
    ///
    /// Returns the removed item, or `None` if it was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or written.
    fn delete(&self, id: &str) -> Result<Option<Item>>;

    /// Number of stored items.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }
}

/// Open the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or initialized.
pub fn open_store(config: &Config) -> Result<Arc<dyn ItemStore>> {
    let path = config.data_path();
    let store: Arc<dyn ItemStore> = match config.storage.backend {
        StorageBackend::Json => Arc::new(JsonFileStore::open(&path)?),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&path)?),
    };
    info!(
        "Using {} item store at {}",
        config.storage.backend,
        path.display()
    );
    Ok(store)
}

/// Create the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Outcome of copying items into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Items written.
    pub imported: usize,
    /// Items skipped because their id was already present.
    pub skipped: usize,
}

/// Copy `items` into `store`, skipping ids it already holds.
///
/// # Errors
///
/// Returns the first storage error other than an id collision.
pub fn import_items(store: &dyn ItemStore, items: &[Item]) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    for item in items {
        match store.insert(item) {
            Ok(()) => stats.imported += 1,
            Err(err) if err.is_duplicate() => stats.skipped += 1,
            Err(err) => return Err(err),
        }
    }
    info!(
        "Imported {} items ({} already present)",
        stats.imported, stats.skipped
    );
    Ok(stats)
}
