//! Item lifecycle: create, edit, and the two ways of deleting.
//!
//! [`Inventory`] ties the item store to the code generator and token signer.
//! The HTTP handlers and the CLI both go through it, so a scan-triggered
//! delete and a manual delete have identical effects on stored state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::codes::{CodeGenerator, TokenError, TokenSigner};
use crate::config::Config;
use crate::error::Result;
use crate::item::{Item, ItemForm};
use crate::storage::{self, ItemStore};

/// Result of a scan-triggered delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The item existed and was removed.
    Deleted(Item),
    /// The token was valid but the item no longer exists.
    AlreadyGone,
    /// The token was refused; nothing was changed.
    Rejected(TokenError),
}

/// Store, code images, and token signing for one inventory.
#[derive(Debug, Clone)]
pub struct Inventory {
    store: Arc<dyn ItemStore>,
    codes: CodeGenerator,
    signer: TokenSigner,
}

impl Inventory {
    /// Assemble an inventory from its parts.
    #[must_use]
    pub fn new(store: Arc<dyn ItemStore>, codes: CodeGenerator, signer: TokenSigner) -> Self {
        Self {
            store,
            codes,
            signer,
        }
    }

    /// Open the store, code directory, and signing key named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if any of them cannot be opened or created.
    pub fn open(config: &Config) -> Result<Self> {
        let store = storage::open_store(config)?;
        let codes = CodeGenerator::new(config.codes_dir())?;
        let signer = TokenSigner::from_config(config)?;
        Ok(Self::new(store, codes, signer))
    }

    /// The underlying item store.
    #[must_use]
    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    /// The code image generator.
    #[must_use]
    pub fn codes(&self) -> &CodeGenerator {
        &self.codes
    }

    /// All items in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list(&self) -> Result<Vec<Item>> {
        self.store.list()
    }

    /// Look up one item.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self, id: &str) -> Result<Option<Item>> {
        self.store.get(id)
    }

    /// Signed URL that deletes `id` when opened.
    #[must_use]
    pub fn deletion_url(&self, base_url: &str, id: &str) -> String {
        let token = self.signer.sign(id, Utc::now());
        format!(
            "{}/delete/{id}?token={token}",
            base_url.trim_end_matches('/')
        )
    }

    /// Validate `form`, store a new item, and render its code.
    ///
    /// A failure to render the code is logged and does not fail the create.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title, or a storage error.
    pub fn create(&self, form: &ItemForm, base_url: &str) -> Result<Item> {
        let changes = form.validate()?;
        let item = Item::new(changes.title, changes.description);
        self.store.insert(&item)?;
        info!("Created item {} ({:?})", item.id, item.title);

        let url = self.deletion_url(base_url, &item.id);
        if let Err(err) = self.codes.generate(&item.id, &url) {
            warn!("Could not render code for item {}: {}", item.id, err);
        }
        Ok(item)
    }

    /// Validate `form` and apply it to an existing item.
    ///
    /// Returns `None` if the item does not exist.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank title, or a storage error.
    pub fn update(&self, id: &str, form: &ItemForm) -> Result<Option<Item>> {
        let changes = form.validate()?;
        let updated = self.store.update(id, changes)?;
        if updated.is_some() {
            info!("Updated item {}", id);
        }
        Ok(updated)
    }

    /// Remove an item and its code image.
    ///
    /// Returns the removed item, or `None` if it was already gone. Failing to
    /// remove the image is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn delete(&self, id: &str) -> Result<Option<Item>> {
        let removed = self.store.delete(id)?;
        if removed.is_some() {
            info!("Deleted item {}", id);
            if let Err(err) = self.codes.remove(id) {
                warn!("Could not remove code image for item {}: {}", id, err);
            }
        }
        Ok(removed)
    }

    /// Delete an item on behalf of a scanned code carrying `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn scan_delete(&self, id: &str, token: Option<&str>) -> Result<ScanOutcome> {
        let verified = token
            .ok_or(TokenError::Missing)
            .and_then(|token| self.signer.verify(id, token, Utc::now()));
        if let Err(reason) = verified {
            warn!("Refused scan delete of {}: {}", id, reason);
            return Ok(ScanOutcome::Rejected(reason));
        }

        Ok(match self.delete(id)? {
            Some(item) => ScanOutcome::Deleted(item),
            None => ScanOutcome::AlreadyGone,
        })
    }

    /// Re-render every item's code with a freshly signed URL.
    ///
    /// Returns the number of codes written.
    ///
    /// # Errors
    ///
    /// Returns the first storage or rendering error.
    pub fn regenerate_codes(&self, base_url: &str) -> Result<usize> {
        let items = self.store.list()?;
        for item in &items {
            let url = self.deletion_url(base_url, &item.id);
            self.codes.regenerate(&item.id, &url)?;
        }
        info!("Regenerated {} codes", items.len());
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, SqliteStore};

    const BASE: &str = "http://localhost:5000";

    fn inventory_with(store: Arc<dyn ItemStore>, dir: &tempfile::TempDir) -> Inventory {
        let codes = CodeGenerator::new(dir.path().join("qrcodes")).unwrap();
        let signer = TokenSigner::new(b"test-secret-0123456789", None).unwrap();
        Inventory::new(store, codes, signer)
    }

    fn inventory() -> (tempfile::TempDir, Inventory) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path().join("items.json")).unwrap());
        let inventory = inventory_with(store, &dir);
        (dir, inventory)
    }

    fn token_from(url: &str) -> &str {
        url.split_once("?token=").unwrap().1
    }

    #[test]
    fn test_create_stores_item_and_code() {
        let (_dir, inventory) = inventory();
        let form = ItemForm {
            title: Some("Box 1".to_string()),
            description: None,
        };

        let item = inventory.create(&form, BASE).unwrap();

        assert_eq!(inventory.list().unwrap(), vec![item.clone()]);
        assert_eq!(item.description, "");
        assert!(inventory.codes().exists(&item.id).unwrap());
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let (_dir, inventory) = inventory();
        let err = inventory.create(&ItemForm::new(" ", "x"), BASE).unwrap_err();

        assert!(err.is_validation());
        assert!(inventory.list().unwrap().is_empty());
        assert_eq!(
            std::fs::read_dir(inventory.codes().dir()).unwrap().count(),
            0
        );
    }

    #[test]
    fn test_update_changes_only_text() {
        let (_dir, inventory) = inventory();
        let item = inventory.create(&ItemForm::new("Old", ""), BASE).unwrap();

        let updated = inventory
            .update(&item.id, &ItemForm::new("New", "shelf 2"))
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, item.created_at);
        assert_eq!(updated.title, "New");
        assert_eq!(updated.description, "shelf 2");
    }

    #[test]
    fn test_update_unknown_and_invalid() {
        let (_dir, inventory) = inventory();
        assert!(inventory
            .update("missing", &ItemForm::new("x", ""))
            .unwrap()
            .is_none());

        let item = inventory.create(&ItemForm::new("Keep", ""), BASE).unwrap();
        assert!(inventory
            .update(&item.id, &ItemForm::new("", ""))
            .unwrap_err()
            .is_validation());
        assert_eq!(inventory.get(&item.id).unwrap().unwrap().title, "Keep");
    }

    #[test]
    fn test_manual_delete_removes_item_and_code() {
        let (_dir, inventory) = inventory();
        let item = inventory.create(&ItemForm::new("Box", ""), BASE).unwrap();

        assert_eq!(inventory.delete(&item.id).unwrap(), Some(item.clone()));
        assert!(!inventory.codes().exists(&item.id).unwrap());
        assert!(inventory.list().unwrap().is_empty());

        assert!(inventory.delete(&item.id).unwrap().is_none());
    }

    #[test]
    fn test_scan_delete_flow() {
        let (_dir, inventory) = inventory();
        let item = inventory.create(&ItemForm::new("Box 1", ""), BASE).unwrap();
        let url = inventory.deletion_url(BASE, &item.id);
        let token = token_from(&url);

        assert!(url.starts_with(&format!("{BASE}/delete/{}?token=", item.id)));
        assert_eq!(
            inventory.scan_delete(&item.id, Some(token)).unwrap(),
            ScanOutcome::Deleted(item.clone())
        );
        assert!(!inventory.codes().exists(&item.id).unwrap());
        assert_eq!(
            inventory.scan_delete(&item.id, Some(token)).unwrap(),
            ScanOutcome::AlreadyGone
        );
    }

    #[test]
    fn test_scan_delete_rejects_bad_tokens() {
        crate::logging::init_test_logging();
        let (_dir, inventory) = inventory();
        let item = inventory.create(&ItemForm::new("Box", ""), BASE).unwrap();
        let other = inventory.create(&ItemForm::new("Other", ""), BASE).unwrap();
        let other_url = inventory.deletion_url(BASE, &other.id);

        assert_eq!(
            inventory.scan_delete(&item.id, None).unwrap(),
            ScanOutcome::Rejected(TokenError::Missing)
        );
        assert_eq!(
            inventory
                .scan_delete(&item.id, Some(token_from(&other_url)))
                .unwrap(),
            ScanOutcome::Rejected(TokenError::BadSignature)
        );
        assert_eq!(inventory.list().unwrap().len(), 2);
        assert!(inventory.codes().exists(&item.id).unwrap());
    }

    #[test]
    fn test_regenerate_codes() {
        let (_dir, inventory) = inventory();
        let item = inventory.create(&ItemForm::new("Box", ""), BASE).unwrap();
        inventory.codes().remove(&item.id).unwrap();

        assert_eq!(inventory.regenerate_codes("https://stock.example").unwrap(), 1);
        assert!(inventory.codes().exists(&item.id).unwrap());
    }

    #[test]
    fn test_works_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = inventory_with(Arc::new(SqliteStore::open_in_memory().unwrap()), &dir);

        let item = inventory.create(&ItemForm::new("Box", ""), BASE).unwrap();
        let url = inventory.deletion_url(BASE, &item.id);
        assert_eq!(
            inventory.scan_delete(&item.id, Some(token_from(&url))).unwrap(),
            ScanOutcome::Deleted(item)
        );
        assert_eq!(inventory.store().count().unwrap(), 0);
    }

    #[test]
    fn test_open_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_path = Some(dir.path().join("items.json"));

        let inventory = Inventory::open(&config).unwrap();
        assert_eq!(inventory.codes().dir(), dir.path().join("qrcodes"));
        assert!(inventory.list().unwrap().is_empty());
    }
}
