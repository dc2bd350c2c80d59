//! `SQLite` item store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{ensure_parent_dir, migrations, ItemStore};
use crate::error::{Error, Result};
use crate::item::{Item, ItemChanges, CREATED_AT_FORMAT};

const SELECT_COLUMNS: &str = "SELECT id, title, description, created_at FROM items";

/// Item store backed by an embedded `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent_dir(&path)?;

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    fn get_with(conn: &Connection, id: &str) -> Result<Option<Item>> {
        let item = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        let created_at: String = row.get(3)?;
        let created_at = NaiveDateTime::parse_from_str(&created_at, CREATED_AT_FORMAT)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;

        Ok(Item {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            created_at,
        })
    }
}

impl ItemStore for SqliteStore {
    fn list(&self) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY seq ASC"))?;
        let items = stmt
            .query_map([], Self::row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn get(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;
        Self::get_with(&conn, id)
    }

    fn insert(&self, item: &Item) -> Result<()> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
            [&item.id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::DuplicateItem {
                id: item.id.clone(),
            });
        }

        conn.execute(
            "INSERT INTO items (id, title, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                item.id,
                item.title,
                item.description,
                item.created_at_display(),
            ],
        )?;
        debug!("Inserted item {}", item.id);
        Ok(())
    }

    fn update(&self, id: &str, changes: ItemChanges) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE items SET title = ?2, description = ?3 WHERE id = ?1",
            params![id, changes.title, changes.description],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        Self::get_with(&conn, id)
    }

    fn delete(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;
        let Some(item) = Self::get_with(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
        debug!("Deleted item {}", id);
        Ok(Some(item))
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::internal(format!("negative item count {count}")))
    }
}
