//! Core item types for qrtrack.
//!
//! An [`Item`] is the only entity the tracker stores. Items are created from
//! an [`ItemForm`], edited in place through [`ItemChanges`], and destroyed by
//! scanning their code or by a manual delete.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Timestamp layout used in the item file.
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A tracked inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier, a UUID v4 in hyphenated form.
    pub id: String,

    /// Display name. Never empty.
    pub title: String,

    /// Free-form notes.
    #[serde(default)]
    pub description: String,

    /// When the item was created (local time, second precision).
    #[serde(with = "created_at_format")]
    pub created_at: NaiveDateTime,
}

impl Item {
    /// Create an item with a fresh id, stamped with the current local time.
    #[must_use]
    pub fn new(title: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            created_at: now_truncated(),
        }
    }

    /// Apply an edit. Only title and description are touched.
    pub fn apply(&mut self, changes: ItemChanges) {
        self.title = changes.title;
        self.description = changes.description;
    }

    /// Creation time formatted the way it is stored.
    #[must_use]
    pub fn created_at_display(&self) -> String {
        self.created_at.format(CREATED_AT_FORMAT).to_string()
    }
}

/// Current local time without sub-second precision, so a freshly created
/// item compares equal to itself after a save/load cycle.
fn now_truncated() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Validated title/description pair for an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemChanges {
    /// New title (trimmed, non-empty).
    pub title: String,
    /// New description.
    pub description: String,
}

/// Raw form submission for creating or editing an item.
///
/// Both fields are optional on the wire so that a missing `title` surfaces as
/// a validation message rather than a rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemForm {
    /// Submitted title.
    #[serde(default)]
    pub title: Option<String>,
    /// Submitted description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemForm {
    /// Build a form from plain values.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }

    /// Check the submission and turn it into item changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the title is missing or blank.
    pub fn validate(&self) -> Result<ItemChanges> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(Error::validation("Title is required."));
        }
        Ok(ItemChanges {
            title: title.to_string(),
            description: self.description.clone().unwrap_or_default(),
        })
    }
}

/// Return the first item with the given id.
#[must_use]
pub fn find<'a>(items: &'a [Item], id: &str) -> Option<&'a Item> {
    items.iter().find(|item| item.id == id)
}

/// Mutable variant of [`find`].
pub fn find_mut<'a>(items: &'a mut [Item], id: &str) -> Option<&'a mut Item> {
    items.iter_mut().find(|item| item.id == id)
}

/// Remove the item with the given id, if present, preserving order of the rest.
pub fn remove(items: &mut Vec<Item>, id: &str) -> Option<Item> {
    let index = items.iter().position(|item| item.id == id)?;
    Some(items.remove(index))
}

/// Whether `id` is a well-formed item identifier.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 36 && Uuid::try_parse(id).is_ok()
}

mod created_at_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::CREATED_AT_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(CREATED_AT_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, CREATED_AT_FORMAT).map_err(serde::de::Error::custom)
    }
}
