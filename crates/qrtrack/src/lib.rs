//! `qrtrack` - Inventory tracker that labels items with scan-to-delete QR codes
//!
//! This library provides item storage, code image generation, deletion token
//! signing, and the web interface served by the `qrtrack` binary.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod codes;
pub mod config;
pub mod error;
pub mod inventory;
pub mod item;
pub mod logging;
pub mod storage;
pub mod web;

pub use codes::{CodeGenerator, TokenError, TokenSigner};
pub use config::{Config, StorageBackend};
pub use error::{Error, Result};
pub use inventory::{Inventory, ScanOutcome};
pub use item::{Item, ItemChanges, ItemForm};
pub use logging::init_logging;
pub use storage::{open_store, ItemStore, JsonFileStore, SqliteStore};
