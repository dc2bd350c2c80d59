//! Scannable code images.
//!
//! Each item gets a QR code PNG at `{codes_dir}/{id}.png` that encodes the
//! signed deletion URL for that item. Images are cached: once the file
//! exists it is never rewritten unless explicitly regenerated.

pub mod token;

use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::item::is_valid_id;

pub use token::{TokenError, TokenSigner};

/// File extension of rendered codes.
pub const CODE_EXTENSION: &str = "png";

/// Pixel size of one QR module.
pub const MODULE_SIZE: u32 = 10;

/// Error correction level used for every code.
pub const ERROR_CORRECTION: EcLevel = EcLevel::L;

/// Renders and caches code images in one directory.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    dir: PathBuf,
}

impl CodeGenerator {
    /// Use `dir` for code images, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the images.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic image path for an item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItemId`] unless `id` is a hyphenated UUID, which keeps
    /// every path inside the code directory.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(Error::invalid_item_id(id));
        }
        Ok(self.dir.join(format!("{id}.{CODE_EXTENSION}")))
    }

    /// Whether an image is cached for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid item id.
    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.path_for(id)?.is_file())
    }

    /// Render `target_url` for `id` unless an image is already cached.
    ///
    /// Returns `true` if a new image was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the image cannot
    /// be written.
    pub fn generate(&self, id: &str, target_url: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        if path.exists() {
            debug!("Code for {} already cached", id);
            return Ok(false);
        }

        let image = render(target_url)?;
        write_png(&image, &self.dir, &path)?;
        debug!("Wrote code for {} to {}", id, path.display());
        Ok(true)
    }

    /// Replace the cached image for `id` with a fresh rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if the old image cannot be removed or the new one
    /// cannot be written.
    pub fn regenerate(&self, id: &str, target_url: &str) -> Result<()> {
        self.remove(id)?;
        self.generate(id, target_url)?;
        Ok(())
    }

    /// Delete the cached image for `id`.
    ///
    /// Returns `true` if an image existed.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is invalid or the file cannot be removed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed code image {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Render `payload` as a black-on-white QR code with a 4-module quiet zone.
///
/// # Errors
///
/// Returns an error if the payload does not fit in a QR code.
pub fn render(payload: &str) -> Result<GrayImage> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), ERROR_CORRECTION)?;
    Ok(code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE, MODULE_SIZE)
        .quiet_zone(true)
        .dark_color(Luma([0]))
        .light_color(Luma([255]))
        .build())
}

/// Write `image` to `path` via a temp file in `dir`, so a half-written file
/// never counts as cached.
fn write_png(image: &GrayImage, dir: &Path, path: &Path) -> Result<()> {
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|source| Error::CodeImage {
                path: path.to_path_buf(),
                source,
            })?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|err| Error::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}
