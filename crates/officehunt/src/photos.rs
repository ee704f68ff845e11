//! Captured photo storage.
//!
//! Accepted photos are written to the photos directory under the BLAKE3 hash
//! of their bytes, so capturing the same image twice stores it once. The
//! returned path is the reference kept in the game record.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::capture::{EncodedImage, JPEG_MIME};
use crate::error::{Error, Result};

/// Directory of captured photos.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Use `dir` for photos. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The photos directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compute the file name for an image.
    #[must_use]
    pub fn file_name(image: &EncodedImage) -> String {
        let hash = blake3::hash(image.bytes()).to_hex();
        let extension = match image.mime_type() {
            "image/png" => "png",
            JPEG_MIME => "jpg",
            _ => "img",
        };
        format!("{hash}.{extension}")
    }

    /// Check whether an identical image is already stored.
    #[must_use]
    pub fn contains(&self, image: &EncodedImage) -> bool {
        self.dir.join(Self::file_name(image)).is_file()
    }

    /// Delete a single stored image. Missing files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self, image: &EncodedImage) -> Result<()> {
        let path = self.dir.join(Self::file_name(image));
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed photo {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Store an image and return its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, image: &EncodedImage) -> Result<String> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| Error::DirectoryCreate {
                path: self.dir.clone(),
                source,
            })?;
        }

        let path = self.dir.join(Self::file_name(image));
        if path.exists() {
            debug!("Photo already stored at {}", path.display());
        } else {
            std::fs::write(&path, image.bytes())?;
            debug!("Stored {} byte photo at {}", image.len(), path.display());
        }

        Ok(path.to_string_lossy().into_owned())
    }

    /// Delete every stored photo, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a file cannot be
    /// removed.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Removed {} photos from {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}
