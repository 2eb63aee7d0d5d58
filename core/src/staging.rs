//! Copies a picked image into a temporary file ahead of upload.
//!
//! A `PendingUpload` owns its temporary path: dropping it removes the file.
//! Create and update commands take the upload by value, so the file lives
//! exactly as long as the command that sends it.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::error::StagingError;

/// Something the user picked that can be read as an image.
pub trait ImageSource: Send + Sync {
    /// Content type reported by the source, if known.
    fn content_type(&self) -> Option<String>;

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>>;
}

/// An image on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
    pub content_type: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, content_type: Option<&str>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

impl ImageSource for FileSource {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// An image already held in memory, e.g. a camera capture.
#[derive(Debug, Clone)]
pub struct BytesSource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ImageSource for BytesSource {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(Cursor::new(self.bytes.as_slice())))
    }
}

/// A staged image waiting to be sent.
#[derive(Debug)]
pub struct PendingUpload {
    path: TempPath,
    mime_type: &'static str,
}

impl PendingUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Extension for a reported content type; unknown types are treated as JPEG.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some(ct) if ct.contains("png") => ".png",
        Some(ct) if ct.contains("gif") => ".gif",
        _ => ".jpg",
    }
}

/// MIME type sent for a staged file, keyed on its extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        ".png" => "image/png",
        ".gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// Stages images into a fixed directory.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Default for Stager {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `source` into a new temporary file named `<prefix>…<ext>`.
    pub fn stage(&self, source: &dyn ImageSource, prefix: &str) -> Result<PendingUpload, StagingError> {
        let content_type = source.content_type();
        let extension = extension_for(content_type.as_deref());

        let mut reader = source.open().map_err(StagingError::Open)?;
        let mut file = Builder::new()
            .prefix(prefix)
            .suffix(extension)
            .tempfile_in(&self.dir)
            .map_err(StagingError::Create)?;

        // On failure `file` is dropped here, which deletes the partial copy.
        let copied = io::copy(&mut reader, file.as_file_mut()).map_err(|e| {
            warn!(error = %e, "image copy interrupted");
            StagingError::Copy(e)
        })?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes = copied, ?content_type, "staged image");
        Ok(PendingUpload {
            path,
            mime_type: mime_for_extension(extension),
        })
    }
}
