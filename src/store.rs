//! On-disk home of the most recent upload.
//!
//! Only one document exists at a time; each upload overwrites it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// File name of the persisted markdown document.
pub const DOCUMENT_FILE: &str = "slide.md";

/// File name of the generated presentation page.
pub const PAGE_FILE: &str = "index.html";

/// Deck shown before anything has been uploaded.
pub const WELCOME_DOCUMENT: &str = "# Welcome to Easy Slide

Use the upload button to upload your markdown file

---

## How to Use

1. Upload your markdown file
2. View your presentation here
3. Use arrow keys to navigate

---

## Markdown Syntax

- Use three dashes (---) to separate slides
- Use two dashes (--) for vertical slides
- Standard markdown formatting works
- Code blocks are syntax highlighted";

#[derive(Debug, Error)]
#[error("{action} {}: {source}", .path.display())]
pub struct StoreError {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl StoreError {
    fn new(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct SlideStore {
    dir: PathBuf,
}

impl SlideStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(DOCUMENT_FILE)
    }

    pub fn page_path(&self) -> PathBuf {
        self.dir.join(PAGE_FILE)
    }

    pub fn has_document(&self) -> bool {
        self.document_path().is_file()
    }

    pub fn has_page(&self) -> bool {
        self.page_path().is_file()
    }

    /// Create the storage directory (and parents) if missing.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::new("failed to create directory", &self.dir, e))
    }

    pub fn save_document(&self, markdown: &[u8]) -> Result<PathBuf, StoreError> {
        self.write(self.document_path(), markdown)
    }

    pub fn save_page(&self, html: &str) -> Result<PathBuf, StoreError> {
        self.write(self.page_path(), html.as_bytes())
    }

    /// Write [`WELCOME_DOCUMENT`] unless a document is already present.
    /// Returns whether anything was written.
    pub fn seed_document(&self) -> Result<bool, StoreError> {
        if self.has_document() {
            return Ok(false);
        }
        self.save_document(WELCOME_DOCUMENT.as_bytes())?;
        tracing::info!("Seeded welcome document at {}", self.document_path().display());
        Ok(true)
    }

    pub fn load_document(&self) -> Result<String, StoreError> {
        let path = self.document_path();
        std::fs::read_to_string(&path).map_err(|e| StoreError::new("failed to read", &path, e))
    }

    fn write(&self, path: PathBuf, contents: &[u8]) -> Result<PathBuf, StoreError> {
        self.ensure_dir()?;
        std::fs::write(&path, contents).map_err(|e| StoreError::new("failed to write", &path, e))?;
        tracing::debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlideStore::new(tmp.path().join("nested").join("static"));

        let path = store.save_document(b"# Hi").unwrap();

        assert_eq!(path, store.document_path());
        assert_eq!(store.load_document().unwrap(), "# Hi");
    }

    #[test]
    fn save_overwrites_previous_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlideStore::new(tmp.path());

        store.save_document(b"first").unwrap();
        store.save_document(b"second").unwrap();

        assert_eq!(store.load_document().unwrap(), "second");
    }

    #[test]
    fn load_missing_document_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlideStore::new(tmp.path());

        let err = store.load_document().unwrap_err();
        assert_eq!(err.path(), store.document_path());
        assert!(err.to_string().starts_with("failed to read"));
    }

    #[test]
    fn seed_keeps_existing_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SlideStore::new(tmp.path());

        assert!(store.seed_document().unwrap());
        assert_eq!(store.load_document().unwrap(), WELCOME_DOCUMENT);

        store.save_document(b"mine").unwrap();
        assert!(!store.seed_document().unwrap());
        assert_eq!(store.load_document().unwrap(), "mine");
    }

    #[test]
    fn welcome_document_has_three_slides() {
        assert_eq!(crate::deck::Deck::parse(WELCOME_DOCUMENT).len(), 3);
    }
}
