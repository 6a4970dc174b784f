//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
pub use verso::{Document, HistoryEngine, VersoConfig, MAIN_BRANCH_ID};

/// A minimal editor document holding one paragraph.
pub fn paragraph(text: &str) -> Value {
    json!({
        "type": "doc",
        "content": [{"type": "paragraph", "content": [{"type": "text", "text": text}]}]
    })
}

/// Open a document in a fresh temp directory.
///
/// The directory is returned so it outlives the document.
pub fn temp_document() -> (TempDir, Document) {
    let dir = TempDir::new().unwrap();
    let doc = Document::open_dir(dir.path()).unwrap();
    (dir, doc)
}

/// Reopen the document kept in `dir`.
pub fn reopen(dir: &Path) -> Document {
    Document::open_dir(dir).unwrap()
}
