//! Verso - versioned, branchable document history
//!
//! Verso keeps every saved state of a structured document as a numbered
//! version, lets the user fork a branch from any earlier version, and
//! persists the whole history to a key-value store with schema validation
//! and automatic recovery on reload.
//!
//! # Quick Start
//!
//! ```no_run
//! use verso::{Document, MAIN_BRANCH_ID};
//! use serde_json::json;
//!
//! let doc = Document::open_dir("./my-document")?;
//!
//! // Commit two versions on main
//! doc.save_now(json!({"type": "doc", "text": "A"}))?;
//! doc.save_now(json!({"type": "doc", "text": "B"}))?;
//!
//! // Fork from version 1 and keep editing there
//! let branch = doc.create_branch(1)?;
//! assert!(!branch.is_main);
//! doc.save_now(json!({"type": "doc", "text": "C"}))?;
//!
//! // Main still ends at B
//! doc.switch_branch(MAIN_BRANCH_ID)?;
//! assert_eq!(doc.version_content(2)?, json!({"type": "doc", "text": "B"}));
//! # Ok::<(), verso::HistoryError>(())
//! ```
//!
//! # Architecture
//!
//! - `verso-core`: data model, validation and the error taxonomy
//! - `verso-storage`: key-value backends, the codec seam and the blob shape
//! - `verso-engine`: the history engine, persistence, the save scheduler
//!   and the [`Document`] service handle

pub use verso_core::*;
pub use verso_engine::*;
pub use verso_storage::{
    FileStore, IdentityCodec, KeyValueStore, MemoryStore, PersistedHistory, StorageCodec,
    StorageError,
};
