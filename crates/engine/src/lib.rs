//! History engine for Verso
//!
//! This crate orchestrates the lower layers:
//! - HistoryEngine: owns versions, branches, the cursor and pending changes
//! - persistence: loads and saves the engine through a key-value store
//! - SaveScheduler: debounces save requests into single commits
//! - Document: the service handle the editing surface and the branch
//!   visualization share
//! - VersoConfig: `verso.toml` settings
//!
//! The engine is the only component that knows about:
//! - Version numbering and branch ancestry
//! - Corruption detection and recovery
//! - Ordering between deferred saves and navigation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod history;
pub mod persistence;
pub mod scheduler;

pub use config::{VersoConfig, CONFIG_FILE_NAME, DEFAULT_SAVE_DEBOUNCE_MS, DEFAULT_STORAGE_KEY};
pub use document::{ContentSink, Document, NullSink};
pub use history::HistoryEngine;
pub use persistence::{load_history, save_history, LoadReport};
pub use scheduler::{PendingSave, SaveScheduler};
