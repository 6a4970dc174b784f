//! Document Service Tests
//!
//! Tests verifying the shared document handle end to end:
//! - Debounced saves collapse into one version
//! - A save requested on one branch never lands on another
//! - History survives close and reopen through a file-backed store

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use verso_core::MAIN_BRANCH_ID;
use verso_engine::{ContentSink, Document, VersoConfig, CONFIG_FILE_NAME};
use verso_storage::MemoryStore;

fn quick() -> VersoConfig {
    VersoConfig {
        save_debounce_ms: 40,
        ..VersoConfig::default()
    }
}

fn slow() -> VersoConfig {
    VersoConfig {
        save_debounce_ms: 60_000,
        ..VersoConfig::default()
    }
}

/// Sink recording everything pushed to it
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Value>>>);

impl ContentSink for Recorder {
    fn set_content(&self, content: &Value) {
        self.0.lock().push(content.clone());
    }
}

#[test]
fn test_typing_burst_commits_once() {
    let doc = Document::open(&quick(), MemoryStore::new()).unwrap();

    for i in 0..10 {
        doc.record_change(json!({"stepType": "replace", "from": i}));
        doc.request_save(json!({"text": "x".repeat(i + 1)}));
    }
    assert!(doc.wait_for_idle(Duration::from_secs(5)));

    doc.with_history(|h| {
        assert_eq!(h.version_count(), 1);
        let version = h.version(1).unwrap();
        assert_eq!(version.content, json!({"text": "xxxxxxxxxx"}));
        assert_eq!(version.steps.len(), 10);
    });
}

#[test]
fn test_pending_save_never_crosses_branches() {
    let doc = Document::open(&slow(), MemoryStore::new()).unwrap();
    doc.save_now(json!("A")).unwrap();
    doc.save_now(json!("B")).unwrap();
    let branch = doc.create_branch(1).unwrap();

    // Requested on the new branch, then the user switches away
    doc.request_save(json!("draft"));
    doc.switch_branch(MAIN_BRANCH_ID).unwrap();
    assert!(!doc.flush());

    doc.with_history(|h| {
        assert_eq!(h.version_count(), 2);
        assert_eq!(h.active_branch_id(), MAIN_BRANCH_ID);
    });
    assert_eq!(doc.branch_versions(&branch.id).unwrap().len(), 1);
}

#[test]
fn test_save_lands_on_branch_it_was_requested_on() {
    let doc = Document::open(&slow(), MemoryStore::new()).unwrap();
    doc.save_now(json!("A")).unwrap();
    let branch = doc.create_branch(1).unwrap();

    doc.request_save(json!("on branch"));
    assert!(doc.flush());

    let versions = doc.branch_versions(&branch.id).unwrap();
    assert_eq!(versions.len(), 2);
    assert!(versions[1].is_head);
    assert_eq!(versions[1].version.content, json!("on branch"));
    assert_eq!(versions[1].version.branch_id, branch.id);
}

#[test]
fn test_reopen_from_directory() {
    let dir = TempDir::new().unwrap();
    let branch_id = {
        let doc = Document::open_dir(dir.path()).unwrap();
        doc.save_now(json!("A")).unwrap();
        doc.save_now(json!("B")).unwrap();
        let branch = doc.create_branch(1).unwrap();
        doc.save_now(json!("C")).unwrap();
        doc.close();
        branch.id
    };
    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert!(dir.path().join("document-versions").exists());

    let sink = Recorder::default();
    let config = VersoConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
    let store = verso_storage::FileStore::open(dir.path()).unwrap();
    let doc = Document::open_with_sink(&config, store, sink.clone()).unwrap();

    assert!(doc.load_error().is_none());
    assert_eq!(doc.active_branch().unwrap().id, branch_id);
    assert_eq!(doc.current_version(), 3);
    assert_eq!(doc.version_content(2).unwrap(), json!("B"));
    assert_eq!(*sink.0.lock(), vec![json!("C")]);

    let names: Vec<_> = doc.branches().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["Main".to_string(), "Branch 1".to_string()]);
}

#[test]
fn test_custom_storage_key_from_config() {
    let dir = TempDir::new().unwrap();
    let config = VersoConfig {
        storage_key: "notes".to_string(),
        ..slow()
    };
    config.write_to_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();

    let doc = Document::open_dir(dir.path()).unwrap();
    doc.save_now(json!("hello")).unwrap();
    doc.close();

    assert!(dir.path().join("notes").exists());
    assert!(!dir.path().join("document-versions").exists());
}

#[test]
fn test_concurrent_edits_and_queries() {
    let doc = Arc::new(Document::open(&quick(), MemoryStore::new()).unwrap());
    doc.save_now(json!(0)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let doc = Arc::clone(&doc);
            std::thread::spawn(move || {
                for i in 0..25 {
                    doc.record_change(json!({"thread": t, "i": i}));
                    let _ = doc.branch_versions(MAIN_BRANCH_ID).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    doc.with_history(|h| assert_eq!(h.pending_changes().len(), 100));
    let n = doc.save_now(json!(1)).unwrap();
    doc.with_history(|h| assert_eq!(h.version(n).unwrap().steps.len(), 100));
}
