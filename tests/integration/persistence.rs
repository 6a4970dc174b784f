//! Persistence across reopen through the top-level facade.

use crate::common::*;
use verso::{ErrorCode, KeyValueStore};

#[test]
fn history_survives_reopen() {
    let (dir, doc) = temp_document();
    doc.save_now(paragraph("A")).unwrap();
    let branch = doc.create_branch(1).unwrap();
    doc.save_now(paragraph("B")).unwrap();
    doc.close();

    let doc = reopen(dir.path());
    assert!(doc.load_error().is_none());
    assert_eq!(doc.active_branch().unwrap().id, branch.id);
    assert_eq!(doc.version_content(2).unwrap(), paragraph("B"));
}

#[test]
fn garbage_on_disk_starts_fresh() {
    let (dir, doc) = temp_document();
    doc.close();

    let store = verso::FileStore::open(dir.path()).unwrap();
    store.write("document-versions", b"]]] not json").unwrap();

    let doc = reopen(dir.path());
    assert_eq!(doc.load_error().unwrap().code(), ErrorCode::StorageError);
    assert!(doc.with_history(|h| !h.has_content()));
    assert!(dir.path().join("document-versions.bak").exists());
}
