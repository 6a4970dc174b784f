//! Branching through the top-level facade.

use crate::common::*;

#[test]
fn fork_edit_and_return() {
    let (_dir, doc) = temp_document();
    doc.save_now(paragraph("A")).unwrap();
    doc.save_now(paragraph("B")).unwrap();

    let branch = doc.create_branch(1).unwrap();
    let c = doc.save_now(paragraph("C")).unwrap();
    assert_eq!(c, 3);

    let versions = doc.branch_versions(&branch.id).unwrap();
    let numbers: Vec<_> = versions.iter().map(|bv| bv.version.version).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert!(versions[1].is_head);

    doc.switch_branch(MAIN_BRANCH_ID).unwrap();
    assert_eq!(doc.current_version(), 2);
    assert_eq!(doc.version_content(2).unwrap(), paragraph("B"));
}

#[test]
fn nested_branches_inherit_only_up_to_fork() {
    let (_dir, doc) = temp_document();
    for text in ["1", "2", "3"] {
        doc.save_now(paragraph(text)).unwrap();
    }
    let outer = doc.create_branch(2).unwrap();
    doc.save_now(paragraph("outer")).unwrap();
    let inner = doc.create_branch(4).unwrap();
    doc.save_now(paragraph("inner")).unwrap();

    assert_eq!(inner.parent_branch_id.as_deref(), Some(outer.id.as_str()));
    let numbers: Vec<_> = doc
        .branch_versions(&inner.id)
        .unwrap()
        .iter()
        .map(|bv| bv.version.version)
        .collect();
    assert_eq!(numbers, vec![1, 2, 4, 5]);
}
