//! Integration Tests
//!
//! End-to-end scenarios through the `verso` facade with file-backed
//! documents in temp directories.

#[path = "../common/mod.rs"]
mod common;

mod branching;
mod persistence;
