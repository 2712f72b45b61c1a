//! Tests for session facts collection.

use kestrel_cli::{
    config::SessionConfig,
    facts::{collect, read_memory, scan_files},
};
use std::fs;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/bin")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::create_dir_all(root.join("target/debug")).unwrap();
    fs::write(root.join("Cargo.toml"), "[package]").unwrap();
    fs::write(root.join(".env"), "SECRET=1").unwrap();
    fs::write(root.join("src/lib.rs"), "").unwrap();
    fs::write(root.join("src/bin/main.rs"), "").unwrap();
    fs::write(root.join(".git/HEAD"), "").unwrap();
    fs::write(root.join("target/debug/app"), "").unwrap();
    dir
}

#[test]
fn scan_skips_hidden_and_build_output() {
    let dir = project();
    let files = scan_files(dir.path(), 100);
    assert_eq!(files, ["Cargo.toml", "src/lib.rs", "src/bin/main.rs"]);
}

#[test]
fn scan_respects_cap() {
    let dir = project();
    assert_eq!(scan_files(dir.path(), 2), ["Cargo.toml", "src/lib.rs"]);
    assert!(scan_files(dir.path(), 0).is_empty());
}

#[test]
fn memory_file_is_optional() {
    let dir = project();
    assert_eq!(read_memory(dir.path(), "KESTREL.md"), None);

    fs::write(dir.path().join("KESTREL.md"), "  \n").unwrap();
    assert_eq!(read_memory(dir.path(), "KESTREL.md"), None);

    fs::write(dir.path().join("KESTREL.md"), "Run cargo fmt.\n").unwrap();
    assert_eq!(
        read_memory(dir.path(), "KESTREL.md").as_deref(),
        Some("Run cargo fmt.\n")
    );
}

#[test]
fn collect_fills_every_fact() {
    let dir = project();
    fs::write(dir.path().join("KESTREL.md"), "Be careful.").unwrap();

    let facts = collect(dir.path(), "local", "llama3.1", &SessionConfig::default());
    assert_eq!(facts.provider, "local");
    assert_eq!(facts.model, "llama3.1");
    assert_eq!(facts.root, dir.path());
    assert!(facts.files.contains(&"KESTREL.md".to_owned()));
    assert_eq!(facts.memory.as_deref(), Some("Be careful."));
}
