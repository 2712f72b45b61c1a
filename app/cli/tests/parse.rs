//! Tests for CLI argument parsing.

use clap::Parser;
use kestrel_cli::{Cli, Command, cmd::providers::format_entry, terminal};
use model::ProviderEntry;
use runtime::Decision;
use std::path::Path;

#[test]
fn cli_defaults_to_chat() {
    let cli = Cli::parse_from(["kestrel"]);
    assert!(cli.command.is_none());
    assert!(!cli.yes);
    assert!(!cli.verbose);
}

#[test]
fn cli_parse_chat() {
    let cli = Cli::parse_from(["kestrel", "chat"]);
    assert!(matches!(cli.command, Some(Command::Chat)));
}

#[test]
fn cli_parse_send() {
    let cli = Cli::parse_from(["kestrel", "send", "hello world"]);
    match cli.command {
        Some(Command::Send { content }) => assert_eq!(content, "hello world"),
        _ => panic!("expected Send command"),
    }
}

#[test]
fn cli_parse_global_flags() {
    let cli = Cli::parse_from([
        "kestrel",
        "send",
        "hi",
        "--provider",
        "claude",
        "--root",
        "/tmp/project",
        "--config",
        "kestrel.toml",
        "-y",
        "-v",
    ]);
    let options = cli.options();
    assert_eq!(options.provider.as_deref(), Some("claude"));
    assert_eq!(options.root.as_deref(), Some(Path::new("/tmp/project")));
    assert_eq!(options.config.as_deref(), Some(Path::new("kestrel.toml")));
    assert!(options.yes);
    assert!(cli.verbose);
}

#[test]
fn cli_parse_providers() {
    let cli = Cli::parse_from(["kestrel", "providers"]);
    assert!(matches!(cli.command, Some(Command::Providers)));
}

#[test]
fn permission_answers() {
    assert_eq!(terminal::parse_answer("y\n"), Decision::Approve);
    assert_eq!(terminal::parse_answer("YES"), Decision::Approve);
    assert_eq!(terminal::parse_answer(" a "), Decision::ApproveAndRemember);
    assert_eq!(terminal::parse_answer("always"), Decision::ApproveAndRemember);
    assert_eq!(terminal::parse_answer("n"), Decision::Deny);
    assert_eq!(terminal::parse_answer(""), Decision::Deny);
    assert_eq!(terminal::parse_answer("maybe"), Decision::Deny);
}

#[test]
fn preview_cuts_long_output() {
    assert_eq!(terminal::preview("short"), "short");
    assert_eq!(terminal::preview("first\nsecond"), "first ...");
    let long = "x".repeat(500);
    assert_eq!(terminal::preview(&long).chars().count(), 124);
}

#[test]
fn provider_listing_marks_active() {
    let entry = ProviderEntry {
        name: "local".into(),
        kind: "ollama",
        models: vec!["llama3.1".into(), "qwen2.5".into()],
        token_limit: 128_000,
        active: true,
    };
    let line = format_entry(&entry);
    assert!(line.starts_with("* local"));
    assert!(line.contains("ollama"));
    assert!(line.contains("128000 tokens"));
    assert!(line.ends_with("llama3.1, qwen2.5"));
}
