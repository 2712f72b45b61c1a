//! Project facts for the system prompt: file list and memory file.

use crate::config::SessionConfig;
use compact_str::CompactString;
use runtime::SessionFacts;
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

/// Directories never listed.
const SKIP_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "dist", "build"];

/// Gather session facts for `root`.
pub fn collect(
    root: &Path,
    provider: impl Into<CompactString>,
    model: impl Into<CompactString>,
    session: &SessionConfig,
) -> SessionFacts {
    SessionFacts {
        provider: provider.into(),
        model: model.into(),
        root: root.to_owned(),
        files: scan_files(root, session.max_files),
        memory: read_memory(root, &session.memory_file),
    }
}

/// List up to `max` project files relative to `root`, breadth first.
///
/// Hidden entries and build output directories are skipped. Entries of
/// each directory are visited in name order.
pub fn scan_files(root: &Path, max: usize) -> Vec<String> {
    let mut files = Vec::new();
    let mut queue = VecDeque::from([PathBuf::new()]);
    while let Some(dir) = queue.pop_front() {
        let entries = match std::fs::read_dir(root.join(&dir)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("skipping {}: {e}", dir.display());
                continue;
            }
        };

        let mut entries: Vec<_> = entries.filter_map(|entry| entry.ok()).collect();
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let relative = dir.join(name.as_ref());
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_dir() {
                if !SKIP_DIRS.contains(&name.as_ref()) {
                    queue.push_back(relative);
                }
            } else {
                if files.len() == max {
                    return files;
                }
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    files
}

/// Read the project memory file, if present and non-empty.
pub fn read_memory(root: &Path, file: &str) -> Option<String> {
    if file.is_empty() {
        return None;
    }
    let path = root.join(file);
    match std::fs::read_to_string(&path) {
        Ok(memory) if !memory.trim().is_empty() => Some(memory),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("no project memory at {}: {e}", path.display());
            None
        }
    }
}
