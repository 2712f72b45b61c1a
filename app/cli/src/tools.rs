//! Built-in tools: file access and shell, rooted at the project directory.
//!
//! Paths are resolved against the root as given. Keeping writes inside the
//! project is the permission gate's job, not the tools'.

use anyhow::{Context, Result};
use kcore::{Tool, ToolCall};
use runtime::Toolbox;
use schemars::JsonSchema;
use serde::{Deserialize, de::DeserializeOwned};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::process::Command;

/// Longest tool output handed back to the model, in bytes.
pub const MAX_OUTPUT: usize = 32 * 1024;

/// Shell commands run at most this long unless the call asks otherwise.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Read a text file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFile {
    /// Path of the file, relative to the project root.
    pub path: String,
}

/// Create or overwrite a text file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFile {
    /// Path of the file, relative to the project root.
    pub path: String,
    /// Full new contents of the file.
    pub content: String,
}

/// List a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFiles {
    /// Directory to list, relative to the project root. Defaults to the root.
    #[serde(default)]
    pub path: Option<String>,
}

/// Run a shell command.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Bash {
    /// Command line passed to `sh -c`, run in the project root.
    pub command: String,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn tool<T: JsonSchema>(name: &str, description: &str) -> Tool {
    Tool::new(name, description, schemars::schema_for!(T))
}

fn parse<T: DeserializeOwned>(call: &ToolCall) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(call.input.clone()))
        .with_context(|| format!("invalid arguments for {}", call.name))
}

/// The built-in toolbox for `root`.
pub fn toolbox(root: impl Into<PathBuf>) -> Toolbox {
    let root: PathBuf = root.into();
    let root: Arc<Path> = root.into();
    let mut toolbox = Toolbox::new();

    let dir = root.clone();
    toolbox.register(
        tool::<ReadFile>("read_file", "Read a text file in the project."),
        move |call| {
            let dir = dir.clone();
            async move { read_file(&dir, parse(&call)?).await }
        },
    );

    let dir = root.clone();
    toolbox.register(
        tool::<WriteFile>(
            "write_file",
            "Create or overwrite a text file in the project with the given content.",
        ),
        move |call| {
            let dir = dir.clone();
            async move { write_file(&dir, parse(&call)?).await }
        },
    );

    let dir = root.clone();
    toolbox.register(
        tool::<ListFiles>(
            "list_files",
            "List a directory in the project. Directories end with '/'.",
        ),
        move |call| {
            let dir = dir.clone();
            async move { list_files(&dir, parse(&call)?).await }
        },
    );

    toolbox.register(
        tool::<Bash>(
            "bash",
            "Run a shell command in the project root and return its output.",
        ),
        move |call| {
            let dir = root.clone();
            async move { bash(&dir, parse(&call)?).await }
        },
    );
    toolbox
}

/// Read `args.path` under `root`.
pub async fn read_file(root: &Path, args: ReadFile) -> Result<String> {
    let path = root.join(&args.path);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", args.path))?;
    Ok(truncate(content))
}

/// Write `args.content` to `args.path` under `root`, creating parents.
pub async fn write_file(root: &Path, args: WriteFile) -> Result<String> {
    let path = root.join(&args.path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, &args.content)
        .await
        .with_context(|| format!("failed to write {}", args.path))?;
    Ok(format!("wrote {} bytes to {}", args.content.len(), args.path))
}

/// List `args.path` under `root`, sorted, directories suffixed with `/`.
pub async fn list_files(root: &Path, args: ListFiles) -> Result<String> {
    let relative = args.path.unwrap_or_default();
    let dir = root.join(&relative);
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    if names.is_empty() {
        return Ok("(empty directory)".to_owned());
    }
    Ok(truncate(names.join("\n")))
}

/// Run `args.command` with `sh -c` in `root`.
///
/// A non-zero exit status is an error carrying the captured output.
pub async fn bash(root: &Path, args: Bash) -> Result<String> {
    let timeout = Duration::from_secs(args.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    tracing::debug!("running shell command: {}", args.command);
    let child = Command::new("sh")
        .arg("-c")
        .arg(&args.command)
        .current_dir(root)
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, child)
        .await
        .with_context(|| format!("command timed out after {}s", timeout.as_secs()))?
        .context("failed to spawn sh")?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    let text = truncate(text);

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_owned(), |code| code.to_string());
        anyhow::bail!("exit status {code}\n{text}");
    }
    if text.is_empty() {
        return Ok("(no output)".to_owned());
    }
    Ok(text)
}

/// Cut `text` to [`MAX_OUTPUT`] bytes on a char boundary.
pub fn truncate(mut text: String) -> String {
    if text.len() <= MAX_OUTPUT {
        return text;
    }
    let total = text.len();
    let mut end = MAX_OUTPUT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(&format!("\n[truncated, {total} bytes total]"));
    text
}
