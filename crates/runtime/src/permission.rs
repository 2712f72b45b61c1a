//! Permission gate: risk classification and queued human approval.
//!
//! Every tool call resolves to approved or denied. Low-risk calls are
//! approved on the spot; the rest wait in a FIFO queue whose head is
//! published to the UI with a one-shot [`Responder`]. Decisions are cached
//! per conversation under a key derived from the tool name and its dominant
//! argument.

use crate::Event;
use compact_str::CompactString;
use kcore::ToolCall;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    fmt,
    path::{Component, Path},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Arguments that name the thing a call acts on, in priority order.
const DOMINANT_ARGS: &[&str] = &["path", "file_path", "filename", "command", "cmd"];

/// Arguments that carry file paths.
const PATH_ARGS: &[&str] = &[
    "path",
    "file_path",
    "filename",
    "source",
    "destination",
    "target",
];

const READ_TOOLS: &[&str] = &[
    "read_file",
    "list_files",
    "list_dir",
    "search",
    "grep",
    "glob",
    "find_files",
    "view",
];
const WRITE_TOOLS: &[&str] = &[
    "write_file",
    "edit_file",
    "create_file",
    "append_file",
    "apply_patch",
    "move_file",
];
const DELETE_TOOLS: &[&str] = &["delete_file", "remove_file", "delete"];
const SHELL_TOOLS: &[&str] = &["bash", "shell", "run_command", "execute"];

/// Commands that only read, when run without redirection or chaining.
const SAFE_COMMANDS: &[&str] = &[
    "ls", "pwd", "cat", "head", "tail", "wc", "echo", "grep", "rg", "tree", "which", "date",
    "whoami", "file", "stat", "du", "df",
];
const SAFE_GIT: &[&str] = &["status", "diff", "log", "show", "branch"];
const SHELL_META: &[&str] = &[">", "<", "|", ";", "&", "$(", "`"];

const DESTRUCTIVE: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r ",
    "sudo ",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    "chmod -r 777",
    "chmod 777",
    "git push --force",
    "git push -f",
    "git reset --hard",
    "git clean -f",
    ":(){",
    "shutdown",
    "reboot",
];

const SECRETS: &[&str] = &[
    ".env",
    ".ssh",
    ".git/",
    ".aws",
    ".gnupg",
    "id_rsa",
    "id_ed25519",
    ".pem",
    ".key",
    "credentials",
    "secrets",
];

/// How consequential a tool call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    /// Read-only; approved without asking.
    Low,
    /// Changes the project; needs approval.
    Medium,
    /// Destructive or touches sensitive locations; needs approval.
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Classification of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    /// Overall risk.
    pub level: RiskLevel,
    /// Human-readable reasons for the level.
    pub reasons: Vec<String>,
    /// File paths the call touches.
    pub paths: Vec<String>,
}

impl Assessment {
    fn new(level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reasons: vec![reason.into()],
            paths: Vec::new(),
        }
    }

    fn raise(&mut self, level: RiskLevel, reason: impl Into<String>) {
        self.level = self.level.max(level);
        self.reasons.push(reason.into());
    }
}

/// Classify a tool call. Pure: depends only on the call.
pub fn classify(call: &ToolCall) -> Assessment {
    let name = call.name.as_str();
    let paths: Vec<String> = PATH_ARGS
        .iter()
        .filter_map(|key| call.argument(key))
        .map(str::to_owned)
        .collect();

    let mut assessment = if READ_TOOLS.contains(&name) {
        Assessment::new(RiskLevel::Low, "read-only tool")
    } else if WRITE_TOOLS.contains(&name) {
        let mut assessment = Assessment::new(RiskLevel::Medium, "modifies files");
        for path in &paths {
            check_path(&mut assessment, path);
        }
        assessment
    } else if DELETE_TOOLS.contains(&name) {
        Assessment::new(RiskLevel::High, "deletes files")
    } else if SHELL_TOOLS.contains(&name) {
        let command = call
            .argument("command")
            .or_else(|| call.argument("cmd"))
            .unwrap_or_default();
        classify_command(command)
    } else {
        Assessment::new(RiskLevel::Medium, format!("unknown tool '{name}'"))
    };
    assessment.paths = paths;
    assessment
}

fn check_path(assessment: &mut Assessment, path: &str) {
    let p = Path::new(path);
    if p.is_absolute() || path.starts_with('~') {
        assessment.raise(RiskLevel::High, format!("absolute path {path}"));
    }
    if p.components().any(|c| c == Component::ParentDir) {
        assessment.raise(RiskLevel::High, format!("path {path} leaves the project"));
    }
    let lower = path.to_lowercase();
    if let Some(secret) = SECRETS.iter().find(|s| lower.contains(*s)) {
        assessment.raise(RiskLevel::High, format!("sensitive location ({secret})"));
    }
}

fn classify_command(command: &str) -> Assessment {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Assessment::new(RiskLevel::Medium, "empty shell command");
    }

    let lower = trimmed.to_lowercase();
    if let Some(pattern) = DESTRUCTIVE.iter().find(|p| lower.contains(*p)) {
        return Assessment::new(
            RiskLevel::High,
            format!("destructive command ({})", pattern.trim()),
        );
    }
    let fetches = lower.contains("curl") || lower.contains("wget");
    let pipes_to_shell = ["| sh", "|sh", "| bash", "|bash"]
        .iter()
        .any(|p| lower.contains(p));
    if fetches && pipes_to_shell {
        return Assessment::new(RiskLevel::High, "pipes a download into a shell");
    }

    let chained = SHELL_META.iter().any(|m| trimmed.contains(m));
    let mut words = trimmed.split_whitespace();
    let program = words.next().unwrap_or_default();
    let safe = match program {
        "git" => words.next().is_some_and(|sub| SAFE_GIT.contains(&sub)),
        "find" => !lower.contains("-delete") && !lower.contains("-exec"),
        program => SAFE_COMMANDS.contains(&program),
    };
    if safe && SECRETS.iter().any(|secret| lower.contains(secret)) {
        Assessment::new(RiskLevel::Medium, "reads a sensitive location")
    } else if safe && !chained {
        Assessment::new(RiskLevel::Low, "read-only command")
    } else {
        Assessment::new(RiskLevel::Medium, "runs a shell command")
    }
}

/// Cache key for a call: tool name plus its dominant argument.
pub fn cache_key(call: &ToolCall) -> String {
    let argument = DOMINANT_ARGS
        .iter()
        .find_map(|key| call.argument(key))
        .unwrap_or_default();
    format!("{}:{argument}", call.name)
}

/// Cache key covering every call to `tool`.
fn tool_key(tool: &str) -> String {
    format!("{tool}:*")
}

/// A human decision on a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run this call.
    Approve,
    /// Run this call and every later call to the same tool.
    ApproveAndRemember,
    /// Do not run this call.
    Deny,
}

impl Decision {
    fn approved(self) -> bool {
        !matches!(self, Self::Deny)
    }
}

/// One-shot channel answering a [`PermissionRequest`].
///
/// Dropping it without answering denies the request.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Decision>);

impl Responder {
    /// Approve this call.
    pub fn approve(self) {
        self.respond(Decision::Approve);
    }

    /// Approve this call and remember the approval for the tool.
    pub fn approve_and_remember(self) {
        self.respond(Decision::ApproveAndRemember);
    }

    /// Deny this call.
    pub fn deny(self) {
        self.respond(Decision::Deny);
    }

    /// Resolves once the gate has stopped waiting for an answer, either
    /// because the wait was cancelled or the request was answered elsewhere.
    pub async fn closed(&mut self) {
        self.0.closed().await;
    }

    /// Send `decision`.
    pub fn respond(self, decision: Decision) {
        if self.0.send(decision).is_err() {
            tracing::debug!("permission request was already resolved");
        }
    }
}

/// A queued call awaiting a human decision.
#[derive(Debug)]
pub struct PermissionRequest {
    /// Request id, unique per gate.
    pub id: u64,
    /// The call under review.
    pub call: ToolCall,
    /// Classified risk.
    pub risk: RiskLevel,
    /// Reasons for the risk level.
    pub reasons: Vec<String>,
    /// Paths the call touches.
    pub paths: Vec<String>,
    /// One-based queue position.
    pub position: usize,
    /// Queue length when published.
    pub total: usize,
    /// Where the decision goes.
    pub responder: Responder,
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// The bypass flag was set.
    Bypass,
    /// An earlier decision for the same key.
    Cached,
    /// Low risk.
    Auto,
    /// A human answered, or the wait was abandoned.
    User,
}

/// Outcome of [`PermissionGate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the call may run.
    pub approved: bool,
    /// How the verdict was reached.
    pub source: VerdictSource,
}

impl Verdict {
    fn new(approved: bool, source: VerdictSource) -> Self {
        Self { approved, source }
    }
}

struct Queued {
    id: u64,
    key: String,
    tool: CompactString,
    request: Option<PermissionRequest>,
}

#[derive(Default)]
struct State {
    cache: HashMap<String, bool>,
    queue: VecDeque<Queued>,
}

/// Per-conversation permission gate.
pub struct PermissionGate {
    bypass: AtomicBool,
    next_id: AtomicU64,
    state: Mutex<State>,
    events: mpsc::UnboundedSender<Event>,
}

impl PermissionGate {
    /// A gate publishing requests to `events`.
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            bypass: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            state: Mutex::new(State::default()),
            events,
        }
    }

    /// Approve every call without checks.
    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }

    /// Whether checks are bypassed.
    pub fn bypass(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }

    /// Number of requests waiting for a decision.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Forget every cached decision.
    pub fn clear_cache(&self) {
        self.state.lock().cache.clear();
    }

    /// Resolve `call` to a verdict, waiting for a human when needed.
    ///
    /// Cancelling `cancel` while queued resolves the call as denied.
    pub async fn check(&self, call: &ToolCall, cancel: &CancellationToken) -> Verdict {
        if self.bypass() {
            return Verdict::new(true, VerdictSource::Bypass);
        }

        let key = cache_key(call);
        let wide = tool_key(&call.name);
        let receiver = {
            let mut state = self.state.lock();
            if let Some(approved) = state
                .cache
                .get(&key)
                .or_else(|| state.cache.get(&wide))
                .copied()
            {
                return Verdict::new(approved, VerdictSource::Cached);
            }

            let assessment = classify(call);
            if assessment.level == RiskLevel::Low {
                state.cache.insert(key, true);
                return Verdict::new(true, VerdictSource::Auto);
            }

            let (tx, rx) = oneshot::channel();
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            state.queue.push_back(Queued {
                id,
                key,
                tool: call.name.clone(),
                request: Some(PermissionRequest {
                    id,
                    call: call.clone(),
                    risk: assessment.level,
                    reasons: assessment.reasons,
                    paths: assessment.paths,
                    position: 0,
                    total: 0,
                    responder: Responder(tx),
                }),
            });
            tracing::debug!("queued permission request {id} for {}", call.name);
            self.publish_head(&mut state);
            (id, rx)
        };

        let (id, rx) = receiver;
        let decision = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("permission request {id} cancelled");
                None
            }
            decision = rx => decision.ok(),
        };
        self.resolve(id, call, decision);
        let approved = decision.is_some_and(Decision::approved);
        Verdict::new(approved, VerdictSource::User)
    }

    /// Record `decision` for request `id` and promote the next request.
    ///
    /// `None` means the wait was abandoned: the call is denied but nothing
    /// is cached. A real decision also answers queued, unpublished requests
    /// it covers.
    fn resolve(&self, id: u64, call: &ToolCall, decision: Option<Decision>) {
        let key = cache_key(call);
        let mut state = self.state.lock();
        if let Some(decision) = decision {
            state.cache.insert(key.clone(), decision.approved());
            if decision == Decision::ApproveAndRemember {
                state.cache.insert(tool_key(&call.name), true);
            }
            if decision == Decision::Deny {
                tracing::warn!("tool call {key} denied");
            }

            for queued in state.queue.iter_mut().filter(|q| q.id != id) {
                let covered = queued.key == key
                    || (decision == Decision::ApproveAndRemember && queued.tool == call.name);
                if covered && let Some(request) = queued.request.take() {
                    request.responder.respond(decision);
                }
            }
        }

        let Some(index) = state.queue.iter().position(|queued| queued.id == id) else {
            return;
        };
        state.queue.remove(index);
        if index == 0 {
            self.publish_head(&mut state);
        }
    }

    /// Hand the head request to the UI if it has not been published yet.
    fn publish_head(&self, state: &mut State) {
        let total = state.queue.len();
        let Some(head) = state.queue.front_mut() else {
            return;
        };
        let Some(mut request) = head.request.take() else {
            return;
        };
        request.position = 1;
        request.total = total;
        if self.events.send(Event::Permission(request)).is_err() {
            tracing::warn!("no UI listening for permission requests");
        }
    }
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("bypass", &self.bypass())
            .field("pending", &self.pending())
            .finish()
    }
}
