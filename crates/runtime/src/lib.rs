//! Kestrel runtime: everything between the user and a [`kcore::Model`].
//!
//! The [`ContextBuilder`] fits history into the model's window, the
//! [`PermissionGate`] decides whether each tool call may run, the
//! [`Toolbox`] runs it, and the [`Conversation`] drives turns across all
//! three, publishing [`Event`]s for the UI.
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_runtime::{Conversation, SessionFacts, Toolbox};
//! use tokio_util::sync::CancellationToken;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut conversation = Conversation::new(model, Toolbox::new(), SessionFacts::default(), tx);
//! let outcome = conversation.turn("hello", &CancellationToken::new()).await;
//! ```

pub use context::{
    ContextBuilder, ConversationEntry, PREAMBLE, Selection, SessionFacts, importance, select,
    summarize,
};
pub use conversation::{Conversation, DENIED, MAX_ROUNDS, Outcome};
pub use event::Event;
pub use permission::{
    Assessment, Decision, PermissionGate, PermissionRequest, Responder, RiskLevel, Verdict,
    VerdictSource, cache_key, classify,
};
pub use tool::{Handler, ToolOutput, Toolbox};

mod context;
mod conversation;
mod event;
mod permission;
mod tool;
