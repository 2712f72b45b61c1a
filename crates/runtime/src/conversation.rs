//! The per-conversation orchestrator.
//!
//! Each user turn runs one or more rounds. A round builds the context,
//! streams from the model, forwards every chunk to the UI and hands each
//! completed tool call to its own task, which runs the permission gate and
//! then the tool. The round commits to history only after the stream closes
//! and every tool task has finished; a failed or cancelled round leaves
//! history untouched.

use crate::{ContextBuilder, Event, PermissionGate, SessionFacts, Toolbox, ToolOutput};
use compact_str::{CompactString, format_compact};
use kcore::{
    Assembler, Message, Model, Request, StreamChunk, ToolCall, ToolEvent, ToolEventKind,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// Most rounds a single turn may run.
pub const MAX_ROUNDS: usize = 16;

/// Result text for a denied tool call.
pub const DENIED: &str = "permission denied by user";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model answered without further tool calls.
    Completed {
        /// Rounds the turn took.
        rounds: usize,
        /// The final assistant message.
        message: Message,
    },
    /// The turn was cancelled; the in-flight round was discarded.
    Cancelled,
    /// The turn failed; the in-flight round was discarded.
    Failed(String),
}

/// One conversation: history, gate, and the model serving it.
pub struct Conversation<M: Model> {
    model: M,
    context: ContextBuilder,
    facts: SessionFacts,
    toolbox: Arc<Toolbox>,
    gate: Arc<PermissionGate>,
    events: mpsc::UnboundedSender<Event>,
    history: Vec<Message>,
}

impl<M: Model> Conversation<M> {
    /// A conversation publishing UI events to `events`.
    pub fn new(
        model: M,
        toolbox: Toolbox,
        facts: SessionFacts,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            context: ContextBuilder::new(model.token_limit()),
            gate: Arc::new(PermissionGate::new(events.clone())),
            model,
            facts,
            toolbox: Arc::new(toolbox),
            events,
            history: Vec::new(),
        }
    }

    /// Replace the context builder.
    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// The permission gate.
    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Committed history.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Session facts.
    pub fn facts(&self) -> &SessionFacts {
        &self.facts
    }

    /// Replace the session facts, e.g. after switching provider.
    pub fn set_facts(&mut self, facts: SessionFacts) {
        self.facts = facts;
        self.context.set_token_limit(self.model.token_limit());
    }

    /// Forget history and cached permission decisions.
    pub fn clear(&mut self) {
        self.history.clear();
        self.gate.clear_cache();
    }

    /// Run one user turn.
    pub async fn turn(&mut self, text: &str, cancel: &CancellationToken) -> Outcome {
        let mut user = (!text.is_empty()).then(|| text.to_owned());
        for round in 1..=MAX_ROUNDS {
            let token = cancel.child_token();
            let result = self.round(round, user.as_deref(), &token).await;
            token.cancel();

            let (message, results) = match result {
                Ok(round) => round,
                Err(_) if cancel.is_cancelled() => return Outcome::Cancelled,
                Err(e) => return Outcome::Failed(e),
            };
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }

            let has_calls = message.has_tool_use();
            if let Some(text) = user.take() {
                self.history.push(Message::user(text));
            }
            if !message.is_empty() {
                self.history.push(message.clone());
            }
            self.history.extend(results);

            if !has_calls {
                return Outcome::Completed {
                    rounds: round,
                    message,
                };
            }
            tracing::debug!("round {round} requested tools, continuing");
        }
        Outcome::Failed(format!("stopped after {MAX_ROUNDS} rounds of tool calls"))
    }

    /// Stream one round, returning the assistant message and tool results.
    async fn round(
        &self,
        round: usize,
        user: Option<&str>,
        token: &CancellationToken,
    ) -> Result<(Message, Vec<Message>), String> {
        let messages = self.context.build(&self.facts, &self.history, user);
        let mut request = Request::default().with_messages(messages);
        if self.model.supports_tool_calling() && !self.toolbox.is_empty() {
            request = request.with_tools(self.toolbox.tools());
        }

        let mut rx = self.model.stream_response(request, token.clone());
        let mut assembler = Assembler::new();
        let mut tasks: Vec<(CompactString, JoinHandle<Message>)> = Vec::new();
        let group = format_compact!("round-{round}");
        let mut failure = None;
        while let Some(item) = rx.recv().await {
            let chunk = match item {
                Ok(StreamChunk::Error { message }) => {
                    failure = Some(message);
                    break;
                }
                Ok(chunk) => chunk,
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            };

            let call = assembler.accept(&chunk);
            self.emit(chunk);
            if let Some(call) = call {
                if tasks.is_empty() {
                    self.emit(StreamChunk::ToolCompletion(
                        ToolEvent::new(ToolEventKind::TaskStart, &call).with_group(group.clone()),
                    ));
                }
                tasks.push((call.id.clone(), self.spawn_tool(call, &group, token)));
            }
        }

        if let Some(message) = failure {
            tracing::error!("round {round} failed: {message}");
            token.cancel();
            for (_, task) in tasks {
                let _ = task.await;
            }
            return Err(message);
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (id, task) in tasks {
            let message = task.await.unwrap_or_else(|e| {
                tracing::error!("tool task for {id} failed: {e}");
                Message::tool(id, format!("tool task failed: {e}"), true)
            });
            results.push(message);
        }
        if token.is_cancelled() {
            return Err("cancelled".into());
        }
        Ok((assembler.finish(), results))
    }

    /// Gate and run `call` on its own task.
    fn spawn_tool(
        &self,
        call: ToolCall,
        group: &CompactString,
        token: &CancellationToken,
    ) -> JoinHandle<Message> {
        let gate = self.gate.clone();
        let toolbox = self.toolbox.clone();
        let events = self.events.clone();
        let group = group.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let emit = |event: ToolEvent| {
                let _ = events.send(Event::Chunk(StreamChunk::ToolCompletion(
                    event.with_group(group.clone()),
                )));
            };

            let verdict = gate.check(&call, &token).await;
            if !verdict.approved {
                emit(ToolEvent::new(ToolEventKind::Error, &call).with_error(DENIED));
                return Message::tool(call.id, DENIED, true);
            }

            emit(ToolEvent::new(ToolEventKind::Start, &call));
            let output = tokio::select! {
                biased;
                _ = token.cancelled() => ToolOutput::error("cancelled"),
                output = toolbox.dispatch(call.clone()) => output,
            };
            let event = if output.is_error {
                ToolEvent::new(ToolEventKind::Error, &call).with_error(output.content.clone())
            } else {
                ToolEvent::new(ToolEventKind::Complete, &call).with_result(output.content.clone())
            };
            emit(event);
            Message::tool(call.id, output.content, output.is_error)
        })
    }

    fn emit(&self, chunk: StreamChunk) {
        if self.events.send(Event::Chunk(chunk)).is_err() {
            tracing::trace!("no UI listening for chunks");
        }
    }
}

impl<M: Model + std::fmt::Debug> std::fmt::Debug for Conversation<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("model", &self.model)
            .field("history", &self.history.len())
            .field("gate", &self.gate)
            .finish()
    }
}
