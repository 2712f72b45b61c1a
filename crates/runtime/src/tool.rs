//! Tool registry and dispatch.

use compact_str::CompactString;
use kcore::{Tool, ToolCall};
use std::{collections::BTreeMap, fmt, future::Future, pin::Pin, sync::Arc};

/// A type-erased async tool handler.
pub type Handler = Arc<
    dyn Fn(ToolCall) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>
        + Send
        + Sync,
>;

/// Output of one tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Result text handed back to the model.
    pub content: String,
    /// Whether the call failed.
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful result.
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool definitions with their handlers.
#[derive(Clone, Default)]
pub struct Toolbox {
    tools: BTreeMap<CompactString, (Tool, Handler)>,
}

impl Toolbox {
    /// An empty toolbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with its handler, replacing any tool of the same name.
    pub fn register<F, Fut>(&mut self, tool: Tool, handler: F)
    where
        F: Fn(ToolCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let name = tool.name.clone();
        let handler: Handler = Arc::new(move |call| Box::pin(handler(call)));
        self.tools.insert(name, (tool, handler));
    }

    /// Tool definitions, sorted by name.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.values().map(|(tool, _)| tool.clone()).collect()
    }

    /// Whether a tool named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run `call`. Unknown tools and handler failures become error results.
    pub async fn dispatch(&self, call: ToolCall) -> ToolOutput {
        let Some((_, handler)) = self.tools.get(call.name.as_str()) else {
            tracing::warn!("model called unknown tool {}", call.name);
            return ToolOutput::error(format!("function {} not available", call.name));
        };

        let name = call.name.clone();
        match handler(call).await {
            Ok(content) => ToolOutput::ok(content),
            Err(e) => {
                tracing::debug!("tool {name} failed: {e:#}");
                ToolOutput::error(format!("{e:#}"))
            }
        }
    }
}

impl fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}
