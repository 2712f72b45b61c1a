//! Role alternation for backends that require strict user/assistant turns.

use crate::model::{Message, Role};

/// Text of the turn synthesized when nothing else survives.
pub const PLACEHOLDER_TURN: &str = "Hello";

/// A conversation split into an out-of-band system prompt and alternating
/// turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alternated {
    /// System messages joined by blank lines, if any.
    pub system: Option<String>,
    /// Turns starting with user and alternating strictly.
    pub turns: Vec<Message>,
}

/// Normalize `messages` into strictly alternating turns.
///
/// System messages move out of the turn sequence, tool messages are treated
/// as assistant turns, adjacent turns of the same role are merged, and
/// leading non-user turns are dropped. An empty result becomes a single
/// minimal user turn.
pub fn alternate(messages: &[Message]) -> Alternated {
    let mut system = Vec::new();
    let mut turns: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        let mut message = message.clone();
        match message.role {
            Role::System => {
                system.push(message.text());
                continue;
            }
            Role::Tool => message.role = Role::Assistant,
            Role::User | Role::Assistant => {}
        }

        if turns.is_empty() && message.role != Role::User {
            continue;
        }

        match turns.last_mut() {
            Some(last) if last.role == message.role => last.merge(message),
            _ => turns.push(message),
        }
    }

    if turns.is_empty() {
        turns.push(Message::user(PLACEHOLDER_TURN));
    }

    let system = system.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
    Alternated {
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        turns,
    }
}
