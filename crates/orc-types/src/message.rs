use serde::{Deserialize, Serialize};

/// One entry in a Task's [`Conversation`] (spec §3, "Message").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    ToolResult {
        tool_name: String,
        args_digest: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content } => content,
            Message::ToolResult { content, .. } => content,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Message::ToolResult { .. })
    }
}

/// Ordered message history visible to the LLM for a single agent run
/// (spec §3, "Conversation"). Pruning behavior lives in
/// `orc_core::context::ContextManager`; this type only owns the ordered
/// sequence and a cheap, continuously-updated token estimate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
    estimated_tokens: usize,
}

/// ~chars/4, matching spec §4.8's "estimated (≈ chars/4)" token policy.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.estimated_tokens += estimate_tokens(message.content());
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replace the whole message list (used by `ContextManager::prune`) and
    /// recompute the token estimate from scratch.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.estimated_tokens = messages.iter().map(|m| estimate_tokens(m.content())).sum();
        self.messages = messages;
    }
}
