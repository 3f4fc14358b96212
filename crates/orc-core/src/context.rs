use orc_types::{Conversation, Message};

/// Prunes a growing [`Conversation`] to fit a token budget (spec §4.8).
///
/// Policy, applied in order, stopping as soon as the conversation fits:
/// 1. Pin the system message (if any) and the last `keep_last_n_user`/
///    `keep_last_n_assistant` messages of each role.
/// 2. Collapse everything older than that pinned window into a single
///    synthetic `System` summary message.
/// 3. If still over budget, replace `ToolResult` messages oldest-first with
///    a one-line `System` marker naming the tool and args digest (they are
///    the cheapest to lose — their content is reconstructible by
///    re-invoking the tool) until the budget is met or none remain.
///
/// Grounded on the teacher's `engine_loop` context trimming, generalized
/// into a standalone, directly testable component.
pub struct ContextManager {
    pub max_context_tokens: usize,
    pub keep_last_n_user: usize,
    pub keep_last_n_assistant: usize,
}

impl ContextManager {
    pub fn new(max_context_tokens: usize, keep_last_n_user: usize, keep_last_n_assistant: usize) -> Self {
        Self {
            max_context_tokens,
            keep_last_n_user,
            keep_last_n_assistant,
        }
    }

    pub fn prune(&self, conversation: &Conversation) -> Conversation {
        if conversation.estimated_tokens() <= self.max_context_tokens {
            return conversation.clone();
        }

        let messages = conversation.messages();
        let system: Vec<Message> = messages
            .iter()
            .filter(|m| matches!(m, Message::System { .. }))
            .cloned()
            .collect();

        let pinned_indices = self.pinned_indices(messages);
        let pinned: Vec<Message> = pinned_indices
            .iter()
            .map(|&i| messages[i].clone())
            .collect();
        let dropped: Vec<&Message> = messages
            .iter()
            .enumerate()
            .filter(|(i, m)| !pinned_indices.contains(i) && !matches!(m, Message::System { .. }))
            .map(|(_, m)| m)
            .collect();

        let mut rebuilt = Vec::new();
        rebuilt.extend(system);
        if !dropped.is_empty() {
            rebuilt.push(Message::System {
                content: summarize(&dropped),
            });
        }
        rebuilt.extend(pinned);

        let mut pruned = Conversation::default();
        for m in rebuilt {
            pruned.push(m);
        }

        if pruned.estimated_tokens() <= self.max_context_tokens {
            return pruned;
        }

        self.drop_tool_results_until_fits(pruned)
    }

    fn pinned_indices(&self, messages: &[Message]) -> std::collections::HashSet<usize> {
        let mut user_seen = 0usize;
        let mut assistant_seen = 0usize;
        let mut pinned = std::collections::HashSet::new();
        for (i, m) in messages.iter().enumerate().rev() {
            match m {
                Message::User { .. } if user_seen < self.keep_last_n_user => {
                    pinned.insert(i);
                    user_seen += 1;
                }
                Message::Assistant { .. } if assistant_seen < self.keep_last_n_assistant => {
                    pinned.insert(i);
                    assistant_seen += 1;
                }
                Message::ToolResult { .. } => {
                    pinned.insert(i);
                }
                _ => {}
            }
        }
        pinned
    }

    /// Replaces each dropped `ToolResult` in place with a one-line `System`
    /// marker naming the tool and args digest (spec §4.8 step 4), so the
    /// conversation keeps an audit trail of what was omitted rather than
    /// losing the fact that a tool was ever called.
    fn drop_tool_results_until_fits(&self, conversation: Conversation) -> Conversation {
        let mut messages: Vec<Message> = conversation.into_messages();
        while {
            let probe = {
                let mut c = Conversation::default();
                for m in &messages {
                    c.push(m.clone());
                }
                c.estimated_tokens()
            };
            probe > self.max_context_tokens
        } {
            let Some(pos) = messages
                .iter()
                .position(|m| matches!(m, Message::ToolResult { .. }))
            else {
                break;
            };
            let Message::ToolResult {
                tool_name,
                args_digest,
                ..
            } = &messages[pos]
            else {
                unreachable!("position was just matched against Message::ToolResult");
            };
            messages[pos] = Message::System {
                content: format!("[omitted tool result: {tool_name} {args_digest}]"),
            };
        }
        let mut out = Conversation::default();
        for m in messages {
            out.push(m);
        }
        out
    }
}

fn summarize(dropped: &[&Message]) -> String {
    format!(
        "[context pruned: {} earlier message(s) summarized out of window]",
        dropped.len()
    )
}
