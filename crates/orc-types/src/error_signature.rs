use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Stable hash of (tool, error class, error-message prefix), used by the
/// Agent Runtime's loop detector (spec §3, "ErrorSignature").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorSignature {
    pub tool_name: String,
    pub error_class: String,
    pub message_prefix: String,
}

const MESSAGE_PREFIX_LEN: usize = 120;

impl ErrorSignature {
    pub fn new(tool_name: impl Into<String>, error_class: impl Into<String>, message: &str) -> Self {
        let message_prefix: String = message.chars().take(MESSAGE_PREFIX_LEN).collect();
        Self {
            tool_name: tool_name.into(),
            error_class: error_class.into(),
            message_prefix,
        }
    }

    pub fn hash_hex(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}
