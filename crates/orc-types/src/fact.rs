use serde::{Deserialize, Serialize};

/// One entry in the append-only Fact Ledger (spec §3, "FactEntry").
///
/// All string fields are expected to already be sanitized (spec invariant:
/// "sanitized before write") by the time a `FactEntry` is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactEntry {
    Success {
        pattern: String,
        action_type: String,
        n: u32,
    },
    Failure {
        pattern: String,
        action_type: String,
        error_signature: String,
        n: u32,
        suggested_fixes: Vec<String>,
    },
    Solution {
        task_fingerprint: String,
        summary: String,
    },
}

impl FactEntry {
    pub fn pattern(&self) -> Option<&str> {
        match self {
            FactEntry::Success { pattern, .. } | FactEntry::Failure { pattern, .. } => {
                Some(pattern)
            }
            FactEntry::Solution { .. } => None,
        }
    }
}
