use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Environment, TaskId};

/// A validated request to invoke a tool (spec §3, "InvocationRequest").
///
/// By the time Governance sees this, arguments have already been checked
/// against the tool's schema (spec invariant: "arguments have been validated
/// against the Tool's schema before Governance sees it").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub tool_name: String,
    pub args: Value,
    pub agent: String,
    pub task_id: TaskId,
    pub environment: Environment,
}

impl InvocationRequest {
    /// A short, stable digest of `args` suitable for `ToolResult.args_digest`
    /// and for error-signature / loop-detection keys.
    pub fn args_digest(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        self.args.to_string().hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}
