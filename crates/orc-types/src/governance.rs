use serde::{Deserialize, Serialize};

use crate::ApprovalId;

/// Outcome of `Governance::decide` (spec §3, "GovernanceDecision").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GovernanceDecision {
    Execute,
    AutoApprove { reason: String },
    RequireApproval { approval_id: ApprovalId },
    Deny { reason: String },
}

impl GovernanceDecision {
    pub fn proceeds_now(&self) -> bool {
        matches!(self, GovernanceDecision::Execute | GovernanceDecision::AutoApprove { .. })
    }
}
