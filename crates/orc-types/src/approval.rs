use serde::{Deserialize, Serialize};

use crate::{ApprovalId, InvocationRequest};

/// Operator verdict on an [`Approval`] (spec §3, "Approval").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ApprovalVerdict {
    Pending,
    Approved,
    Rejected { reason: String },
}

/// A persisted, operator-decided authorization to perform one tool
/// invocation (spec §3, "Approval"). Once `decided_at` is set the verdict
/// never transitions again (spec invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub request: InvocationRequest,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub requester_agent: String,
    pub verdict: ApprovalVerdict,
    pub decided_at: Option<chrono::DateTime<chrono::Utc>>,
    pub operator_note: Option<String>,
}

impl Approval {
    pub fn pending(request: InvocationRequest, requester_agent: impl Into<String>) -> Self {
        Self {
            id: ApprovalId::new(),
            request,
            created_at: chrono::Utc::now(),
            requester_agent: requester_agent.into(),
            verdict: ApprovalVerdict::Pending,
            decided_at: None,
            operator_note: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self.verdict, ApprovalVerdict::Pending)
    }
}
