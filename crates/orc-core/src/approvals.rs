use std::path::PathBuf;
use std::sync::Arc;

use orc_types::{Approval, ApprovalId, ApprovalVerdict, InvocationRequest};
use tokio::sync::RwLock;

use crate::paths::write_atomic;

/// Durable, append-then-update JSON ledger of [`Approval`] records (spec
/// §4.6). Keyed by approval id; writes are atomic (write-temp-then-rename).
/// Grounded on `tandem-core::permissions::PermissionManager`'s
/// `Arc<RwLock<HashMap<..>>>` in-memory index, generalized to also persist
/// to disk on every mutation so pending approvals survive a process
/// restart, as spec'd.
#[derive(Clone)]
pub struct ApprovalStore {
    path: PathBuf,
    approvals: Arc<RwLock<Vec<Approval>>>,
}

impl ApprovalStore {
    pub fn new(path: PathBuf) -> Self {
        let approvals = load(&path).unwrap_or_default();
        Self {
            path,
            approvals: Arc::new(RwLock::new(approvals)),
        }
    }

    pub async fn create(
        &self,
        request: InvocationRequest,
        requester_agent: String,
    ) -> std::io::Result<Approval> {
        let approval = Approval::pending(request, requester_agent);
        let mut approvals = self.approvals.write().await;
        approvals.push(approval.clone());
        self.persist(&approvals)?;
        Ok(approval)
    }

    pub async fn list(&self, status: Option<&str>) -> Vec<Approval> {
        let approvals = self.approvals.read().await;
        approvals
            .iter()
            .filter(|a| match status {
                None => true,
                Some("pending") => matches!(a.verdict, ApprovalVerdict::Pending),
                Some("approved") => matches!(a.verdict, ApprovalVerdict::Approved),
                Some("rejected") => matches!(a.verdict, ApprovalVerdict::Rejected { .. }),
                Some(_) => true,
            })
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: ApprovalId) -> Option<Approval> {
        self.approvals
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// Finds the most recent already-decided approval for the same tool
    /// invocation (matched by tool name, requesting agent, and arguments —
    /// not `task_id`, since a resumed task is built fresh with its own id
    /// each time `Orchestrator::execute` runs). Lets `Governance::decide`
    /// resume a previously approved/rejected call instead of parking a new
    /// pending record every time the same request is re-submitted.
    pub async fn find_decided_for(&self, request: &InvocationRequest) -> Option<Approval> {
        let approvals = self.approvals.read().await;
        approvals
            .iter()
            .rev()
            .find(|a| {
                a.is_decided()
                    && a.request.tool_name == request.tool_name
                    && a.request.agent == request.agent
                    && a.request.args == request.args
            })
            .cloned()
    }

    /// Transitions a pending approval to `approved`/`rejected`. Returns
    /// `Ok(None)` if the id is unknown, and leaves an already-decided
    /// approval untouched (spec invariant: "once decided, never transitions
    /// again").
    pub async fn decide(
        &self,
        id: ApprovalId,
        verdict: ApprovalVerdict,
        operator_note: Option<String>,
    ) -> std::io::Result<Option<Approval>> {
        let mut approvals = self.approvals.write().await;
        let Some(approval) = approvals.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if approval.is_decided() {
            return Ok(Some(approval.clone()));
        }
        approval.verdict = verdict;
        approval.decided_at = Some(chrono::Utc::now());
        approval.operator_note = operator_note;
        let decided = approval.clone();
        self.persist(&approvals)?;
        Ok(Some(decided))
    }

    fn persist(&self, approvals: &[Approval]) -> std::io::Result<()> {
        let bytes = serde_json::to_vec_pretty(approvals)?;
        write_atomic(&self.path, &bytes)
    }
}

fn load(path: &PathBuf) -> std::io::Result<Vec<Approval>> {
    match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
        Ok(_) => Ok(Vec::new()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err),
    }
}
