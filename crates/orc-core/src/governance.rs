use orc_types::{
    ApprovalId, ApprovalVerdict, Environment, GovernanceDecision, InvocationRequest, RiskTag,
};

use crate::approvals::ApprovalStore;

const SHELL_LIKE_TOOLS: &[&str] = &["shell", "bash", "run_command", "terminal", "cmd"];

const READ_ONLY_COMMAND_PREFIXES: &[&str] = &[
    "status", "list", "ls", "info", "get", "show", "describe", "cat", "head", "tail", "grep",
    "find", "ps", "df", "du", "whoami", "echo", "pwd", "which", "env",
];

const DESTRUCTIVE_COMMAND_MARKERS: &[&str] = &[
    "rm ", "rm\t", "rm -", "delete", "drop table", "mkfs", "dd if=", "chmod 777", "chown",
    "sudo ", ">>", "> /", "| sh", "shutdown", "reboot",
];

/// Maps an `(InvocationRequest, environment, risk tag)` triple to a
/// [`GovernanceDecision`] via the fixed rule table in spec §4.5. Holds no
/// mutable state of its own beyond a handle to the [`ApprovalStore`] it
/// persists `RequireApproval` records into — grounded on
/// `tandem-core::permissions::PermissionManager::evaluate`, generalized from
/// wildcard-pattern rules to the spec's fixed risk/environment table.
pub struct Governance {
    approvals: ApprovalStore,
}

impl Governance {
    pub fn new(approvals: ApprovalStore) -> Self {
        Self { approvals }
    }

    /// `risk` is the tool's registered risk tag; this function applies the
    /// per-invocation shell-command override before consulting the rule
    /// table, per spec §4.5 "Per-invocation overrides".
    pub async fn decide(
        &self,
        request: &InvocationRequest,
        risk: RiskTag,
        allowed_contexts: &[String],
        requester_agent: &str,
    ) -> GovernanceDecision {
        if !allowed_contexts.is_empty()
            && !allowed_contexts
                .iter()
                .any(|ctx| ctx == &request.environment.to_string())
        {
            return GovernanceDecision::Deny {
                reason: "context not permitted".to_string(),
            };
        }

        let effective_risk = self.reclassify(request, risk);

        match effective_risk {
            RiskTag::Green => GovernanceDecision::Execute,
            RiskTag::Yellow if request.environment.is_non_production() => {
                GovernanceDecision::AutoApprove {
                    reason: "non-prod yellow".to_string(),
                }
            }
            RiskTag::Yellow | RiskTag::Red => {
                // Resume a previously decided approval for this same
                // invocation rather than parking a fresh pending one (spec
                // §4.5: "On approved, the Agent runtime re-enters the
                // ToolDispatch state with the same InvocationRequest and
                // performs the call").
                if let Some(existing) = self.approvals.find_decided_for(request).await {
                    return match existing.verdict {
                        ApprovalVerdict::Approved => GovernanceDecision::AutoApprove {
                            reason: "resumed from an approved approval".to_string(),
                        },
                        ApprovalVerdict::Rejected { reason } => GovernanceDecision::Deny { reason },
                        ApprovalVerdict::Pending => unreachable!(
                            "find_decided_for only returns decided approvals"
                        ),
                    };
                }

                match self
                    .approvals
                    .create(request.clone(), requester_agent.to_string())
                    .await
                {
                    Ok(approval) => GovernanceDecision::RequireApproval {
                        approval_id: approval.id,
                    },
                    Err(_) => GovernanceDecision::RequireApproval {
                        approval_id: ApprovalId::new(),
                    },
                }
            }
        }
    }

    /// Inspects a shell-like tool's command argument and re-derives its risk
    /// tag per spec §4.5: read-only allowlisted commands downgrade to
    /// `green`; destructive patterns upgrade to `red` and are never
    /// downgradable; anything else keeps its registered tag. Grounded on
    /// `tool_policy.rs::python_policy_violation`'s pattern-matching idiom.
    fn reclassify(&self, request: &InvocationRequest, registered: RiskTag) -> RiskTag {
        if !SHELL_LIKE_TOOLS.contains(&request.tool_name.as_str()) {
            return registered;
        }
        let Some(command) = extract_command(&request.args) else {
            return registered;
        };
        let lower = command.to_lowercase();

        if DESTRUCTIVE_COMMAND_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
        {
            return RiskTag::Red;
        }

        let first_token = lower.split_whitespace().next().unwrap_or("");
        if READ_ONLY_COMMAND_PREFIXES.contains(&first_token) {
            return RiskTag::Green;
        }

        registered
    }
}

fn extract_command(args: &serde_json::Value) -> Option<&str> {
    args.get("command")
        .or_else(|| args.get("cmd"))
        .or_else(|| args.get("script"))
        .and_then(|v| v.as_str())
}
