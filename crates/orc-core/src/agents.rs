use orc_types::ApprovalId;

/// A pluggable agent kind. Per spec §4.3, agent kinds differ only in their
/// system prompt and the subset of tools they prefer — the cooperative
/// state machine itself lives in [`crate::runtime::AgentRuntime`] and is
/// shared across every kind. Grounded on
/// `tandem-core::agents::AgentDefinition`, trimmed of the desktop-specific
/// `mode`/`hidden`/`skills` fields that have no spec counterpart.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub preferred_tools: Vec<String>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        preferred_tools: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            preferred_tools,
        }
    }
}

/// Outcome of a single [`crate::runtime::AgentRuntime::run`] invocation
/// (spec §4.3, "AgentResult").
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub status: AgentStatus,
    pub summary: Option<String>,
    pub artifacts: Vec<String>,
    pub pending_approval: Option<ApprovalId>,
}

impl AgentResult {
    pub fn succeeded(summary: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Succeeded,
            summary: Some(summary.into()),
            artifacts: Vec::new(),
            pending_approval: None,
        }
    }

    pub fn awaiting_approval(approval_id: ApprovalId) -> Self {
        Self {
            status: AgentStatus::AwaitingApproval,
            summary: None,
            artifacts: Vec::new(),
            pending_approval: Some(approval_id),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Failed { reason: reason.into() },
            summary: None,
            artifacts: Vec::new(),
            pending_approval: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            status: AgentStatus::Stopped,
            summary: None,
            artifacts: Vec::new(),
            pending_approval: None,
        }
    }

    pub fn budget_exhausted(reason: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::BudgetExhausted { reason: reason.into() },
            summary: None,
            artifacts: Vec::new(),
            pending_approval: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentStatus {
    Succeeded,
    AwaitingApproval,
    Failed { reason: String },
    Stopped,
    BudgetExhausted { reason: String },
}

/// Registry of known agent kinds, keyed by name (spec §3, "Tool"-adjacent
/// registration pattern reused for agents; grounded on
/// `tandem-core::agents::AgentRegistry`).
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    default_agent: String,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>, default_agent: impl Into<String>) -> Self {
        Self {
            agents,
            default_agent: default_agent.into(),
        }
    }

    /// The built-in agent kinds named in spec §2's example list: Consulting,
    /// Docker, Config, Design. Each differs only in prompt/preferred tools.
    pub fn with_defaults() -> Self {
        let agents = vec![
            Agent::new(
                "consulting",
                "General-purpose consulting and Q&A agent",
                "You are a consulting agent. Answer questions and perform \
                 read-only investigation using the tools available to you.",
                vec!["read_file".to_string(), "list_containers".to_string()],
            ),
            Agent::new(
                "docker",
                "Container lifecycle operations",
                "You are a Docker operations agent. You can inspect, \
                 restart, and redeploy containers; treat destructive \
                 operations with care.",
                vec![
                    "list_containers".to_string(),
                    "restart_container".to_string(),
                    "shell".to_string(),
                ],
            ),
            Agent::new(
                "config",
                "Configuration file management",
                "You are a configuration agent. You read and write \
                 configuration files on behalf of the operator.",
                vec!["read_file".to_string(), "write_file".to_string()],
            ),
            Agent::new(
                "design",
                "From-scratch system design",
                "You are a system design agent. When essential parameters \
                 (scale, availability target, resource envelope, \
                 authentication availability) are missing, ask for them \
                 before proposing a design.",
                vec!["read_file".to_string()],
            ),
        ];
        Self::new(agents, "consulting")
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn default_agent(&self) -> Option<&Agent> {
        self.get(&self.default_agent)
    }

    pub fn list(&self) -> &[Agent] {
        &self.agents
    }
}
