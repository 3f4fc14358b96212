//! Ties the Router, Agent Registry, Agent Runtime, and Fact Ledger into the
//! single `execute` entry point (spec §4.1). The nine-step behavior below
//! follows the spec's numbering directly; failure classification follows
//! its "Failure semantics" paragraph verbatim.

use std::collections::VecDeque;
use std::sync::Arc;

use orc_core::agents::AgentStatus;
use orc_core::{AgentRegistry, AgentRuntime, EmergencyStop, FactLedger};
use orc_types::{BudgetCeilings, Environment, RouteDecision, Task, TaskId, TaskStatus};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::router::{RouteContext, RouterChain};

const RECENT_HISTORY_CAPACITY: usize = 20;

/// `{task_id, status}` pair returned by `execute` (spec §4.1, "TaskResult").
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

impl TaskResult {
    fn new(task_id: TaskId, status: TaskStatus) -> Self {
        Self { task_id, status }
    }
}

pub struct Orchestrator {
    router: RouterChain,
    agents: AgentRegistry,
    runtime: Arc<AgentRuntime>,
    fact_ledger: Arc<FactLedger>,
    estop: EmergencyStop,
    ceilings: BudgetCeilings,
    recent_decisions: RwLock<VecDeque<RouteDecision>>,
}

impl Orchestrator {
    pub fn new(
        router: RouterChain,
        agents: AgentRegistry,
        runtime: Arc<AgentRuntime>,
        fact_ledger: Arc<FactLedger>,
        estop: EmergencyStop,
        ceilings: BudgetCeilings,
    ) -> Self {
        Self {
            router,
            agents,
            runtime,
            fact_ledger,
            estop,
            ceilings,
            recent_decisions: RwLock::new(VecDeque::with_capacity(RECENT_HISTORY_CAPACITY)),
        }
    }

    /// Spec §4.1, steps 1-9.
    pub async fn execute(&self, task_text: &str, environment: Environment) -> TaskResult {
        // 1. Emergency-stop check before any work begins.
        if self.estop.is_stopped() {
            return TaskResult::new(TaskId::new(), TaskStatus::Stopped {
                reason: "emergency stop active".to_string(),
            });
        }

        // 2. Build the Task.
        let task = Task::new(task_text, environment);

        // Zero-length (or whitespace-only) task text fails immediately,
        // without ever reaching the Router.
        if task_text.trim().is_empty() {
            return TaskResult::new(task.id, TaskStatus::Failed {
                reason: "empty_task".to_string(),
            });
        }

        // 3. Ask the Router for a RouteDecision.
        let recent_history: Vec<RouteDecision> =
            self.recent_decisions.read().await.iter().cloned().collect();
        let ctx = RouteContext {
            task_text,
            available_agents: self.agents.list(),
            recent_history: &recent_history,
        };
        let route = match self.router.analyze(&ctx).await {
            Some(route) => route,
            None => {
                // RouterChain's terminal strategy should always answer; if
                // every strategy somehow returned None, this is not an
                // exception per spec's failure semantics, it's a routing
                // void: fail cleanly rather than panic.
                return TaskResult::new(task.id, TaskStatus::Failed {
                    reason: "router produced no decision".to_string(),
                });
            }
        };
        self.remember_decision(route.clone()).await;

        // 4. Clarification short-circuit.
        if route.clarification_needed {
            let prompt = route
                .clarification_prompt
                .clone()
                .unwrap_or_else(|| "additional input required".to_string());
            return TaskResult::new(task.id, TaskStatus::AwaitingHumanInput { prompt });
        }

        // 5. Look up primary agent, falling back to the registry default.
        let primary = match self
            .agents
            .get(&route.primary)
            .or_else(|| self.agents.default_agent())
        {
            Some(agent) => agent.clone(),
            None => {
                return TaskResult::new(task.id, TaskStatus::Failed {
                    reason: "no_agent".to_string(),
                });
            }
        };

        // 6. Invoke the primary agent under the Task's BudgetState.
        let primary_result = self.runtime.run(&task, &primary, &self.ceilings).await;

        let status = match primary_result.status {
            AgentStatus::Succeeded => {
                let mut summary = primary_result.summary.clone().unwrap_or_default();

                // 7. Sequentially invoke secondary agents with the primary's
                // summarized result folded in as added context.
                for secondary_name in &route.secondary {
                    if self.estop.is_stopped() {
                        break;
                    }
                    let Some(secondary_agent) = self.agents.get(secondary_name) else {
                        continue;
                    };
                    let follow_up_text =
                        format!("{task_text}\n\nContext from {}: {summary}", primary.name);
                    let follow_up_task = Task::new(follow_up_text, environment).with_parent(task.id);
                    let secondary_result = self
                        .runtime
                        .run(&follow_up_task, secondary_agent, &self.ceilings)
                        .await;
                    if let Some(addition) = secondary_result.summary {
                        summary = format!("{summary}\n\n[{}]: {addition}", secondary_agent.name);
                    }
                }

                TaskStatus::Succeeded { summary }
            }
            AgentStatus::AwaitingApproval => TaskStatus::AwaitingApproval {
                approval_id: primary_result
                    .pending_approval
                    .expect("awaiting_approval always carries an approval id"),
            },
            AgentStatus::Stopped => TaskStatus::Stopped {
                reason: "emergency stop".to_string(),
            },
            AgentStatus::BudgetExhausted { reason } => TaskStatus::BudgetExhausted { reason },
            AgentStatus::Failed { reason } => TaskStatus::Failed { reason },
        };

        // 8. Record the outcome to the Fact Ledger for routing feedback.
        self.record_outcome(&primary.name, task_text, &status).await;

        // 9. Return the final TaskResult.
        TaskResult::new(task.id, status)
    }

    async fn remember_decision(&self, decision: RouteDecision) {
        let _ = self.fact_ledger.record_routing_decision(decision.clone()).await;
        let mut history = self.recent_decisions.write().await;
        if history.len() >= RECENT_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(decision);
    }

    async fn record_outcome(&self, agent_name: &str, task_text: &str, status: &TaskStatus) {
        match status {
            TaskStatus::Succeeded { summary } => {
                let _ = self.fact_ledger.record_success(agent_name, task_text).await;
                let _ = self
                    .fact_ledger
                    .record_solution(task_text, summary.clone())
                    .await;
                info!(agent = agent_name, "task succeeded");
            }
            TaskStatus::Failed { reason } => {
                let _ = self
                    .fact_ledger
                    .record_failure(agent_name, task_text, reason, Vec::new())
                    .await;
                warn!(agent = agent_name, reason, "task failed");
            }
            _ => {}
        }
    }
}
