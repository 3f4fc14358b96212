use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orc_providers::Provider;
use orc_tools::Registry as ToolRegistry;
use orc_types::{
    BudgetCeilings, BudgetState, Conversation, ErrorSignature, GovernanceDecision,
    InvocationRequest, Message, Task,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::agents::{Agent, AgentResult};
use crate::cost::CostTracker;
use crate::context::ContextManager;
use crate::estop::EmergencyStop;
use crate::facts::FactLedger;
use crate::governance::Governance;
use orc_sanitizer::Sanitizer;

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const LOOP_DETECTION_THRESHOLD: u32 = 3;

/// The cooperative reasoning/tool-dispatch loop shared by every agent kind
/// (spec §4.3). Agent kinds differ only in their system prompt and tool
/// preference — this struct owns the shared leaf components (LLM
/// provider, tool registry, governance, sanitizer, cost tracker, context
/// manager, emergency stop) and never branches on which agent is running.
/// Grounded on `tandem-core::engine_loop`'s reasoning/tool-dispatch
/// alternation, reimplemented directly from the spec's state machine
/// pseudocode rather than adapted line-by-line (the teacher's loop carries
/// streaming/UI concerns this spec does not have).
pub struct AgentRuntime {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    governance: Arc<Governance>,
    sanitizer: Sanitizer,
    cost_tracker: Arc<CostTracker>,
    fact_ledger: Arc<FactLedger>,
    context_manager: ContextManager,
    estop: EmergencyStop,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

enum RunState {
    Reasoning,
    ToolDispatch { name: String, args: Value },
    Final(String),
}

#[derive(Deserialize)]
struct ToolCallEnvelope {
    tool_call: ToolCallBody,
}

#[derive(Deserialize)]
struct ToolCallBody {
    name: String,
    #[serde(default)]
    args: Value,
}

/// Parses the strict `{"tool_call": {"name": "...", "args": {...}}}`
/// protocol embedded in assistant text (resolved Open Question: tool-call
/// wire format). Text with no `tool_call` marker at all is a Final
/// message, not a parse failure; text that looks like an attempted call
/// but doesn't parse is a `ValidationError`, per spec §7's "malformed →
/// ValidationError, not panic."
fn try_parse_tool_call(text: &str) -> Result<Option<(String, Value)>, String> {
    if !text.contains("\"tool_call\"") {
        return Ok(None);
    }
    if let Ok(envelope) = serde_json::from_str::<ToolCallEnvelope>(text) {
        return Ok(Some((envelope.tool_call.name, envelope.tool_call.args)));
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(envelope) = serde_json::from_str::<ToolCallEnvelope>(&text[start..=end]) {
                return Ok(Some((envelope.tool_call.name, envelope.tool_call.args)));
            }
        }
    }
    Err("malformed tool_call JSON in assistant response".to_string())
}

fn estimate_cost_usd(rates: (f64, f64), input_tokens: u64, output_tokens: u64) -> f64 {
    (input_tokens as f64 / 1000.0) * rates.0 + (output_tokens as f64 / 1000.0) * rates.1
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        governance: Arc<Governance>,
        sanitizer: Sanitizer,
        cost_tracker: Arc<CostTracker>,
        fact_ledger: Arc<FactLedger>,
        context_manager: ContextManager,
        estop: EmergencyStop,
    ) -> Self {
        Self {
            provider,
            tools,
            governance,
            sanitizer,
            cost_tracker,
            fact_ledger,
            context_manager,
            estop,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, llm_timeout: Duration, tool_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self.tool_timeout = tool_timeout;
        self
    }

    /// Drives one agent run to a terminal [`AgentResult`] (spec §4.3).
    /// Owns its own `Conversation`, `BudgetState`, and error-signature set
    /// exclusively for the duration of this call — nothing here is shared
    /// across concurrent runs.
    pub async fn run(&self, task: &Task, agent: &Agent, ceilings: &BudgetCeilings) -> AgentResult {
        if self.estop.is_stopped() {
            return AgentResult::stopped();
        }

        let mut conversation = Conversation::new();
        conversation.push(Message::System {
            content: agent.system_prompt.clone(),
        });
        conversation.push(Message::User {
            content: task.text.clone(),
        });

        let mut budget = BudgetState::default();
        let mut error_counts: HashMap<String, u32> = HashMap::new();
        // Maps an already-failed (tool, args) pair to the `ErrorSignature`
        // hash it failed with, so a repeat of the same call still drives
        // loop detection even though it's skipped rather than re-invoked.
        let mut attempted_error_keys: HashMap<(String, String), String> = HashMap::new();
        let mut state = RunState::Reasoning;
        let started_at = Instant::now();

        loop {
            if self.estop.is_stopped() {
                return AgentResult::stopped();
            }
            budget.wall_clock_secs = started_at.elapsed().as_secs();
            if let Some(ceiling) = budget.exceeded(ceilings) {
                warn!(ceiling = ceiling.as_str(), task_id = %task.id, "budget ceiling reached");
                return AgentResult::budget_exhausted(ceiling.as_str());
            }

            state = match state {
                RunState::Reasoning => {
                    conversation = self.context_manager.prune(&conversation);

                    let remaining_wall = ceilings
                        .max_wall_clock_secs
                        .saturating_sub(budget.wall_clock_secs)
                        .max(1);
                    let llm_deadline = self.llm_timeout.min(Duration::from_secs(remaining_wall));

                    let invoked =
                        tokio::time::timeout(llm_deadline, self.provider.invoke(&conversation, None))
                            .await;
                    budget.record_iteration();

                    let completion = match invoked {
                        Ok(Ok(completion)) => completion,
                        Ok(Err(err)) => return AgentResult::failed(format!("llm error: {err}")),
                        Err(_) => {
                            conversation.push(Message::ToolResult {
                                tool_name: "_llm".to_string(),
                                args_digest: String::new(),
                                content: "llm call timed out".to_string(),
                                is_error: true,
                            });
                            continue;
                        }
                    };

                    let rates = self.provider.rates();
                    let cost = estimate_cost_usd(
                        rates,
                        completion.usage.input_tokens,
                        completion.usage.output_tokens,
                    );
                    let breach = self
                        .cost_tracker
                        .record(
                            task.id,
                            &mut budget,
                            ceilings,
                            completion.usage.input_tokens,
                            completion.usage.output_tokens,
                            cost,
                        )
                        .unwrap_or(None);
                    if let Some(ceiling) = breach {
                        return AgentResult::budget_exhausted(ceiling.as_str());
                    }

                    conversation.push(Message::Assistant {
                        content: completion.text.clone(),
                    });

                    match try_parse_tool_call(&completion.text) {
                        Ok(Some((name, args))) => RunState::ToolDispatch { name, args },
                        Ok(None) => RunState::Final(completion.text),
                        Err(reason) => {
                            conversation.push(Message::ToolResult {
                                tool_name: "_parse".to_string(),
                                args_digest: String::new(),
                                content: reason,
                                is_error: true,
                            });
                            RunState::Reasoning
                        }
                    }
                }

                RunState::ToolDispatch { name, args } => {
                    let request = InvocationRequest {
                        tool_name: name.clone(),
                        args: args.clone(),
                        agent: agent.name.clone(),
                        task_id: task.id,
                        environment: task.environment,
                    };
                    let args_digest = request.args_digest();

                    let Some(descriptor) = self.tools.lookup(&name).await else {
                        return AgentResult::failed(format!("unknown tool: {name}"));
                    };

                    if let Some(signature_hash) = attempted_error_keys
                        .get(&(name.clone(), args_digest.clone()))
                        .cloned()
                    {
                        conversation.push(Message::ToolResult {
                            tool_name: name.clone(),
                            args_digest,
                            content: "skipped: identical invocation already failed in this run"
                                .to_string(),
                            is_error: true,
                        });

                        let count = error_counts.entry(signature_hash.clone()).or_insert(0);
                        *count += 1;
                        let _ = self
                            .fact_ledger
                            .record_failure(
                                agent.name.as_str(),
                                name.as_str(),
                                signature_hash,
                                Vec::new(),
                            )
                            .await;
                        if *count >= LOOP_DETECTION_THRESHOLD {
                            return AgentResult::failed("repeated_error");
                        }
                        RunState::Reasoning
                    } else {
                        let decision = self
                            .governance
                            .decide(&request, descriptor.risk, &descriptor.allowed_contexts, &agent.name)
                            .await;

                        match decision {
                            GovernanceDecision::Execute | GovernanceDecision::AutoApprove { .. } => {
                                let remaining_wall = ceilings
                                    .max_wall_clock_secs
                                    .saturating_sub(budget.wall_clock_secs)
                                    .max(1);
                                let deadline =
                                    self.tool_timeout.min(Duration::from_secs(remaining_wall));

                                let outcome = self.tools.invoke(&name, args, deadline).await;
                                let (raw_content, is_error) = match outcome {
                                    Ok(o) if !o.is_error() => (
                                        o.data.map(|d| d.to_string()).unwrap_or_default(),
                                        false,
                                    ),
                                    Ok(o) => {
                                        (o.error_message.unwrap_or_else(|| "tool error".to_string()), true)
                                    }
                                    Err(err) => (err.to_string(), true),
                                };

                                let sanitized = self.sanitizer.sanitize(&raw_content);
                                if sanitized.redactions.iter().any(|r| r.count > 0) {
                                    info!(tool = %name, task_id = %task.id, "redacted secrets from tool output");
                                }
                                conversation.push(Message::ToolResult {
                                    tool_name: name.clone(),
                                    args_digest: args_digest.clone(),
                                    content: sanitized.sanitized_text,
                                    is_error,
                                });

                                if is_error {
                                    let signature =
                                        ErrorSignature::new(&name, "tool_error", &raw_content);
                                    let count = error_counts.entry(signature.hash_hex()).or_insert(0);
                                    *count += 1;
                                    attempted_error_keys
                                        .insert((name.clone(), args_digest), signature.hash_hex());
                                    let _ = self
                                        .fact_ledger
                                        .record_failure(
                                            agent.name.as_str(),
                                            name.as_str(),
                                            signature.hash_hex(),
                                            Vec::new(),
                                        )
                                        .await;
                                    if *count >= LOOP_DETECTION_THRESHOLD {
                                        return AgentResult::failed("repeated_error");
                                    }
                                }
                                RunState::Reasoning
                            }
                            GovernanceDecision::RequireApproval { approval_id } => {
                                return AgentResult::awaiting_approval(approval_id);
                            }
                            GovernanceDecision::Deny { reason } => {
                                conversation.push(Message::ToolResult {
                                    tool_name: name,
                                    args_digest,
                                    content: format!("denied: {reason}"),
                                    is_error: true,
                                });
                                RunState::Reasoning
                            }
                        }
                    }
                }

                RunState::Final(summary) => return AgentResult::succeeded(summary),
            };
        }
    }
}
