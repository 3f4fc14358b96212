//! End-to-end scenarios from spec §8 (S1-S6), exercised against the real
//! `AgentRuntime`/`Governance`/`FactLedger` stack with a scripted provider
//! standing in for the LLM and purpose-built tools standing in for the
//! `docker`-shelling builtins so these run without any external process.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orc_core::{
    AgentRuntime, ApprovalStore, ContextManager, CostTracker, EmergencyStop, FactLedger,
    Governance,
};
use orc_providers::{Completion, Provider};
use orc_sanitizer::Sanitizer;
use orc_tools::{Registry as ToolRegistry, Tool, ToolOutcome};
use orc_types::{
    ApprovalVerdict, BudgetCeilings, Conversation, Environment, ModelInfo, ProviderInfo, RiskTag,
    Task, ToolDescriptor, ToolParam,
};

/// Replays a fixed sequence of assistant completions, one per call, and
/// records every conversation it was invoked with so tests can assert on
/// what the LLM would have seen.
struct ScriptedProvider {
    script: Mutex<VecDeque<&'static str>>,
    seen: Mutex<Vec<Conversation>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<&'static str>) -> Self {
        Self {
            script: Mutex::new(turns.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn conversation_at(&self, index: usize) -> Conversation {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "scripted".to_string(),
            name: "Scripted test provider".to_string(),
            models: vec![ModelInfo {
                id: "scripted-1".to_string(),
                provider_id: "scripted".to_string(),
                display_name: "Scripted".to_string(),
                context_window: 32_000,
            }],
        }
    }

    async fn invoke(
        &self,
        conversation: &Conversation,
        _model_override: Option<&str>,
    ) -> anyhow::Result<Completion> {
        self.seen.lock().unwrap().push(conversation.clone());
        let text = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or("no more scripted turns")
            .to_string();
        Ok(Completion {
            text,
            usage: orc_types::TokenUsage {
                input_tokens: 10,
                output_tokens: 10,
            },
        })
    }

    fn rates(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
}

struct FixedOutcomeTool(ToolOutcome);

#[async_trait]
impl Tool for FixedOutcomeTool {
    async fn invoke(&self, _args: &serde_json::Value) -> ToolOutcome {
        self.0.clone()
    }
}

struct SleepingTool(Duration);

#[async_trait]
impl Tool for SleepingTool {
    async fn invoke(&self, _args: &serde_json::Value) -> ToolOutcome {
        tokio::time::sleep(self.0).await;
        ToolOutcome::success(serde_json::json!({ "done": true }))
    }
}

fn descriptor(name: &str, risk: RiskTag, params: Vec<ToolParam>) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: "test tool".to_string(),
        params,
        risk,
        requires_auth: None,
        allowed_contexts: Vec::new(),
    }
}

struct Harness {
    dir: tempfile::TempDir,
    tools: ToolRegistry,
    governance: Arc<Governance>,
    fact_ledger: Arc<FactLedger>,
    estop: EmergencyStop,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let approvals = ApprovalStore::new(dir.path().join("approvals.json"));
        Self {
            governance: Arc::new(Governance::new(approvals)),
            fact_ledger: Arc::new(FactLedger::new(dir.path().join("facts.json"))),
            estop: EmergencyStop::new(dir.path().join(".emergency_stop")),
            tools: ToolRegistry::new(false),
            dir,
        }
    }

    fn runtime(&self, provider: Arc<dyn Provider>) -> AgentRuntime {
        AgentRuntime::new(
            provider,
            self.tools.clone(),
            self.governance.clone(),
            Sanitizer::default(),
            Arc::new(CostTracker::new(self.dir.path().join("cost.json"), 100.0)),
            self.fact_ledger.clone(),
            ContextManager::new(8_000, 5, 5),
            self.estop.clone(),
        )
    }

    fn approvals(&self) -> ApprovalStore {
        ApprovalStore::new(self.dir.path().join("approvals.json"))
    }
}

fn agent(preferred_tools: &[&str]) -> orc_core::Agent {
    orc_core::Agent::new(
        "docker",
        "container ops",
        "You are a container operations agent.",
        preferred_tools.iter().map(|s| s.to_string()).collect(),
    )
}

#[tokio::test]
async fn s1_green_read_only_tool_succeeds_with_no_approval_recorded() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("list_containers", RiskTag::Green, vec![]),
            Arc::new(FixedOutcomeTool(ToolOutcome::success(
                serde_json::json!({"containers": ["homeassistant"]}),
            ))),
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "list_containers", "args": {}}}"#,
        "the running containers are listed above",
    ]));
    let runtime = harness.runtime(provider);
    let task = Task::new("list all containers", Environment::Production);
    let result = runtime
        .run(&task, &agent(&["list_containers"]), &BudgetCeilings::default())
        .await;

    assert_eq!(result.status, orc_core::agents::AgentStatus::Succeeded);
    assert_eq!(harness.approvals().list(None).await.len(), 0);
}

#[tokio::test]
async fn s2_yellow_write_auto_approves_in_dev_but_parks_in_production() {
    for (environment, expect_approval) in
        [(Environment::Dev, false), (Environment::Production, true)]
    {
        let harness = Harness::new();
        harness
            .tools
            .register(
                descriptor(
                    "write_file",
                    RiskTag::Yellow,
                    vec![ToolParam::required("path", orc_types::ParamType::String)],
                ),
                Arc::new(FixedOutcomeTool(ToolOutcome::success(serde_json::json!({
                    "bytes_written": 42
                })))),
            )
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool_call": {"name": "write_file", "args": {"path": "docker-compose.yml"}}}"#,
            "wrote the compose file",
        ]));
        let runtime = harness.runtime(provider);
        let task = Task::new(
            "create a docker-compose.yml with a redis service on port 6379",
            environment,
        );
        let result = runtime
            .run(&task, &agent(&["write_file"]), &BudgetCeilings::default())
            .await;

        if expect_approval {
            assert_eq!(result.status, orc_core::agents::AgentStatus::AwaitingApproval);
            assert_eq!(harness.approvals().list(Some("pending")).await.len(), 1);
        } else {
            assert_eq!(result.status, orc_core::agents::AgentStatus::Succeeded);
            assert_eq!(harness.approvals().list(None).await.len(), 0);
        }
    }
}

#[tokio::test]
async fn s3_red_deploy_requires_approval_then_reject_is_final() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("restart_container", RiskTag::Red, vec![]),
            Arc::new(FixedOutcomeTool(ToolOutcome::success(serde_json::json!({
                "restarted": "homeassistant"
            })))),
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "restart_container", "args": {"name": "homeassistant"}}}"#,
    ]));
    let runtime = harness.runtime(provider);
    let task = Task::new("restart the homeassistant container", Environment::Dev);
    let result = runtime
        .run(&task, &agent(&["restart_container"]), &BudgetCeilings::default())
        .await;

    let approval_id = match result.status {
        orc_core::agents::AgentStatus::AwaitingApproval => {
            result.pending_approval.expect("approval id must be present")
        }
        other => panic!("expected awaiting_approval, got {other:?}"),
    };

    let approvals = harness.approvals();
    assert_eq!(approvals.list(Some("pending")).await.len(), 1);

    let rejected = approvals
        .decide(
            approval_id,
            ApprovalVerdict::Rejected {
                reason: "not now".to_string(),
            },
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(rejected.verdict, ApprovalVerdict::Rejected { .. }));

    // Re-deciding the same (now-decided) id is a no-op, not a second
    // transition (spec's "once decided, never transitions again").
    let reapproved = approvals
        .decide(approval_id, ApprovalVerdict::Approved, None)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reapproved.verdict, ApprovalVerdict::Rejected { .. }));
}

#[tokio::test]
async fn s3_approved_invocation_resumes_and_executes_the_tool() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("restart_container", RiskTag::Red, vec![]),
            Arc::new(FixedOutcomeTool(ToolOutcome::success(serde_json::json!({
                "restarted": "homeassistant"
            })))),
        )
        .await
        .unwrap();

    // First run parks a pending approval and stops short of the tool call.
    let first_run_provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "restart_container", "args": {"name": "homeassistant"}}}"#,
    ]));
    let first_result = harness
        .runtime(first_run_provider)
        .run(
            &Task::new("restart the homeassistant container", Environment::Dev),
            &agent(&["restart_container"]),
            &BudgetCeilings::default(),
        )
        .await;
    let approval_id = match first_result.status {
        orc_core::agents::AgentStatus::AwaitingApproval => first_result
            .pending_approval
            .expect("approval id must be present"),
        other => panic!("expected awaiting_approval, got {other:?}"),
    };

    harness
        .approvals()
        .decide(approval_id, ApprovalVerdict::Approved, None)
        .await
        .unwrap();

    // A fresh run with the identical InvocationRequest (same tool, args,
    // agent) now resumes from the approved decision and performs the call,
    // instead of parking a second pending approval.
    let resumed_provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "restart_container", "args": {"name": "homeassistant"}}}"#,
        "restarted homeassistant as approved",
    ]));
    let resumed_result = harness
        .runtime(resumed_provider)
        .run(
            &Task::new("restart the homeassistant container", Environment::Dev),
            &agent(&["restart_container"]),
            &BudgetCeilings::default(),
        )
        .await;

    assert_eq!(resumed_result.status, orc_core::agents::AgentStatus::Succeeded);
    assert_eq!(harness.approvals().list(Some("pending")).await.len(), 0);
}

#[tokio::test]
async fn s4_secret_never_reaches_the_next_llm_turn() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("read_file", RiskTag::Green, vec![]),
            Arc::new(FixedOutcomeTool(ToolOutcome::success(serde_json::json!({
                "contents": "API_KEY=sk-ABCDEFGHIJKLMNOPQRSTUVWX"
            })))),
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "read_file", "args": {}}}"#,
        "the file contained a key, now redacted",
    ]));
    let runtime = harness.runtime(provider.clone());
    let task = Task::new("read the env file", Environment::Dev);
    let result = runtime
        .run(&task, &agent(&["read_file"]), &BudgetCeilings::default())
        .await;
    assert_eq!(result.status, orc_core::agents::AgentStatus::Succeeded);

    // The second LLM call (index 1) is the one that saw the tool's output;
    // the raw secret must not appear anywhere in what was sent to it.
    let second_turn = provider.conversation_at(1);
    for message in second_turn.messages() {
        assert!(!message.content().contains("sk-ABCDEFGHIJKLMNOPQRSTUVWX"));
    }
    let tool_result = second_turn
        .messages()
        .iter()
        .find(|m| m.is_tool_result())
        .expect("a tool result message must be present");
    assert!(tool_result.content().contains("REDACTED"));
}

#[tokio::test]
async fn s5_emergency_stop_during_a_long_tool_call_ends_the_task_stopped() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("slow_tool", RiskTag::Green, vec![]),
            Arc::new(SleepingTool(Duration::from_millis(150))),
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "slow_tool", "args": {}}}"#,
        "should never be reached",
    ]));
    let runtime = harness.runtime(provider);
    let task = Task::new("run the long task", Environment::Dev);

    let estop = harness.estop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        estop.activate("ops drill");
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runtime.run(&task, &agent(&["slow_tool"]), &BudgetCeilings::default()),
    )
    .await
    .expect("task must terminate within the tool timeout, not hang");

    assert_eq!(result.status, orc_core::agents::AgentStatus::Stopped);
}

#[tokio::test]
async fn s6_loop_detection_fails_on_the_third_identical_error() {
    let harness = Harness::new();
    harness
        .tools
        .register(
            descriptor("flaky_tool", RiskTag::Green, vec![]),
            Arc::new(FixedOutcomeTool(ToolOutcome::error("connection refused"))),
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{"tool_call": {"name": "flaky_tool", "args": {}}}"#,
        r#"{"tool_call": {"name": "flaky_tool", "args": {}}}"#,
        r#"{"tool_call": {"name": "flaky_tool", "args": {}}}"#,
    ]));
    let runtime = harness.runtime(provider);
    let ceilings = BudgetCeilings {
        max_iterations: 20,
        ..BudgetCeilings::default()
    };
    let task = Task::new("call the flaky tool repeatedly", Environment::Dev);
    let result = runtime.run(&task, &agent(&["flaky_tool"]), &ceilings).await;

    match result.status {
        orc_core::agents::AgentStatus::Failed { reason } => assert_eq!(reason, "repeated_error"),
        other => panic!("expected failed(repeated_error), got {other:?}"),
    }

    // Three identical tool failures within the run must land in the Fact
    // Ledger as three Failure entries for the agent, matching spec §8 S6.
    let rate = harness.fact_ledger.agent_success_rate("docker").await;
    assert_eq!(rate, 0.0, "three recorded failures and no successes must yield a 0.0 rate");
}
