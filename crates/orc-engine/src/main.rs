//! Headless CLI entry point for the orchestration core (spec §6).
//!
//! Grounded on `tandem-engine`'s `clap`-derived `Cli`/`Command` shape and
//! its `build_state`-then-dispatch structure; the `serve`/`chat` surfaces
//! (an HTTP/websocket front end) have no counterpart in this spec, which
//! specifies a local-filesystem-only CLI, so they were dropped in favor of
//! `execute`/`approve`/`stop`.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use orc_core::{
    AgentRegistry, AgentRuntime, ApprovalStore, ContextManager, CostTracker, EmergencyStop,
    FactLedger, Governance, RuntimeConfig,
};
use orc_core::paths::StatePaths;
use orc_orchestrator::{DefaultRouter, EmbeddingRouter, LlmRouter, Orchestrator, RouterChain};
use orc_providers::{EchoProvider, HttpProvider, Provider};
use orc_sanitizer::Sanitizer;
use orc_tools::{
    ListContainersTool, ReadFileTool, RestartContainerTool, Registry as ToolRegistry, ShellTool,
    WriteFileTool,
};
use orc_types::{ApprovalId, ApprovalVerdict, Environment, TaskStatus};

#[derive(Parser, Debug)]
#[command(name = "orc-engine")]
#[command(about = "Autonomous agent orchestration core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a task through the Orchestrator to completion.
    Execute {
        task_text: String,
        #[arg(long = "env")]
        environment: Option<Environment>,
    },
    #[command(subcommand)]
    Approve(ApproveCommand),
    #[command(subcommand)]
    Stop(StopCommand),
}

#[derive(Subcommand, Debug)]
enum ApproveCommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Show {
        id: String,
    },
    Approve {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
    Reject {
        id: String,
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum StopCommand {
    Activate { reason: Option<String> },
    Status,
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Execute { task_text, environment } => run_execute(task_text, environment).await?,
        Command::Approve(cmd) => run_approve(cmd).await?,
        Command::Stop(cmd) => run_stop(cmd)?,
    };
    std::process::exit(exit_code);
}

async fn run_execute(task_text: String, environment_override: Option<Environment>) -> anyhow::Result<i32> {
    let paths = StatePaths::cwd().context("resolving working directory")?;
    let config = RuntimeConfig::from_env();
    let environment = environment_override.unwrap_or(config.environment);

    let approvals = ApprovalStore::new(paths.approvals());
    let governance = Arc::new(Governance::new(approvals));
    let fact_ledger = Arc::new(FactLedger::new(paths.fact_ledger()));
    let cost_tracker = Arc::new(CostTracker::new(paths.cost_history(), config.max_cost_per_hour_usd));
    let estop = EmergencyStop::new(paths.emergency_stop());
    let context_manager = ContextManager::new(
        config.max_context_tokens,
        config.keep_last_n_user_messages,
        config.keep_last_n_assistant_messages,
    );

    let tools = ToolRegistry::new(false);
    register_builtin_tools(&tools).await;

    let provider: Arc<dyn Provider> = build_provider(&config);

    let runtime = Arc::new(AgentRuntime::new(
        provider.clone(),
        tools,
        governance,
        Sanitizer::default(),
        cost_tracker,
        fact_ledger.clone(),
        context_manager,
        estop.clone(),
    ));

    let agents = AgentRegistry::with_defaults();
    let mut strategies: Vec<Arc<dyn orc_orchestrator::Router>> = Vec::new();
    strategies.push(Arc::new(LlmRouter::new(provider)));
    if config.use_semantic_routing {
        strategies.push(Arc::new(EmbeddingRouter::new(fact_ledger.clone())));
    }
    let default_agent = agents
        .default_agent()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "consulting".to_string());
    strategies.push(Arc::new(DefaultRouter::new(default_agent)));
    let design_agent = agents.get("design").map(|a| a.name.clone());
    let router = RouterChain::new(design_agent, strategies);

    let orchestrator = Orchestrator::new(
        router,
        agents,
        runtime,
        fact_ledger,
        estop,
        config.budget_ceilings,
    );

    let result = orchestrator.execute(&task_text, environment).await;
    print_task_result(&result.status);
    Ok(result.status.exit_code())
}

fn build_provider(config: &RuntimeConfig) -> Arc<dyn Provider> {
    match config.llm_provider.as_str() {
        "echo" | "" => Arc::new(EchoProvider::new()),
        _ => {
            let base_url = std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
            let api_key = std::env::var("LLM_API_KEY").ok();
            Arc::new(HttpProvider::new(
                config.llm_provider.clone(),
                config.llm_provider.clone(),
                base_url,
                api_key,
                config.llm_model.clone(),
                (0.0, 0.0),
            ))
        }
    }
}

async fn register_builtin_tools(tools: &ToolRegistry) {
    use orc_tools::infer_risk_tag;
    use orc_types::{ToolDescriptor, ToolParam};

    let registrations: Vec<(&str, &str, Vec<ToolParam>, orc_tools::ToolCapabilities, Arc<dyn orc_tools::Tool>)> = vec![
        (
            "read_file",
            "Read a file's contents",
            vec![ToolParam::required("path", orc_types::ParamType::String)],
            orc_tools::ToolCapabilities::default(),
            Arc::new(ReadFileTool),
        ),
        (
            "write_file",
            "Write contents to a file",
            vec![
                ToolParam::required("path", orc_types::ParamType::String),
                ToolParam::required("contents", orc_types::ParamType::String),
            ],
            orc_tools::ToolCapabilities { writes_filesystem: true, ..Default::default() },
            Arc::new(WriteFileTool),
        ),
        (
            "shell",
            "Run a shell command",
            vec![ToolParam::required("command", orc_types::ParamType::String)],
            orc_tools::ToolCapabilities { arbitrary_shell: true, ..Default::default() },
            Arc::new(ShellTool),
        ),
        (
            "list_containers",
            "List running container names",
            vec![],
            orc_tools::ToolCapabilities { spawns_process: true, ..Default::default() },
            Arc::new(ListContainersTool),
        ),
        (
            "restart_container",
            "Restart a named container",
            vec![ToolParam::required("name", orc_types::ParamType::String)],
            orc_tools::ToolCapabilities { restarts_services: true, ..Default::default() },
            Arc::new(RestartContainerTool),
        ),
    ];

    for (name, description, params, caps, handle) in registrations {
        let descriptor = ToolDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            params,
            risk: infer_risk_tag(&caps),
            requires_auth: None,
            allowed_contexts: Vec::new(),
        };
        let _ = tools.register(descriptor, handle).await;
    }
}

fn print_task_result(status: &TaskStatus) {
    match status {
        TaskStatus::Succeeded { summary } => println!("succeeded: {summary}"),
        TaskStatus::Failed { reason } => println!("failed: {reason}"),
        TaskStatus::BudgetExhausted { reason } => println!("budget_exhausted: {reason}"),
        TaskStatus::Stopped { reason } => println!("stopped: {reason}"),
        TaskStatus::AwaitingApproval { approval_id } => {
            println!("awaiting_approval: {approval_id}");
        }
        TaskStatus::AwaitingHumanInput { prompt } => println!("needs_input: {prompt}"),
        TaskStatus::Queued | TaskStatus::Running => println!("running"),
    }
}

async fn run_approve(cmd: ApproveCommand) -> anyhow::Result<i32> {
    let paths = StatePaths::cwd().context("resolving working directory")?;
    let store = ApprovalStore::new(paths.approvals());

    match cmd {
        ApproveCommand::List { status } => {
            let approvals = store.list(status.as_deref()).await;
            for approval in &approvals {
                println!(
                    "{} [{}] {} -> {}",
                    approval.id, approval.requester_agent, approval.request.tool_name, verdict_label(&approval.verdict)
                );
            }
            Ok(0)
        }
        ApproveCommand::Show { id } => {
            let id: ApprovalId = id.parse().context("invalid approval id")?;
            match store.get(id).await {
                Some(approval) => {
                    println!("{}", serde_json::to_string_pretty(&approval)?);
                    Ok(0)
                }
                None => {
                    eprintln!("no such approval: {id}");
                    Ok(1)
                }
            }
        }
        ApproveCommand::Approve { id, note } => {
            let id: ApprovalId = id.parse().context("invalid approval id")?;
            match store.decide(id, ApprovalVerdict::Approved, note).await? {
                Some(_) => {
                    println!("approved {id}");
                    Ok(0)
                }
                None => {
                    eprintln!("no such approval: {id}");
                    Ok(1)
                }
            }
        }
        ApproveCommand::Reject { id, reason } => {
            let id: ApprovalId = id.parse().context("invalid approval id")?;
            match store
                .decide(id, ApprovalVerdict::Rejected { reason }, None)
                .await?
            {
                Some(_) => {
                    println!("rejected {id}");
                    Ok(0)
                }
                None => {
                    eprintln!("no such approval: {id}");
                    Ok(1)
                }
            }
        }
    }
}

fn verdict_label(verdict: &ApprovalVerdict) -> &'static str {
    match verdict {
        ApprovalVerdict::Pending => "pending",
        ApprovalVerdict::Approved => "approved",
        ApprovalVerdict::Rejected { .. } => "rejected",
    }
}

fn run_stop(cmd: StopCommand) -> anyhow::Result<i32> {
    let paths = StatePaths::cwd().context("resolving working directory")?;

    match cmd {
        StopCommand::Activate { reason } => {
            let estop = EmergencyStop::new(paths.emergency_stop());
            estop.activate(&reason.unwrap_or_else(|| "operator requested".to_string()));
            println!("emergency stop activated");
            Ok(0)
        }
        StopCommand::Status => {
            let estop = EmergencyStop::new(paths.emergency_stop());
            println!("stopped: {}", estop.is_stopped());
            Ok(0)
        }
        StopCommand::Reset => {
            let mut estop = EmergencyStop::new(paths.emergency_stop());
            estop.reset();
            println!("emergency stop reset");
            Ok(0)
        }
    }
}
