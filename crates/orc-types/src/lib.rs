//! Shared wire types for the agent orchestration core.
//!
//! This crate holds the data model from the orchestration spec: [`Task`],
//! [`RouteDecision`], [`Message`], tool metadata, governance decisions,
//! approvals, budgets, and fact-ledger entries. Behavior lives in `orc-core`;
//! this crate only owns shape + (de)serialization so every other crate can
//! depend on a single, small, dependency-light definition of "what a Task is".

mod approval;
mod budget;
mod environment;
mod error_signature;
mod fact;
mod governance;
mod ids;
mod invocation;
mod message;
mod provider;
mod route;
mod task;
mod tool;

pub use approval::{Approval, ApprovalVerdict};
pub use budget::{BudgetCeilings, BudgetState};
pub use environment::Environment;
pub use error_signature::ErrorSignature;
pub use fact::FactEntry;
pub use governance::GovernanceDecision;
pub use ids::{ApprovalId, TaskId};
pub use invocation::InvocationRequest;
pub use message::{estimate_tokens, Conversation, Message};
pub use provider::{ModelInfo, ProviderInfo, TokenUsage};
pub use route::{Complexity, RouteDecision};
pub use task::{Task, TaskStatus};
pub use tool::{ParamType, RiskTag, ToolDescriptor, ToolParam};
