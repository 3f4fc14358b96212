//! Agent runtime, governance, and safety envelope for the orchestration core.
//!
//! This crate owns every stateful component in spec §2 except the tool
//! registry (`orc-tools`), the LLM provider abstraction (`orc-providers`),
//! and output sanitization (`orc-sanitizer`) — those are split into their own
//! crates because other components (and tests) need them without pulling in
//! the whole runtime.

pub mod agents;
pub mod approvals;
pub mod auth;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod estop;
pub mod event_bus;
pub mod facts;
pub mod governance;
pub mod paths;
pub mod runtime;

pub use agents::{Agent, AgentRegistry, AgentResult, AgentStatus};
pub use approvals::ApprovalStore;
pub use auth::{AuthBroker, AuthOutcome, Identity};
pub use config::RuntimeConfig;
pub use context::ContextManager;
pub use cost::CostTracker;
pub use error::OrcError;
pub use estop::EmergencyStop;
pub use event_bus::{Event, EventBus};
pub use facts::FactLedger;
pub use governance::Governance;
pub use runtime::AgentRuntime;
