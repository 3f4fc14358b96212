//! Task routing and end-to-end task execution (spec §4.1, §4.2).
//!
//! Wires the Router and Agent Runtime together behind a single
//! `Orchestrator::execute` entry point. Grounded on `tandem-orchestrator`'s
//! crate layout; its Mission/WorkItem event-sourcing model (reducer,
//! agent-spawn policy) had no counterpart in this spec's single-level
//! Router-to-agent flow and was dropped — the pure match-based transition
//! style of its reducer carried over into `RouterChain::analyze` instead.

mod orchestrator;
mod router;

pub use orchestrator::{Orchestrator, TaskResult};
pub use router::{
    looks_like_design_request, missing_design_essentials, DefaultRouter, EmbeddingRouter,
    LlmRouter, Router, RouteContext, RouterChain,
};
