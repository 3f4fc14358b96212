//! Task-to-agent routing (spec §4.2).
//!
//! Three substitutable strategies — [`LlmRouter`], [`EmbeddingRouter`],
//! [`DefaultRouter`] — chained by [`RouterChain`] in degrade-gracefully
//! order, grounded on `tandem-providers::ProviderRegistry`'s
//! try-next-backend-on-failure pattern. None of them may propagate an
//! error to the Orchestrator; each returns `None` on failure and the
//! chain falls through to the next strategy.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use orc_core::{Agent, FactLedger};
use orc_providers::Provider;
use orc_types::{Complexity, Conversation, Message, RouteDecision};
use serde::Deserialize;

/// Everything a routing strategy needs to see (spec §4.2, `Analyze`'s
/// three positional arguments bundled for readability).
pub struct RouteContext<'a> {
    pub task_text: &'a str,
    pub available_agents: &'a [Agent],
    pub recent_history: &'a [RouteDecision],
}

#[async_trait]
pub trait Router: Send + Sync {
    async fn analyze(&self, ctx: &RouteContext<'_>) -> Option<RouteDecision>;
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    intersection / union
}

const DESIGN_TRIGGER_WORDS: &[&str] = &[
    "design a", "design an", "build a system", "build me a system", "architect a",
    "from scratch", "greenfield",
];

const DESIGN_ESSENTIALS: &[(&str, &[&str])] = &[
    ("scale", &["scale", "users", "qps", "throughput", "requests per second"]),
    ("availability target", &["availability", "uptime", "sla", "nines"]),
    ("resource envelope", &["budget", "instances", "cpu", "memory", "cost"]),
    ("authentication availability", &["auth", "oauth", "login", "sso", "credential"]),
];

/// True if the task text plausibly asks for a from-scratch system design
/// (spec §4.2's design-agent routing rule).
pub fn looks_like_design_request(task_text: &str) -> bool {
    let lower = task_text.to_lowercase();
    DESIGN_TRIGGER_WORDS.iter().any(|w| lower.contains(w))
}

/// Which of the four design essentials the task text leaves unanswered.
pub fn missing_design_essentials(task_text: &str) -> Vec<&'static str> {
    let lower = task_text.to_lowercase();
    DESIGN_ESSENTIALS
        .iter()
        .filter(|(_, keywords)| !keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(name, _)| *name)
        .collect()
}

#[derive(Deserialize)]
struct LlmDecision {
    primary: String,
    #[serde(default)]
    secondary: Vec<String>,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

/// Prompts the LLM for a structured decision and parses its reply (spec
/// §4.2, strategy 1). Falls through to the next strategy on any provider
/// error or unparseable reply.
pub struct LlmRouter {
    provider: Arc<dyn Provider>,
}

impl LlmRouter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn build_prompt(ctx: &RouteContext<'_>) -> String {
        let roster = ctx
            .available_agents
            .iter()
            .map(|a| format!("- {}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Task: {}\n\nAvailable agents:\n{}\n\nReply with JSON: {{\"primary\": \"<agent name>\", \"secondary\": [], \"confidence\": 0.0-1.0, \"reasoning\": \"...\"}}",
            ctx.task_text, roster
        )
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn analyze(&self, ctx: &RouteContext<'_>) -> Option<RouteDecision> {
        let mut conversation = Conversation::new();
        conversation.push(Message::User {
            content: Self::build_prompt(ctx),
        });
        let completion = self.provider.invoke(&conversation, None).await.ok()?;

        let parsed: LlmDecision = serde_json::from_str(&completion.text)
            .or_else(|_| {
                let start = completion.text.find('{')?;
                let end = completion.text.rfind('}')?;
                serde_json::from_str(&completion.text[start..=end]).ok()
            })
            .ok()?;

        if !ctx.available_agents.iter().any(|a| a.name == parsed.primary) {
            return None;
        }

        Some(
            RouteDecision::simple(parsed.primary, parsed.confidence, parsed.reasoning)
                .with_secondary(parsed.secondary),
        )
    }
}

/// Nearest-agent-by-token-overlap fallback (spec §4.2, strategy 2) — a
/// stand-in for a real embedding model's cosine similarity, scored with
/// Jaccard overlap over lowercased tokens. Ties are broken by the Fact
/// Ledger's recorded success rate for each candidate agent.
pub struct EmbeddingRouter {
    fact_ledger: Arc<FactLedger>,
}

impl EmbeddingRouter {
    pub fn new(fact_ledger: Arc<FactLedger>) -> Self {
        Self { fact_ledger }
    }
}

#[async_trait]
impl Router for EmbeddingRouter {
    async fn analyze(&self, ctx: &RouteContext<'_>) -> Option<RouteDecision> {
        if ctx.available_agents.is_empty() {
            return None;
        }
        let task_tokens = tokenize(ctx.task_text);
        let mut scored: Vec<(&Agent, f32)> = ctx
            .available_agents
            .iter()
            .map(|agent| {
                let agent_tokens = tokenize(&format!("{} {}", agent.name, agent.description));
                (agent, jaccard(&task_tokens, &agent_tokens))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let best_score = scored.first()?.1;
        if best_score <= 0.0 {
            return None;
        }
        let tied: Vec<&Agent> = scored
            .iter()
            .filter(|(_, score)| (*score - best_score).abs() < f32::EPSILON)
            .map(|(agent, _)| *agent)
            .collect();

        let winner = if tied.len() == 1 {
            tied[0]
        } else {
            let mut best = tied[0];
            let mut best_rate = self.fact_ledger.agent_success_rate(&best.name).await;
            for candidate in &tied[1..] {
                let rate = self.fact_ledger.agent_success_rate(&candidate.name).await;
                if rate > best_rate {
                    best = candidate;
                    best_rate = rate;
                }
            }
            best
        };

        Some(RouteDecision::simple(
            winner.name.clone(),
            best_score.clamp(0.0, 1.0),
            "nearest agent by description overlap",
        ))
    }
}

/// Terminal strategy: always succeeds, routing to the configured
/// general/consulting agent with confidence 0 (spec §4.2, strategy 3).
pub struct DefaultRouter {
    default_agent: String,
}

impl DefaultRouter {
    pub fn new(default_agent: impl Into<String>) -> Self {
        Self {
            default_agent: default_agent.into(),
        }
    }
}

#[async_trait]
impl Router for DefaultRouter {
    async fn analyze(&self, _ctx: &RouteContext<'_>) -> Option<RouteDecision> {
        Some(RouteDecision::simple(
            self.default_agent.clone(),
            0.0,
            "default fallback",
        ))
    }
}

/// Applies the design-agent routing rule first, then degrades through
/// `strategies` in order until one returns `Some` (spec §4.2). The last
/// entry should always be a [`DefaultRouter`] so `analyze` never returns
/// `None`.
pub struct RouterChain {
    design_agent: Option<String>,
    strategies: Vec<Arc<dyn Router>>,
}

impl RouterChain {
    pub fn new(design_agent: Option<String>, strategies: Vec<Arc<dyn Router>>) -> Self {
        Self {
            design_agent,
            strategies,
        }
    }

    pub async fn analyze(&self, ctx: &RouteContext<'_>) -> Option<RouteDecision> {
        if let Some(design_agent) = &self.design_agent {
            if ctx.available_agents.iter().any(|a| &a.name == design_agent)
                && looks_like_design_request(ctx.task_text)
            {
                let missing = missing_design_essentials(ctx.task_text);
                return Some(if missing.is_empty() {
                    RouteDecision::simple(design_agent.clone(), 0.9, "from-scratch design request")
                } else {
                    RouteDecision::needs_clarification(
                        design_agent.clone(),
                        format!(
                            "Before I design this, I need: {}.",
                            missing.join(", ")
                        ),
                        "from-scratch design request missing essentials",
                    )
                });
            }
        }

        for strategy in &self.strategies {
            if let Some(decision) = strategy.analyze(ctx).await {
                return Some(decision);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_core::Agent;

    fn agents() -> Vec<Agent> {
        vec![
            Agent::new("consulting", "general Q&A and read-only lookups", "prompt", vec![]),
            Agent::new("docker", "container lifecycle operations", "prompt", vec![]),
            Agent::new("design", "from-scratch system design", "prompt", vec![]),
        ]
    }

    #[tokio::test]
    async fn default_router_always_returns_some() {
        let router = DefaultRouter::new("consulting");
        let agents = agents();
        let ctx = RouteContext {
            task_text: "anything",
            available_agents: &agents,
            recent_history: &[],
        };
        let decision = router.analyze(&ctx).await.unwrap();
        assert_eq!(decision.primary, "consulting");
        assert_eq!(decision.confidence, 0.0);
    }

    #[tokio::test]
    async fn embedding_router_picks_nearest_agent_by_description_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(FactLedger::new(dir.path().join("facts.json")));
        let router = EmbeddingRouter::new(ledger);
        let agents = agents();
        let ctx = RouteContext {
            task_text: "please restart the container lifecycle",
            available_agents: &agents,
            recent_history: &[],
        };
        let decision = router.analyze(&ctx).await.unwrap();
        assert_eq!(decision.primary, "docker");
    }

    #[tokio::test]
    async fn embedding_router_returns_none_on_zero_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(FactLedger::new(dir.path().join("facts.json")));
        let router = EmbeddingRouter::new(ledger);
        let agents = agents();
        let ctx = RouteContext {
            task_text: "zzz qqq xyz",
            available_agents: &agents,
            recent_history: &[],
        };
        assert!(router.analyze(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn chain_routes_design_requests_to_design_agent_with_clarification() {
        let chain = RouterChain::new(
            Some("design".to_string()),
            vec![Arc::new(DefaultRouter::new("consulting"))],
        );
        let agents = agents();
        let ctx = RouteContext {
            task_text: "design a system from scratch for image uploads",
            available_agents: &agents,
            recent_history: &[],
        };
        let decision = chain.analyze(&ctx).await.unwrap();
        assert_eq!(decision.primary, "design");
        assert!(decision.clarification_needed);
        assert!(decision.secondary.is_empty());
    }

    #[tokio::test]
    async fn chain_skips_clarification_when_essentials_already_present() {
        let chain = RouterChain::new(
            Some("design".to_string()),
            vec![Arc::new(DefaultRouter::new("consulting"))],
        );
        let agents = agents();
        let ctx = RouteContext {
            task_text: "design a system from scratch for 10k users with 99.9% uptime, a $500/mo budget, and OAuth login",
            available_agents: &agents,
            recent_history: &[],
        };
        let decision = chain.analyze(&ctx).await.unwrap();
        assert!(!decision.clarification_needed);
    }

    #[tokio::test]
    async fn chain_falls_through_to_default_when_no_strategy_matches() {
        let chain = RouterChain::new(None, vec![Arc::new(DefaultRouter::new("consulting"))]);
        let agents = agents();
        let ctx = RouteContext {
            task_text: "what is the weather",
            available_agents: &agents,
            recent_history: &[],
        };
        let decision = chain.analyze(&ctx).await.unwrap();
        assert_eq!(decision.primary, "consulting");
    }
}
