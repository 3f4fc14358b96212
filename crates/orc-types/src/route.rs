use serde::{Deserialize, Serialize};

/// Complexity tier assigned to a task by the Router (spec §3, "RouteDecision").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

/// Output of `Router::analyze` (spec §4.2).
///
/// Invariant enforced by construction helpers below: `clarification_needed`
/// and a non-empty `secondary` set are never both set (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub primary: String,
    pub secondary: Vec<String>,
    pub complexity: Complexity,
    pub clarification_needed: bool,
    pub clarification_prompt: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

impl RouteDecision {
    pub fn simple(primary: impl Into<String>, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Vec::new(),
            complexity: Complexity::Simple,
            clarification_needed: false,
            clarification_prompt: None,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    pub fn needs_clarification(
        primary: impl Into<String>,
        prompt: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            primary: primary.into(),
            secondary: Vec::new(),
            complexity: Complexity::Complex,
            clarification_needed: true,
            clarification_prompt: Some(prompt.into()),
            confidence: 1.0,
            reasoning: reasoning.into(),
        }
    }

    pub fn with_secondary(mut self, secondary: Vec<String>) -> Self {
        if self.clarification_needed {
            // Invariant: never both clarification_needed and secondary agents.
            self.secondary.clear();
            return self;
        }
        self.secondary = secondary.into_iter().filter(|s| s != &self.primary).collect();
        self
    }
}
