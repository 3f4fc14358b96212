use serde::{Deserialize, Serialize};

/// Configured ceilings for a Task's [`BudgetState`] (spec §4.3, §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetCeilings {
    pub max_iterations: u32,
    pub max_wall_clock_secs: u64,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    pub max_cost_usd: f64,
}

impl Default for BudgetCeilings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_wall_clock_secs: 10 * 60,
            max_input_tokens: 200_000,
            max_output_tokens: 50_000,
            max_cost_usd: 5.0,
        }
    }
}

/// Per-task resource accounting (spec §3, "BudgetState").
///
/// All fields are monotonically non-decreasing; crossing any configured
/// ceiling converts the owning Task to `budget_exhausted`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetState {
    pub iterations_used: u32,
    pub wall_clock_secs: u64,
    pub input_tokens_used: u64,
    pub output_tokens_used: u64,
    pub estimated_cost_usd: f64,
}

/// Which ceiling was crossed, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCeiling {
    Iterations,
    WallClock,
    Tokens,
    Cost,
}

impl BudgetCeiling {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetCeiling::Iterations => "iterations",
            BudgetCeiling::WallClock => "wall_clock",
            BudgetCeiling::Tokens => "tokens",
            BudgetCeiling::Cost => "cost",
        }
    }
}

impl BudgetState {
    /// First ceiling breached, if any (spec invariant 5: "the first ceiling
    /// reached terminates the Task").
    pub fn exceeded(&self, ceilings: &BudgetCeilings) -> Option<BudgetCeiling> {
        if self.iterations_used >= ceilings.max_iterations {
            return Some(BudgetCeiling::Iterations);
        }
        if self.wall_clock_secs >= ceilings.max_wall_clock_secs {
            return Some(BudgetCeiling::WallClock);
        }
        if self.input_tokens_used >= ceilings.max_input_tokens
            || self.output_tokens_used >= ceilings.max_output_tokens
        {
            return Some(BudgetCeiling::Tokens);
        }
        if self.estimated_cost_usd >= ceilings.max_cost_usd {
            return Some(BudgetCeiling::Cost);
        }
        None
    }

    pub fn record_iteration(&mut self) {
        self.iterations_used += 1;
    }

    pub fn record_tokens(&mut self, input: u64, output: u64, cost_usd: f64) {
        self.input_tokens_used += input;
        self.output_tokens_used += output;
        self.estimated_cost_usd += cost_usd;
    }

    pub fn record_elapsed(&mut self, secs: u64) {
        self.wall_clock_secs += secs;
    }

    /// Fraction of whichever ceiling is closest to being hit (spec §4.9:
    /// "warning emitted at >= 80%").
    pub fn usage_fraction(&self, ceilings: &BudgetCeilings) -> f64 {
        let iter = self.iterations_used as f64 / ceilings.max_iterations.max(1) as f64;
        let wall = self.wall_clock_secs as f64 / ceilings.max_wall_clock_secs.max(1) as f64;
        let tokens = (self.input_tokens_used + self.output_tokens_used) as f64
            / (ceilings.max_input_tokens + ceilings.max_output_tokens).max(1) as f64;
        let cost = self.estimated_cost_usd / ceilings.max_cost_usd.max(f64::EPSILON);
        iter.max(wall).max(tokens).max(cost)
    }
}
