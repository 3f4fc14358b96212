use std::path::PathBuf;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orc_types::{BudgetCeiling, BudgetCeilings, BudgetState, TaskId};
use serde::{Deserialize, Serialize};

use crate::paths::write_atomic;

/// One completed or in-flight task's recorded spend, appended to
/// `cost_history.json` (spec §4.9, "Cost Tracker").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub task_id: TaskId,
    pub recorded_at: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Tracks a single task's budget against its ceilings and maintains a
/// rolling-hour cost ledger for the cross-task `max_cost_per_hour` guard
/// (grounded on the teacher's JSON-file storage discipline in
/// `tandem-core::storage`, simplified to one flat append-only list rather
/// than a keyed store).
pub struct CostTracker {
    history_path: PathBuf,
    max_cost_per_hour_usd: f64,
}

impl CostTracker {
    pub fn new(history_path: PathBuf, max_cost_per_hour_usd: f64) -> Self {
        Self {
            history_path,
            max_cost_per_hour_usd,
        }
    }

    /// Applies a provider call's token usage and dollar cost to `state`,
    /// returning the first ceiling breached, if any (spec invariant 5).
    pub fn record(
        &self,
        task_id: TaskId,
        state: &mut BudgetState,
        ceilings: &BudgetCeilings,
        input_tokens: u64,
        output_tokens: u64,
        cost_usd: f64,
    ) -> std::io::Result<Option<BudgetCeiling>> {
        state.record_tokens(input_tokens, output_tokens, cost_usd);
        self.append(CostEntry {
            task_id,
            recorded_at: Utc::now(),
            input_tokens,
            output_tokens,
            cost_usd,
        })?;
        Ok(state.exceeded(ceilings))
    }

    /// Sum of `cost_usd` for entries recorded within the last hour, across
    /// all tasks. Used by the Agent Runtime to enforce `max_cost_per_hour`
    /// even when a single task's own ceiling hasn't been hit.
    pub fn rolling_hour_cost_usd(&self) -> std::io::Result<f64> {
        let cutoff = Utc::now() - ChronoDuration::hours(1);
        let total = self
            .load()?
            .into_iter()
            .filter(|e| e.recorded_at >= cutoff)
            .map(|e| e.cost_usd)
            .sum();
        Ok(total)
    }

    pub fn hourly_ceiling_exceeded(&self) -> std::io::Result<bool> {
        Ok(self.rolling_hour_cost_usd()? > self.max_cost_per_hour_usd)
    }

    fn load(&self) -> std::io::Result<Vec<CostEntry>> {
        match std::fs::read(&self.history_path) {
            Ok(bytes) if !bytes.is_empty() => {
                Ok(serde_json::from_slice(&bytes).unwrap_or_default())
            }
            Ok(_) => Ok(Vec::new()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    fn append(&self, entry: CostEntry) -> std::io::Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        let bytes = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.history_path, &bytes)
    }
}
