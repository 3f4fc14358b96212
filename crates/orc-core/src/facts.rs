use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use orc_types::{FactEntry, RouteDecision};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::paths::write_atomic;

const DEFAULT_ROTATION_LIMIT: usize = 2_000;
const DEFAULT_HISTORY_LIMIT: usize = 500;

/// On-disk shape of `fact_ledger.json` (spec §6, "Persisted state"):
/// `{"successes":[…], "failures":[…], "solutions":[…], "routing_history":[…]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FactLedgerDocument {
    #[serde(default)]
    successes: Vec<FactEntry>,
    #[serde(default)]
    failures: Vec<FactEntry>,
    #[serde(default)]
    solutions: Vec<FactEntry>,
    #[serde(default)]
    routing_history: Vec<RouteDecision>,
}

/// Append-only record of successes, failures, and attempted fixes (spec
/// §4.11), plus the routing history the Router consults for tie-breaking.
/// Rotation drops the oldest entries once `rotation_limit` (or
/// `history_limit` for routing decisions) is exceeded; similarity lookup
/// is a linear scan over a bag-of-tokens overlap score, matching the
/// spec's "exactness is not required." Grounded on
/// `tandem-core::storage`'s JSON-file persistence discipline, reusing
/// `orc_core::paths::write_atomic`.
///
/// Lock order is always `entries` before `routing_history`, so the two
/// independent `RwLock`s never deadlock against each other.
#[derive(Clone)]
pub struct FactLedger {
    path: PathBuf,
    rotation_limit: usize,
    history_limit: usize,
    entries: Arc<RwLock<Vec<FactEntry>>>,
    routing_history: Arc<RwLock<Vec<RouteDecision>>>,
}

impl FactLedger {
    pub fn new(path: PathBuf) -> Self {
        Self::with_rotation_limit(path, DEFAULT_ROTATION_LIMIT)
    }

    pub fn with_rotation_limit(path: PathBuf, rotation_limit: usize) -> Self {
        let (entries, routing_history) = load(&path).unwrap_or_default();
        Self {
            path,
            rotation_limit,
            history_limit: DEFAULT_HISTORY_LIMIT,
            entries: Arc::new(RwLock::new(entries)),
            routing_history: Arc::new(RwLock::new(routing_history)),
        }
    }

    pub async fn record_success(
        &self,
        action_type: impl Into<String>,
        pattern: impl Into<String>,
    ) -> std::io::Result<()> {
        self.append(FactEntry::Success {
            pattern: pattern.into(),
            action_type: action_type.into(),
            n: 1,
        })
        .await
    }

    pub async fn record_failure(
        &self,
        action_type: impl Into<String>,
        pattern: impl Into<String>,
        error_signature: impl Into<String>,
        suggested_fixes: Vec<String>,
    ) -> std::io::Result<()> {
        self.append(FactEntry::Failure {
            pattern: pattern.into(),
            action_type: action_type.into(),
            error_signature: error_signature.into(),
            n: 1,
            suggested_fixes,
        })
        .await
    }

    pub async fn record_solution(
        &self,
        task_fingerprint: impl Into<String>,
        summary: impl Into<String>,
    ) -> std::io::Result<()> {
        self.append(FactEntry::Solution {
            task_fingerprint: task_fingerprint.into(),
            summary: summary.into(),
        })
        .await
    }

    /// Persists a Router decision to `routing_history` for routing-feedback
    /// learning (spec §4.1 step 8, §4.11's `routing_history` field).
    pub async fn record_routing_decision(&self, decision: RouteDecision) -> std::io::Result<()> {
        let entries_snapshot = self.entries.read().await.clone();
        let mut history = self.routing_history.write().await;
        history.push(decision);
        if history.len() > self.history_limit {
            let overflow = history.len() - self.history_limit;
            history.drain(0..overflow);
        }
        let history_snapshot = history.clone();
        drop(history);
        persist(&self.path, &entries_snapshot, &history_snapshot)
    }

    pub async fn recent_routing_history(&self, limit: usize) -> Vec<RouteDecision> {
        let history = self.routing_history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Cheap bag-of-tokens overlap against every `Solution` entry's
    /// fingerprint, ranked descending, matching spec's tolerance for
    /// inexact matches.
    pub async fn find_similar(&self, task_fingerprint: &str) -> Vec<FactEntry> {
        let needle = tokenize(task_fingerprint);
        let entries = self.entries.read().await;
        let mut scored: Vec<(usize, FactEntry)> = entries
            .iter()
            .filter_map(|e| match e {
                FactEntry::Solution {
                    task_fingerprint: fp,
                    ..
                } => {
                    let overlap = tokenize(fp).intersection(&needle).count();
                    (overlap > 0).then_some((overlap, e.clone()))
                }
                _ => None,
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, e)| e).collect()
    }

    /// Fraction of `Success` entries over `Success + Failure` entries whose
    /// `action_type` matches `agent_name`; `None` observations yield `1.0`
    /// so a never-tried agent isn't penalized by the Router's tie-break.
    pub async fn agent_success_rate(&self, agent_name: &str) -> f64 {
        let entries = self.entries.read().await;
        let (mut successes, mut failures) = (0u32, 0u32);
        for entry in entries.iter() {
            match entry {
                FactEntry::Success { action_type, n, .. } if action_type == agent_name => {
                    successes += n
                }
                FactEntry::Failure { action_type, n, .. } if action_type == agent_name => {
                    failures += n
                }
                _ => {}
            }
        }
        let total = successes + failures;
        if total == 0 {
            1.0
        } else {
            successes as f64 / total as f64
        }
    }

    async fn append(&self, entry: FactEntry) -> std::io::Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        if entries.len() > self.rotation_limit {
            let overflow = entries.len() - self.rotation_limit;
            entries.drain(0..overflow);
        }
        let entries_snapshot = entries.clone();
        drop(entries);
        let history_snapshot = self.routing_history.read().await.clone();
        persist(&self.path, &entries_snapshot, &history_snapshot)
    }
}

fn bucket(entries: &[FactEntry]) -> (Vec<FactEntry>, Vec<FactEntry>, Vec<FactEntry>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    let mut solutions = Vec::new();
    for entry in entries {
        match entry {
            FactEntry::Success { .. } => successes.push(entry.clone()),
            FactEntry::Failure { .. } => failures.push(entry.clone()),
            FactEntry::Solution { .. } => solutions.push(entry.clone()),
        }
    }
    (successes, failures, solutions)
}

fn persist(path: &PathBuf, entries: &[FactEntry], routing_history: &[RouteDecision]) -> std::io::Result<()> {
    let (successes, failures, solutions) = bucket(entries);
    let doc = FactLedgerDocument {
        successes,
        failures,
        solutions,
        routing_history: routing_history.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&doc)?;
    write_atomic(path, &bytes)
}

fn tokenize(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn load(path: &PathBuf) -> std::io::Result<(Vec<FactEntry>, Vec<RouteDecision>)> {
    let doc: FactLedgerDocument = match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes).unwrap_or_default(),
        Ok(_) => FactLedgerDocument::default(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => FactLedgerDocument::default(),
        Err(err) => return Err(err),
    };
    let mut entries = Vec::with_capacity(doc.successes.len() + doc.failures.len() + doc.solutions.len());
    entries.extend(doc.successes);
    entries.extend(doc.failures);
    entries.extend(doc.solutions);
    Ok((entries, doc.routing_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rotation_drops_oldest_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FactLedger::with_rotation_limit(dir.path().join("facts.json"), 3);
        for i in 0..5 {
            ledger
                .record_success("docker", format!("pattern-{i}"))
                .await
                .unwrap();
        }
        let entries = ledger.entries.read().await;
        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[0], FactEntry::Success { pattern, .. } if pattern == "pattern-2"));
    }

    #[tokio::test]
    async fn find_similar_ranks_by_token_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FactLedger::new(dir.path().join("facts.json"));
        ledger
            .record_solution("deploy service to staging cluster", "scaled replicas")
            .await
            .unwrap();
        ledger
            .record_solution("restart container on host", "restarted unit")
            .await
            .unwrap();
        let matches = ledger.find_similar("deploy service to production cluster").await;
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn agent_success_rate_reflects_recorded_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FactLedger::new(dir.path().join("facts.json"));
        assert_eq!(ledger.agent_success_rate("docker").await, 1.0);
        ledger.record_success("docker", "p1").await.unwrap();
        ledger
            .record_failure("docker", "p2", "sig", vec![])
            .await
            .unwrap();
        assert_eq!(ledger.agent_success_rate("docker").await, 0.5);
    }

    #[tokio::test]
    async fn routing_history_persists_across_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        let ledger = FactLedger::new(path.clone());
        ledger
            .record_routing_decision(RouteDecision::simple("docker", 0.8, "container task"))
            .await
            .unwrap();

        let reopened = FactLedger::new(path);
        let history = reopened.recent_routing_history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].primary, "docker");
    }

    #[tokio::test]
    async fn document_buckets_entries_by_kind_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.json");
        let ledger = FactLedger::new(path.clone());
        ledger.record_success("docker", "p1").await.unwrap();
        ledger
            .record_failure("docker", "p2", "sig", vec![])
            .await
            .unwrap();
        ledger.record_solution("fp", "summary").await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["successes"].as_array().unwrap().len(), 1);
        assert_eq!(value["failures"].as_array().unwrap().len(), 1);
        assert_eq!(value["solutions"].as_array().unwrap().len(), 1);
    }
}
