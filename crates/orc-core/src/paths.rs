use std::path::{Path, PathBuf};

/// Locations of the JSON ledgers and sentinel file the core persists to the
/// working directory (spec §6, "Persisted state").
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cwd() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn approvals(&self) -> PathBuf {
        self.root.join("approvals.json")
    }

    pub fn cost_history(&self) -> PathBuf {
        self.root.join("cost_history.json")
    }

    pub fn fact_ledger(&self) -> PathBuf {
        self.root.join("fact_ledger.json")
    }

    pub fn emergency_stop(&self) -> PathBuf {
        self.root.join(".emergency_stop")
    }
}

/// Write `contents` to `path` atomically: write to a sibling temp file, then
/// rename over the destination (spec §4.6/§9: "use atomic rename on write").
/// This is the single write primitive shared by the Approval Store, Cost
/// Tracker, and Fact Ledger.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    ));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
