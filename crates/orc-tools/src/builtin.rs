//! Built-in tool implementations backing the example agent kinds in spec
//! §2 (Consulting, Docker, Config, Design). Grounded on `tandem-tools`'s
//! `ReadTool`/`WriteTool`/`BashTool`, trimmed to the file/shell/container
//! primitives this spec's scenarios exercise (spec §8, S1-S4).

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::{Tool, ToolOutcome};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    async fn invoke(&self, args: &Value) -> ToolOutcome {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing `path` argument");
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => ToolOutcome::success(json!({ "contents": contents })),
            Err(err) => ToolOutcome::error(format!("failed to read {path}: {err}")),
        }
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    async fn invoke(&self, args: &Value) -> ToolOutcome {
        let (Some(path), Some(contents)) = (
            args.get("path").and_then(|v| v.as_str()),
            args.get("contents").and_then(|v| v.as_str()),
        ) else {
            return ToolOutcome::error("missing `path` or `contents` argument");
        };
        match tokio::fs::write(path, contents).await {
            Ok(()) => ToolOutcome::success(json!({ "bytes_written": contents.len() })),
            Err(err) => ToolOutcome::error(format!("failed to write {path}: {err}")),
        }
    }
}

/// Backs the `shell`-family tools Governance inspects for per-invocation
/// risk reclassification. Registered `red` by default; the registry caller
/// is expected to have applied `orc_core::governance` before this runs.
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    async fn invoke(&self, args: &Value) -> ToolOutcome {
        let Some(command) = args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing `command` argument");
        };
        let output = Command::new("sh").arg("-c").arg(command).output().await;
        match output {
            Ok(output) if output.status.success() => ToolOutcome::success(json!({
                "stdout": String::from_utf8_lossy(&output.stdout),
            })),
            Ok(output) => ToolOutcome::error(format!(
                "command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )),
            Err(err) => ToolOutcome::error(format!("failed to spawn command: {err}")),
        }
    }
}

pub struct ListContainersTool;

#[async_trait]
impl Tool for ListContainersTool {
    async fn invoke(&self, _args: &Value) -> ToolOutcome {
        let output = Command::new("docker")
            .args(["ps", "--format", "{{.Names}}"])
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => ToolOutcome::success(json!({
                "containers": String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            })),
            Ok(output) => ToolOutcome::error(String::from_utf8_lossy(&output.stderr).to_string()),
            Err(err) => ToolOutcome::error(format!("docker not available: {err}")),
        }
    }
}

pub struct RestartContainerTool;

#[async_trait]
impl Tool for RestartContainerTool {
    async fn invoke(&self, args: &Value) -> ToolOutcome {
        let Some(name) = args.get("name").and_then(|v| v.as_str()) else {
            return ToolOutcome::error("missing `name` argument");
        };
        let output = Command::new("docker").args(["restart", name]).output().await;
        match output {
            Ok(output) if output.status.success() => {
                ToolOutcome::success(json!({ "restarted": name }))
            }
            Ok(output) => ToolOutcome::error(String::from_utf8_lossy(&output.stderr).to_string()),
            Err(err) => ToolOutcome::error(format!("docker not available: {err}")),
        }
    }
}
