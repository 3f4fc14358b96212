//! Tool registration, discovery, validation, and dispatch (spec §4.4).
//!
//! Grounded on `tandem-tools::ToolRegistry`'s name-keyed
//! `Arc<RwLock<HashMap<..>>>` dispatch-by-name idiom, generalized with the
//! risk-tag inference and dangerous-pattern rejection the spec requires for
//! `discover`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orc_types::{ParamType, RiskTag, ToolDescriptor, ToolParam};
use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;

const TRANSIENT_IO_RETRY_BACKOFF: Duration = Duration::from_millis(100);

mod builtin;
pub use builtin::{ListContainersTool, ReadFileTool, RestartContainerTool, ShellTool, WriteFileTool};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolRegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArgs { tool: String, reason: String },
    #[error("tool {0} is already registered")]
    DuplicateTool(String),
    #[error("rejected tool `{name}` during discovery: {reason}")]
    DangerousTool { name: String, reason: String },
}

/// Outcome of a single dispatched tool invocation (spec §4.4, "Dispatch").
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub status: ToolOutcomeStatus,
    pub data: Option<Value>,
    pub error_message: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcomeStatus {
    Success,
    Error,
}

impl ToolOutcome {
    pub fn success(data: Value) -> Self {
        Self {
            status: ToolOutcomeStatus::Success,
            data: Some(data),
            error_message: None,
            metadata: Value::Null,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolOutcomeStatus::Error,
            data: None,
            error_message: Some(message.into()),
            metadata: Value::Null,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolOutcomeStatus::Error
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    async fn invoke(&self, args: &Value) -> ToolOutcome;
}

/// Declarative manifest for a tool discovered at runtime (spec §4.4,
/// "Discovery"). `body_text` is the tool's implementation source/command
/// template, scanned for dangerous patterns before registration.
#[derive(Debug, Clone, Default)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
    pub requires_auth: Option<String>,
    pub allowed_contexts: Vec<String>,
    pub capabilities: ToolCapabilities,
    pub body_text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ToolCapabilities {
    pub writes_filesystem: bool,
    pub spawns_process: bool,
    pub network_write: bool,
    pub restarts_services: bool,
    pub deploys_code: bool,
    pub arbitrary_shell: bool,
}

/// Computes the default risk tag from a tool's declared capabilities (spec
/// §4.4): no writes/spawns/network-writes ⇒ green; local filesystem writes
/// or single-container exec ⇒ yellow; anything that restarts services,
/// deploys code, or runs arbitrary shell ⇒ red.
pub fn infer_risk_tag(caps: &ToolCapabilities) -> RiskTag {
    if caps.restarts_services || caps.deploys_code || caps.arbitrary_shell {
        RiskTag::Red
    } else if caps.writes_filesystem || caps.spawns_process || caps.network_write {
        RiskTag::Yellow
    } else {
        RiskTag::Green
    }
}

fn dangerous_patterns() -> &'static [(&'static str, &'static str)] {
    &[
        (r"(?i)\beval\s*\(", "unconditional code execution primitive (eval)"),
        (r"(?i)\bexec\s*\(", "unconditional code execution primitive (exec)"),
        (r"(?i)os\.system\s*\(", "unconditional shell-out via os.system"),
        (
            r#"(?i)Command::new\([^)]*\)\s*\.\s*arg\s*\(\s*format!"#,
            "shell-out with unconditional concatenation of parameters",
        ),
        (r"rm\s+-rf\s+/(\s|$|\*)", "destructive filesystem wildcard (rm -rf /)"),
        (r"rm\s+-rf\s+\*", "destructive filesystem wildcard (rm -rf *)"),
    ]
}

/// `None` if `body_text` contains no recognized dangerous pattern.
pub fn dangerous_pattern_violation(body_text: &str) -> Option<String> {
    dangerous_patterns().iter().find_map(|(pattern, reason)| {
        Regex::new(pattern)
            .ok()
            .filter(|re| re.is_match(body_text))
            .map(|_| reason.to_string())
    })
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handle: Arc<dyn Tool>,
}

/// Process-wide registry of tools, keyed by unique name (spec §4.4).
/// `allow_unsafe_red` permits discovery to register a tool whose body text
/// tripped a dangerous-pattern check, provided it is explicitly tagged
/// `red` (spec: "...unless the tool is explicitly marked red and the
/// registry is configured to permit such tools").
#[derive(Clone)]
pub struct Registry {
    tools: Arc<RwLock<HashMap<String, Arc<RegisteredTool>>>>,
    allow_unsafe_red: bool,
}

impl Registry {
    pub fn new(allow_unsafe_red: bool) -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            allow_unsafe_red,
        }
    }

    pub async fn register(
        &self,
        descriptor: ToolDescriptor,
        handle: Arc<dyn Tool>,
    ) -> Result<(), ToolRegistryError> {
        let mut tools = self.tools.write().await;
        if tools.contains_key(&descriptor.name) {
            return Err(ToolRegistryError::DuplicateTool(descriptor.name.clone()));
        }
        tools.insert(
            descriptor.name.clone(),
            Arc::new(RegisteredTool { descriptor, handle }),
        );
        Ok(())
    }

    pub async fn lookup(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.read().await.get(name).map(|t| t.descriptor.clone())
    }

    pub async fn list(&self, filter: Option<RiskTag>) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self
            .tools
            .read()
            .await
            .values()
            .filter(|t| match filter {
                Some(f) => t.descriptor.risk == f,
                None => true,
            })
            .map(|t| t.descriptor.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Validates and registers every manifest in `manifests` (spec §4.4,
    /// "Discovery"); every tool registered this way is always `red`
    /// regardless of its inferred capability risk (spec: "Every dynamically
    /// added tool (post-startup) starts red regardless of analysis").
    pub async fn discover(
        &self,
        manifests: Vec<ToolManifest>,
        handle_factory: impl Fn(&ToolManifest) -> Arc<dyn Tool>,
    ) -> Result<Vec<ToolDescriptor>, ToolRegistryError> {
        let mut registered = Vec::new();
        for manifest in manifests {
            if let Some(reason) = dangerous_pattern_violation(&manifest.body_text) {
                if !self.allow_unsafe_red {
                    return Err(ToolRegistryError::DangerousTool {
                        name: manifest.name,
                        reason,
                    });
                }
            }
            let descriptor = ToolDescriptor {
                name: manifest.name.clone(),
                description: manifest.description.clone(),
                params: manifest.params.clone(),
                risk: RiskTag::Red,
                requires_auth: manifest.requires_auth.clone(),
                allowed_contexts: manifest.allowed_contexts.clone(),
            };
            let handle = handle_factory(&manifest);
            self.register(descriptor.clone(), handle).await?;
            registered.push(descriptor);
        }
        Ok(registered)
    }

    /// Validates `args` against the tool's schema, then runs it with a
    /// wall-clock deadline (spec §4.4, "Dispatch"). Unknown tool is an
    /// immediate `Err`, per spec invariant ("unknown tool ⇒ immediate
    /// failure, not red-approval") — Governance never sees it. A timeout is
    /// treated as transient I/O (spec §7, *TransientIO*) and gets a single
    /// retry after a short backoff before it's surfaced as a tool error.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        deadline: Duration,
    ) -> Result<ToolOutcome, ToolRegistryError> {
        let registered = {
            let tools = self.tools.read().await;
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| ToolRegistryError::UnknownTool(name.to_string()))?
        };

        validate_args(&registered.descriptor, &args)?;

        if let Ok(outcome) = tokio::time::timeout(deadline, registered.handle.invoke(&args)).await {
            return Ok(outcome);
        }

        tokio::time::sleep(TRANSIENT_IO_RETRY_BACKOFF).await;

        match tokio::time::timeout(deadline, registered.handle.invoke(&args)).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Ok(ToolOutcome::error(format!(
                "tool `{name}` timed out after {:.1}s (retried once)",
                deadline.as_secs_f64()
            ))),
        }
    }
}

fn validate_args(descriptor: &ToolDescriptor, args: &Value) -> Result<(), ToolRegistryError> {
    let obj = args.as_object().ok_or_else(|| ToolRegistryError::InvalidArgs {
        tool: descriptor.name.clone(),
        reason: "arguments must be a JSON object".to_string(),
    })?;

    for name in descriptor.required_param_names() {
        if !obj.contains_key(name) {
            return Err(ToolRegistryError::InvalidArgs {
                tool: descriptor.name.clone(),
                reason: format!("missing required parameter `{name}`"),
            });
        }
    }

    let types = descriptor.param_types();
    for (key, value) in obj {
        let Some(expected) = types.get(key.as_str()) else {
            continue;
        };
        if !matches_param_type(*expected, value) {
            return Err(ToolRegistryError::InvalidArgs {
                tool: descriptor.name.clone(),
                reason: format!("parameter `{key}` does not match expected type {expected:?}"),
            });
        }
    }
    Ok(())
}

fn matches_param_type(expected: ParamType, value: &Value) -> bool {
    match expected {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Object => value.is_object(),
        ParamType::Array => value.is_array(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::ParamType;
    use serde_json::json;

    fn descriptor(name: &str, risk: RiskTag) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: "test tool".to_string(),
            params: vec![ToolParam {
                name: "path".to_string(),
                param_type: ParamType::String,
                required: true,
                description: "a path".to_string(),
            }],
            risk,
            requires_auth: None,
            allowed_contexts: Vec::new(),
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        async fn invoke(&self, args: &Value) -> ToolOutcome {
            ToolOutcome::success(args.clone())
        }
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let registry = Registry::new(false);
        registry
            .register(descriptor("read_file", RiskTag::Green), Arc::new(EchoTool))
            .await
            .unwrap();
        let found = registry.lookup("read_file").await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = Registry::new(false);
        registry
            .register(descriptor("read_file", RiskTag::Green), Arc::new(EchoTool))
            .await
            .unwrap();
        let err = registry
            .register(descriptor("read_file", RiskTag::Green), Arc::new(EchoTool))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::DuplicateTool(_)));
    }

    #[tokio::test]
    async fn invoke_unknown_tool_fails_immediately() {
        let registry = Registry::new(false);
        let err = registry
            .invoke("nonexistent", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn invoke_validates_required_args() {
        let registry = Registry::new(false);
        registry
            .register(descriptor("read_file", RiskTag::Green), Arc::new(EchoTool))
            .await
            .unwrap();
        let err = registry
            .invoke("read_file", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::InvalidArgs { .. }));
    }

    #[tokio::test]
    async fn invoke_succeeds_with_valid_args() {
        let registry = Registry::new(false);
        registry
            .register(descriptor("read_file", RiskTag::Green), Arc::new(EchoTool))
            .await
            .unwrap();
        let outcome = registry
            .invoke("read_file", json!({"path": "/tmp/x"}), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!outcome.is_error());
    }

    struct FlakyOnceTool {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Tool for FlakyOnceTool {
        async fn invoke(&self, _args: &Value) -> ToolOutcome {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call == 0 {
                // First call outlives the deadline; the retry's second call
                // returns immediately.
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            ToolOutcome::success(json!({"call": call}))
        }
    }

    #[tokio::test]
    async fn invoke_retries_once_after_a_timeout_then_succeeds() {
        let registry = Registry::new(false);
        registry
            .register(
                descriptor("flaky", RiskTag::Green),
                Arc::new(FlakyOnceTool {
                    calls: std::sync::atomic::AtomicUsize::new(0),
                }),
            )
            .await
            .unwrap();
        let outcome = registry
            .invoke(
                "flaky",
                json!({"path": "/tmp/x"}),
                Duration::from_millis(20),
            )
            .await
            .unwrap();
        assert!(!outcome.is_error());
    }

    struct AlwaysSlowTool;

    #[async_trait]
    impl Tool for AlwaysSlowTool {
        async fn invoke(&self, _args: &Value) -> ToolOutcome {
            tokio::time::sleep(Duration::from_millis(200)).await;
            ToolOutcome::success(json!({}))
        }
    }

    #[tokio::test]
    async fn invoke_surfaces_a_tool_error_after_the_retry_also_times_out() {
        let registry = Registry::new(false);
        registry
            .register(descriptor("always_slow", RiskTag::Green), Arc::new(AlwaysSlowTool))
            .await
            .unwrap();
        let outcome = registry
            .invoke(
                "always_slow",
                json!({"path": "/tmp/x"}),
                Duration::from_millis(20),
            )
            .await
            .unwrap();
        assert!(outcome.is_error());
    }

    #[test]
    fn risk_tag_inference_matches_spec_table() {
        assert_eq!(infer_risk_tag(&ToolCapabilities::default()), RiskTag::Green);
        assert_eq!(
            infer_risk_tag(&ToolCapabilities {
                writes_filesystem: true,
                ..Default::default()
            }),
            RiskTag::Yellow
        );
        assert_eq!(
            infer_risk_tag(&ToolCapabilities {
                arbitrary_shell: true,
                ..Default::default()
            }),
            RiskTag::Red
        );
    }

    #[test]
    fn dangerous_pattern_rejects_rm_rf_root() {
        assert!(dangerous_pattern_violation("rm -rf /").is_some());
    }

    #[test]
    fn dangerous_pattern_allows_benign_body() {
        assert!(dangerous_pattern_violation("println!(\"hello\")").is_none());
    }

    #[tokio::test]
    async fn discover_rejects_dangerous_manifest_unless_allowed() {
        let registry = Registry::new(false);
        let manifest = ToolManifest {
            name: "danger".to_string(),
            body_text: "rm -rf /".to_string(),
            ..Default::default()
        };
        let err = registry
            .discover(vec![manifest], |_| Arc::new(EchoTool))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::DangerousTool { .. }));
    }

    #[tokio::test]
    async fn discover_always_registers_as_red() {
        let registry = Registry::new(true);
        let manifest = ToolManifest {
            name: "dyn_tool".to_string(),
            capabilities: ToolCapabilities::default(),
            body_text: "rm -rf /".to_string(),
            ..Default::default()
        };
        let registered = registry
            .discover(vec![manifest], |_| Arc::new(EchoTool))
            .await
            .unwrap();
        assert_eq!(registered[0].risk, RiskTag::Red);
    }
}
