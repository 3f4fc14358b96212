use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Risk classification driving the Governance rule table (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTag {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: String::new(),
        }
    }
}

/// Static metadata for a registered tool (spec §3, "Tool").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
    pub risk: RiskTag,
    pub requires_auth: Option<String>,
    /// Non-empty only when the tool restricts which environments it may run
    /// in at all (spec §4.5, "Explicit per-tool allowed_contexts").
    pub allowed_contexts: Vec<String>,
}

impl ToolDescriptor {
    pub fn required_param_names(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn param_types(&self) -> HashMap<&str, ParamType> {
        self.params.iter().map(|p| (p.name.as_str(), p.param_type)).collect()
    }
}
