use serde::{Deserialize, Serialize};

/// Environment tag a [`crate::Task`] runs under. Drives governance's
/// yellow-risk auto-approve/require-approval split (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Production,
    Local,
}

impl Environment {
    /// `true` for every environment in which a `yellow` tool auto-approves
    /// instead of parking for operator approval.
    pub fn is_non_production(self) -> bool {
        !matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            "local" => Ok(Environment::Local),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Local => "local",
        };
        write!(f, "{s}")
    }
}
