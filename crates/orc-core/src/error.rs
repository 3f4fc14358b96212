use thiserror::Error;

/// Error taxonomy for the orchestration core (spec §7).
///
/// The Agent Runtime never lets one of these escape as a raw process error:
/// `ToolError`/`ValidationError`/`GovernanceReject` are folded into a
/// `ToolResult` message, while `BudgetExhausted`/`LoopDetected`/
/// `EmergencyStop`/`Internal` become a terminal `TaskStatus`.
#[derive(Debug, Error)]
pub enum OrcError {
    #[error("transient I/O error invoking {tool}: {message}")]
    TransientIo { tool: String, message: String },

    #[error("tool {tool} reported an error: {message}")]
    ToolError { tool: String, message: String },

    #[error("invalid arguments for tool {tool}: {message}")]
    ValidationError { tool: String, message: String },

    #[error("governance rejected {tool}: {reason}")]
    GovernanceReject { tool: String, reason: String },

    #[error("budget ceiling reached: {0}")]
    BudgetExhausted(String),

    #[error("loop detected: {0}")]
    LoopDetected(String),

    #[error("emergency stop: {0}")]
    EmergencyStop(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrcError {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrcError::BudgetExhausted(_)
                | OrcError::LoopDetected(_)
                | OrcError::EmergencyStop(_)
                | OrcError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OrcError>;
