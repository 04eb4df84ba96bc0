//! Error taxonomy for a delivery attempt
//!
//! Every variant is recovered locally into a user-facing status line; none of
//! them escape `deliver` as a fault.

use serde::Serialize;
use thiserror::Error;

/// Why a delivery attempt did not (or could not) succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryError {
    #[error("command text is empty")]
    EmptyInput,

    #[error("a delivery is already in progress")]
    Busy,

    #[error("permission denied: {capability}")]
    PermissionDenied { capability: String },

    #[error("{target} is not running")]
    TargetNotRunning { target: String },

    /// The process list could not be read, so the running state is unknown
    #[error("could not check whether {target} is running")]
    TargetStateUnknown { target: String },

    #[error("{target} could not be found or launched")]
    TargetNotFound { target: String },

    #[error("every delivery strategy failed")]
    AllStrategiesFailed,
}

impl DeliveryError {
    /// The status line shown to the user for this failure
    pub fn status_message(&self) -> String {
        match self {
            Self::EmptyInput => "Nothing to send".to_string(),
            Self::Busy => "A command is already being sent".to_string(),
            Self::PermissionDenied { .. } => {
                "Please enable accessibility permissions in System Preferences".to_string()
            }
            Self::TargetNotRunning { target } => format!(
                "Error: {} application is not running. Please start {} first.",
                target, target
            ),
            Self::TargetStateUnknown { target } => format!(
                "Error: Could not check whether {} is running. Check permissions and try again.",
                target
            ),
            Self::TargetNotFound { target } => {
                format!("Error: Could not find or launch {} application", target)
            }
            Self::AllStrategiesFailed => {
                "Failed to send command. Check permissions and try again.".to_string()
            }
        }
    }
}

/// Failure reported by the OS scripting engine
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The engine ran the script and reported an error
    #[error("script execution error: {message}")]
    Execution { code: Option<i32>, message: String },

    #[error("script timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to start scripting engine: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ScriptError {
    /// Numeric OS error code, when the engine reported one
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Execution { code, .. } => *code,
            _ => None,
        }
    }
}
