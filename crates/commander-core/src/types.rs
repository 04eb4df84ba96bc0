use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// A running OS process. Only valid while the process lives, so it is
/// resolved again for every delivery instead of being cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub pid: u32,
    pub name: String,
    pub bundle_id: Option<String>,
}

/// A point in global screen coordinates (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Window or screen bounds in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRegion {
    pub fn new(origin_x: f64, origin_y: f64, width: f64, height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The two independent OS authorizations the pipeline depends on.
/// Both start out false until the first query completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Synthesizing input and reading UI state system-wide
    pub input_synthesis_allowed: bool,
    /// Driving the System Events scripting facility
    pub ui_scripting_allowed: bool,
}

/// A command to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub text: String,
}

impl DeliveryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// What happened to one strategy during an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyReport {
    pub name: String,
    pub attempted: bool,
    pub succeeded: bool,
}

/// The single result produced for each delivery request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub succeeded: bool,
    pub status_message: String,
    pub error: Option<DeliveryError>,
    pub strategies: Vec<StrategyReport>,
}

impl DeliveryOutcome {
    pub fn success(text: &str, strategies: Vec<StrategyReport>) -> Self {
        Self {
            succeeded: true,
            status_message: format!("Command sent: {}", text),
            error: None,
            strategies,
        }
    }

    pub fn failure(error: DeliveryError, strategies: Vec<StrategyReport>) -> Self {
        Self {
            succeeded: false,
            status_message: error.status_message(),
            error: Some(error),
            strategies,
        }
    }

    /// Names of strategies that ran, in the order they ran
    pub fn attempted(&self) -> Vec<&str> {
        self.strategies
            .iter()
            .filter(|s| s.attempted)
            .map(|s| s.name.as_str())
            .collect()
    }
}
