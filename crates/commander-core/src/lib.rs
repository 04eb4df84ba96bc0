//! commander-core - delivers text commands into the Cursor chat composer
//!
//! This crate provides:
//! - Permission gate for input synthesis and System Events scripting
//! - Target locator and launcher (content index, install paths, URL scheme)
//! - Window locator and the panel-opening choreography
//! - Three ranked delivery strategies and the orchestrator that runs them
//! - Shared session state, background status polling and recent-command history
//! - macOS implementations of the platform capabilities

pub mod config;
pub mod delivery;
pub mod error;
pub mod history;
pub mod input;
pub mod keymap;
pub mod locator;
pub mod panel;
pub mod permission;
pub mod platform;
pub mod poller;
pub mod script;
pub mod session;
pub mod strategies;
pub mod types;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::{ChoreographyConfig, DeliveryConfig, PollingConfig, TargetIdentity, TimingConfig};
pub use delivery::DeliveryOrchestrator;
pub use error::{DeliveryError, ScriptError};
pub use history::{HISTORY_CAPACITY, HistoryEntry, HistorySink, RecentCommands};
pub use locator::{LaunchAttempt, LaunchMethod, TargetLocator};
pub use permission::PermissionGate;
pub use platform::Capabilities;
pub use poller::StatusPoller;
pub use session::SessionState;
pub use strategies::DeliveryStrategy;
pub use types::{AuthorizationState, DeliveryOutcome, DeliveryRequest, ProcessHandle, StrategyReport};
