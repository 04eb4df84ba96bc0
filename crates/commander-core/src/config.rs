//! Tunable parameters of the delivery pipeline
//!
//! The target identity, the panel-opening choreography, and every fixed delay
//! live here instead of inside the pipeline code. Tests use
//! [`TimingConfig::zero`] so nothing waits on the wall clock.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The single application commands are delivered to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetIdentity {
    /// Localized process name, e.g. "Cursor"
    pub display_name: String,
    /// Stable bundle identifier
    pub bundle_id: String,
    /// URL scheme used as the last-resort launch method
    pub url_scheme: String,
    /// Conventional install locations, checked in order (`~` is expanded)
    pub install_paths: Vec<String>,
    /// Content-index query; `None` derives one from the name and bundle id
    pub index_query: Option<String>,
}

impl Default for TargetIdentity {
    fn default() -> Self {
        Self {
            display_name: "Cursor".to_string(),
            bundle_id: "io.cursor.Cursor".to_string(),
            url_scheme: "cursor://".to_string(),
            install_paths: vec![
                "/Applications/Cursor.app".to_string(),
                "/Applications/Utilities/Cursor.app".to_string(),
                "~/Applications/Cursor.app".to_string(),
                "/Applications/Cursor/Cursor.app".to_string(),
            ],
            index_query: None,
        }
    }
}

impl TargetIdentity {
    /// The query handed to the content index when resolving an install path
    pub fn content_index_query(&self) -> String {
        self.index_query.clone().unwrap_or_else(|| {
            format!(
                "kMDItemCFBundleIdentifier == '{}' || kMDItemDisplayName == '{}.app'",
                self.bundle_id, self.display_name
            )
        })
    }

    /// Install paths with a leading `~` expanded to the home directory
    pub fn expanded_install_paths(&self) -> Vec<PathBuf> {
        self.install_paths.iter().map(|p| expand_home(p)).collect()
    }

    /// True if a process with this name or bundle id belongs to the target.
    /// Either match is enough: the display name may be localized.
    pub fn matches(&self, name: &str, bundle_id: Option<&str>) -> bool {
        name == self.display_name || bundle_id == Some(self.bundle_id.as_str())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Keyboard choreography used to reveal the chat composer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChoreographyConfig {
    /// Virtual key pressed with Command to open the command palette (K)
    pub palette_key: u16,
    /// Text typed into the palette to filter it down to the chat panel
    pub filter_text: String,
    /// Virtual key pressed with Command to toggle the chat panel directly (J)
    pub toggle_key: u16,
    /// Distance in points between the window's bottom edge and the composer
    pub composer_offset: f64,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            palette_key: 40,
            filter_text: "chat".to_string(),
            toggle_key: 38,
            composer_offset: 30.0,
        }
    }
}

/// Fixed delays, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub activate_settle: u64,
    pub palette_open: u64,
    pub filter_settle: u64,
    pub confirm_settle: u64,
    pub toggle_settle: u64,
    pub click_settle: u64,
    pub key_event_gap: u64,
    pub char_gap: u64,
    pub mouse_event_gap: u64,
    pub clear_settle: u64,
    pub pre_submit: u64,
    pub restore_delay: u64,
    pub permission_recheck: u64,
    pub launch_recheck: u64,
    /// Upper bound on a single strategy; a strategy that exceeds it has failed
    pub strategy_timeout: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            activate_settle: 500,
            palette_open: 300,
            filter_settle: 300,
            confirm_settle: 500,
            toggle_settle: 500,
            click_settle: 200,
            key_event_gap: 20,
            char_gap: 30,
            mouse_event_gap: 50,
            clear_settle: 50,
            pre_submit: 200,
            restore_delay: 500,
            permission_recheck: 1000,
            launch_recheck: 2000,
            strategy_timeout: 30_000,
        }
    }
}

impl TimingConfig {
    /// No waiting at all, except a strategy timeout that still bounds hangs
    pub fn zero() -> Self {
        Self {
            activate_settle: 0,
            palette_open: 0,
            filter_settle: 0,
            confirm_settle: 0,
            toggle_settle: 0,
            click_settle: 0,
            key_event_gap: 0,
            char_gap: 0,
            mouse_event_gap: 0,
            clear_settle: 0,
            pre_submit: 0,
            restore_delay: 0,
            permission_recheck: 0,
            launch_recheck: 0,
            strategy_timeout: 5_000,
        }
    }
}

/// Background status polling cadence, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_delay: u64,
    pub running_to_scripting: u64,
    pub cycle_pause: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay: 2,
            running_to_scripting: 2,
            cycle_pause: 8,
        }
    }
}

/// Everything the pipeline needs to know up front
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    pub target: TargetIdentity,
    pub choreography: ChoreographyConfig,
    pub timing: TimingConfig,
    pub polling: PollingConfig,
}

impl DeliveryConfig {
    /// Default target and choreography with every delay removed
    pub fn instant() -> Self {
        Self {
            timing: TimingConfig::zero(),
            ..Self::default()
        }
    }
}

/// Pause for a configured number of milliseconds; zero returns immediately
pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_matches_name_or_bundle() {
        let target = TargetIdentity::default();
        assert!(target.matches("Cursor", None));
        assert!(target.matches("Curseur", Some("io.cursor.Cursor")));
        assert!(!target.matches("Code", Some("com.microsoft.VSCode")));
        assert!(!target.matches("cursor", None));
    }

    #[test]
    fn test_content_index_query_derived() {
        let target = TargetIdentity::default();
        assert_eq!(
            target.content_index_query(),
            "kMDItemCFBundleIdentifier == 'io.cursor.Cursor' || kMDItemDisplayName == 'Cursor.app'"
        );

        let custom = TargetIdentity {
            index_query: Some("kMDItemDisplayName == 'Other.app'".to_string()),
            ..TargetIdentity::default()
        };
        assert_eq!(custom.content_index_query(), "kMDItemDisplayName == 'Other.app'");
    }

    #[test]
    fn test_install_paths_expand_home() {
        let target = TargetIdentity::default();
        let paths = target.expanded_install_paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], PathBuf::from("/Applications/Cursor.app"));
        assert!(!paths[2].to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }

    #[test]
    fn test_zero_timing_keeps_strategy_timeout() {
        let timing = TimingConfig::zero();
        assert_eq!(timing.activate_settle, 0);
        assert_eq!(timing.launch_recheck, 0);
        assert!(timing.strategy_timeout > 0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DeliveryConfig = serde_json::from_str(
            r#"{"choreography": {"filter_text": "agent"}, "timing": {"char_gap": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.choreography.filter_text, "agent");
        assert_eq!(config.choreography.palette_key, 40);
        assert_eq!(config.timing.char_gap, 5);
        assert_eq!(config.timing.restore_delay, 500);
        assert_eq!(config.target.display_name, "Cursor");
    }
}
