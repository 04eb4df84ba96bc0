//! Shared session state
//!
//! One `SessionState` is shared (behind an `Arc`) by the permission gate, the
//! target locator, the orchestrator and the status poller. Each field has a
//! single writer, and every publish is dropped if it would not change the
//! value, so pollers that disagree for a moment cannot start a feedback loop.

use std::sync::Mutex;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::AuthorizationState;

/// Readiness message used while nothing else needs reporting
pub const STATUS_READY: &str = "Ready";
pub const STATUS_ACCESSIBILITY_REQUIRED: &str = "Accessibility permissions required";
pub const STATUS_SCRIPTING_REQUIRED: &str = "System Events access required. Check permissions.";

pub struct SessionState {
    authorization: watch::Sender<AuthorizationState>,
    target_running: watch::Sender<bool>,
    status: watch::Sender<String>,
    pending_text: Mutex<String>,
    shutdown: CancellationToken,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            authorization: watch::Sender::new(AuthorizationState::default()),
            target_running: watch::Sender::new(false),
            status: watch::Sender::new(String::new()),
            pending_text: Mutex::new(String::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn authorization(&self) -> AuthorizationState {
        *self.authorization.borrow()
    }

    pub fn subscribe_authorization(&self) -> watch::Receiver<AuthorizationState> {
        self.authorization.subscribe()
    }

    /// Returns true if the stored value changed
    pub(crate) fn set_input_synthesis_allowed(&self, allowed: bool) -> bool {
        self.authorization.send_if_modified(|state| {
            if state.input_synthesis_allowed == allowed {
                return false;
            }
            state.input_synthesis_allowed = allowed;
            true
        })
    }

    /// Returns true if the stored value changed
    pub(crate) fn set_ui_scripting_allowed(&self, allowed: bool) -> bool {
        self.authorization.send_if_modified(|state| {
            if state.ui_scripting_allowed == allowed {
                return false;
            }
            state.ui_scripting_allowed = allowed;
            true
        })
    }

    pub fn target_running(&self) -> bool {
        *self.target_running.borrow()
    }

    pub fn subscribe_target_running(&self) -> watch::Receiver<bool> {
        self.target_running.subscribe()
    }

    pub(crate) fn set_target_running(&self, running: bool) -> bool {
        self.target_running.send_if_modified(|current| {
            if *current == running {
                return false;
            }
            *current = running;
            true
        })
    }

    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    pub(crate) fn set_status(&self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.status.send_if_modified(|current| {
            if *current == message {
                return false;
            }
            *current = message;
            true
        })
    }

    /// Replace the status only if it currently reads `expected`
    pub(crate) fn replace_status(&self, expected: &[&str], message: &str) -> bool {
        self.status.send_if_modified(|current| {
            if current.as_str() != message && expected.contains(&current.as_str()) {
                *current = message.to_string();
                return true;
            }
            false
        })
    }

    /// The command text waiting to be (re)sent
    pub fn pending_text(&self) -> String {
        self.pending_text
            .lock()
            .map(|text| text.clone())
            .unwrap_or_default()
    }

    pub fn set_pending_text(&self, text: impl Into<String>) {
        if let Ok(mut pending) = self.pending_text.lock() {
            *pending = text.into();
        }
    }

    pub(crate) fn clear_pending_text(&self) {
        self.set_pending_text(String::new());
    }

    /// Cancelled when the session ends; delayed re-checks stop with it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_defaults_to_denied() {
        let session = SessionState::new();
        assert_eq!(session.authorization(), AuthorizationState::default());
        assert!(!session.authorization().input_synthesis_allowed);
        assert!(!session.authorization().ui_scripting_allowed);
        assert!(!session.target_running());
    }

    #[test]
    fn test_noop_publish_does_not_notify() {
        let session = SessionState::new();
        let mut rx = session.subscribe_authorization();

        assert!(!session.set_ui_scripting_allowed(false));
        assert!(!rx.has_changed().unwrap());

        assert!(session.set_ui_scripting_allowed(true));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().ui_scripting_allowed);

        assert!(!session.set_ui_scripting_allowed(true));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_flags_are_independent() {
        let session = SessionState::new();
        session.set_input_synthesis_allowed(true);
        assert!(session.authorization().input_synthesis_allowed);
        assert!(!session.authorization().ui_scripting_allowed);
    }

    #[test]
    fn test_replace_status_only_from_expected() {
        let session = SessionState::new();
        session.set_status("Command sent: hi");
        assert!(!session.replace_status(&[STATUS_READY, ""], STATUS_SCRIPTING_REQUIRED));
        assert_eq!(session.status(), "Command sent: hi");

        session.set_status(STATUS_READY);
        assert!(session.replace_status(&[STATUS_READY, ""], STATUS_SCRIPTING_REQUIRED));
        assert_eq!(session.status(), STATUS_SCRIPTING_REQUIRED);
    }

    #[test]
    fn test_pending_text() {
        let session = SessionState::new();
        session.set_pending_text("deploy now");
        assert_eq!(session.pending_text(), "deploy now");
        session.clear_pending_text();
        assert_eq!(session.pending_text(), "");
    }
}
