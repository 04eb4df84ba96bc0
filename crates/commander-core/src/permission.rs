//! Permission gate
//!
//! Queries the two OS authorizations the pipeline needs and publishes them to
//! the session. It is the only writer of the authorization flags.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::pause;
use crate::platform::{ACCESSIBILITY_SETTINGS_URL, Guidance, PermissionProvider, ScriptRunner};
use crate::script::SYSTEM_EVENTS_PROBE;
use crate::session::{
    STATUS_ACCESSIBILITY_REQUIRED, STATUS_READY, STATUS_SCRIPTING_REQUIRED, SessionState,
};
use crate::types::AuthorizationState;

#[derive(Clone)]
pub struct PermissionGate {
    permissions: Arc<dyn PermissionProvider>,
    scripts: Arc<dyn ScriptRunner>,
    session: Arc<SessionState>,
    target_name: String,
    recheck_delay_ms: u64,
    prompt: bool,
}

impl PermissionGate {
    pub fn new(
        permissions: Arc<dyn PermissionProvider>,
        scripts: Arc<dyn ScriptRunner>,
        session: Arc<SessionState>,
        target_name: impl Into<String>,
        recheck_delay_ms: u64,
    ) -> Self {
        Self {
            permissions,
            scripts,
            session,
            target_name: target_name.into(),
            recheck_delay_ms,
            prompt: true,
        }
    }

    /// Whether trust queries ask the OS to prompt the user (on by default)
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Query input-synthesis trust and publish it
    pub async fn check_input_synthesis_permission(&self) -> bool {
        let allowed = self.permissions.input_synthesis_trusted(self.prompt).await;
        if self.session.set_input_synthesis_allowed(allowed) {
            info!("Input synthesis permission: {}", allowed);
        }

        if allowed {
            self.session
                .replace_status(&["", STATUS_ACCESSIBILITY_REQUIRED], STATUS_READY);
        } else {
            self.session.replace_status(
                &["", STATUS_READY, STATUS_SCRIPTING_REQUIRED],
                STATUS_ACCESSIBILITY_REQUIRED,
            );
        }
        allowed
    }

    /// Run a no-op System Events script; no error means scripting is allowed
    pub async fn check_ui_scripting_permission(&self) -> bool {
        let allowed = match self.scripts.run(SYSTEM_EVENTS_PROBE).await {
            Ok(_) => true,
            Err(e) => {
                debug!("System Events probe failed: {}", e);
                false
            }
        };

        if self.session.set_ui_scripting_allowed(allowed) {
            info!("UI scripting permission: {}", allowed);
            if allowed {
                self.session
                    .replace_status(&[STATUS_SCRIPTING_REQUIRED], STATUS_READY);
            } else {
                self.session
                    .replace_status(&["", STATUS_READY], STATUS_SCRIPTING_REQUIRED);
            }
        }
        allowed
    }

    /// Refresh both authorizations
    pub async fn refresh(&self) -> AuthorizationState {
        self.check_input_synthesis_permission().await;
        self.check_ui_scripting_permission().await;
        self.session.authorization()
    }

    /// Open the Accessibility settings, explain what to do, and re-check
    /// after a short delay to pick up a manual grant
    pub fn request_input_synthesis_permission(&self) -> JoinHandle<()> {
        let guidance = Guidance {
            title: "Accessibility Permissions Required".to_string(),
            body: format!(
                "Commander needs accessibility permissions to send commands to {name}.\n\n\
                 1. In the Privacy & Security settings that just opened, unlock to make changes.\n\
                 2. Check the box next to Commander (or your terminal) in the list.\n\
                 3. Restart Commander after granting permissions.",
                name = self.target_name
            ),
        };
        let gate = self.clone();
        tokio::spawn(async move {
            gate.open_and_explain(&guidance).await;
            if gate.wait_recheck().await {
                gate.check_input_synthesis_permission().await;
            }
        })
    }

    /// Same as [`Self::request_input_synthesis_permission`] for System Events
    /// automation access
    pub fn request_ui_scripting_permission(&self) -> JoinHandle<()> {
        let guidance = Guidance {
            title: "System Events Permissions Required".to_string(),
            body: format!(
                "Commander needs permission to control System Events to send commands to {name}.\n\n\
                 1. In the Privacy & Security settings that just opened, unlock to make changes.\n\
                 2. Make sure Commander (or your terminal) is checked under Accessibility and Automation.\n\
                 3. If it is not listed, run Commander again to trigger the request.\n\
                 4. Restart Commander after granting permissions.",
                name = self.target_name
            ),
        };
        let gate = self.clone();
        tokio::spawn(async move {
            gate.open_and_explain(&guidance).await;
            if gate.wait_recheck().await {
                gate.check_ui_scripting_permission().await;
            }
        })
    }

    async fn open_and_explain(&self, guidance: &Guidance) {
        if let Err(e) = self.permissions.open_settings(ACCESSIBILITY_SETTINGS_URL).await {
            warn!("Failed to open privacy settings: {}", e);
        }
        if let Err(e) = self.permissions.show_guidance(guidance).await {
            warn!("Failed to show permission guidance: {}", e);
        }
    }

    /// False if the session shut down before the delay elapsed
    async fn wait_recheck(&self) -> bool {
        let shutdown = self.session.shutdown_token();
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = pause(self.recheck_delay_ms) => true,
        }
    }
}
