//! Focus/panel opener
//!
//! Runs the fixed choreography that reveals the target's chat composer:
//! palette shortcut, filter text, confirm, direct toggle shortcut, then a
//! click on the composer. Every step runs unconditionally because the UI
//! state is unknown beforehand. The result is never checked; the strategies
//! that follow find out for themselves whether the composer has focus.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::{ChoreographyConfig, TimingConfig, pause};
use crate::input::InputSequencer;
use crate::keymap::{KEY_RETURN, Modifiers};
use crate::platform::ScriptRunner;
use crate::script::ScriptBuilder;
use crate::session::SessionState;
use crate::types::ProcessHandle;
use crate::window::WindowLocator;

#[derive(Clone)]
pub struct PanelOpener {
    scripts: Arc<dyn ScriptRunner>,
    input: InputSequencer,
    windows: WindowLocator,
    session: Arc<SessionState>,
    choreography: ChoreographyConfig,
    timing: TimingConfig,
}

impl PanelOpener {
    pub fn new(
        scripts: Arc<dyn ScriptRunner>,
        input: InputSequencer,
        windows: WindowLocator,
        session: Arc<SessionState>,
        choreography: ChoreographyConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            scripts,
            input,
            windows,
            session,
            choreography,
            timing,
        }
    }

    /// Best effort. Uses System Events when scripting is authorized and
    /// falls back to synthetic events otherwise.
    pub async fn open_input_panel(&self, target: &ProcessHandle) {
        if self.session.authorization().ui_scripting_allowed {
            let script = ScriptBuilder::new(&target.name, &self.choreography, &self.timing)
                .open_panel();
            match self.scripts.run(&script).await {
                Ok(_) => {
                    debug!("Opened input panel via System Events");
                    return;
                }
                Err(e) => warn!(code = ?e.code(), "Panel script failed: {}", e),
            }
        }

        if let Err(e) = self.open_with_events(target).await {
            warn!("Synthetic panel choreography failed: {:#}", e);
        }
    }

    async fn open_with_events(&self, target: &ProcessHandle) -> Result<()> {
        let c = &self.choreography;
        let t = &self.timing;

        self.input.press(c.palette_key, Modifiers::COMMAND).await?;
        pause(t.palette_open).await;
        self.input.type_text(&c.filter_text).await?;
        pause(t.filter_settle).await;
        self.input.press(KEY_RETURN, Modifiers::NONE).await?;
        pause(t.confirm_settle).await;
        self.input.press(c.toggle_key, Modifiers::COMMAND).await?;
        pause(t.toggle_settle).await;

        let point = self.windows.locate_input_surface(target).await;
        self.input.click(point).await?;
        pause(t.click_settle).await;

        debug!("Opened input panel via synthetic events");
        Ok(())
    }
}
