use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::DeliveryStrategy;
use crate::config::{TimingConfig, pause};
use crate::input::InputSequencer;
use crate::keymap::{KEY_DELETE, KEY_RETURN, Modifiers};
use crate::types::ProcessHandle;
use crate::window::WindowLocator;

/// Clicks the composer, triple-clicks to select what is there, deletes it,
/// then types and submits through the low-level input pipeline. Success only
/// means every event was posted.
pub struct SyntheticStrategy {
    input: InputSequencer,
    windows: WindowLocator,
    timing: TimingConfig,
}

impl SyntheticStrategy {
    pub fn new(input: InputSequencer, windows: WindowLocator, timing: TimingConfig) -> Self {
        Self {
            input,
            windows,
            timing,
        }
    }
}

#[async_trait]
impl DeliveryStrategy for SyntheticStrategy {
    fn name(&self) -> &str {
        "synthetic-events"
    }

    async fn deliver(&self, text: &str, target: &ProcessHandle) -> Result<()> {
        let point = self.windows.locate_input_surface(target).await;

        self.input.click(point).await?;
        pause(self.timing.click_settle).await;
        for _ in 0..3 {
            self.input.click(point).await?;
        }

        self.input.press(KEY_DELETE, Modifiers::NONE).await?;
        pause(self.timing.clear_settle).await;

        let skipped = self.input.type_text(text).await?;
        if skipped > 0 {
            debug!("Skipped {} characters with no key mapping", skipped);
        }

        pause(self.timing.pre_submit).await;
        self.input.press(KEY_RETURN, Modifiers::NONE).await?;
        Ok(())
    }
}
