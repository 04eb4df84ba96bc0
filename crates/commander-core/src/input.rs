//! Paced synthetic keyboard and mouse sequences
//!
//! Posting events back to back lets the OS coalesce or drop them, so every
//! event pair is followed by a configured gap.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::{TimingConfig, pause};
use crate::keymap::{Modifiers, key_for_char};
use crate::platform::{InputInjector, KeyEvent, MouseEvent};
use crate::types::Point;

#[derive(Clone)]
pub struct InputSequencer {
    injector: Arc<dyn InputInjector>,
    timing: TimingConfig,
}

impl InputSequencer {
    pub fn new(injector: Arc<dyn InputInjector>, timing: TimingConfig) -> Self {
        Self { injector, timing }
    }

    /// Key down then key up with the same modifiers
    pub async fn press(&self, code: u16, modifiers: Modifiers) -> Result<()> {
        self.injector.post_key(KeyEvent {
            code,
            down: true,
            modifiers,
        })?;
        pause(self.timing.key_event_gap).await;
        self.injector.post_key(KeyEvent {
            code,
            down: false,
            modifiers,
        })?;
        pause(self.timing.key_event_gap).await;
        Ok(())
    }

    /// Left button down then up at a screen point
    pub async fn click(&self, at: Point) -> Result<()> {
        self.injector.post_mouse(MouseEvent { at, down: true })?;
        pause(self.timing.mouse_event_gap).await;
        self.injector.post_mouse(MouseEvent { at, down: false })?;
        pause(self.timing.mouse_event_gap).await;
        Ok(())
    }

    /// One key press per mapped character. Unmapped characters are skipped;
    /// returns how many were skipped.
    pub async fn type_text(&self, text: &str) -> Result<usize> {
        let mut skipped = 0;
        for c in text.chars() {
            let Some(stroke) = key_for_char(c) else {
                debug!("No key for {:?}, skipping", c);
                skipped += 1;
                continue;
            };
            let modifiers = if stroke.shift {
                Modifiers::SHIFT
            } else {
                Modifiers::NONE
            };
            self.press(stroke.code, modifiers).await?;
            pause(self.timing.char_gap).await;
        }
        Ok(skipped)
    }
}
