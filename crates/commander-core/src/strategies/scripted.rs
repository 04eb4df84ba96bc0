use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::DeliveryStrategy;
use crate::config::{ChoreographyConfig, TimingConfig};
use crate::platform::ScriptRunner;
use crate::script::{ScriptAddressing, ScriptBuilder};
use crate::types::ProcessHandle;

/// Runs the whole choreography plus clear, type and submit as one script.
/// Success means the scripting engine reported no error.
pub struct ScriptedStrategy {
    scripts: Arc<dyn ScriptRunner>,
    addressing: ScriptAddressing,
    choreography: ChoreographyConfig,
    timing: TimingConfig,
}

impl ScriptedStrategy {
    pub fn new(
        scripts: Arc<dyn ScriptRunner>,
        addressing: ScriptAddressing,
        choreography: ChoreographyConfig,
        timing: TimingConfig,
    ) -> Self {
        Self {
            scripts,
            addressing,
            choreography,
            timing,
        }
    }

    /// Activates the target by name before driving it
    pub fn direct(
        scripts: Arc<dyn ScriptRunner>,
        choreography: ChoreographyConfig,
        timing: TimingConfig,
    ) -> Self {
        Self::new(scripts, ScriptAddressing::Direct, choreography, timing)
    }

    /// Drives the target only through System Events
    pub fn system_events(
        scripts: Arc<dyn ScriptRunner>,
        choreography: ChoreographyConfig,
        timing: TimingConfig,
    ) -> Self {
        Self::new(scripts, ScriptAddressing::SystemEvents, choreography, timing)
    }
}

#[async_trait]
impl DeliveryStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        match self.addressing {
            ScriptAddressing::Direct => "direct-script",
            ScriptAddressing::SystemEvents => "system-events-script",
        }
    }

    async fn deliver(&self, text: &str, target: &ProcessHandle) -> Result<()> {
        let script = ScriptBuilder::new(&target.name, &self.choreography, &self.timing)
            .deliver(text, self.addressing);
        debug!("Running {} ({} bytes)", self.name(), script.len());

        match self.scripts.run(&script).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(code = ?e.code(), "{} failed: {}", self.name(), e);
                Err(e.into())
            }
        }
    }
}
