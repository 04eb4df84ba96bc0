//! Ranked delivery strategies
//!
//! Each strategy is a self-contained way of getting text into the focused
//! composer and submitting it. The orchestrator tries them in rank order and
//! stops at the first success. A failed strategy may still have left
//! keystrokes behind in the target; that is not rolled back.

mod scripted;
mod synthetic;

pub use scripted::ScriptedStrategy;
pub use synthetic::SyntheticStrategy;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::ProcessHandle;

#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Short stable name used in logs and outcome reports
    fn name(&self) -> &str;

    /// Type `text` into the target's composer and submit it.
    /// `text` has already been checked to be non-empty.
    async fn deliver(&self, text: &str, target: &ProcessHandle) -> Result<()>;
}
