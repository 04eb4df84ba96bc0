//! Background status polling
//!
//! Periodically re-checks whether the target is running and whether UI
//! scripting is still authorized. Every wait is raced against cancellation,
//! so `stop()` takes effect at the next await point.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollingConfig;
use crate::locator::TargetLocator;
use crate::permission::PermissionGate;

pub struct StatusPoller {
    locator: TargetLocator,
    gate: PermissionGate,
    config: PollingConfig,
    /// Parent token; cancelling it stops the poller for good
    shutdown: CancellationToken,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl StatusPoller {
    pub fn new(
        locator: TargetLocator,
        gate: PermissionGate,
        config: PollingConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            locator,
            gate,
            config,
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// Start polling. Returns false if it was already running.
    pub fn start(&self) -> bool {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        if let Some((token, handle)) = task.as_ref()
            && !token.is_cancelled()
            && !handle.is_finished()
        {
            return false;
        }

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_cycle(
            self.locator.clone(),
            self.gate.clone(),
            self.config.clone(),
            token.clone(),
        ));
        *task = Some((token, handle));
        info!("Status poller started");
        true
    }

    /// Stop polling. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        match task.take() {
            Some((token, _handle)) => {
                token.cancel();
                info!("Status poller stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| {
                task.as_ref()
                    .is_some_and(|(token, handle)| !token.is_cancelled() && !handle.is_finished())
            })
            .unwrap_or(false)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock()
            && let Some((token, _)) = task.take()
        {
            token.cancel();
        }
    }
}

/// False if cancelled before the delay elapsed
async fn wait(token: &CancellationToken, secs: u64) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
    }
}

async fn run_cycle(
    locator: TargetLocator,
    gate: PermissionGate,
    config: PollingConfig,
    token: CancellationToken,
) {
    if !wait(&token, config.initial_delay).await {
        return;
    }
    loop {
        let running = locator.is_target_running().await;
        debug!("Poll: target running = {}", running);
        if !wait(&token, config.running_to_scripting).await {
            break;
        }

        let scripting = gate.check_ui_scripting_permission().await;
        debug!("Poll: UI scripting allowed = {}", scripting);
        if !wait(&token, config.cycle_pause).await {
            break;
        }
    }
    debug!("Status poller task ended");
}
