//! Delivery orchestrator
//!
//! Drives one command through the pipeline:
//!
//! ```text
//! Idle -> PreconditionCheck -> Locating -> OpeningPanel
//!      -> Strategy 1 -> Strategy 2 -> Strategy 3 -> Restoring -> Done
//! ```
//!
//! Every request yields exactly one [`DeliveryOutcome`]. Failures are folded
//! into the outcome and the session status; nothing escapes as an error.
//! Launching the target is a separate action and never happens mid-delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{DeliveryConfig, TimingConfig, pause};
use crate::error::DeliveryError;
use crate::history::HistorySink;
use crate::input::InputSequencer;
use crate::locator::{LaunchAttempt, TargetLocator};
use crate::panel::PanelOpener;
use crate::permission::PermissionGate;
use crate::platform::{Capabilities, ProcessDirectory};
use crate::poller::StatusPoller;
use crate::session::SessionState;
use crate::strategies::{DeliveryStrategy, ScriptedStrategy, SyntheticStrategy};
use crate::types::{
    AuthorizationState, DeliveryOutcome, DeliveryRequest, ProcessHandle, StrategyReport,
};
use crate::window::WindowLocator;

#[derive(Clone, Copy)]
enum Phase {
    PreconditionCheck,
    Locating,
    OpeningPanel,
    /// 1-based strategy rank
    Strategy(usize),
    Restoring,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreconditionCheck => write!(f, "precondition-check"),
            Self::Locating => write!(f, "locating"),
            Self::OpeningPanel => write!(f, "opening-panel"),
            Self::Strategy(rank) => write!(f, "strategy-{}", rank),
            Self::Restoring => write!(f, "restoring"),
        }
    }
}

pub struct DeliveryOrchestrator {
    session: Arc<SessionState>,
    gate: PermissionGate,
    locator: TargetLocator,
    directory: Arc<dyn ProcessDirectory>,
    panel: PanelOpener,
    strategies: Vec<Arc<dyn DeliveryStrategy>>,
    history: Arc<dyn HistorySink>,
    config: DeliveryConfig,
    /// Held for the whole attempt; a second request while held is rejected
    in_flight: Mutex<()>,
}

impl DeliveryOrchestrator {
    /// Wire the pipeline with the three standard strategies in rank order:
    /// synthetic events, direct scripting, System Events scripting
    pub fn new(
        config: DeliveryConfig,
        caps: Capabilities,
        session: Arc<SessionState>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        let target = config.target.clone();
        let timing = config.timing.clone();
        let choreography = config.choreography.clone();

        let gate = PermissionGate::new(
            caps.permissions.clone(),
            caps.scripts.clone(),
            session.clone(),
            target.display_name.clone(),
            timing.permission_recheck,
        );
        let locator = TargetLocator::new(
            caps.directory.clone(),
            session.clone(),
            target,
            timing.launch_recheck,
        );
        let input = InputSequencer::new(caps.injector.clone(), timing.clone());
        let windows = WindowLocator::new(caps.directory.clone(), choreography.composer_offset);
        let panel = PanelOpener::new(
            caps.scripts.clone(),
            input.clone(),
            windows.clone(),
            session.clone(),
            choreography.clone(),
            timing.clone(),
        );

        let strategies: Vec<Arc<dyn DeliveryStrategy>> = vec![
            Arc::new(SyntheticStrategy::new(input, windows, timing.clone())),
            Arc::new(ScriptedStrategy::direct(
                caps.scripts.clone(),
                choreography.clone(),
                timing.clone(),
            )),
            Arc::new(ScriptedStrategy::system_events(
                caps.scripts.clone(),
                choreography,
                timing,
            )),
        ];

        Self {
            session,
            gate,
            locator,
            directory: caps.directory,
            panel,
            strategies,
            history,
            config,
            in_flight: Mutex::new(()),
        }
    }

    /// Replace the ranked strategy list
    pub fn with_strategies(mut self, strategies: Vec<Arc<dyn DeliveryStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn permission_gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn locator(&self) -> &TargetLocator {
        &self.locator
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    /// A poller bound to this pipeline's session; it stops when the session
    /// shuts down
    pub fn status_poller(&self) -> StatusPoller {
        StatusPoller::new(
            self.locator.clone(),
            self.gate.clone(),
            self.config.polling.clone(),
            self.session.shutdown_token(),
        )
    }

    pub async fn refresh_running_state(&self) -> bool {
        self.locator.is_target_running().await
    }

    pub async fn refresh_permissions(&self) -> AuthorizationState {
        self.gate.refresh().await
    }

    pub async fn launch_target(&self) -> Result<LaunchAttempt, DeliveryError> {
        self.locator.launch_target().await
    }

    /// Deliver one command. Empty text and overlapping requests are rejected
    /// before any side effect.
    pub async fn deliver(&self, request: &DeliveryRequest) -> DeliveryOutcome {
        let text = request.text.as_str();
        if text.is_empty() {
            debug!("Rejected empty command");
            return DeliveryOutcome::failure(DeliveryError::EmptyInput, Vec::new());
        }
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("A delivery is already in progress, rejecting request");
            return DeliveryOutcome::failure(DeliveryError::Busy, Vec::new());
        };

        let attempt = Uuid::new_v4();
        let span = info_span!(
            "delivery",
            %attempt,
            target = %self.locator.target().display_name
        );
        self.run_attempt(text).instrument(span).await
    }

    async fn run_attempt(&self, text: &str) -> DeliveryOutcome {
        let timing = &self.config.timing;
        self.session.set_pending_text(text);
        info!("Delivering command ({} chars)", text.chars().count());

        enter(Phase::PreconditionCheck);
        if !self.session.authorization().input_synthesis_allowed {
            self.gate.check_input_synthesis_permission().await;
            let err = DeliveryError::PermissionDenied {
                capability: "input synthesis".to_string(),
            };
            return self.finish(DeliveryOutcome::failure(err, self.reports()));
        }

        enter(Phase::Locating);
        let target_name = || self.locator.target().display_name.clone();
        let target = match self.locator.refresh().await {
            Ok(Some(target)) => target,
            Ok(None) => {
                let err = DeliveryError::TargetNotRunning {
                    target: target_name(),
                };
                return self.finish(DeliveryOutcome::failure(err, self.reports()));
            }
            Err(_) => {
                let err = DeliveryError::TargetStateUnknown {
                    target: target_name(),
                };
                return self.finish(DeliveryOutcome::failure(err, self.reports()));
            }
        };

        let previous = match self.directory.frontmost_application().await {
            Ok(app) => app,
            Err(e) => {
                warn!("Could not capture the focused application: {:#}", e);
                None
            }
        };
        self.history.record(text);

        if let Err(e) = self.directory.activate(&target).await {
            warn!("Failed to activate {}: {:#}", target.name, e);
        }
        pause(timing.activate_settle).await;

        enter(Phase::OpeningPanel);
        self.panel.open_input_panel(&target).await;

        let reports = self.run_strategies(text, &target, timing).await;
        let succeeded = reports.iter().any(|r| r.succeeded);

        enter(Phase::Restoring);
        self.restore_focus(previous, timing).await;

        let outcome = if succeeded {
            DeliveryOutcome::success(text, reports)
        } else {
            DeliveryOutcome::failure(DeliveryError::AllStrategiesFailed, reports)
        };
        self.finish(outcome)
    }

    /// Try each strategy in rank order until one succeeds
    async fn run_strategies(
        &self,
        text: &str,
        target: &ProcessHandle,
        timing: &TimingConfig,
    ) -> Vec<StrategyReport> {
        let limit = Duration::from_millis(timing.strategy_timeout);
        let mut reports = self.reports();

        for (rank, strategy) in self.strategies.iter().enumerate() {
            enter(Phase::Strategy(rank + 1));
            let report = &mut reports[rank];
            report.attempted = true;

            match tokio::time::timeout(limit, strategy.deliver(text, target)).await {
                Ok(Ok(())) => {
                    info!("Strategy {} succeeded", strategy.name());
                    report.succeeded = true;
                    break;
                }
                Ok(Err(e)) => warn!("Strategy {} failed: {:#}", strategy.name(), e),
                Err(_) => warn!(
                    "Strategy {} timed out after {}ms",
                    strategy.name(),
                    timing.strategy_timeout
                ),
            }
        }
        reports
    }

    async fn restore_focus(&self, previous: Option<ProcessHandle>, timing: &TimingConfig) {
        let Some(previous) = previous else {
            debug!("No previously focused application to restore");
            return;
        };
        pause(timing.restore_delay).await;
        match self.directory.activate(&previous).await {
            Ok(()) => debug!("Restored focus to {}", previous.name),
            Err(e) => warn!("Failed to restore focus to {}: {:#}", previous.name, e),
        }
    }

    /// Every strategy, none attempted yet
    fn reports(&self) -> Vec<StrategyReport> {
        self.strategies
            .iter()
            .map(|s| StrategyReport {
                name: s.name().to_string(),
                attempted: false,
                succeeded: false,
            })
            .collect()
    }

    fn finish(&self, outcome: DeliveryOutcome) -> DeliveryOutcome {
        if outcome.succeeded {
            self.session.clear_pending_text();
            info!("{}", outcome.status_message);
        } else {
            warn!("{}", outcome.status_message);
        }
        self.session.set_status(outcome.status_message.clone());
        outcome
    }
}

fn enter(phase: Phase) {
    debug!(%phase, "Entering phase");
}
