//! Target locator
//!
//! Finds the target among running processes and launches it when asked.
//! Only this module publishes the session's target-running flag.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{TargetIdentity, pause};
use crate::error::DeliveryError;
use crate::platform::ProcessDirectory;
use crate::session::{STATUS_READY, SessionState};
use crate::types::ProcessHandle;

/// How a launch request reached the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMethod {
    ContentIndex(PathBuf),
    InstallPath(PathBuf),
    UrlScheme(String),
}

impl std::fmt::Display for LaunchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContentIndex(path) => write!(f, "content index ({})", path.display()),
            Self::InstallPath(path) => write!(f, "install path ({})", path.display()),
            Self::UrlScheme(url) => write!(f, "URL scheme ({})", url),
        }
    }
}

/// A launch that was handed to the OS. `recheck` resolves to the running
/// state observed after the launch delay, or false if the session ended first.
pub struct LaunchAttempt {
    pub method: LaunchMethod,
    pub recheck: JoinHandle<bool>,
}

#[derive(Clone)]
pub struct TargetLocator {
    directory: Arc<dyn ProcessDirectory>,
    session: Arc<SessionState>,
    target: TargetIdentity,
    recheck_delay_ms: u64,
}

impl TargetLocator {
    pub fn new(
        directory: Arc<dyn ProcessDirectory>,
        session: Arc<SessionState>,
        target: TargetIdentity,
        recheck_delay_ms: u64,
    ) -> Self {
        Self {
            directory,
            session,
            target,
            recheck_delay_ms,
        }
    }

    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    fn not_running_status(&self) -> String {
        format!("{} is not running", self.target.display_name)
    }

    /// Resolve the target's process without publishing anything. An error
    /// means the process list could not be read, not that the target is absent.
    pub async fn find_running(&self) -> Result<Option<ProcessHandle>> {
        let apps = self.directory.running_applications().await?;
        Ok(apps
            .into_iter()
            .find(|app| self.target.matches(&app.name, app.bundle_id.as_deref())))
    }

    /// Resolve the target's process and publish whether it is running. When
    /// the process list cannot be read, the published state is left as is.
    pub async fn refresh(&self) -> Result<Option<ProcessHandle>> {
        let found = match self.find_running().await {
            Ok(found) => found,
            Err(e) => {
                warn!("Failed to list running applications: {:#}", e);
                return Err(e);
            }
        };
        let running = found.is_some();

        if self.session.set_target_running(running) {
            info!("{} running: {}", self.target.display_name, running);
        }

        let not_running = self.not_running_status();
        if running {
            self.session.replace_status(&[not_running.as_str()], STATUS_READY);
        } else {
            self.session.replace_status(&["", STATUS_READY], &not_running);
        }
        Ok(found)
    }

    /// Refresh and report the running state; falls back to the last
    /// published state when the process list cannot be read
    pub async fn is_target_running(&self) -> bool {
        match self.refresh().await {
            Ok(found) => found.is_some(),
            Err(_) => self.session.target_running(),
        }
    }

    /// Try the content index, then the install paths, then the URL scheme.
    /// Returns as soon as one method is accepted by the OS; the running state
    /// is re-checked in the background after the launch delay.
    pub async fn launch_target(&self) -> Result<LaunchAttempt, DeliveryError> {
        let name = &self.target.display_name;
        info!("Launching {}", name);

        let method = match self.launch_first_available().await {
            Some(method) => method,
            None => {
                let err = DeliveryError::TargetNotFound {
                    target: name.clone(),
                };
                warn!("{}", err);
                self.session.set_status(err.status_message());
                return Err(err);
            }
        };
        info!("Launch requested via {}", method);

        let locator = self.clone();
        let recheck = tokio::spawn(async move {
            let shutdown = locator.session.shutdown_token();
            tokio::select! {
                _ = shutdown.cancelled() => false,
                _ = pause(locator.recheck_delay_ms) => locator.is_target_running().await,
            }
        });

        Ok(LaunchAttempt { method, recheck })
    }

    async fn launch_first_available(&self) -> Option<LaunchMethod> {
        let query = self.target.content_index_query();
        match self.directory.content_index_search(&query).await {
            Ok(paths) => {
                if let Some(path) = paths.into_iter().next() {
                    match self.directory.launch_path(&path).await {
                        Ok(()) => return Some(LaunchMethod::ContentIndex(path)),
                        Err(e) => debug!("Launch of indexed path {} failed: {:#}", path.display(), e),
                    }
                } else {
                    debug!("Content index has no match for {}", query);
                }
            }
            Err(e) => debug!("Content index search failed: {:#}", e),
        }

        for path in self.target.expanded_install_paths() {
            if !self.directory.path_exists(&path) {
                continue;
            }
            match self.directory.launch_path(&path).await {
                Ok(()) => return Some(LaunchMethod::InstallPath(path)),
                Err(e) => debug!("Launch of {} failed: {:#}", path.display(), e),
            }
        }

        let url = &self.target.url_scheme;
        match self.directory.open_url(url).await {
            Ok(()) => Some(LaunchMethod::UrlScheme(url.clone())),
            Err(e) => {
                debug!("Opening {} failed: {:#}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDirectory, Journal, cursor_app, terminal_app};
    use std::sync::atomic::Ordering;

    fn locator(directory: FakeDirectory) -> (TargetLocator, Arc<FakeDirectory>, Arc<SessionState>) {
        let directory = Arc::new(directory);
        let session = Arc::new(SessionState::new());
        let locator = TargetLocator::new(
            directory.clone(),
            session.clone(),
            TargetIdentity::default(),
            2000,
        );
        (locator, directory, session)
    }

    #[tokio::test]
    async fn test_running_by_name_or_bundle_id() {
        let (locator, _, session) =
            locator(FakeDirectory::new(Journal::default()).with_running(cursor_app()));
        assert!(locator.is_target_running().await);
        assert!(session.target_running());

        // Localized name, same bundle id
        let mut localized = cursor_app();
        localized.name = "Kursor".to_string();
        let (locator, _, _) = locator_with(localized);
        assert!(locator.is_target_running().await);

        // Matching name without a bundle id
        let mut anonymous = cursor_app();
        anonymous.bundle_id = None;
        let (locator, _, _) = locator_with(anonymous);
        assert!(locator.is_target_running().await);
    }

    fn locator_with(app: ProcessHandle) -> (TargetLocator, Arc<FakeDirectory>, Arc<SessionState>) {
        locator(FakeDirectory::new(Journal::default()).with_running(app))
    }

    #[tokio::test]
    async fn test_not_running_status() {
        let (locator, directory, session) =
            locator(FakeDirectory::new(Journal::default()).with_running(terminal_app()));
        assert!(!locator.is_target_running().await);
        assert!(!session.target_running());
        assert_eq!(session.status(), "Cursor is not running");

        directory.apps.lock().unwrap().push(cursor_app());
        assert!(locator.is_target_running().await);
        assert_eq!(session.status(), status);
        assert_ne!(session.status(), "Cursor is not running");
    }

    #[tokio::test]
    async fn test_find_running_does_not_publish() {
        let (locator, _, session) = locator_with(cursor_app());
        assert_eq!(locator.find_running().await.unwrap(), Some(cursor_app()));
        assert!(!session.target_running());
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_published_state() {
        let (locator, directory, session) = locator_with(cursor_app());
        assert!(locator.is_target_running().await);
        let status = session.status();

        directory.fail_listing.store(true, Ordering::SeqCst);
        assert!(locator.find_running().await.is_err());
        assert!(locator.refresh().await.is_err());
        // Still the last observed state, and no "not running" claim
        assert!(session.target_running());
        assert!(locator.is_target_running().await);
        assert_eq!(session.status(), status);
        assert_ne!(session.status(), "Cursor is not running");
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_prefers_content_index() {
        let journal = Journal::default();
        let directory = FakeDirectory::new(journal.clone());
        *directory.index_results.lock().unwrap() = vec![PathBuf::from("/Volumes/Apps/Cursor.app")];
        *directory.starts_on_launch.lock().unwrap() = Some(cursor_app());
        let (locator, directory, session) = locator(directory);

        let attempt = locator.launch_target().await.unwrap();
        assert_eq!(
            attempt.method,
            LaunchMethod::ContentIndex(PathBuf::from("/Volumes/Apps/Cursor.app"))
        );
        assert!(attempt.recheck.await.unwrap());
        assert!(session.target_running());
        assert!(directory.opened_urls.lock().unwrap().is_empty());
        assert!(journal.entries()[0].contains("kMDItemCFBundleIdentifier == 'io.cursor.Cursor'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_falls_back_to_install_path() {
        let directory = FakeDirectory::new(Journal::default());
        directory
            .existing_paths
            .lock()
            .unwrap()
            .insert(PathBuf::from("/Applications/Utilities/Cursor.app"));
        let (locator, directory, _) = locator(directory);

        let attempt = locator.launch_target().await.unwrap();
        assert_eq!(
            attempt.method,
            LaunchMethod::InstallPath(PathBuf::from("/Applications/Utilities/Cursor.app"))
        );
        assert_eq!(directory.launched.lock().unwrap().len(), 1);
        // Nothing started, so the re-check sees it still absent
        assert!(!attempt.recheck.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_falls_back_to_url_scheme() {
        let directory = FakeDirectory::new(Journal::default());
        *directory.index_results.lock().unwrap() = vec![PathBuf::from("/stale/Cursor.app")];
        directory.fail_launch.store(true, Ordering::SeqCst);
        let (locator, directory, _) = locator(directory);

        let attempt = locator.launch_target().await.unwrap();
        assert_eq!(attempt.method, LaunchMethod::UrlScheme("cursor://".to_string()));
        assert_eq!(
            directory.opened_urls.lock().unwrap().as_slice(),
            &["cursor://".to_string()]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_sets_terminal_status() {
        let directory = FakeDirectory::new(Journal::default());
        directory.fail_open_url.store(true, Ordering::SeqCst);
        let (locator, _, session) = locator(directory);

        let err = locator.launch_target().await.err().unwrap();
        assert_eq!(
            err,
            DeliveryError::TargetNotFound {
                target: "Cursor".to_string()
            }
        );
        assert_eq!(
            session.status(),
            "Error: Could not find or launch Cursor application"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recheck_stops_on_shutdown() {
        let directory = FakeDirectory::new(Journal::default());
        *directory.starts_on_launch.lock().unwrap() = Some(cursor_app());
        let (locator, directory, session) = locator(directory);

        let attempt = locator.launch_target().await.unwrap();
        session.shutdown();
        assert!(!attempt.recheck.await.unwrap());
        assert_eq!(directory.listings.load(Ordering::SeqCst), 0);
    }
}
