//! Platform abstraction layer
//!
//! The pipeline only talks to the OS through four narrow capabilities, so it
//! can run against fakes in tests. On macOS the implementations use
//! `osascript`, `mdfind`, `open`, `NSWorkspace`, Accessibility trust queries
//! and CoreGraphics.

#[cfg(target_os = "macos")]
pub mod macos;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ScriptError;
use crate::keymap::Modifiers;
use crate::types::{Point, ProcessHandle, ScreenRegion};

/// Deep link to the Accessibility list in Privacy & Security settings
pub const ACCESSIBILITY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

/// Instructions shown to the user alongside a settings deep link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guidance {
    pub title: String,
    pub body: String,
}

/// OS trust state and the settings surface that changes it
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Whether this process may synthesize input; `prompt` asks the OS to
    /// register the request with the user
    async fn input_synthesis_trusted(&self, prompt: bool) -> bool;
    async fn open_settings(&self, url: &str) -> Result<()>;
    async fn show_guidance(&self, guidance: &Guidance) -> Result<()>;
}

/// Process enumeration, focus, window geometry and launching
#[async_trait]
pub trait ProcessDirectory: Send + Sync {
    async fn running_applications(&self) -> Result<Vec<ProcessHandle>>;
    async fn frontmost_application(&self) -> Result<Option<ProcessHandle>>;
    async fn activate(&self, app: &ProcessHandle) -> Result<()>;
    /// Bounds of the on-screen windows owned by `pid`, front-most first
    async fn window_regions(&self, pid: u32) -> Result<Vec<ScreenRegion>>;
    async fn main_screen_region(&self) -> Result<ScreenRegion>;
    async fn content_index_search(&self, query: &str) -> Result<Vec<PathBuf>>;
    fn path_exists(&self, path: &Path) -> bool;
    async fn launch_path(&self, path: &Path) -> Result<()>;
    async fn open_url(&self, url: &str) -> Result<()>;
}

/// The OS scripting engine
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run a script body; any output is returned but the pipeline only cares
    /// whether an error was reported
    async fn run(&self, script: &str) -> std::result::Result<String, ScriptError>;
}

/// A single synthetic keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub down: bool,
    pub modifiers: Modifiers,
}

/// A single synthetic left-button event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub at: Point,
    pub down: bool,
}

/// The low-level input pipeline. Posting is fire-and-forget; an error only
/// means the event could not be built.
pub trait InputInjector: Send + Sync {
    fn post_key(&self, event: KeyEvent) -> Result<()>;
    fn post_mouse(&self, event: MouseEvent) -> Result<()>;
}

/// The four capabilities bundled for wiring up a pipeline
#[derive(Clone)]
pub struct Capabilities {
    pub permissions: Arc<dyn PermissionProvider>,
    pub directory: Arc<dyn ProcessDirectory>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub injector: Arc<dyn InputInjector>,
}

impl Capabilities {
    /// The host platform's implementations
    pub fn native(script_timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            permissions: Arc::from(create_permission_provider()?),
            directory: Arc::from(create_process_directory()?),
            scripts: Arc::from(create_script_runner(script_timeout_secs)?),
            injector: Arc::from(create_input_injector()?),
        })
    }
}

/// Create platform permission provider
pub fn create_permission_provider() -> Result<Box<dyn PermissionProvider>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacOsPermissions))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!("Permission provider not available on this platform"))
    }
}

/// Create platform process directory
pub fn create_process_directory() -> Result<Box<dyn ProcessDirectory>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacOsProcessDirectory))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!("Process directory not available on this platform"))
    }
}

/// Create platform script runner with the given per-script timeout
pub fn create_script_runner(timeout_secs: u64) -> Result<Box<dyn ScriptRunner>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::OsaScriptRunner::new(timeout_secs)))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = timeout_secs;
        Err(anyhow::anyhow!("Script runner not available on this platform"))
    }
}

/// Create platform input injector
pub fn create_input_injector() -> Result<Box<dyn InputInjector>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::CgEventInjector))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!("Input injector not available on this platform"))
    }
}
