//! In-memory fakes of the platform capabilities, shared by the unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::ScriptError;
use crate::keymap::{KEY_DELETE, KEY_RETURN, KEY_SHIFT};
use crate::platform::{
    Guidance, InputInjector, KeyEvent, MouseEvent, PermissionProvider, ProcessDirectory,
    ScriptRunner,
};
use crate::types::{ProcessHandle, ScreenRegion};

/// Ordered log of side effects across all fakes
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub fn cursor_app() -> ProcessHandle {
    ProcessHandle {
        pid: 512,
        name: "Cursor".to_string(),
        bundle_id: Some("io.cursor.Cursor".to_string()),
    }
}

pub fn terminal_app() -> ProcessHandle {
    ProcessHandle {
        pid: 77,
        name: "Terminal".to_string(),
        bundle_id: Some("com.apple.Terminal".to_string()),
    }
}

// ── Permissions ────────────────────────────────────────────────────────────

pub struct FakePermissions {
    pub trusted: AtomicBool,
    pub queries: AtomicUsize,
    pub prompted: AtomicUsize,
    pub opened: Mutex<Vec<String>>,
    pub guidance: Mutex<Vec<Guidance>>,
    journal: Journal,
}

impl FakePermissions {
    pub fn new(trusted: bool, journal: Journal) -> Self {
        Self {
            trusted: AtomicBool::new(trusted),
            queries: AtomicUsize::new(0),
            prompted: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            guidance: Mutex::new(Vec::new()),
            journal,
        }
    }
}

#[async_trait]
impl PermissionProvider for FakePermissions {
    async fn input_synthesis_trusted(&self, prompt: bool) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if prompt {
            self.prompted.fetch_add(1, Ordering::SeqCst);
        }
        self.journal.push("trust-query");
        self.trusted.load(Ordering::SeqCst)
    }

    async fn open_settings(&self, url: &str) -> Result<()> {
        self.journal.push(format!("open-settings:{}", url));
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn show_guidance(&self, guidance: &Guidance) -> Result<()> {
        self.journal.push(format!("guidance:{}", guidance.title));
        self.guidance.lock().unwrap().push(guidance.clone());
        Ok(())
    }
}

// ── Processes ──────────────────────────────────────────────────────────────

pub struct FakeDirectory {
    pub apps: Mutex<Vec<ProcessHandle>>,
    pub frontmost: Mutex<Option<ProcessHandle>>,
    pub windows: Mutex<HashMap<u32, Vec<ScreenRegion>>>,
    pub screen: Mutex<Option<ScreenRegion>>,
    pub index_results: Mutex<Vec<PathBuf>>,
    pub existing_paths: Mutex<HashSet<PathBuf>>,
    pub launched: Mutex<Vec<PathBuf>>,
    pub opened_urls: Mutex<Vec<String>>,
    pub fail_launch: AtomicBool,
    pub fail_open_url: AtomicBool,
    pub fail_activate: AtomicBool,
    /// Process listing reports an Apple event authorization error
    pub fail_listing: AtomicBool,
    /// Added to `apps` after a successful launch
    pub starts_on_launch: Mutex<Option<ProcessHandle>>,
    pub listings: AtomicUsize,
    journal: Journal,
}

impl FakeDirectory {
    pub fn new(journal: Journal) -> Self {
        Self {
            apps: Mutex::new(Vec::new()),
            frontmost: Mutex::new(None),
            windows: Mutex::new(HashMap::new()),
            screen: Mutex::new(Some(ScreenRegion::new(0.0, 0.0, 1440.0, 900.0))),
            index_results: Mutex::new(Vec::new()),
            existing_paths: Mutex::new(HashSet::new()),
            launched: Mutex::new(Vec::new()),
            opened_urls: Mutex::new(Vec::new()),
            fail_launch: AtomicBool::new(false),
            fail_open_url: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            starts_on_launch: Mutex::new(None),
            listings: AtomicUsize::new(0),
            journal,
        }
    }

    pub fn with_running(self, app: ProcessHandle) -> Self {
        self.apps.lock().unwrap().push(app);
        self
    }

    pub fn with_frontmost(self, app: ProcessHandle) -> Self {
        *self.frontmost.lock().unwrap() = Some(app);
        self
    }

    pub fn with_window(self, pid: u32, region: ScreenRegion) -> Self {
        self.windows.lock().unwrap().entry(pid).or_default().push(region);
        self
    }

    fn started(&self) {
        if let Some(app) = self.starts_on_launch.lock().unwrap().clone() {
            self.apps.lock().unwrap().push(app);
        }
    }
}

#[async_trait]
impl ProcessDirectory for FakeDirectory {
    async fn running_applications(&self) -> Result<Vec<ProcessHandle>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("Not authorized to send Apple events to System Events. (-1743)");
        }
        Ok(self.apps.lock().unwrap().clone())
    }

    async fn frontmost_application(&self) -> Result<Option<ProcessHandle>> {
        self.journal.push("capture-frontmost");
        Ok(self.frontmost.lock().unwrap().clone())
    }

    async fn activate(&self, app: &ProcessHandle) -> Result<()> {
        self.journal.push(format!("activate:{}", app.name));
        if self.fail_activate.load(Ordering::SeqCst) {
            anyhow::bail!("activation refused");
        }
        *self.frontmost.lock().unwrap() = Some(app.clone());
        Ok(())
    }

    async fn window_regions(&self, pid: u32) -> Result<Vec<ScreenRegion>> {
        Ok(self
            .windows
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .unwrap_or_default())
    }

    async fn main_screen_region(&self) -> Result<ScreenRegion> {
        self.screen
            .lock()
            .unwrap()
            .ok_or_else(|| anyhow::anyhow!("no screen"))
    }

    async fn content_index_search(&self, query: &str) -> Result<Vec<PathBuf>> {
        self.journal.push(format!("index:{}", query));
        Ok(self.index_results.lock().unwrap().clone())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.existing_paths.lock().unwrap().contains(path)
    }

    async fn launch_path(&self, path: &Path) -> Result<()> {
        self.journal.push(format!("launch:{}", path.display()));
        if self.fail_launch.load(Ordering::SeqCst) {
            anyhow::bail!("launch failed");
        }
        self.launched.lock().unwrap().push(path.to_path_buf());
        self.started();
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        self.journal.push(format!("open-url:{}", url));
        if self.fail_open_url.load(Ordering::SeqCst) {
            anyhow::bail!("no handler for {}", url);
        }
        self.opened_urls.lock().unwrap().push(url.to_string());
        self.started();
        Ok(())
    }
}

// ── Scripting ──────────────────────────────────────────────────────────────

pub struct FakeScripts {
    /// Scripted responses, consumed in order; when empty every run succeeds
    pub responses: Mutex<VecDeque<Result<String, ScriptError>>>,
    pub runs: Mutex<Vec<String>>,
    journal: Journal,
}

impl FakeScripts {
    pub fn new(journal: Journal) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            runs: Mutex::new(Vec::new()),
            journal,
        }
    }

    pub fn fail_next(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ScriptError::Execution {
                code: Some(-1743),
                message: message.to_string(),
            }));
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl ScriptRunner for FakeScripts {
    async fn run(&self, script: &str) -> Result<String, ScriptError> {
        self.journal.push("script");
        self.runs.lock().unwrap().push(script.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

// ── Synthetic input ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Injected {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

pub struct RecordingInjector {
    pub events: Mutex<Vec<Injected>>,
    pub fail: AtomicBool,
    journal: Journal,
}

impl RecordingInjector {
    pub fn new(journal: Journal) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            journal,
        }
    }

    pub fn events(&self) -> Vec<Injected> {
        self.events.lock().unwrap().clone()
    }

    pub fn mouse_downs(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Injected::Mouse(m) if m.down))
            .count()
    }

    pub fn key_downs(&self, code: u16) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Injected::Key(k) if k.down && k.code == code))
            .count()
    }

    /// Key codes of every key-down that is not a modifier, Delete or Return
    pub fn typed_codes(&self) -> Vec<(u16, bool)> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Injected::Key(k)
                    if k.down
                        && !k.modifiers.command
                        && k.code != KEY_SHIFT
                        && k.code != KEY_DELETE
                        && k.code != KEY_RETURN =>
                {
                    Some((k.code, k.modifiers.shift))
                }
                _ => None,
            })
            .collect()
    }
}

impl InputInjector for RecordingInjector {
    fn post_key(&self, event: KeyEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("event source unavailable");
        }
        if event.down {
            self.journal.push(format!("key:{}", event.code));
        }
        self.events.lock().unwrap().push(Injected::Key(event));
        Ok(())
    }

    fn post_mouse(&self, event: MouseEvent) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("event source unavailable");
        }
        if event.down {
            self.journal.push("click");
        }
        self.events.lock().unwrap().push(Injected::Mouse(event));
        Ok(())
    }
}
