//! macOS platform implementations using AppleScript, Spotlight, AppKit and
//! CoreGraphics

use std::ffi::{CStr, c_void};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use cocoa::base::{id, nil};
use cocoa::foundation::{NSAutoreleasePool, NSString, NSUInteger};
use core_foundation::base::{CFType, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::display::CGDisplay;
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGEventType, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};
use objc::runtime::{BOOL, NO};
use objc::{class, msg_send, sel, sel_impl};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{
    Guidance, InputInjector, KeyEvent, MouseEvent, PermissionProvider, ProcessDirectory,
    ScriptRunner,
};
use crate::error::ScriptError;
use crate::script::escape_applescript_string;
use crate::types::{ProcessHandle, ScreenRegion};

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrustedWithOptions(options: *const std::ffi::c_void) -> bool;
}

/// Split `osascript` stderr such as
/// `0:42: execution error: Not authorized to send Apple events to System Events. (-1743)`
/// into its numeric code and message
fn parse_osascript_error(stderr: &str) -> ScriptError {
    let line = stderr.trim();
    let body = match line.find("execution error: ") {
        Some(idx) => &line[idx + "execution error: ".len()..],
        None => line,
    };

    if let Some(open) = body.rfind(" (")
        && body.ends_with(')')
        && let Ok(code) = body[open + 2..body.len() - 1].parse::<i32>()
    {
        return ScriptError::Execution {
            code: Some(code),
            message: body[..open].trim().to_string(),
        };
    }

    ScriptError::Execution {
        code: None,
        message: body.to_string(),
    }
}

/// Run an AppleScript through `osascript` with a timeout
async fn run_osascript(script: &str, timeout_secs: u64) -> Result<String, ScriptError> {
    let output = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        Command::new("osascript").arg("-e").arg(script).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| ScriptError::TimedOut { secs: timeout_secs })??;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let err = parse_osascript_error(&String::from_utf8_lossy(&output.stderr));
        debug!("osascript failed: {}", err);
        Err(err)
    }
}

/// Collect a child's output, killing it if `limit` passes first
async fn output_within(command: &mut Command, limit: Duration) -> Result<Output> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    tokio::time::timeout(limit, command.kill_on_drop(true).output())
        .await
        .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", program, limit))?
        .with_context(|| format!("Failed to run {}", program))
}

/// One entry of the window server's on-screen window list
#[derive(Debug, Clone, PartialEq)]
struct WindowEntry {
    owner_pid: u32,
    layer: i64,
    bounds: ScreenRegion,
}

fn window_value(info: &CFDictionary, key: &'static str) -> Option<CFType> {
    let key = CFString::from_static_string(key);
    let value = info.find(key.as_concrete_TypeRef().cast::<c_void>())?;
    Some(unsafe { CFType::wrap_under_get_rule(*value) })
}

fn window_number(info: &CFDictionary, key: &'static str) -> Option<f64> {
    window_value(info, key)?.downcast::<CFNumber>()?.to_f64()
}

/// Read owner, layer and bounds from a `CGWindowListCopyWindowInfo` entry
fn window_entry(info: &CFDictionary) -> Option<WindowEntry> {
    let owner_pid = window_number(info, "kCGWindowOwnerPID")?;
    let layer = window_number(info, "kCGWindowLayer").unwrap_or(0.0);
    let bounds = window_value(info, "kCGWindowBounds")?.downcast::<CFDictionary>()?;
    Some(WindowEntry {
        owner_pid: owner_pid as u32,
        layer: layer as i64,
        bounds: ScreenRegion::new(
            window_number(&bounds, "X")?,
            window_number(&bounds, "Y")?,
            window_number(&bounds, "Width")?,
            window_number(&bounds, "Height")?,
        ),
    })
}

/// Normal-layer, non-empty windows owned by `pid`, keeping the window
/// server's front-to-back order
fn owned_regions(entries: &[WindowEntry], pid: u32) -> Vec<ScreenRegion> {
    entries
        .iter()
        .filter(|w| w.owner_pid == pid && w.layer == 0 && !w.bounds.is_empty())
        .map(|w| w.bounds)
        .collect()
}

fn on_screen_windows() -> Vec<WindowEntry> {
    let Some(list) = copy_window_info(
        kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements,
        kCGNullWindowID,
    ) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|item| {
            let info = unsafe { CFType::wrap_under_get_rule(*item) };
            window_entry(&info.downcast::<CFDictionary>()?)
        })
        .collect()
}

/// Copy an `NSString` into an owned string
unsafe fn ns_string(value: id) -> Option<String> {
    if value == nil {
        return None;
    }
    unsafe {
        let ptr = NSString::UTF8String(value);
        if ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// Read pid, localized name and bundle id from an `NSRunningApplication`
unsafe fn process_handle(app: id) -> Option<ProcessHandle> {
    if app == nil {
        return None;
    }
    unsafe {
        let pid: i32 = msg_send![app, processIdentifier];
        if pid <= 0 {
            return None;
        }
        let name = ns_string(msg_send![app, localizedName]).unwrap_or_default();
        let bundle_id = ns_string(msg_send![app, bundleIdentifier]);
        Some(ProcessHandle {
            pid: pid as u32,
            name,
            bundle_id,
        })
    }
}

/// Run `f` against the shared `NSWorkspace` on a blocking thread, inside an
/// autorelease pool
async fn with_workspace<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(id) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || unsafe {
        let pool = NSAutoreleasePool::new(nil);
        let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
        let result = f(workspace);
        pool.drain();
        result
    })
    .await
    .context("NSWorkspace task failed")
}

// ── Scripting ──────────────────────────────────────────────────────────────

/// Runs scripts through `osascript`
pub struct OsaScriptRunner {
    timeout_secs: u64,
}

impl OsaScriptRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl ScriptRunner for OsaScriptRunner {
    async fn run(&self, script: &str) -> Result<String, ScriptError> {
        run_osascript(script, self.timeout_secs).await
    }
}

// ── Permissions ────────────────────────────────────────────────────────────

pub struct MacOsPermissions;

#[async_trait]
impl PermissionProvider for MacOsPermissions {
    async fn input_synthesis_trusted(&self, prompt: bool) -> bool {
        let result = tokio::task::spawn_blocking(move || {
            let key = CFString::new("AXTrustedCheckOptionPrompt");
            let value = if prompt {
                CFBoolean::true_value()
            } else {
                CFBoolean::false_value()
            };
            let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);
            unsafe {
                AXIsProcessTrustedWithOptions(
                    options.as_concrete_TypeRef() as *const std::ffi::c_void
                )
            }
        })
        .await;

        match result {
            Ok(trusted) => trusted,
            Err(e) => {
                warn!("Accessibility trust query failed: {}", e);
                false
            }
        }
    }

    async fn open_settings(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            open::that(&url).with_context(|| format!("Failed to open {}", url))
        })
        .await?
    }

    async fn show_guidance(&self, guidance: &Guidance) -> Result<()> {
        let script = format!(
            r#"display dialog "{}" with title "{}" buttons {{"OK"}} default button "OK" with icon note"#,
            escape_applescript_string(&guidance.body),
            escape_applescript_string(&guidance.title),
        );
        // The dialog waits for the user, so allow it plenty of time
        run_osascript(&script, 600)
            .await
            .map(|_| ())
            .context("Failed to show guidance dialog")
    }
}

// ── Processes & windows ────────────────────────────────────────────────────

/// `NSApplicationActivateIgnoringOtherApps`
const ACTIVATE_IGNORING_OTHER_APPS: NSUInteger = 1 << 1;

/// Processes come from `NSWorkspace` and windows from the window server, so
/// none of this needs Apple event consent
#[derive(Default)]
pub struct MacOsProcessDirectory;

#[async_trait]
impl ProcessDirectory for MacOsProcessDirectory {
    async fn running_applications(&self) -> Result<Vec<ProcessHandle>> {
        with_workspace(|workspace| unsafe {
            let apps: id = msg_send![workspace, runningApplications];
            let count: NSUInteger = msg_send![apps, count];
            (0..count)
                .filter_map(|i| {
                    let app: id = msg_send![apps, objectAtIndex: i];
                    process_handle(app)
                })
                .collect()
        })
        .await
    }

    async fn frontmost_application(&self) -> Result<Option<ProcessHandle>> {
        with_workspace(|workspace| unsafe {
            let app: id = msg_send![workspace, frontmostApplication];
            process_handle(app)
        })
        .await
    }

    async fn activate(&self, app: &ProcessHandle) -> Result<()> {
        debug!("Activating {} (pid {})", app.name, app.pid);
        let pid = app.pid as i32;
        let name = app.name.clone();
        with_workspace(move |_| unsafe {
            let running: id = msg_send![
                class!(NSRunningApplication),
                runningApplicationWithProcessIdentifier: pid
            ];
            if running == nil {
                anyhow::bail!("{} (pid {}) is no longer running", name, pid);
            }
            let activated: BOOL =
                msg_send![running, activateWithOptions: ACTIVATE_IGNORING_OTHER_APPS];
            if activated == NO {
                anyhow::bail!("Failed to activate {}", name);
            }
            Ok(())
        })
        .await?
    }

    async fn window_regions(&self, pid: u32) -> Result<Vec<ScreenRegion>> {
        let windows = tokio::task::spawn_blocking(on_screen_windows)
            .await
            .context("Window list task failed")?;
        Ok(owned_regions(&windows, pid))
    }

    async fn main_screen_region(&self) -> Result<ScreenRegion> {
        let bounds = CGDisplay::main().bounds();
        let region = ScreenRegion::new(
            bounds.origin.x,
            bounds.origin.y,
            bounds.size.width,
            bounds.size.height,
        );
        if region.is_empty() {
            anyhow::bail!("Main display reports empty bounds");
        }
        Ok(region)
    }

    async fn content_index_search(&self, query: &str) -> Result<Vec<PathBuf>> {
        debug!("Spotlight search: {}", query);
        let output = output_within(Command::new("mdfind").arg(query), Duration::from_secs(30))
            .await
            .context("Spotlight search failed")?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect())
        } else {
            Err(anyhow::anyhow!(
                "Spotlight search failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn launch_path(&self, path: &Path) -> Result<()> {
        let output = output_within(Command::new("open").arg(path), Duration::from_secs(10))
            .await
            .with_context(|| format!("Failed to launch {}", path.display()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Failed to open {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            open::that(&url).with_context(|| format!("Failed to open {}", url))
        })
        .await?
    }
}

// ── Synthetic input ────────────────────────────────────────────────────────

/// Posts CoreGraphics events into the HID event tap
pub struct CgEventInjector;

fn event_source() -> Result<CGEventSource> {
    CGEventSource::new(CGEventSourceStateID::CombinedSessionState)
        .map_err(|_| anyhow::anyhow!("Failed to create event source"))
}

impl InputInjector for CgEventInjector {
    fn post_key(&self, event: KeyEvent) -> Result<()> {
        let key = CGEvent::new_keyboard_event(event_source()?, event.code, event.down)
            .map_err(|_| anyhow::anyhow!("Failed to create key event {}", event.code))?;

        let mut flags = CGEventFlags::empty();
        if event.modifiers.command {
            flags |= CGEventFlags::CGEventFlagCommand;
        }
        if event.modifiers.shift {
            flags |= CGEventFlags::CGEventFlagShift;
        }
        key.set_flags(flags);
        key.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_mouse(&self, event: MouseEvent) -> Result<()> {
        let kind = if event.down {
            CGEventType::LeftMouseDown
        } else {
            CGEventType::LeftMouseUp
        };
        let mouse = CGEvent::new_mouse_event(
            event_source()?,
            kind,
            CGPoint::new(event.at.x, event.at.y),
            CGMouseButton::Left,
        )
        .map_err(|_| anyhow::anyhow!("Failed to create mouse event"))?;
        mouse.post(CGEventTapLocation::HID);
        Ok(())
    }
}
