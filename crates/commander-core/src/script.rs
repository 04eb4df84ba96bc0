//! AppleScript builders for the panel choreography and the scripted strategies

use crate::config::{ChoreographyConfig, TimingConfig};
use crate::keymap::{KEY_DELETE, KEY_RETURN};

/// Escape text for embedding inside an AppleScript string literal.
/// Backslashes are doubled first so the quote escapes stay intact.
pub fn escape_applescript_string(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Milliseconds rendered as an AppleScript `delay` argument
fn secs(ms: u64) -> String {
    format!("{}", ms as f64 / 1000.0)
}

/// Which process the delivery script is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAddressing {
    /// Activate the target by name, then drive it
    Direct,
    /// Drive the target only through System Events
    SystemEvents,
}

/// Builds scripts for one target with fixed choreography and timing
pub struct ScriptBuilder<'a> {
    app_name: &'a str,
    choreography: &'a ChoreographyConfig,
    timing: &'a TimingConfig,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(
        app_name: &'a str,
        choreography: &'a ChoreographyConfig,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            app_name,
            choreography,
            timing,
        }
    }

    /// Palette shortcut, filter text, confirm, then the direct toggle shortcut.
    /// The toggle is always sent: the UI state is unknown beforehand.
    fn choreography_lines(&self) -> String {
        let c = self.choreography;
        let t = self.timing;
        format!(
            r#"        key code {palette} using {{command down}}
        delay {palette_open}
        keystroke "{filter}"
        delay {filter_settle}
        key code {ret}
        delay {confirm_settle}
        key code {toggle} using {{command down}}
        delay {toggle_settle}
"#,
            palette = c.palette_key,
            palette_open = secs(t.palette_open),
            filter = escape_applescript_string(&c.filter_text),
            filter_settle = secs(t.filter_settle),
            ret = KEY_RETURN,
            confirm_settle = secs(t.confirm_settle),
            toggle = c.toggle_key,
            toggle_settle = secs(t.toggle_settle),
        )
    }

    /// Sets clickX/clickY to the composer point of the front window
    fn composer_point_lines(&self) -> String {
        format!(
            r#"            set {{winX, winY}} to position of window 1
            set {{winW, winH}} to size of window 1
            set clickX to winX + (winW / 2)
            set clickY to winY + winH - {offset}
"#,
            offset = self.choreography.composer_offset,
        )
    }

    /// Script that only reveals and focuses the composer
    pub fn open_panel(&self) -> String {
        format!(
            r#"tell application "System Events"
    tell process "{app}"
{choreography}        try
{point}            click at {{clickX, clickY}}
            delay {click_settle}
        end try
    end tell
end tell"#,
            app = escape_applescript_string(self.app_name),
            choreography = self.choreography_lines(),
            point = self.composer_point_lines(),
            click_settle = secs(self.timing.click_settle),
        )
    }

    /// Full delivery: reveal the composer, select and delete what is there,
    /// type the command and submit it
    pub fn deliver(&self, text: &str, addressing: ScriptAddressing) -> String {
        let app = escape_applescript_string(self.app_name);
        let t = self.timing;
        let (activate, frontmost) = match addressing {
            ScriptAddressing::Direct => (
                format!(
                    "tell application \"{}\"\n    activate\n    delay {}\nend tell\n",
                    app,
                    secs(t.activate_settle)
                ),
                format!(
                    "        set frontmost to true\n        delay {}\n",
                    secs(t.click_settle)
                ),
            ),
            ScriptAddressing::SystemEvents => (String::new(), String::new()),
        };
        let gap = secs(t.mouse_event_gap);

        format!(
            r#"{activate}tell application "System Events"
    tell process "{app}"
{frontmost}{choreography}        try
{point}            click at {{clickX, clickY}}
            delay {click_settle}
            click at {{clickX, clickY}}
            delay {gap}
            click at {{clickX, clickY}}
            delay {gap}
            click at {{clickX, clickY}}
            delay {gap}
        on error
            key code {palette} using {{command down}}
            delay {click_settle}
        end try
        key code {delete}
        delay {clear_settle}
        keystroke "{text}"
        delay {pre_submit}
        keystroke return
    end tell
end tell"#,
            activate = activate,
            app = app,
            frontmost = frontmost,
            choreography = self.choreography_lines(),
            point = self.composer_point_lines(),
            click_settle = secs(t.click_settle),
            gap = gap,
            palette = self.choreography.palette_key,
            delete = KEY_DELETE,
            clear_settle = secs(t.clear_settle),
            text = escape_applescript_string(text),
            pre_submit = secs(t.pre_submit),
        )
    }
}

/// Minimal System Events call used to probe UI-scripting permission
pub const SYSTEM_EVENTS_PROBE: &str = r#"tell application "System Events"
    return 1
end tell"#;
