//! Character to virtual key code table for the US ANSI layout

/// Return / Enter
pub const KEY_RETURN: u16 = 0x24;
/// Backspace
pub const KEY_DELETE: u16 = 0x33;
pub const KEY_SPACE: u16 = 0x31;
pub const KEY_SHIFT: u16 = 0x38;

/// Modifier keys held while a key event is posted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub command: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        command: false,
        shift: false,
    };
    pub const COMMAND: Self = Self {
        command: true,
        shift: false,
    };
    pub const SHIFT: Self = Self {
        command: false,
        shift: true,
    };
}

/// A physical key plus whether Shift must be held to produce the character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub code: u16,
    pub shift: bool,
}

/// Map a character to the key that types it. Characters outside the table
/// (accents, emoji, control characters) return `None`.
pub fn key_for_char(c: char) -> Option<KeyStroke> {
    if c.is_ascii_uppercase() {
        return key_code(c.to_ascii_lowercase()).map(|code| KeyStroke { code, shift: true });
    }
    if let Some(code) = key_code(c) {
        return Some(KeyStroke { code, shift: false });
    }
    shifted_base(c)
        .and_then(key_code)
        .map(|code| KeyStroke { code, shift: true })
}

fn key_code(c: char) -> Option<u16> {
    let code = match c {
        'a' => 0x00,
        's' => 0x01,
        'd' => 0x02,
        'f' => 0x03,
        'h' => 0x04,
        'g' => 0x05,
        'z' => 0x06,
        'x' => 0x07,
        'c' => 0x08,
        'v' => 0x09,
        'b' => 0x0B,
        'q' => 0x0C,
        'w' => 0x0D,
        'e' => 0x0E,
        'r' => 0x0F,
        'y' => 0x10,
        't' => 0x11,
        '1' => 0x12,
        '2' => 0x13,
        '3' => 0x14,
        '4' => 0x15,
        '6' => 0x16,
        '5' => 0x17,
        '=' => 0x18,
        '9' => 0x19,
        '7' => 0x1A,
        '-' => 0x1B,
        '8' => 0x1C,
        '0' => 0x1D,
        ']' => 0x1E,
        'o' => 0x1F,
        'u' => 0x20,
        '[' => 0x21,
        'i' => 0x22,
        'p' => 0x23,
        'l' => 0x25,
        'j' => 0x26,
        '\'' => 0x27,
        'k' => 0x28,
        ';' => 0x29,
        '\\' => 0x2A,
        ',' => 0x2B,
        '/' => 0x2C,
        'n' => 0x2D,
        'm' => 0x2E,
        '.' => 0x2F,
        ' ' => KEY_SPACE,
        '`' => 0x32,
        _ => return None,
    };
    Some(code)
}

/// The unshifted character sharing a key with a shifted one
fn shifted_base(c: char) -> Option<char> {
    let base = match c {
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        '~' => '`',
        _ => return None,
    };
    Some(base)
}
