//! Physical input identifiers and their `SDLK_*` / `MOUSE_*` spellings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BindError;

/// Prefix used by keyboard key strings in config files and scripts.
pub const KEY_PREFIX: &str = "SDLK_";

/// Prefix used by mouse button strings.
pub const MOUSE_PREFIX: &str = "MOUSE_";

const PLACEHOLDER_NAME: &str = "UNKNOWN";

const PUNCTUATION: [(&str, char); 11] = [
    ("BACKQUOTE", '`'),
    ("COMMA", ','),
    ("PERIOD", '.'),
    ("SLASH", '/'),
    ("SEMICOLON", ';'),
    ("QUOTE", '\''),
    ("MINUS", '-'),
    ("EQUALS", '='),
    ("LEFTBRACKET", '['),
    ("RIGHTBRACKET", ']'),
    ("BACKSLASH", '\\'),
];

const NAMED_KEYS: [(&str, Key); 22] = [
    ("ESCAPE", Key::Escape),
    ("RETURN", Key::Return),
    ("SPACE", Key::Space),
    ("TAB", Key::Tab),
    ("BACKSPACE", Key::Backspace),
    ("DELETE", Key::Delete),
    ("INSERT", Key::Insert),
    ("HOME", Key::Home),
    ("END", Key::End),
    ("PAGEUP", Key::PageUp),
    ("PAGEDOWN", Key::PageDown),
    ("UP", Key::Up),
    ("DOWN", Key::Down),
    ("LEFT", Key::Left),
    ("RIGHT", Key::Right),
    ("LSHIFT", Key::LShift),
    ("RSHIFT", Key::RShift),
    ("LCTRL", Key::LCtrl),
    ("RCTRL", Key::RCtrl),
    ("LALT", Key::LAlt),
    ("RALT", Key::RAlt),
    ("CAPSLOCK", Key::CapsLock),
];

const MOUSE_BUTTONS: [(&str, MouseButton); 5] = [
    ("LEFT", MouseButton::Left),
    ("MIDDLE", MouseButton::Middle),
    ("RIGHT", MouseButton::Right),
    ("X1", MouseButton::X1),
    ("X2", MouseButton::X2),
];

/// A keyboard key. Character keys are stored lowercased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Char(char),
    F(u8),
    Escape,
    Return,
    Space,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    LShift,
    RShift,
    LCtrl,
    RCtrl,
    LAlt,
    RAlt,
    CapsLock,
}

impl Key {
    /// Look up a key by its name without the `SDLK_` prefix.
    pub fn from_name(name: &str) -> Option<Key> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() {
                return Some(Key::Char(c.to_ascii_lowercase()));
            }
            if PUNCTUATION.iter().any(|(_, p)| *p == c) {
                return Some(Key::Char(c));
            }
            return None;
        }

        let upper = name.to_ascii_uppercase();
        if let Some((_, key)) = NAMED_KEYS.iter().find(|(label, _)| *label == upper) {
            return Some(*key);
        }
        if let Some((_, c)) = PUNCTUATION.iter().find(|(label, _)| *label == upper) {
            return Some(Key::Char(*c));
        }
        upper
            .strip_prefix('F')
            .filter(|digits| {
                !digits.is_empty()
                    && !digits.starts_with('0')
                    && digits.bytes().all(|b| b.is_ascii_digit())
            })
            .and_then(|digits| digits.parse::<u8>().ok())
            .filter(|n| (1..=12).contains(n))
            .map(Key::F)
    }

    /// Canonical name without prefix: lowercase for single characters,
    /// uppercase otherwise.
    pub fn name(&self) -> String {
        match self {
            Key::Char(c) => match PUNCTUATION.iter().find(|(_, p)| p == c) {
                Some((label, _)) => (*label).to_string(),
                None => c.to_string(),
            },
            Key::F(n) => format!("F{n}"),
            other => NAMED_KEYS
                .iter()
                .find(|(_, key)| key == other)
                .map(|(label, _)| (*label).to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    X1,
    X2,
}

impl MouseButton {
    pub fn from_name(name: &str) -> Option<MouseButton> {
        let upper = name.to_ascii_uppercase();
        MOUSE_BUTTONS
            .iter()
            .find(|(label, _)| *label == upper)
            .map(|(_, button)| *button)
    }

    pub fn name(&self) -> &'static str {
        MOUSE_BUTTONS
            .iter()
            .find(|(_, button)| button == self)
            .map(|(label, _)| *label)
            .unwrap_or("LEFT")
    }
}

/// A physical input source an action can be bound to.
///
/// `Trigger::Unknown` is the placeholder scripts register against before a
/// config file assigns a real key; nothing is ever dispatched on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Trigger {
    #[default]
    Unknown,
    Key(Key),
    Mouse(MouseButton),
}

impl Trigger {
    /// Parse a key string such as `SDLK_w`, `SDLK_ESCAPE`, `MOUSE_LEFT` or
    /// a bare key name (`w`, `escape`).
    pub fn parse(text: &str) -> Result<Trigger, BindError> {
        let text = text.trim();
        let unknown = || BindError::UnknownKey {
            name: text.to_string(),
        };

        let upper = text.to_ascii_uppercase();
        if upper.starts_with(MOUSE_PREFIX) {
            return MouseButton::from_name(&text[MOUSE_PREFIX.len()..])
                .map(Trigger::Mouse)
                .ok_or_else(unknown);
        }

        let name = if upper.starts_with(KEY_PREFIX) {
            &text[KEY_PREFIX.len()..]
        } else {
            text
        };
        if name.eq_ignore_ascii_case(PLACEHOLDER_NAME) {
            return Ok(Trigger::Unknown);
        }
        Key::from_name(name).map(Trigger::Key).ok_or_else(unknown)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Trigger::Unknown)
    }

    /// Canonical string form, e.g. `SDLK_w`, `SDLK_ESCAPE`, `MOUSE_LEFT`.
    pub fn keystring(&self) -> String {
        match self {
            Trigger::Unknown => format!("{KEY_PREFIX}{PLACEHOLDER_NAME}"),
            Trigger::Key(key) => format!("{KEY_PREFIX}{}", key.name()),
            Trigger::Mouse(button) => format!("{MOUSE_PREFIX}{}", button.name()),
        }
    }

    /// Human-facing label: the keystring without its prefix, uppercased,
    /// with underscores turned into spaces.
    pub fn display_name(&self) -> String {
        let name = match self {
            Trigger::Unknown => PLACEHOLDER_NAME.to_string(),
            Trigger::Key(key) => key.name(),
            Trigger::Mouse(button) => format!("MOUSE {}", button.name()),
        };
        name.to_ascii_uppercase().replace('_', " ")
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keystring())
    }
}

impl FromStr for Trigger {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trigger::parse(s)
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.keystring())
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Trigger::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sdl_key_strings() {
        assert_eq!(Trigger::parse("SDLK_w").unwrap(), Trigger::Key(Key::Char('w')));
        assert_eq!(Trigger::parse("SDLK_W").unwrap(), Trigger::Key(Key::Char('w')));
        assert_eq!(Trigger::parse("SDLK_ESCAPE").unwrap(), Trigger::Key(Key::Escape));
        assert_eq!(Trigger::parse("sdlk_pageup").unwrap(), Trigger::Key(Key::PageUp));
        assert_eq!(Trigger::parse("SDLK_F11").unwrap(), Trigger::Key(Key::F(11)));
        assert_eq!(
            Trigger::parse("SDLK_BACKQUOTE").unwrap(),
            Trigger::Key(Key::Char('`'))
        );
    }

    #[test]
    fn bare_names_and_placeholder() {
        assert_eq!(Trigger::parse("space").unwrap(), Trigger::Key(Key::Space));
        assert_eq!(Trigger::parse("7").unwrap(), Trigger::Key(Key::Char('7')));
        assert_eq!(Trigger::parse("SDLK_UNKNOWN").unwrap(), Trigger::Unknown);
        assert!(Trigger::parse("SDLK_UNKNOWN").unwrap().is_placeholder());
    }

    #[test]
    fn mouse_buttons() {
        assert_eq!(
            Trigger::parse("MOUSE_RIGHT").unwrap(),
            Trigger::Mouse(MouseButton::Right)
        );
        assert_eq!(Trigger::Mouse(MouseButton::X1).keystring(), "MOUSE_X1");
        assert_eq!(Trigger::Mouse(MouseButton::Left).display_name(), "MOUSE LEFT");
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            Trigger::parse("SDLK_NOPE"),
            Err(BindError::UnknownKey {
                name: "SDLK_NOPE".to_string()
            })
        );
        assert!(Trigger::parse("SDLK_F13").is_err());
        assert!(Trigger::parse("SDLK_F01").is_err());
        assert!(Trigger::parse("SDLK_F+1").is_err());
        assert!(Trigger::parse("SDLK_F").is_err());
        assert!(Trigger::parse("MOUSE_WHEEL").is_err());
        assert!(Trigger::parse("").is_err());
    }

    #[test]
    fn keystrings_follow_sdl_casing() {
        assert_eq!(Trigger::Key(Key::Char('w')).keystring(), "SDLK_w");
        assert_eq!(Trigger::Key(Key::Escape).keystring(), "SDLK_ESCAPE");
        assert_eq!(Trigger::Key(Key::Char(',')).keystring(), "SDLK_COMMA");
        assert_eq!(Trigger::Unknown.keystring(), "SDLK_UNKNOWN");
        assert_eq!(Trigger::Key(Key::Char('w')).display_name(), "W");
        assert_eq!(Trigger::Key(Key::PageDown).display_name(), "PAGEDOWN");
    }

    #[test]
    fn keystring_parses_back() {
        for text in ["SDLK_a", "SDLK_0", "SDLK_SLASH", "SDLK_F1", "SDLK_RCTRL", "MOUSE_MIDDLE"] {
            let trigger = Trigger::parse(text).unwrap();
            assert_eq!(trigger.keystring(), text);
        }
    }

    #[test]
    fn serde_uses_keystrings() {
        let json = serde_json::to_string(&Trigger::Key(Key::Return)).unwrap();
        assert_eq!(json, "\"SDLK_RETURN\"");
        let parsed: Trigger = serde_json::from_str("\"SDLK_d\"").unwrap();
        assert_eq!(parsed, Trigger::Key(Key::Char('d')));
        assert!(serde_json::from_str::<Trigger>("\"SDLK_WHAT\"").is_err());
    }
}
