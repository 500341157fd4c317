//! Key combinations that suggest the user is taking a screenshot.
//!
//! This is a heuristic. Hardware buttons, OS menus and external tools never
//! show up here, so a screenshot count built on it is a lower bound at best.

use serde::{Deserialize, Serialize};

/// One key press with its modifiers, as reported by the host's keyboard hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    /// Key name as reported by the host, e.g. `PrintScreen` or `4`.
    pub key: String,
    /// Cmd on macOS, Win on Windows.
    #[serde(default)]
    pub meta: bool,
    /// Control held.
    #[serde(default)]
    pub ctrl: bool,
    /// Shift held.
    #[serde(default)]
    pub shift: bool,
    /// Alt / Option held.
    #[serde(default)]
    pub alt: bool,
}

impl KeyChord {
    /// A bare key without modifiers.
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            meta: false,
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    /// `key` with meta (Cmd / Win) and shift held.
    pub fn meta_shift(key: impl Into<String>) -> Self {
        Self {
            meta: true,
            shift: true,
            ..Self::plain(key)
        }
    }
}

/// PrintScreen, Cmd+Shift+3/4/5 (macOS) or Win+Shift+S (Windows snipping).
pub fn is_capture_combo(chord: &KeyChord) -> bool {
    if chord.key.eq_ignore_ascii_case("PrintScreen") {
        return true;
    }
    if !(chord.meta && chord.shift) {
        return false;
    }
    matches!(chord.key.as_str(), "3" | "4" | "5") || chord.key.eq_ignore_ascii_case("s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_platform_shortcuts() {
        assert!(is_capture_combo(&KeyChord::plain("PrintScreen")));
        assert!(is_capture_combo(&KeyChord::meta_shift("3")));
        assert!(is_capture_combo(&KeyChord::meta_shift("5")));
        assert!(is_capture_combo(&KeyChord::meta_shift("S")));
    }

    #[test]
    fn ignores_ordinary_keys() {
        assert!(!is_capture_combo(&KeyChord::plain("3")));
        assert!(!is_capture_combo(&KeyChord::plain("s")));
        assert!(!is_capture_combo(&KeyChord::meta_shift("6")));
        let ctrl_shift = KeyChord {
            ctrl: true,
            shift: true,
            ..KeyChord::plain("4")
        };
        assert!(!is_capture_combo(&ctrl_shift));
    }
}
