//! Key identifiers and key-name parsing.
//!
//! Keys are Windows virtual-key codes. The same numbers are what the macro
//! store writes to disk, so a `KeyCode` read back from a file can be handed
//! to the injector unchanged.

use crate::error::{KpError, Result};

/// A platform key identifier (Windows virtual-key code).
pub type KeyCode = u16;

/// Ordered keys pressed together in one tick. Duplicates are allowed.
pub type KeySet = Vec<KeyCode>;

pub const VK_LBUTTON: KeyCode = 0x01;
pub const VK_RBUTTON: KeyCode = 0x02;
pub const VK_MBUTTON: KeyCode = 0x04;

/// Named keys that are not simple letters or digits.
const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("lmb", VK_LBUTTON),
    ("rmb", VK_RBUTTON),
    ("mmb", VK_MBUTTON),
    ("backspace", 0x08),
    ("tab", 0x09),
    ("enter", 0x0D),
    ("shift", 0x10),
    ("ctrl", 0x11),
    ("alt", 0x12),
    ("esc", 0x1B),
    ("space", 0x20),
    ("left", 0x25),
    ("up", 0x26),
    ("right", 0x27),
    ("down", 0x28),
    ("num0", 0x60),
    ("num1", 0x61),
    ("num2", 0x62),
    ("num3", 0x63),
    ("num4", 0x64),
    ("num5", 0x65),
    ("num6", 0x66),
    ("num7", 0x67),
    ("num8", 0x68),
    ("num9", 0x69),
    ("f1", 0x70),
    ("f2", 0x71),
    ("f3", 0x72),
    ("f4", 0x73),
    ("f5", 0x74),
    ("f6", 0x75),
    ("f7", 0x76),
    ("f8", 0x77),
    ("f9", 0x78),
    ("f10", 0x79),
    ("f11", 0x7A),
    ("f12", 0x7B),
];

/// Alternative spellings accepted by [`parse_key`].
fn canonical_name(name: &str) -> &str {
    match name {
        "return" => "enter",
        "escape" => "esc",
        "control" => "ctrl",
        "leftmouse" | "mouse1" => "lmb",
        "rightmouse" | "mouse2" => "rmb",
        "middlemouse" | "mouse3" => "mmb",
        "arrowleft" => "left",
        "arrowup" => "up",
        "arrowright" => "right",
        "arrowdown" => "down",
        other => other,
    }
}

/// Parse a key given as a name (`"a"`, `"space"`, `"num5"`), a decimal
/// virtual-key code (`"65"`), or a hex code (`"0x41"`).
///
/// Single digits are the top-row number keys; use `num0`..`num9` for the
/// numeric keypad. A bare multi-digit number is a virtual-key code.
pub fn parse_key(input: &str) -> Result<KeyCode> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(KpError::invalid_key(input, "empty key"));
    }

    let lower = trimmed.to_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        return KeyCode::from_str_radix(hex, 16)
            .map_err(|e| KpError::invalid_key(input, e.to_string()));
    }

    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            // VK codes for letters and digits are their uppercase ASCII values
            return Ok(c.to_ascii_uppercase() as KeyCode);
        }
    }

    if lower.chars().all(|c| c.is_ascii_digit()) {
        return lower
            .parse::<KeyCode>()
            .map_err(|e| KpError::invalid_key(input, e.to_string()));
    }

    let name = canonical_name(&lower);
    NAMED_KEYS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, code)| *code)
        .ok_or_else(|| KpError::invalid_key(input, "unknown key name"))
}

/// Parse a comma- or whitespace-separated list of keys.
pub fn parse_key_list(input: &str) -> Result<KeySet> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(parse_key)
        .collect()
}

/// Human-readable name for a key code, if it has one.
pub fn key_name(code: KeyCode) -> Option<String> {
    if let Some((name, _)) = NAMED_KEYS.iter().find(|(_, known)| *known == code) {
        return Some((*name).to_string());
    }

    match u8::try_from(code).map(char::from) {
        Ok(c) if c.is_ascii_uppercase() || c.is_ascii_digit() => Some(c.to_string()),
        _ => None,
    }
}

/// Display form used by the CLI: the key name, or the raw code.
pub fn display_key(code: KeyCode) -> String {
    key_name(code).unwrap_or_else(|| format!("#{code}"))
}

/// Every key with a name, in code order.
pub fn known_keys() -> Vec<(String, KeyCode)> {
    let mut keys: Vec<(String, KeyCode)> = (b'0'..=b'9')
        .chain(b'A'..=b'Z')
        .map(|b| (char::from(b).to_string(), KeyCode::from(b)))
        .chain(NAMED_KEYS.iter().map(|(name, code)| ((*name).to_string(), *code)))
        .collect();
    keys.sort_by_key(|(_, code)| *code);
    keys
}
