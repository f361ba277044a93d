//! Append-only macro store.
//!
//! Each macro is three lines: name, delay in seconds, then the key codes
//! separated by spaces (the key line may be empty). Records follow each
//! other with nothing in between.
//!
//! ```text
//! chord
//! 3
//! 65 66
//! ```
//!
//! Loading is permissive:
//!
//! - a missing file is an empty store,
//! - lines that are not valid UTF-8 are decoded lossily,
//! - the delay is the line's leading digits (`"3abc"` reads as 3), and a
//!   delay with no digits, or zero, becomes [`DEFAULT_DELAY_SECS`],
//! - the key line is read up to its first non-numeric token.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KpError, Result};
use crate::keys::{KeyCode, KeySet};

/// Delay given to records whose delay line does not parse.
pub const DEFAULT_DELAY_SECS: u32 = 1;

/// Default store file name, relative to the working directory.
pub const DEFAULT_STORE_FILE: &str = "macros.txt";

/// A named key set and delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    pub keys: KeySet,
    pub delay: u32,
}

impl Macro {
    pub fn new(name: impl Into<String>, keys: KeySet, delay: u32) -> Self {
        Self {
            name: name.into(),
            keys,
            delay,
        }
    }

    /// Checks the name can be written as a single, non-empty line.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(KpError::invalid_macro(&self.name, "name cannot be empty"));
        }
        if self.name.contains(['\n', '\r']) {
            return Err(KpError::invalid_macro(
                &self.name,
                "name cannot contain a line break",
            ));
        }
        Ok(())
    }
}

/// Flat-file macro storage.
#[derive(Debug, Clone)]
pub struct MacroStore {
    path: PathBuf,
}

impl Default for MacroStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_FILE)
    }
}

impl MacroStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Existing records are never touched, so saving a
    /// name twice leaves two records with that name.
    pub fn save(&self, m: &Macro) -> Result<()> {
        m.validate()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format_record(m).as_bytes())?;

        debug!("saved macro '{}' to {}", m.name, self.path.display());
        Ok(())
    }

    /// Read every record in file order. A missing file yields no macros.
    pub fn load_all(&self) -> Result<Vec<Macro>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no macro store at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let macros = parse_records(BufReader::new(file))?;
        debug!(
            "loaded {} macro(s) from {}",
            macros.len(),
            self.path.display()
        );
        Ok(macros)
    }

    /// First macro with the given name, if any.
    pub fn find(&self, name: &str) -> Result<Option<Macro>> {
        Ok(self.load_all()?.into_iter().find(|m| m.name == name))
    }
}

fn format_record(m: &Macro) -> String {
    let keys: Vec<String> = m.keys.iter().map(ToString::to_string).collect();
    format!("{}\n{}\n{}\n", m.name, m.delay, keys.join(" "))
}

/// Parse records in groups of three lines. A short final group reads its
/// missing lines as empty.
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<Macro>> {
    let mut lines = reader.split(b'\n');
    let mut macros = Vec::new();

    while let Some(name) = lines.next() {
        let name = decode_line(name?);
        let delay_line = lines.next().transpose()?.map(decode_line).unwrap_or_default();
        let key_line = lines.next().transpose()?.map(decode_line).unwrap_or_default();

        macros.push(Macro {
            delay: parse_delay(&name, &delay_line),
            keys: parse_key_line(&key_line),
            name,
        });
    }

    Ok(macros)
}

/// Lossy UTF-8 decode with any trailing `\r` removed.
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Leading decimal digits of the line, after leading whitespace.
fn parse_delay(name: &str, line: &str) -> u32 {
    let trimmed = line.trim_start();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());

    match trimmed[..digits_end].parse::<u32>() {
        Ok(delay) if delay > 0 => delay,
        _ => {
            warn!(
                "macro '{}' has invalid delay '{}', using {}s",
                name, line, DEFAULT_DELAY_SECS
            );
            DEFAULT_DELAY_SECS
        }
    }
}

fn parse_key_line(line: &str) -> KeySet {
    line.split_whitespace()
        .map_while(|token| token.parse::<KeyCode>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Vec<Macro> {
        parse_records(Cursor::new(text)).unwrap()
    }

    #[test]
    fn test_format_record() {
        let m = Macro::new("chord", vec![65, 66], 3);
        assert_eq!(format_record(&m), "chord\n3\n65 66\n");

        let empty = Macro::new("idle", Vec::new(), 1);
        assert_eq!(format_record(&empty), "idle\n1\n\n");
    }

    #[test]
    fn test_parse_records_in_order() {
        let macros = parse("first\n2\n65 66\nsecond\n5\n\n");
        assert_eq!(macros.len(), 2);
        assert_eq!(macros[0], Macro::new("first", vec![65, 66], 2));
        assert_eq!(macros[1], Macro::new("second", Vec::new(), 5));
    }

    #[test]
    fn test_parse_tolerates_trailing_space_and_crlf() {
        let macros = parse("chord\r\n3\r\n65 66 \r\n");
        assert_eq!(macros, vec![Macro::new("chord", vec![65, 66], 3)]);
    }

    #[test]
    fn test_parse_bad_delay_defaults() {
        let macros = parse("broken\nsoon\n65\nzero\n0\n66\n");
        assert_eq!(macros[0].delay, DEFAULT_DELAY_SECS);
        assert_eq!(macros[0].keys, vec![65]);
        assert_eq!(macros[1].delay, DEFAULT_DELAY_SECS);
    }

    #[test]
    fn test_parse_delay_reads_leading_digits() {
        let macros = parse("suffix\n3abc\n65\npadded\n  12 \n\nsigned\n-4\n\n");
        assert_eq!(macros[0].delay, 3);
        assert_eq!(macros[1].delay, 12);
        assert_eq!(macros[2].delay, DEFAULT_DELAY_SECS);
    }

    #[test]
    fn test_parse_invalid_utf8_keeps_other_records() {
        let macros = parse_records(Cursor::new(&b"good\n2\n65\ncaf\xe9\n3\n66\n"[..])).unwrap();
        assert_eq!(macros.len(), 2);
        assert_eq!(macros[0], Macro::new("good", vec![65], 2));
        assert_eq!(macros[1].name, "caf\u{FFFD}");
        assert_eq!(macros[1].delay, 3);
        assert_eq!(macros[1].keys, vec![66]);
    }

    #[test]
    fn test_parse_key_line_stops_at_garbage() {
        let macros = parse("partial\n1\n65 x 66\n");
        assert_eq!(macros[0].keys, vec![65]);
    }

    #[test]
    fn test_parse_truncated_record() {
        let macros = parse("whole\n2\n32\ncut\n4");
        assert_eq!(macros.len(), 2);
        assert_eq!(macros[1], Macro::new("cut", Vec::new(), 4));
    }

    #[test]
    fn test_name_is_kept_verbatim() {
        let macros = parse("  spaced name \n1\n\n");
        assert_eq!(macros[0].name, "  spaced name ");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(Macro::new("", vec![65], 1).validate().is_err());
        assert!(Macro::new("two\nlines", vec![65], 1).validate().is_err());
        assert!(Macro::new("ok", vec![65], 1).validate().is_ok());
    }
}
