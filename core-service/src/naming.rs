//! Helpers for turning catalog titles into file and folder names.
//!
//! `Replace` keeps word boundaries by substituting spaces and is meant for
//! file names; `Remove` drops the offending characters and suits compact
//! contexts such as folder prefixes.

use serde::{Deserialize, Serialize};

/// Characters rejected by at least one of the supported filesystems.
const INVALID_PATH_CHARACTERS: [char; 9] = ['*', '|', '\\', '/', ':', '"', '>', '<', '?'];

/// ONE DOT LEADER, stands in for a leading or trailing `.`.
const DOT_LEADER: char = '\u{2024}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingMode {
    Remove,
    #[default]
    Replace,
}

impl NamingMode {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingMode::Remove => remove_invalid_path_characters(name),
            NamingMode::Replace => replace_invalid_path_characters(name),
        }
    }
}

fn is_invalid(c: char) -> bool {
    INVALID_PATH_CHARACTERS.contains(&c)
}

/// Drops invalid characters and trailing dots, then trims.
pub fn remove_invalid_path_characters(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !is_invalid(*c)).collect();
    cleaned.trim_end_matches('.').trim().to_string()
}

/// Turns invalid characters into spaces and collapses whitespace runs.
///
/// A leading or trailing `.` becomes `․` (U+2024) so the name is neither
/// hidden nor stripped by the filesystem.
pub fn replace_invalid_path_characters(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() || is_invalid(c) {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }

    if let Some(rest) = collapsed.strip_prefix('.') {
        collapsed = format!("{DOT_LEADER}{rest}");
    }
    if let Some(rest) = collapsed.strip_suffix('.') {
        collapsed = format!("{rest}{DOT_LEADER}");
    }
    collapsed.trim().to_string()
}

/// Left-pads `number` with zeroes to the digit count of `total`.
///
/// ```
/// use core_service::naming::pad_zeroes;
///
/// assert_eq!(pad_zeroes(7, 120), "007");
/// assert_eq!(pad_zeroes(12, 9), "12");
/// ```
pub fn pad_zeroes(number: u64, total: u64) -> String {
    let width = total.to_string().len();
    format!("{:0>width$}", number, width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_drops_characters() {
        assert_eq!(
            remove_invalid_path_characters("Fate/stay night: UBW?"),
            "Fatestay night UBW"
        );
        assert_eq!(remove_invalid_path_characters("  Toradora!..."), "Toradora!");
        assert_eq!(remove_invalid_path_characters("a<b>c|d\\e*\"f"), "abcdef");
    }

    #[test]
    fn test_replace_keeps_word_boundaries() {
        assert_eq!(
            replace_invalid_path_characters("Fate/stay night: UBW?"),
            "Fate stay night UBW"
        );
        assert_eq!(replace_invalid_path_characters("a  *  b"), "a b");
        assert_eq!(replace_invalid_path_characters("tab\there"), "tab here");
    }

    #[test]
    fn test_replace_guards_edge_dots() {
        assert_eq!(replace_invalid_path_characters(".hack"), "\u{2024}hack");
        assert_eq!(replace_invalid_path_characters("Ep. 1."), "Ep. 1\u{2024}");
        // Trailing whitespace shields the dot from substitution.
        assert_eq!(replace_invalid_path_characters("end. "), "end.");
    }

    #[test]
    fn test_mode_dispatch() {
        assert_eq!(NamingMode::default(), NamingMode::Replace);
        assert_eq!(NamingMode::Remove.apply("a:b"), "ab");
        assert_eq!(NamingMode::Replace.apply("a:b"), "a b");
    }

    #[test]
    fn test_pad_zeroes() {
        assert_eq!(pad_zeroes(1, 12), "01");
        assert_eq!(pad_zeroes(12, 12), "12");
        assert_eq!(pad_zeroes(5, 1000), "0005");
        assert_eq!(pad_zeroes(0, 0), "0");
    }
}
