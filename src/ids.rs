//! Window and tab identifier formats.
//!
//! A window id is 8 lowercase hex digits; a tab id is
//! `<window_id>_<8-hex-suffix>`.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

pub static TAB_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-fA-F]{8,})_([0-9a-fA-F]{8})$").expect("tab id pattern")
});

/// Splits a tab id into its window prefix and tab suffix.
pub fn parse_tab_id(id: &str) -> Option<(&str, &str)> {
    let captures = TAB_ID_PATTERN.captures(id)?;
    match (captures.get(1), captures.get(2)) {
        (Some(prefix), Some(suffix)) => Some((prefix.as_str(), suffix.as_str())),
        _ => None,
    }
}

/// A fresh 8-hex-digit session id.
pub fn new_session_id() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

pub fn tab_id(window_id: &str, suffix: &str) -> String {
    format!("{window_id}_{suffix}")
}
