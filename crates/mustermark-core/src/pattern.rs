//! Pattern compilation and matching over page text

use regex::Regex;

use crate::error::MarkError;

/// Tagged identifiers such as `#IV.2{sidAB12cd34}`, `#12_3{sid...}` or `#7{sid...}`
pub const DEFAULT_PATTERN: &str =
    r"(#[IVXLCDM]+[._]\d+\{sid\w{8}\}|#\d+[._]\d+\{sid\w{8}\}|#\d+\{sid\w{8}\})";

pub fn compile(source: &str) -> Result<Regex, MarkError> {
    Ok(Regex::new(source)?)
}

/// All non-overlapping matches in order of appearance
///
/// Duplicates and empty matches are kept.
pub fn find_targets(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
