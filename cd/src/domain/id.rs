//! Record ID generation and validation
//!
//! Generated IDs use the format: `{6-char-hex}-{kind}-{slug}`
//! Example: `019430-task-farmer-1042`

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{TaskError, TaskResult};

/// Reserved word that collides with batch routes
const RESERVED_ID: &str = "bulk";

/// Longest id the shape accepts
const MAX_ID_LEN: usize = 96;

fn id_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,95}$").expect("static id pattern"))
}

/// Generate a record ID from kind and a descriptive seed
pub fn generate_id(kind: &str, seed: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let simple = uuid.simple().to_string();
    // The first 12 hex digits of a v7 UUID are a millisecond clock; take the
    // tail of the random section so IDs made in the same millisecond differ.
    let hex = &simple[simple.len() - 6..];
    // Room left for the slug after "{hex}-{kind}-"
    let room = MAX_ID_LEN.saturating_sub(hex.len() + kind.len() + 2);
    let mut slug = slugify(seed);
    slug.truncate(room);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{}-{}", hex, kind)
    } else {
        format!("{}-{}-{}", hex, kind, slug)
    }
}

/// Slugify text for use in IDs
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Check an incoming ID against the identifier shape
///
/// The literal `bulk` is never a valid ID, in any casing.
pub fn validate_id(kind: &str, id: &str) -> TaskResult<()> {
    if id.eq_ignore_ascii_case(RESERVED_ID) {
        return Err(TaskError::validation(format!("'{}' is not a valid {} id", id, kind)));
    }
    if !id_shape().is_match(id) {
        return Err(TaskError::validation(format!("Malformed {} id: '{}'", kind, id)));
    }
    Ok(())
}
