//! Language bucket keys

/// Bucket for tasks whose farmer has no usable language
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Normalize a language into a bucket key (trimmed, lower-case)
pub fn language_key(language: Option<&str>) -> String {
    match language.map(str::trim) {
        Some(l) if !l.is_empty() => l.to_lowercase(),
        _ => UNKNOWN_LANGUAGE.to_string(),
    }
}
