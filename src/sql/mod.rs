//! SQL output for the downstream catalog schema.
//!
//! The schema is owned elsewhere; this module only renders idempotent upserts
//! for it, so re-running a franchise is the update path.

mod emitter;

pub use emitter::render;

use serde_json::Value;

/// Escapes a string for a single-quoted SQL literal.
///
/// ```rust
/// use franchise_sync::sql::escape;
///
/// assert_eq!(escape("Jojo's \\ Bizarre"), "Jojo''s \\\\ Bizarre");
/// ```
#[must_use]
pub fn escape(value: &str) -> String {
    value.replace('\'', "''").replace('\\', "\\\\")
}

#[must_use]
pub fn quote(value: &str) -> String {
    format!("'{}'", escape(value))
}

/// Quoted literal, or `NULL` for a missing or empty value.
#[must_use]
pub fn quote_opt(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .map_or_else(|| "NULL".to_string(), quote)
}

/// `ARRAY[...]` of quoted strings, or `NULL` when empty.
#[must_use]
pub fn text_array(values: &[String]) -> String {
    if values.is_empty() {
        return "NULL".to_string();
    }
    let items: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("ARRAY[{}]", items.join(", "))
}

/// JSON literal cast to `jsonb`. JSON carries its own backslash escapes, so
/// only quotes are doubled.
#[must_use]
pub fn jsonb(value: &Value) -> String {
    format!("'{}'::jsonb", value.to_string().replace('\'', "''"))
}

/// Text safe to place after `--`. Any control character would end the line
/// comment early, so each one becomes a space.
///
/// ```rust
/// use franchise_sync::sql::comment_text;
///
/// assert_eq!(comment_text("Evil\rDROP TABLE entries;"), "Evil DROP TABLE entries;");
/// ```
#[must_use]
pub fn comment_text(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Cuts `value` to at most `max` characters.
#[must_use]
pub fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_opt() {
        assert_eq!(quote_opt(Some("O'Brien")), "'O''Brien'");
        assert_eq!(quote_opt(Some("")), "NULL");
        assert_eq!(quote_opt(None), "NULL");
    }

    #[test]
    fn test_text_array() {
        assert_eq!(text_array(&[]), "NULL");
        assert_eq!(
            text_array(&["進撃の巨人".to_string(), "AoT's".to_string()]),
            "ARRAY['進撃の巨人', 'AoT''s']"
        );
    }

    #[test]
    fn test_jsonb_keeps_json_escapes() {
        let value = json!({ "name": "it's \"quoted\"" });
        assert_eq!(jsonb(&value), r#"'{"name":"it''s \"quoted\""}'::jsonb"#);
    }

    #[test]
    fn test_comment_text_strips_line_breaks() {
        assert_eq!(comment_text("a\r\nb\u{2028}c\u{85}d"), "a  b\u{2028}c d");
        assert_eq!(comment_text("Frieren"), "Frieren");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("鬼滅の刃", 2), "鬼滅");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
