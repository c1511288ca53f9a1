use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const DESCRIPTION_MAX_CHARS: usize = 2000;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Cleans a catalog description: drops HTML tags, `(Source: ...)` and
/// `[Written by ...]` credits, decodes entities and collapses whitespace.
///
/// Descriptions longer than 2000 characters are cut to 1997 plus `...`.
#[must_use]
pub fn clean_description(raw: Option<&str>) -> Option<String> {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    static SOURCE: OnceLock<Regex> = OnceLock::new();
    static WRITTEN_BY: OnceLock<Regex> = OnceLock::new();

    let raw = raw?;
    let text = get_regex(&TAGS, r"<[^>]+>").replace_all(raw, " ");
    let text = html_escape::decode_html_entities(&text);
    let text = get_regex(&SOURCE, r"\(Source:.*?\)").replace_all(&text, "");
    let text = get_regex(&WRITTEN_BY, r"\[Written by.*?\]").replace_all(&text, "");

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    if collapsed.chars().count() > DESCRIPTION_MAX_CHARS {
        let mut cut: String = collapsed.chars().take(DESCRIPTION_MAX_CHARS - 3).collect();
        cut.push_str("...");
        return Some(cut);
    }

    Some(collapsed)
}

/// Turns `"Family, Given"` into `"Given Family"`. Other names pass through.
#[must_use]
pub fn flip_family_given(name: &str) -> String {
    match name.split_once(", ") {
        Some((family, given)) if !given.trim().is_empty() => {
            format!("{} {}", given.trim(), family.trim())
        }
        _ => name.trim().to_string(),
    }
}

/// Lowercased label with spaces and hyphens turned into underscores, as used
/// for genre, tag and free-text role names.
///
/// ```rust
/// use franchise_sync::parser::text::label;
///
/// assert_eq!(label("Slice of Life"), "slice_of_life");
/// assert_eq!(label("Coming-of-Age"), "coming_of_age");
/// ```
#[must_use]
pub fn label(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Builds a calendar date from a partial catalog date. A missing month or day
/// defaults to 1; a missing year means no date.
#[must_use]
pub fn fuzzy_date(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year?, month.unwrap_or(1), day.unwrap_or(1))
}

/// Maps a catalog language name onto a short language tag.
#[must_use]
pub fn language_code(language: Option<&str>) -> String {
    match language.map(str::trim) {
        None | Some("" | "Japanese") => "ja".to_string(),
        Some("English") => "en".to_string(),
        Some("Korean") => "ko".to_string(),
        Some("Mandarin" | "Chinese") => "zh".to_string(),
        Some("Spanish") => "es".to_string(),
        Some("French") => "fr".to_string(),
        Some("German") => "de".to_string(),
        Some("Italian") => "it".to_string(),
        Some("Portuguese" | "Portuguese (BR)") => "pt".to_string(),
        Some(other) => label(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_description_strips_markup() {
        let raw = "Tanjiro sets out.<br><br>\n(Source: Crunchyroll)  <i>Note</i> &amp; more [Written by MAL Rewrite]";
        assert_eq!(
            clean_description(Some(raw)).as_deref(),
            Some("Tanjiro sets out. Note & more")
        );
    }

    #[test]
    fn test_clean_description_empty() {
        assert_eq!(clean_description(None), None);
        assert_eq!(clean_description(Some("  <br> ")), None);
    }

    #[test]
    fn test_clean_description_truncates() {
        let long = "x".repeat(2500);
        let cleaned = clean_description(Some(&long)).unwrap();
        assert_eq!(cleaned.chars().count(), 2000);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_flip_family_given() {
        assert_eq!(flip_family_given("Hanae, Natsuki"), "Natsuki Hanae");
        assert_eq!(flip_family_given("Natsuki Hanae"), "Natsuki Hanae");
        assert_eq!(flip_family_given("LiSA"), "LiSA");
    }

    #[test]
    fn test_fuzzy_date_defaults() {
        assert_eq!(fuzzy_date(Some(2019), None, None), NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(fuzzy_date(Some(2019), Some(4), Some(6)), NaiveDate::from_ymd_opt(2019, 4, 6));
        assert_eq!(fuzzy_date(None, Some(4), Some(6)), None);
        assert_eq!(fuzzy_date(Some(2019), Some(13), None), None);
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code(Some("Japanese")), "ja");
        assert_eq!(language_code(Some("English")), "en");
        assert_eq!(language_code(Some("Korean")), "ko");
        assert_eq!(language_code(None), "ja");
        assert_eq!(language_code(Some("Hebrew")), "hebrew");
    }
}
