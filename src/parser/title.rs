use crate::matching::name::NameMatcher;
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

const SLUG_MAX_LEN: usize = 80;

/// Words that mark a post-colon subtitle as an arc of the same series.
pub const ARC_MARKERS: &[&str] = &["arc", "cour", "chapter", "hen"];

/// Romanized native-title fragments that mark a post-colon subtitle as an
/// alias of the pre-colon title rather than a new release.
pub const NATIVE_ALIAS_MARKERS: &[&str] = &["kimetsu", "yaiba", "shingeki", "kyojin"];

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_punctuation(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect()
}

/// Maps ordinal words, ordinal suffixes and the roman numerals ii-iv to digits.
fn number_token(token: &str) -> Option<&'static str> {
    match token {
        "1st" | "first" => Some("1"),
        "2nd" | "second" | "iird" => Some("2"),
        "3rd" | "third" | "iiird" => Some("3"),
        "4th" | "fourth" => Some("4"),
        "5th" | "fifth" => Some("5"),
        "ii" => Some("2"),
        "iii" => Some("3"),
        "iv" => Some("4"),
        _ => None,
    }
}

fn is_filler(token: &str) -> bool {
    matches!(token, "the" | "no" | "of" | "a" | "an")
}

/// Normalizes a title for franchise comparison.
///
/// Lowercases, drops `Part N` / `Season N` / `Nth Season` markers and
/// parentheticals, strips punctuation, turns ordinal words and small roman
/// numerals into digits, and drops filler words.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    static SEASON_MARKERS: OnceLock<Regex> = OnceLock::new();
    static PARENTHETICAL: OnceLock<Regex> = OnceLock::new();

    let lower = title.to_lowercase();
    let without_markers = get_regex(
        &SEASON_MARKERS,
        r"\b(?:part\s*[ivxlc\d]+|season\s*\d+|\d+(?:st|nd|rd|th)\s+season)\b",
    )
    .replace_all(&lower, "");
    let without_parens = get_regex(&PARENTHETICAL, r"\([^)]*\)").replace_all(&without_markers, "");
    let bare = strip_punctuation(&without_parens);

    bare.split_whitespace()
        .filter(|token| !is_filler(token))
        .map(|token| number_token(token).unwrap_or(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips season tails and trailing arc names from an already normalized title.
///
/// `"attack on titan final season the final chapters"` becomes
/// `"attack on titan"`; `"demon slayer kimetsu yaiba entertainment district arc"`
/// becomes `"demon slayer"`.
#[must_use]
pub fn strip_arc_subtitle(title: &str) -> String {
    static TAILS: OnceLock<Vec<Regex>> = OnceLock::new();
    static ARC_NAME: OnceLock<Regex> = OnceLock::new();

    let tails = TAILS.get_or_init(|| {
        vec![
            Regex::new(r"\s+final\s+season.*$").expect("Invalid Regex"),
            Regex::new(r"\s+\d+(?:st|nd|rd|th)\s+season.*$").expect("Invalid Regex"),
            Regex::new(r"\s+season\s+\d+.*$").expect("Invalid Regex"),
            Regex::new(r"\s+part\s+[ivxlc\d]+.*$").expect("Invalid Regex"),
            Regex::new(r"\s+cour\s+\d+.*$").expect("Invalid Regex"),
        ]
    });

    let mut result = title.to_string();
    for pattern in tails {
        result = pattern.replace(&result, "").to_string();
    }

    let result = get_regex(&ARC_NAME, r"\s+(?:\w+\s+){0,4}arc\s*$").replace(&result, "");
    result.trim().to_string()
}

fn word_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}

/// Strips season and part markers from a post-colon subtitle, leaving only
/// whatever names a distinct release.
fn subtitle_core(subtitle: &str) -> String {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)\b\d*(?:st|nd|rd|th)?\s*season\b.*$").expect("Invalid Regex"),
            Regex::new(r"(?i)\bseason\s*\d+\b.*$").expect("Invalid Regex"),
            Regex::new(r"(?i)\bpart\s*[ivxlc\d]+\b.*$").expect("Invalid Regex"),
        ]
    });

    let mut core = subtitle.to_string();
    for pattern in patterns {
        core = pattern.replace(&core, "").trim().to_string();
    }
    core
}

/// How the text after a colon relates to the title before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleKind {
    /// Arc, cour or chapter name of the same series.
    Arc,
    /// Romanized native-title alias of the pre-colon title.
    NativeAlias,
    /// Nothing but a season or part marker.
    SeasonMarker,
    /// A multi-word subtitle naming a separate release.
    Distinct,
    /// A short suffix that carries no grouping signal.
    Minor,
}

/// Classifies the post-colon part of a title.
#[must_use]
pub fn classify_subtitle(subtitle: &str) -> SubtitleKind {
    let lower = subtitle.trim().to_lowercase();
    let has_marker = |markers: &[&str]| word_tokens(&lower).any(|t| markers.contains(&t));

    if has_marker(ARC_MARKERS) {
        return SubtitleKind::Arc;
    }
    if has_marker(NATIVE_ALIAS_MARKERS) {
        return SubtitleKind::NativeAlias;
    }

    let core = subtitle_core(&lower);
    if core.is_empty() {
        SubtitleKind::SeasonMarker
    } else if core.split_whitespace().count() >= 2 {
        SubtitleKind::Distinct
    } else {
        SubtitleKind::Minor
    }
}

/// Grouping key for a TV entry. Entries sharing a key are seasons of one Work.
///
/// ```rust
/// use franchise_sync::parser::title::tv_group_key;
///
/// assert_eq!(tv_group_key("Show"), tv_group_key("Show Part 2"));
/// assert_eq!(tv_group_key("Show"), tv_group_key("Show: Arc Name"));
/// assert_ne!(
///     tv_group_key("Fate/stay night"),
///     tv_group_key("Fate/stay night: Unlimited Blade Works"),
/// );
/// ```
#[must_use]
pub fn tv_group_key(title: &str) -> String {
    let clean = title.replace('/', " ");
    let stripped = strip_arc_subtitle(&normalize_title(&clean));

    let Some((pre, post)) = clean.split_once(':') else {
        return stripped;
    };

    let pre_key = strip_arc_subtitle(&normalize_title(pre.trim()));
    if pre_key.is_empty() {
        return stripped;
    }

    match classify_subtitle(post) {
        SubtitleKind::Distinct => stripped,
        SubtitleKind::Arc
        | SubtitleKind::NativeAlias
        | SubtitleKind::SeasonMarker
        | SubtitleKind::Minor => pre_key,
    }
}

/// Keywords that bound relation-graph traversal to one franchise.
///
/// ```rust
/// use franchise_sync::parser::title::extract_franchise_keywords;
///
/// let keywords = extract_franchise_keywords("Fate/stay night: Unlimited Blade Works");
/// assert_eq!(keywords, vec!["fate stay night", "fate", "unlimited blade works"]);
/// ```
#[must_use]
pub fn extract_franchise_keywords(title: &str) -> Vec<String> {
    static BASE_SPLIT: OnceLock<Regex> = OnceLock::new();
    static TRAILING_NUMBER: OnceLock<Regex> = OnceLock::new();

    let clean = title.replace('/', " ");
    let base = get_regex(&BASE_SPLIT, r"[:\-–—]")
        .split(&clean)
        .next()
        .unwrap_or_default()
        .trim();
    let normalized = normalize_title(base);

    let mut keywords: Vec<String> = Vec::new();
    let mut push = |keyword: String| {
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    };

    if !normalized.is_empty() {
        let core = get_regex(&TRAILING_NUMBER, r"\s*\d+\s*$")
            .replace(&normalized, "")
            .trim()
            .to_string();
        push(normalized.clone());
        if core != normalized && core.chars().count() >= 3 {
            push(core);
        }
    }

    if let Some((brand, _)) = title.split_once('/') {
        let brand = brand.trim().to_lowercase();
        if brand.chars().count() >= 3 {
            push(brand);
        }
    }

    if let Some((_, subtitle)) = title.split_once(':') {
        let sub = normalize_title(subtitle.trim());
        if sub.chars().count() > 3 {
            push(sub);
        }
    }

    keywords
}

/// Whether any of a work's titles contains one of the franchise keywords.
///
/// English and romaji titles are compared in normalized form; the native title
/// is compared as written.
#[must_use]
pub fn titles_match_franchise(
    english: Option<&str>,
    romaji: Option<&str>,
    native: Option<&str>,
    keywords: &[String],
) -> bool {
    let eng = normalize_title(&english.unwrap_or_default().replace('/', " "));
    let rom = normalize_title(&romaji.unwrap_or_default().replace('/', " "));
    let native = native.unwrap_or_default();

    keywords.iter().any(|kw| {
        !kw.is_empty() && (eng.contains(kw.as_str()) || rom.contains(kw.as_str()) || native.contains(kw.as_str()))
    })
}

/// Whether an episode-database entry belongs to the franchise, judged by any
/// of its name variants.
///
/// Accepts a fuzzy score of at least 70, the slash-brand prefix written with its
/// slash (`Fate/` matches `Fate/Zero`), or the franchise words appearing as a
/// contiguous phrase.
#[must_use]
pub fn belongs_to_franchise(names: &[&str], franchise_name: &str, matcher: &NameMatcher) -> bool {
    let flatten = |s: &str| s.to_lowercase().replace(['/', ':', '-'], " ");

    let franchise_words: Vec<String> = flatten(franchise_name)
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();
    if franchise_words.is_empty() {
        return false;
    }
    let phrase = franchise_words.join(" ");
    let brand_prefix = franchise_name
        .split_once('/')
        .map(|(brand, _)| brand.to_lowercase());

    names.iter().filter(|n| !n.is_empty()).any(|name| {
        if matcher.score(franchise_name, name) >= 70.0 {
            return true;
        }

        let lower = name.to_lowercase();
        if let Some(brand) = &brand_prefix
            && (lower.contains(&format!("{brand}/")) || lower.contains(&format!("{brand} /")))
        {
            return true;
        }

        collapse_whitespace(&flatten(name)).contains(&phrase)
    })
}

/// Removes a `(TV)` format annotation before a title becomes a slug.
#[must_use]
pub fn strip_format_annotation(title: &str) -> String {
    static TV_TAG: OnceLock<Regex> = OnceLock::new();
    let stripped = get_regex(&TV_TAG, r"\s*\((?:TV|tv)\)\s*").replace_all(title, " ");
    collapse_whitespace(&stripped)
}

/// URL-safe slug. Non-ASCII characters without an ASCII decomposition are
/// dropped; an empty result becomes `unknown`.
///
/// ```rust
/// use franchise_sync::parser::title::slugify;
///
/// assert_eq!(slugify("My Dress-Up Darling"), "my-dress-up-darling");
/// assert_eq!(slugify("Fate/Zero"), "fate-zero");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let ascii: String = text
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase()
        .replace(['/', '\\'], "-");

    let kept: String = ascii
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut pending_dash = false;
    for c in kept.chars() {
        if c == '-' || c.is_whitespace() {
            pending_dash = !slug.is_empty();
        } else {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(c);
        }
    }

    slug.truncate(SLUG_MAX_LEN);
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}
