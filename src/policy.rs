//! Policy tables for credits.
//!
//! Catalogs list dozens of low-signal production roles per entry. Only the
//! roles that identify who made a work are kept as creator credits.

use crate::models::franchise::CompanyRole;
use crate::parser::text::label;
use regex::Regex;
use std::sync::OnceLock;

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Substrings that drop a staff role.
pub const CREATOR_ROLE_BLACKLIST: &[&str] = &[
    "assistant producer",
    "associate producer",
    "planning producer",
    "planning",
    "production manager",
    "production assistant",
    "production coordination",
    "2nd key animation",
    "in-between animation",
    "layout",
    "art design",
    "background art",
    "color design",
    "color setting",
    "photography",
    "composition",
    "arrangement",
    "lyrics",
    "sound effects",
    "recording engineer",
    "adr script",
    "cg animation",
    "prop design",
    "special effects",
    "publicity",
    "editing",
    "finishing",
    "endcard",
    "talent coordination",
];

pub const COMPANY_ROLE_BLACKLIST: &[&str] = &["other", "licensor"];

/// Staff role substrings and their canonical labels, most specific first.
const STAFF_ROLES: &[(&str, &str)] = &[
    ("chief animation director", "chief_animation_director"),
    ("chief director", "chief_director"),
    ("animation director", "animation_director"),
    ("art director", "art_director"),
    ("sound director", "sound_director"),
    ("director", "director"),
    ("original creator", "original_creator"),
    ("original story", "original_story"),
    ("series composition", "series_composition"),
    ("screenplay", "screenplay"),
    ("script", "script"),
    ("storyboard", "storyboard"),
    ("character design", "character_design"),
    ("key animation", "key_animation"),
    ("music", "music"),
    ("producer", "producer"),
];

/// Lowercases a catalog role and drops episode ranges and other
/// parenthesized notes.
fn bare_role(role: &str) -> String {
    static NOTES: OnceLock<Regex> = OnceLock::new();
    let stripped = get_regex(&NOTES, r"\s*\([^)]*\)").replace_all(role, "");
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps a catalog staff role onto the credit label it is stored under.
///
/// Known roles map to their canonical label, matched by substring with the
/// most specific role first. A blacklisted substring drops the role unless it
/// sits inside the canonical role that matched, so "Series Composition" is
/// kept while "2nd Key Animation" is not. Unmapped roles keep a snake_case
/// label of their own.
///
/// ```rust
/// use franchise_sync::policy::staff_role;
///
/// assert_eq!(staff_role("Director (eps 1-13)").as_deref(), Some("director"));
/// assert_eq!(staff_role("Series Composition").as_deref(), Some("series_composition"));
/// assert_eq!(staff_role("Theme Song Performance").as_deref(), Some("theme_song_performance"));
/// assert_eq!(staff_role("2nd Key Animation"), None);
/// ```
#[must_use]
pub fn staff_role(role: &str) -> Option<String> {
    let bare = bare_role(role);
    if bare.is_empty() {
        return None;
    }

    let canonical = STAFF_ROLES.iter().find(|(key, _)| bare.contains(key));

    let blocked = CREATOR_ROLE_BLACKLIST.iter().any(|term| {
        bare.contains(term) && canonical.is_none_or(|(key, _)| !key.contains(term))
    });
    if blocked {
        return None;
    }

    match canonical {
        Some((_, canonical)) => Some((*canonical).to_string()),
        None => Some(label(&bare)).filter(|l| !l.is_empty()),
    }
}

#[must_use]
pub fn company_role_allowed(role: CompanyRole) -> bool {
    !COMPANY_ROLE_BLACKLIST.contains(&role.as_str())
}
