pub const USER_AGENT: &str = concat!("franchise-sync/", env!("CARGO_PKG_VERSION"));

pub mod thresholds {
    /// Franchise-name similarity a season candidate needs during reconciliation.
    pub const SEASON_FRANCHISE_MATCH: f64 = 60.0;

    /// Specials carry long idiosyncratic titles, so they get a looser check.
    pub const SPECIAL_FRANCHISE_MATCH: f64 = 40.0;

    pub const SEASON_ACCEPT: i32 = 60;

    pub const SPECIAL_SEASON_ACCEPT: i32 = 55;

    pub const SERIES_ACCEPT: f64 = 70.0;

    pub const TRAVERSAL_KEYWORD_MATCH: f64 = 85.0;
}

pub mod scoring {
    pub const SEASON_BASE: i32 = 50;

    pub const POINT_INSIDE_SPAN: i32 = 15;

    pub const LONG_OVERLAP: i32 = 20;

    pub const SHORT_OVERLAP: i32 = 10;

    pub const LONG_OVERLAP_DAYS: i64 = 30;

    pub const SHORT_OVERLAP_DAYS: i64 = 7;

    pub const SHORT_SPECIAL: i32 = 5;

    pub const SHORT_SPECIAL_MAX_EPISODES: u32 = 2;

    pub const EPISODES_CLOSE: i32 = 15;

    pub const EPISODES_NEAR: i32 = 5;

    pub const SAME_YEAR: f64 = 8.0;

    pub const FIRST_AIRED_NEAR: f64 = 5.0;

    pub const FIRST_AIRED_NEAR_DAYS: i64 = 90;

    pub const FORMAT_MISMATCH: f64 = -20.0;
}

pub mod limits {
    /// Minimum tag rank kept on a Work.
    pub const MIN_TAG_RANK: u32 = 70;

    pub const MAX_SEARCH_RESULTS: usize = 10;
}
