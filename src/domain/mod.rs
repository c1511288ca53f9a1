//! Domain primitives shared by the catalogs and the resolution core.
//!
//! Each catalog numbers its records independently, so every external ID gets
//! its own newtype. Mixing an `AniList` ID with a MAL ID is a compile error
//! rather than a silent mismatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

external_id!(
    /// Media ID in the `AniList` GraphQL catalog.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use franchise_sync::domain::AnilistId;
    ///
    /// let id = AnilistId::new(16498);
    /// assert_eq!(id.value(), 16498);
    /// assert_eq!(id.to_string(), "16498");
    /// ```
    AnilistId
);

external_id!(
    /// Media ID in the `MyAnimeList` catalog, served through Jikan.
    MalId
);

external_id!(
    /// Series ID in the TVDB episode database.
    TvdbId
);

/// Identifies the catalog a record or field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataProvider {
    Anilist,
    Jikan,
    Tvdb,
}

impl MetadataProvider {
    /// Returns the string representation of the provider.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use franchise_sync::domain::MetadataProvider;
    ///
    /// assert_eq!(MetadataProvider::Jikan.as_str(), "jikan");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anilist => "anilist",
            Self::Jikan => "jikan",
            Self::Tvdb => "tvdb",
        }
    }
}

impl fmt::Display for MetadataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every external ID folded into one canonical Work.
///
/// The set only ever grows: merging two records unions their IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIds {
    pub anilist: BTreeSet<AnilistId>,
    pub mal: BTreeSet<MalId>,
    pub tvdb: Option<TvdbId>,
}

impl SourceIds {
    #[must_use]
    pub fn from_anilist(id: AnilistId, mal: Option<MalId>) -> Self {
        let mut ids = Self::default();
        ids.anilist.insert(id);
        ids.mal.extend(mal);
        ids
    }

    /// Unions `other` into `self`. An existing TVDB ID is never replaced.
    pub fn merge(&mut self, other: &Self) {
        self.anilist.extend(other.anilist.iter().copied());
        self.mal.extend(other.mal.iter().copied());
        if self.tvdb.is_none() {
            self.tvdb = other.tvdb;
        }
    }

    #[must_use]
    pub fn contains_anilist(&self, id: AnilistId) -> bool {
        self.anilist.contains(&id)
    }
}
