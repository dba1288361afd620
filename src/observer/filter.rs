//! Kind filter and text search over delivered events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{Event, EventKind, UnknownEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(EventKind),
}

impl KindFilter {
    pub fn admits(&self, kind: EventKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(only) => *only == kind,
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindFilter::All => f.write_str("all"),
            KindFilter::Only(kind) => kind.fmt(f),
        }
    }
}

/// Accepts `all` (or an empty string) and any event kind name.
impl FromStr for KindFilter {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(KindFilter::All);
        }
        s.parse().map(KindFilter::Only)
    }
}

/// Current filter state of one observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default, with = "kind_filter_str")]
    pub kind: KindFilter,
    #[serde(default)]
    pub search: String,
}

impl FilterState {
    pub fn new(kind: KindFilter, search: impl Into<String>) -> Self {
        Self {
            kind,
            search: search.into(),
        }
    }

    /// Visible iff the kind is admitted and, with a non-empty search, the URL
    /// or payload contains it case-insensitively.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.kind.admits(event.kind()) {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        event.url.to_lowercase().contains(&needle)
            || event
                .payload()
                .is_some_and(|p| p.to_lowercase().contains(&needle))
    }
}

mod kind_filter_str {
    use super::KindFilter;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(kind: &KindFilter, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(kind)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<KindFilter, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}
