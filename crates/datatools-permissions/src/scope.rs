//! Feed-scope grammar: which feeds of a project a `view-feed` grant covers.

use datatools_core::{FeedId, WILDCARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grammar violations in a raw feed scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedScopeError {
    /// The wildcard appeared next to explicit feed ids
    #[error("'*' must be the only entry of a feed scope")]
    MixedWildcard,

    /// An entry is not a valid feed id
    #[error("invalid feed id '{entry}': {reason}")]
    InvalidFeed {
        /// The rejected entry
        entry: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Feeds of one project covered by a grant.
///
/// On the wire a scope is a list of feed ids, with `["*"]` meaning every feed
/// of the project, including feeds created after the grant was issued.
/// Matching is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum FeedScope {
    /// Every feed in the owning project
    All,

    /// Only the listed feeds; an empty list covers nothing
    Only(Vec<FeedId>),
}

impl FeedScope {
    /// Scope that covers nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::Only(Vec::new())
    }

    /// Parse raw scope entries.
    ///
    /// Duplicate ids collapse to their first occurrence.
    pub fn parse<I, S>(entries: I) -> Result<Self, FeedScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wildcard = false;
        let mut feeds: Vec<FeedId> = Vec::new();

        for entry in entries {
            let entry = entry.as_ref();
            if entry == WILDCARD {
                wildcard = true;
                continue;
            }
            let feed = FeedId::new(entry).map_err(|e| FeedScopeError::InvalidFeed {
                entry: entry.to_string(),
                reason: e.to_string(),
            })?;
            if !feeds.contains(&feed) {
                feeds.push(feed);
            }
        }

        match (wildcard, feeds.is_empty()) {
            (true, true) => Ok(Self::All),
            (true, false) => Err(FeedScopeError::MixedWildcard),
            (false, _) => Ok(Self::Only(feeds)),
        }
    }

    /// Whether the scope covers `feed_id`.
    #[must_use]
    pub fn matches(&self, feed_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(feeds) => feeds.iter().any(|feed| feed.as_str() == feed_id),
        }
    }

    /// Whether this is the wildcard scope.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether the scope covers no feed at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(feeds) if feeds.is_empty())
    }

    /// Scope covering every feed either scope covers.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Only(left), Self::Only(right)) => {
                let mut feeds = left.clone();
                for feed in right {
                    if !feeds.contains(feed) {
                        feeds.push(feed.clone());
                    }
                }
                Self::Only(feeds)
            }
        }
    }

    /// Add a feed to an explicit scope. No-op for the wildcard; a feed id
    /// equal to `*` widens the scope to every feed.
    pub fn insert(&mut self, feed: FeedId) {
        if feed.as_str() == WILDCARD {
            *self = Self::All;
            return;
        }
        if let Self::Only(feeds) = self {
            if !feeds.contains(&feed) {
                feeds.push(feed);
            }
        }
    }

    /// Remove a feed from an explicit scope, returning whether it was present.
    ///
    /// The wildcard cannot drop a single feed; callers must narrow it to an
    /// explicit list first.
    pub fn remove(&mut self, feed_id: &str) -> bool {
        match self {
            Self::All => false,
            Self::Only(feeds) => {
                let before = feeds.len();
                feeds.retain(|feed| feed.as_str() != feed_id);
                feeds.len() != before
            }
        }
    }

    /// Raw entries for serialization.
    #[must_use]
    pub fn to_entries(&self) -> Vec<String> {
        match self {
            Self::All => vec![WILDCARD.to_string()],
            Self::Only(feeds) => feeds.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Default for FeedScope {
    fn default() -> Self {
        Self::none()
    }
}

impl TryFrom<Vec<String>> for FeedScope {
    type Error = FeedScopeError;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(entries)
    }
}

impl From<FeedScope> for Vec<String> {
    fn from(scope: FeedScope) -> Self {
        scope.to_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(id: &str) -> FeedId {
        FeedId::new(id).expect("valid feed id")
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let scope = FeedScope::parse(["*"]).expect("wildcard scope");
        assert!(scope.is_all());
        assert!(scope.matches("f1"));
        assert!(scope.matches("created-next-year"));
    }

    #[test]
    fn test_explicit_list_matches_exactly() {
        let scope = FeedScope::parse(["f1", "f2"]).expect("explicit scope");
        assert!(scope.matches("f1"));
        assert!(scope.matches("f2"));
        assert!(!scope.matches("f3"));
        assert!(!scope.matches("f"));
        assert!(!scope.matches("f1-extra"));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let scope = FeedScope::parse(Vec::<String>::new()).expect("empty scope");
        assert!(scope.is_empty());
        assert!(!scope.matches("f1"));
        assert_eq!(scope, FeedScope::none());
    }

    #[test]
    fn test_mixed_wildcard_rejected() {
        let result = FeedScope::parse(["*", "f1"]);
        assert_eq!(result, Err(FeedScopeError::MixedWildcard));
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let result = FeedScope::parse(["f1", ""]);
        assert!(matches!(result, Err(FeedScopeError::InvalidFeed { .. })));

    }

    #[test]
    fn test_only_lone_wildcard_is_special() {
        let scope = FeedScope::parse(["feed*v2", "Night Owl"]).expect("explicit scope");
        assert!(!scope.is_all());
        assert!(scope.matches("feed*v2"));
        assert!(scope.matches("Night Owl"));
        assert!(!scope.matches("feedXv2"));
        assert!(!scope.matches("f1"));
    }

    #[test]
    fn test_insert_wildcard_id_widens() {
        let mut scope = FeedScope::parse(["f1"]).expect("explicit scope");
        scope.insert(FeedId::new("*").expect("non-empty id"));
        assert!(scope.is_all());
    }

    #[test]
    fn test_duplicates_collapse() {
        let scope = FeedScope::parse(["f2", "f1", "f2"]).expect("explicit scope");
        assert_eq!(scope.to_entries(), vec!["f2", "f1"]);
    }

    #[test]
    fn test_union() {
        let left = FeedScope::parse(["f1"]).expect("scope");
        let right = FeedScope::parse(["f2", "f1"]).expect("scope");
        assert_eq!(left.union(&right).to_entries(), vec!["f1", "f2"]);
        assert!(left.union(&FeedScope::All).is_all());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut scope = FeedScope::none();
        scope.insert(feed("f1"));
        scope.insert(feed("f1"));
        assert_eq!(scope.to_entries(), vec!["f1"]);

        assert!(scope.remove("f1"));
        assert!(!scope.remove("f1"));
        assert!(scope.is_empty());

        let mut all = FeedScope::All;
        all.insert(feed("f9"));
        assert!(all.is_all());
        assert!(!all.remove("f9"));
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_string(&FeedScope::All).expect("serialize scope");
        assert_eq!(json, r#"["*"]"#);

        let parsed: FeedScope = serde_json::from_str(r#"["a","b"]"#).expect("deserialize scope");
        assert_eq!(parsed.to_entries(), vec!["a", "b"]);

        assert!(serde_json::from_str::<FeedScope>(r#"["*","a"]"#).is_err());
    }
}
