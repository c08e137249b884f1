//! Station code reconciliation.
//!
//! The static graph and the live endpoints spell the same physical stop in
//! different ways: `T308/1`, `T308_1` and `t308-1` are one stop, and some
//! sources drop the pole suffix entirely (`T308`). This module normalizes
//! codes and matches them against an index of known stops.

use std::collections::HashMap;

use serde::Serialize;

/// Canonical separator between a base station code and its pole suffix.
pub const SEPARATOR: char = '/';

/// Normalize a station code: trim, uppercase, and map `/`, `_`, `-` to `/`.
///
/// Normalization is idempotent.
///
/// ```
/// use bus_tracker::resolve::normalize_code;
///
/// assert_eq!(normalize_code(" t308_1 "), "T308/1");
/// assert_eq!(normalize_code("T308-1"), "T308/1");
/// assert_eq!(normalize_code(&normalize_code("T308_1")), "T308/1");
/// ```
pub fn normalize_code(code: &str) -> String {
    code.trim()
        .chars()
        .map(|c| match c {
            '/' | '_' | '-' => SEPARATOR,
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// The part of a normalized code before the first separator.
pub fn base_code(normalized: &str) -> &str {
    normalized
        .split_once(SEPARATOR)
        .map_or(normalized, |(base, _)| base)
}

/// Which rule produced a match. Earlier variants take priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Codes are equal after normalization.
    Exact,
    /// Codes share the same base once suffixes are stripped.
    Base,
    /// The query matched the stop's secondary alias.
    Alias,
}

/// Outcome of resolving a station code.
///
/// `Unresolved` is deliberately distinct from any stop, so callers can tell
/// "wrong station" apart from "no data".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<K> {
    Resolved { key: K, kind: MatchKind },
    Unresolved,
}

impl<K> Resolution<K> {
    /// The matched key, if any.
    pub fn key(&self) -> Option<&K> {
        match self {
            Resolution::Resolved { key, .. } => Some(key),
            Resolution::Unresolved => None,
        }
    }

    /// Which rule matched, if any.
    pub fn kind(&self) -> Option<MatchKind> {
        match self {
            Resolution::Resolved { kind, .. } => Some(*kind),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Index of known stops, keyed three ways.
///
/// `K` is whatever the caller wants back: a canonical code for the static
/// graph, or a position for a live snapshot. When several stops land on the
/// same index entry they are kept in insertion order and the first one wins
/// for [`StopResolver::resolve`].
#[derive(Debug, Clone)]
pub struct StopResolver<K> {
    exact: HashMap<String, Vec<K>>,
    base: HashMap<String, Vec<K>>,
    alias: HashMap<String, Vec<K>>,
}

impl<K> Default for StopResolver<K> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            base: HashMap::new(),
            alias: HashMap::new(),
        }
    }
}

impl<K: Clone> StopResolver<K> {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stop under its code and optional alias.
    ///
    /// Empty codes are ignored.
    pub fn insert(&mut self, code: &str, alias: Option<&str>, key: K) {
        let normalized = normalize_code(code);
        if normalized.is_empty() {
            return;
        }

        let base = base_code(&normalized).to_string();
        if !base.is_empty() {
            self.base.entry(base).or_default().push(key.clone());
        }

        if let Some(alias) = alias.map(normalize_code).filter(|a| !a.is_empty()) {
            self.alias.entry(alias).or_default().push(key.clone());
        }

        self.exact.entry(normalized).or_default().push(key);
    }

    /// Number of distinct normalized codes indexed.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Resolve a code to a single stop. First matching rule wins.
    pub fn resolve(&self, code: &str) -> Resolution<K> {
        match self.resolve_all(code) {
            Some((kind, keys)) => match keys.first() {
                Some(key) => Resolution::Resolved {
                    key: key.clone(),
                    kind,
                },
                None => Resolution::Unresolved,
            },
            None => Resolution::Unresolved,
        }
    }

    /// Every stop matched by the highest-priority rule that matches at all.
    ///
    /// A location list reporting `T304` without a pole suffix legitimately
    /// covers both `T304/1` and `T304/2`; this returns both.
    pub fn resolve_all(&self, code: &str) -> Option<(MatchKind, &[K])> {
        let normalized = normalize_code(code);
        if normalized.is_empty() {
            return None;
        }
        let base = base_code(&normalized);

        if let Some(keys) = self.exact.get(&normalized) {
            return Some((MatchKind::Exact, keys.as_slice()));
        }

        if !base.is_empty()
            && let Some(keys) = self.base.get(base)
        {
            return Some((MatchKind::Base, keys.as_slice()));
        }

        self.alias
            .get(&normalized)
            .or_else(|| self.alias.get(base))
            .map(|keys| (MatchKind::Alias, keys.as_slice()))
    }
}

impl<'a> FromIterator<&'a str> for StopResolver<usize> {
    /// Index a sequence of codes by position.
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut resolver = StopResolver::new();
        for (idx, code) in iter.into_iter().enumerate() {
            resolver.insert(code, None, idx);
        }
        resolver
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn code() -> impl Strategy<Value = String> {
        "[A-Za-z][0-9]{1,4}([/_-][0-9]{1,2})?"
    }

    proptest! {
        /// Normalizing twice is the same as normalizing once.
        #[test]
        fn normalize_idempotent(s in "[A-Za-z0-9/_ -]{0,12}") {
            let once = normalize_code(&s);
            prop_assert_eq!(normalize_code(&once), once);
        }

        /// Resolving a stop's own canonical code returns that stop.
        #[test]
        fn canonical_code_resolves_to_itself(c in code()) {
            let canonical = normalize_code(&c);
            let mut r = StopResolver::new();
            r.insert(&canonical, None, canonical.clone());
            let res = r.resolve(&canonical);
            prop_assert_eq!(res.key(), Some(&canonical));
            prop_assert_eq!(res.kind(), Some(MatchKind::Exact));
        }

        /// Codes differing only in separator resolve to the same stop.
        #[test]
        fn separator_insensitive(base in "[A-Z][0-9]{1,4}", suffix in "[0-9]{1,2}") {
            let mut r = StopResolver::new();
            r.insert(&format!("{base}/{suffix}"), None, 7usize);
            for sep in ['/', '_', '-'] {
                let res = r.resolve(&format!("{base}{sep}{suffix}"));
                prop_assert_eq!(res.key(), Some(&7));
                prop_assert_eq!(res.kind(), Some(MatchKind::Exact));
            }
        }
    }
}
