//! Version placeholder tokens.
//!
//! Template text may embed either token any number of times. Substitution is
//! literal: no pattern syntax, no partial matches.

/// Replaced with the tag that opens the version interval.
pub const PLACEHOLDER_PREVIOUS_VERSION: &str = "@PREVIOUS_VERSION@";
/// Replaced with the tag that closes the version interval.
pub const PLACEHOLDER_CURRENT_VERSION: &str = "@CURRENT_VERSION@";

/// The resolved `(previous, current)` labels for one version interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionPair {
    pub previous: String,
    pub current: String,
}

impl VersionPair {
    pub fn new(previous: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            previous: previous.into(),
            current: current.into(),
        }
    }

    /// Substitute both tokens in `input`.
    pub fn apply(&self, input: &str) -> String {
        input
            .replace(PLACEHOLDER_PREVIOUS_VERSION, &self.previous)
            .replace(PLACEHOLDER_CURRENT_VERSION, &self.current)
    }
}

impl std::fmt::Display for VersionPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.previous, self.current)
    }
}
