//! Pattern matching for event names.
//!
//! A pattern is split into segments by the configured delimiter. Besides
//! literal text a pattern may contain:
//!
//! - `*` alone: matches any candidate name.
//! - `*` as a segment: matches exactly one segment.
//! - `*` inside a segment (`user*`): matches any text within that segment.
//! - `**` anywhere: the whole pattern is matched against the whole name, `**`
//!   standing for any run of characters including delimiters. Other
//!   characters, a lone `*` included, are literal in this mode.
//!
//! Patterns are compiled once at registration and reused for every emission.

use regex::Regex;
use tracing::warn;

use crate::config::EmitterConfig;

/// Single-level wildcard token.
pub const SINGLE_WILDCARD: &str = "*";

/// Multi-level wildcard token.
pub const MULTI_WILDCARD: &str = "**";

/// Settings that affect how patterns are compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOptions {
    /// Segment separator.
    pub delimiter: String,
    /// Whether wildcard tokens are honoured.
    pub use_wildcards: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::from(&EmitterConfig::default())
    }
}

impl From<&EmitterConfig> for MatchOptions {
    fn from(config: &EmitterConfig) -> Self {
        Self {
            delimiter: config.delimiter.clone(),
            use_wildcards: config.use_wildcards,
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Any,
    Glob(Regex),
}

impl Segment {
    fn compile(raw: &str) -> Self {
        if raw == SINGLE_WILDCARD {
            return Segment::Any;
        }
        if !raw.contains('*') {
            return Segment::Literal(raw.to_string());
        }
        match glob_regex(raw.split('*')) {
            Ok(regex) => Segment::Glob(regex),
            Err(err) => {
                warn!(segment = raw, error = %err, "failed to compile segment, matching literally");
                Segment::Literal(raw.to_string())
            }
        }
    }

    fn matches(&self, part: &str) -> bool {
        match self {
            Segment::Literal(text) => text == part,
            Segment::Any => true,
            Segment::Glob(regex) => regex.is_match(part),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    CatchAll,
    MultiLevel(Regex),
    Segments(Vec<Segment>),
}

/// A compiled subscription pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    delimiter: String,
    matcher: Matcher,
}

impl Pattern {
    /// Compiles `raw` under the given options.
    pub fn compile(raw: &str, options: &MatchOptions) -> Self {
        Self {
            raw: raw.to_string(),
            delimiter: options.delimiter.clone(),
            matcher: compile_matcher(raw, options),
        }
    }

    /// Returns the pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the pattern contains an active wildcard.
    pub fn is_wildcard(&self) -> bool {
        !matches!(self.matcher, Matcher::Exact)
    }

    /// Returns true if the concrete event `name` matches this pattern.
    pub fn matches(&self, name: &str) -> bool {
        if self.raw == name {
            return true;
        }

        match &self.matcher {
            Matcher::Exact => false,
            Matcher::CatchAll => true,
            Matcher::MultiLevel(regex) => regex.is_match(name),
            Matcher::Segments(segments) => {
                let parts: Vec<&str> = name.split(self.delimiter.as_str()).collect();
                parts.len() == segments.len()
                    && segments
                        .iter()
                        .zip(parts)
                        .all(|(segment, part)| segment.matches(part))
            }
        }
    }

    /// Pattern-against-query test used by lookups and removal.
    ///
    /// A query that carries a wildcard token only matches an identical
    /// pattern; any other query is treated as a concrete name.
    pub fn overlaps(&self, query: &str) -> bool {
        if has_wildcard(query) {
            self.raw == query
        } else {
            self.matches(query)
        }
    }
}

/// Returns true if `name` contains a wildcard token.
pub fn has_wildcard(name: &str) -> bool {
    name.contains('*')
}

/// Returns true if the concrete `name` matches `pattern`.
///
/// Compiles the pattern on every call; registered patterns are compiled once
/// and matched through [`Pattern::matches`] instead.
pub fn matches(name: &str, pattern: &str, options: &MatchOptions) -> bool {
    Pattern::compile(pattern, options).matches(name)
}

fn compile_matcher(raw: &str, options: &MatchOptions) -> Matcher {
    if !options.use_wildcards || !has_wildcard(raw) {
        return Matcher::Exact;
    }
    if raw == SINGLE_WILDCARD {
        return Matcher::CatchAll;
    }

    if raw.contains(MULTI_WILDCARD) {
        return match glob_regex(raw.split(MULTI_WILDCARD)) {
            Ok(regex) => Matcher::MultiLevel(regex),
            Err(err) => {
                warn!(pattern = raw, error = %err, "failed to compile pattern, matching exactly");
                Matcher::Exact
            }
        };
    }

    Matcher::Segments(
        raw.split(options.delimiter.as_str())
            .map(Segment::compile)
            .collect(),
    )
}

/// Anchored regex matching the literal pieces joined by "any characters".
fn glob_regex<'a>(pieces: impl Iterator<Item = &'a str>) -> Result<Regex, regex::Error> {
    let body = pieces.map(regex::escape).collect::<Vec<_>>().join(".*");
    Regex::new(&format!("(?s)^{}$", body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> MatchOptions {
        MatchOptions::default()
    }

    fn dotted() -> MatchOptions {
        MatchOptions {
            delimiter: ".".to_string(),
            use_wildcards: true,
        }
    }

    #[test]
    fn test_exact_match() {
        assert!(matches("user:created", "user:created", &opts()));
        assert!(!matches("user:created", "user:updated", &opts()));
        assert!(matches("", "", &opts()));
    }

    #[test]
    fn test_catch_all() {
        assert!(matches("anything", "*", &opts()));
        assert!(matches("user:profile:created", "*", &opts()));
        assert!(matches("", "*", &opts()));
    }

    #[test]
    fn test_single_level_wildcard() {
        let pattern = Pattern::compile("user:*", &opts());
        assert!(pattern.is_wildcard());
        assert!(pattern.matches("user:created"));
        assert!(pattern.matches("user:updated"));
        assert!(!pattern.matches("user:profile:created"));
        assert!(!pattern.matches("admin:created"));
        assert!(!pattern.matches("user"));
    }

    #[test]
    fn test_single_level_wildcard_in_middle() {
        let pattern = Pattern::compile("user:*:login", &opts());
        assert!(pattern.matches("user:normal:login"));
        assert!(pattern.matches("user:admin:login"));
        assert!(!pattern.matches("admin:normal:login"));
        assert!(!pattern.matches("user:login"));

        let pattern = Pattern::compile("*:created", &opts());
        assert!(pattern.matches("admin:created"));
        assert!(pattern.matches("user:created"));
        assert!(!pattern.matches("admin:updated"));
        assert!(!pattern.matches("user:profile:created"));
    }

    #[test]
    fn test_segment_count_must_match() {
        let pattern = Pattern::compile("user:profile:*", &opts());
        assert!(!pattern.matches("user"));
        assert!(!pattern.matches("user:profile"));
        assert!(!pattern.matches("user:profile:settings:extra"));
        assert!(!pattern.matches("admin:profile:settings"));
        assert!(!pattern.matches("user:settings:profile"));
        assert!(pattern.matches("user:profile:settings"));
    }

    #[test]
    fn test_partial_segment_wildcard() {
        let pattern = Pattern::compile("user*:created", &opts());
        assert!(pattern.matches("user:created"));
        assert!(pattern.matches("users:created"));
        assert!(pattern.matches("user_admin:created"));
        assert!(!pattern.matches("admin:created"));
        assert!(!pattern.matches("users:profile:created"));
    }

    #[test]
    fn test_partial_segment_escapes_regex_characters() {
        let pattern = Pattern::compile("v1.*(beta)", &opts());
        assert!(pattern.matches("v1.2(beta)"));
        assert!(!pattern.matches("v1x2(beta)"));
        assert!(!pattern.matches("v1.2beta"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let pattern = Pattern::compile("user:**", &opts());
        assert!(pattern.matches("user:login"));
        assert!(pattern.matches("user:profile:created"));
        assert!(pattern.matches("user:settings:privacy:updated"));
        assert!(!pattern.matches("admin:login"));

        let pattern = Pattern::compile("**:created", &opts());
        assert!(pattern.matches("admin:created"));
        assert!(pattern.matches("user:profile:created"));
        assert!(!pattern.matches("admin:updated"));
    }

    #[test]
    fn test_multi_level_alone_matches_everything() {
        let pattern = Pattern::compile("**", &opts());
        assert!(pattern.matches("test1"));
        assert!(pattern.matches("user:created"));
        assert!(pattern.matches(""));
    }

    #[test]
    fn test_multi_level_treats_single_star_literally() {
        let pattern = Pattern::compile("**:*", &opts());
        assert!(pattern.matches("user:*"));
        assert!(!pattern.matches("user:created"));
    }

    #[test]
    fn test_custom_delimiter() {
        assert!(matches("user.login", "user.*", &dotted()));
        assert!(!matches("user.profile.created", "user.*", &dotted()));
        assert!(matches("other.created", "*.created", &dotted()));
        assert!(matches("user.settings.privacy.updated", "user.**", &dotted()));
        assert!(!matches("admin.login", "user.**", &dotted()));
        // ':' is plain text under a '.' delimiter
        assert!(!matches("user:login", "user.*", &dotted()));
    }

    #[test]
    fn test_wildcards_disabled() {
        let options = MatchOptions {
            use_wildcards: false,
            ..MatchOptions::default()
        };
        let pattern = Pattern::compile("user:*", &options);
        assert!(!pattern.is_wildcard());
        assert!(!pattern.matches("user:created"));
        assert!(pattern.matches("user:*"));
        assert!(!matches("user:created", "*", &options));
        assert!(matches("*", "*", &options));
    }

    #[test]
    fn test_overlaps() {
        let pattern = Pattern::compile("user:*", &opts());
        assert!(pattern.overlaps("user:*"));
        assert!(!pattern.overlaps("admin:*"));
        assert!(!pattern.overlaps("user:**"));
        assert!(pattern.overlaps("user:created"));

        let exact = Pattern::compile("user:created", &opts());
        assert!(!exact.overlaps("user:*"));
        assert!(exact.overlaps("user:created"));
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("*"));
        assert!(has_wildcard("user:**"));
        assert!(has_wildcard("user*"));
        assert!(!has_wildcard("user:created"));
    }
}
