//! Compiled glob and regex patterns.
//!
//! Both are validated at construction so a malformed pattern is reported before
//! any filesystem access happens.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;

use super::ToolError;

const GLOB_META: &[char] = &['*', '?', '[', '{', '\\'];

/// A compiled path glob.
///
/// `*` and `?` never cross a `/`; `**` matches any number of directory levels.
/// Leading `./` and empty segments are dropped, so `./src//*.rs` matches the
/// same paths as `src/*.rs`.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    normalized: String,
    matcher: GlobMatcher,
    prefix: PathBuf,
    max_depth: Option<usize>,
}

impl GlobPattern {
    pub fn new(raw: impl Into<String>) -> Result<Self, ToolError> {
        let raw = raw.into();
        let invalid = |message: String| ToolError::InvalidGlob {
            pattern: raw.clone(),
            message,
        };

        let absolute = raw.starts_with('/');
        let segments: Vec<&str> = raw
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        if segments.is_empty() {
            return Err(invalid("pattern matches no path".to_string()));
        }

        let mut normalized = if absolute { "/".to_string() } else { String::new() };
        normalized.push_str(&segments.join("/"));

        let matcher = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid(e.kind().to_string()))?
            .compile_matcher();

        // The final segment is never part of the prefix: the walk must see it.
        let literal_len = segments[..segments.len() - 1]
            .iter()
            .take_while(|segment| !segment.contains(GLOB_META))
            .count();
        let mut prefix = if absolute {
            PathBuf::from("/")
        } else {
            PathBuf::new()
        };
        prefix.extend(&segments[..literal_len]);

        let rest = &segments[literal_len..];
        let max_depth = if rest.iter().any(|segment| segment.contains("**")) {
            None
        } else {
            Some(rest.len())
        };

        Ok(Self {
            raw,
            normalized,
            matcher,
            prefix,
            max_depth,
        })
    }

    /// Compile every pattern, failing on the first invalid one.
    pub fn parse_all<I, S>(patterns: I) -> Result<Vec<Self>, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        patterns.into_iter().map(Self::new).collect()
    }

    /// The pattern as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whether `path`, written relative to the sandbox root, matches.
    #[must_use]
    pub fn is_match(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }

    /// Literal directory segments that every match must start with.
    pub(crate) fn literal_prefix(&self) -> &Path {
        &self.prefix
    }

    /// Deepest level below the literal prefix a match can sit at; `None` if unbounded.
    pub(crate) fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A compiled regular expression, matched against single lines.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    regex: Regex,
}

impl RegexPattern {
    pub fn new(raw: &str) -> Result<Self, ToolError> {
        let regex = Regex::new(raw).map_err(|e| ToolError::InvalidRegex {
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

impl fmt::Display for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(raw: &str) -> GlobPattern {
        GlobPattern::new(raw).unwrap()
    }

    #[test]
    fn star_does_not_cross_separator() {
        let pattern = glob("*.py");
        assert!(pattern.is_match(Path::new("test1.py")));
        assert!(!pattern.is_match(Path::new("sub/test1.py")));
    }

    #[test]
    fn double_star_crosses_directories() {
        let pattern = glob("**/*.rs");
        assert!(pattern.is_match(Path::new("main.rs")));
        assert!(pattern.is_match(Path::new("src/deep/lib.rs")));
        assert!(!pattern.is_match(Path::new("src/lib.py")));
    }

    #[test]
    fn leading_dot_segments_are_normalized() {
        let pattern = glob("./src//*.rs");
        assert_eq!(pattern.normalized(), "src/*.rs");
        assert_eq!(pattern.as_str(), "./src//*.rs");
        assert!(pattern.is_match(Path::new("src/lib.rs")));
    }

    #[test]
    fn literal_prefix_stops_at_first_wildcard_segment() {
        let pattern = glob("src/tools/*/mod.rs");
        assert_eq!(pattern.literal_prefix(), Path::new("src/tools"));
        assert_eq!(pattern.max_depth(), Some(2));
    }

    #[test]
    fn fully_literal_pattern_keeps_last_segment_out_of_prefix() {
        let pattern = glob("docs/readme.md");
        assert_eq!(pattern.literal_prefix(), Path::new("docs"));
        assert_eq!(pattern.max_depth(), Some(1));
    }

    #[test]
    fn recursive_pattern_has_unbounded_depth() {
        let pattern = glob("src/**/*.rs");
        assert_eq!(pattern.literal_prefix(), Path::new("src"));
        assert_eq!(pattern.max_depth(), None);
    }

    #[test]
    fn absolute_pattern_keeps_root_in_prefix() {
        let pattern = glob("/var/data/*.csv");
        assert_eq!(pattern.literal_prefix(), Path::new("/var/data"));
        assert!(pattern.is_match(Path::new("/var/data/a.csv")));
    }

    #[test]
    fn brace_alternatives_are_supported() {
        let pattern = glob("*.{rs,toml}");
        assert!(pattern.is_match(Path::new("Cargo.toml")));
        assert!(pattern.is_match(Path::new("lib.rs")));
        assert!(!pattern.is_match(Path::new("lib.py")));
    }

    #[test]
    fn unclosed_class_is_invalid() {
        let err = GlobPattern::new("src/[abc").unwrap_err();
        assert!(matches!(err, ToolError::InvalidGlob { pattern, .. } if pattern == "src/[abc"));
    }

    #[test]
    fn empty_pattern_is_invalid() {
        assert!(matches!(
            GlobPattern::new(""),
            Err(ToolError::InvalidGlob { .. })
        ));
        assert!(matches!(
            GlobPattern::new("./"),
            Err(ToolError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn parse_all_reports_first_invalid_pattern() {
        let err = GlobPattern::parse_all(["*.rs", "{unclosed", "[also"]).unwrap_err();
        assert!(matches!(err, ToolError::InvalidGlob { pattern, .. } if pattern == "{unclosed"));
    }

    #[test]
    fn regex_matches_within_line() {
        let pattern = RegexPattern::new(r"def \w+").unwrap();
        assert!(pattern.is_match("    def foo(self):"));
        assert!(!pattern.is_match("class Foo:"));
        assert_eq!(pattern.to_string(), r"def \w+");
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = RegexPattern::new("(unclosed").unwrap_err();
        assert!(matches!(err, ToolError::InvalidRegex { pattern, .. } if pattern == "(unclosed"));
    }
}
