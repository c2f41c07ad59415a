//! Exact-or-pattern string matching used by cache clearing and abort filters.

use regex::Regex;

/// Matches a subject either exactly or against a regular expression.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, subject: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == subject,
            Matcher::Pattern(re) => re.is_match(subject),
        }
    }

    /// Exact matchers are compared upper-cased, for HTTP methods.
    pub(crate) fn upper_cased(self) -> Matcher {
        match self {
            Matcher::Exact(expected) => Matcher::Exact(expected.to_ascii_uppercase()),
            pattern => pattern,
        }
    }
}

/// A missing matcher accepts everything.
pub fn equals_or_matches(subject: &str, matcher: Option<&Matcher>) -> bool {
    matcher.is_none_or(|m| m.matches(subject))
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Matcher::Exact(value.to_string())
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Matcher::Exact(value)
    }
}

impl From<Regex> for Matcher {
    fn from(re: Regex) -> Self {
        Matcher::Pattern(re)
    }
}

impl From<&reqwest::Method> for Matcher {
    fn from(method: &reqwest::Method) -> Self {
        Matcher::Exact(method.as_str().to_string())
    }
}
