//! Structured invalidation patterns.
//!
//! Invalidation patterns are declared as data, not as ad hoc regex strings,
//! so a mistyped configuration value cannot turn into an arbitrary regex with
//! surprising match semantics. Three shapes cover every invalidation rule the
//! storefront registers: exact keys, key prefixes, and simple `*` globs.

use serde::{Deserialize, Serialize};

/// A pattern matched against cache keys during bulk deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum KeyPattern {
    /// Matches exactly one key.
    Exact(String),
    /// Matches every key starting with the given prefix.
    Prefix(String),
    /// Matches with `*` as a multi-character wildcard. No other
    /// metacharacters are supported.
    Glob(String),
}

impl KeyPattern {
    /// Check whether a stored key matches this pattern.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(k) => key == k,
            KeyPattern::Prefix(p) => key.starts_with(p.as_str()),
            KeyPattern::Glob(g) => glob_match(g, key),
        }
    }

    /// Render this pattern as a Redis `MATCH` expression for `SCAN`.
    ///
    /// Redis glob metacharacters in literal portions are escaped so an
    /// `Exact` or `Prefix` pattern never matches more than intended.
    pub fn redis_match(&self) -> String {
        match self {
            KeyPattern::Exact(k) => escape_redis_glob(k),
            KeyPattern::Prefix(p) => format!("{}*", escape_redis_glob(p)),
            KeyPattern::Glob(g) => g
                .split('*')
                .map(escape_redis_glob)
                .collect::<Vec<_>>()
                .join("*"),
        }
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPattern::Exact(k) => write!(f, "exact:{k}"),
            KeyPattern::Prefix(p) => write!(f, "prefix:{p}"),
            KeyPattern::Glob(g) => write!(f, "glob:{g}"),
        }
    }
}

/// Match `text` against a pattern where `*` matches any (possibly empty)
/// run of characters. Classic two-pointer scan with star backtracking.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last star consume one more character.
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Escape Redis glob metacharacters (`*`, `?`, `[`, `]`, `\`) in a literal.
fn escape_redis_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
