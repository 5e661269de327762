//! `${NAME}` / `${NAME:fallback}` expansion against an external property source.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Source of values for placeholder expansion.
pub trait PlaceholderSource: Send + Sync {
    /// Returns the value bound to `key`, if any.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads placeholders from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvPlaceholders;

impl PlaceholderSource for EnvPlaceholders {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Reads placeholders from a fixed map.
#[derive(Debug, Clone, Default)]
pub struct MapPlaceholders(HashMap<String, String>);

impl MapPlaceholders {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl PlaceholderSource for MapPlaceholders {
    fn lookup(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

impl fmt::Debug for dyn PlaceholderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlaceholderSource")
    }
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").ok())
        .as_ref()
}

/// Expands every placeholder in `input`.
///
/// Tokens with no binding and no fallback are left verbatim.
#[must_use]
pub fn expand(source: &dyn PlaceholderSource, input: &str) -> String {
    let Some(pattern) = placeholder_pattern().filter(|_| input.contains("${")) else {
        return input.to_string();
    };
    pattern
        .replace_all(input, |caps: &Captures<'_>| {
            let key = caps[1].trim();
            source
                .lookup(key)
                .or_else(|| caps.get(2).map(|fallback| fallback.as_str().to_string()))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_bound_keys() {
        let source = MapPlaceholders::new().with("ORDERS_HOST", "orders.internal");
        assert_eq!(
            expand(&source, "${ORDERS_HOST}:7070"),
            "orders.internal:7070"
        );
    }

    #[test]
    fn uses_fallback_when_unbound() {
        let source = MapPlaceholders::new();
        assert_eq!(expand(&source, "${PORT:9090}"), "9090");
        assert_eq!(expand(&source, "host:${PORT:}"), "host:");
    }

    #[test]
    fn leaves_unresolvable_tokens_verbatim() {
        let source = MapPlaceholders::new();
        assert_eq!(expand(&source, "${MISSING}:80"), "${MISSING}:80");
    }

    #[test]
    fn input_without_tokens_is_untouched() {
        assert_eq!(expand(&EnvPlaceholders, "localhost:9090"), "localhost:9090");
    }
}
