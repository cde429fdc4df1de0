//! Secret redaction applied to commands, args and free-form text before
//! anything reaches the ledger.
//!
//! The catalog is pluggable: the built-in patterns cover the known secret
//! shapes, and callers can extend it with [`Redactor::with_patterns`].

use regex::Regex;
use std::sync::Arc;

/// Marker substituted for any matched secret.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Built-in secret patterns. Order matters: flag-style patterns run before the
/// generic key=value pattern so the flag name survives redaction.
const BUILTIN_PATTERNS: &[&str] = &[
    // Authorization headers and bare bearer tokens
    r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+",
    // --api-key VALUE / --api-key=VALUE (also --token, --password, --secret)
    r"(?i)(--(?:api-key|token|password|secret))(=|\s+)\S+",
    // FLOWFORGE_API_KEY=... and friends exported inline
    r"(?i)(FLOWFORGE_(?:API|MASTER)_KEY)=\S+",
    // generic assignments that look like credentials
    r"(?i)\b((?:api[_-]?key|access[_-]?key|auth[_-]?token|password|passwd|secret))=\S+",
];

/// Compiled, shareable redactor.
#[derive(Clone)]
pub struct Redactor {
    patterns: Arc<Vec<Regex>>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Redactor {
    /// Redactor with the built-in catalog.
    pub fn new() -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { patterns: Arc::new(patterns) }
    }

    /// Extend the built-in catalog with operator-supplied patterns.
    ///
    /// Invalid patterns are skipped; the built-ins always remain active.
    pub fn with_patterns<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<Regex> = BUILTIN_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        for pattern in extra {
            // invalid operator patterns are skipped; built-ins stay active
            if let Ok(re) = Regex::new(pattern.as_ref()) {
                patterns.push(re);
            }
        }
        Self { patterns: Arc::new(patterns) }
    }

    /// Redact a single line of text.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in self.patterns.iter() {
            out = re
                .replace_all(&out, |caps: &regex::Captures<'_>| {
                    // Keep the flag/key name when the pattern captured one.
                    match (caps.get(1), caps.get(2)) {
                        (Some(name), Some(sep)) => {
                            format!("{}{}{}", name.as_str(), sep.as_str(), REDACTION_MARKER)
                        }
                        (Some(name), None) => format!("{}={}", name.as_str(), REDACTION_MARKER),
                        _ => REDACTION_MARKER.to_string(),
                    }
                })
                .into_owned();
        }
        out
    }

    /// Redact a command plus its args into a single display string.
    pub fn redact_command(&self, command: &str, args: &[String]) -> String {
        let mut parts = vec![command.to_string()];
        parts.extend(args.iter().cloned());
        self.redact(&parts.join(" "))
    }

    /// Whether the text still matches any known secret pattern.
    ///
    /// Used by tests and the ledger's write barrier; redacted text never
    /// matches because the marker replaces the secret value.
    pub fn contains_secret(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| {
            re.find_iter(text)
                .any(|m| !m.as_str().contains(REDACTION_MARKER))
        })
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
