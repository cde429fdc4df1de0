//! Run and ledger-event identifiers.
//!
//! FlowForge ids are short prefixed strings (`run-…`, `evt-…`): a 4-char
//! type prefix plus a 19-char nanoid, 23 characters total. They exist to be
//! logged, correlated and stored as TEXT columns, so they are plain strings
//! rather than anything fancier.

/// Total length of a generated id: 4-char prefix + 19-char nanoid.
pub const ID_LEN: usize = 23;

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// Define a prefixed id newtype over `String`.
///
/// Generates `new()` (random suffix), `from_string()`, `as_str()`,
/// `suffix()`, `short()`, `Display` and `PartialEq<&str>`. That is the whole
/// surface the ledger and control plane use; anything else would be carried
/// dead weight.
macro_rules! prefixed_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random id with the type prefix.
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
            }

            /// Wrap an existing id string (row reads, tests).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The id without its type prefix.
            pub fn suffix(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
            }

            /// The suffix truncated to at most `n` characters, for logs.
            pub fn short(&self, n: usize) -> &str {
                crate::id::short(self.suffix(), n)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

prefixed_id! {
    /// Unique identifier for a supervised run.
    pub struct RunId("run-");
}

prefixed_id! {
    /// Stable external identifier for a ledger event.
    pub struct EventId("evt-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
