//! The [`wire_enum!`] macro: one table per enum mapping variants to their
//! canonical wire names.
//!
//! FlowForge persists statuses, actions and decisions as TEXT columns and
//! serves them over HTTP, so every such enum needs the same pair: `Display`
//! into the wire name and `from_wire` back out of it. Keeping both sides in
//! a single table means a column value and its parser can never drift apart.

/// Generate `Display` and `from_wire` from one variant ↔ wire-name table.
///
/// ```ignore
/// crate::wire_enum! {
///     MyStatus {
///         Healthy => "healthy",
///         AtRisk => "at_risk",
///     }
/// }
/// ```
#[macro_export]
macro_rules! wire_enum {
    ($enum:ty { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant => $str, )+
                })
            }
        }

        impl $enum {
            /// Parse the exact wire name back into the enum.
            pub fn from_wire(s: &str) -> Option<Self> {
                match s {
                    $( $str => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}
