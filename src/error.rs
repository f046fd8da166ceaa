//! Error types for typed records.
//!
//! Only the typed-record layer can fail. Trie bookkeeping never surfaces as an
//! error, and reads report absence with `None` or a caller-supplied default.

use std::fmt;

/// Errors raised at the boundary of a typed record or a record session.
///
/// Every error is raised before any trie node is touched, so the receiver is
/// left exactly as it was.
///
/// # Examples
///
/// ```rust
/// use typed_map::RecordError;
///
/// let error = RecordError::UnknownField {
///     schema: "Sale",
///     field: "color".to_string(),
/// };
/// assert_eq!(format!("{error}"), "Sale has no field named `color`");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A write named a field the schema does not declare.
    UnknownField {
        /// Name of the schema that rejected the write.
        schema: &'static str,
        /// The rejected field name.
        field: String,
    },
    /// A session was asked for an operation other than `set`.
    UnsupportedInSession {
        /// The rejected operation.
        operation: &'static str,
    },
    /// A mutable handle was used after `as_immutable`.
    SessionClosed,
    /// A key path was empty or deeper than the typed path API allows.
    InvalidKeyPath {
        /// Number of keys supplied.
        depth: usize,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { schema, field } => {
                write!(formatter, "{schema} has no field named `{field}`")
            }
            Self::UnsupportedInSession { operation } => write!(
                formatter,
                "`{operation}` is not available inside a mutation session; only `set` is"
            ),
            Self::SessionClosed => write!(formatter, "mutation session already closed"),
            Self::InvalidKeyPath { depth } => write!(
                formatter,
                "key path must hold between 1 and {} keys, got {depth}",
                crate::record::MAX_PATH_DEPTH
            ),
        }
    }
}

impl std::error::Error for RecordError {}
