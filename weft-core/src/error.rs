//! Error types for the watch-expression surface.

use thiserror::Error;

/// Rejection reasons for a watch expression.
///
/// Watch expressions are dotted key paths (`"user.name"`). Anything outside
/// identifier/dot syntax is rejected at watcher construction, instead of
/// silently producing a unit that can never evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The expression was empty after trimming surrounding whitespace.
    #[error("watch expression is empty")]
    Empty,

    /// The expression contains a character outside `[A-Za-z0-9_$.]`.
    #[error("watch expression `{0}` contains a character outside identifier/dot syntax")]
    InvalidCharacter(String),

    /// Two dots in a row, or a leading or trailing dot (`"a..c"`, `".a"`).
    #[error("watch expression `{0}` contains an empty path segment")]
    EmptySegment(String),
}
