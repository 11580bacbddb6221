//! Error-kind taxonomy used for retry and catch matching.
//!
//! Every runtime failure the engine observes is classified into one of these
//! kinds. The serialized snake_case tags are stable: they appear in workflow
//! files (`error_equals` lists), in checkpoint records, and in log output.

use serde::{Deserialize, Serialize};

/// Stable error classification tag.
///
/// `All` is a wildcard usable in `error_equals` lists; it matches any
/// non-fatal kind and never an error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed workflow, unknown step target, bad store path, unknown
    /// activity, type-incompatible input. Fatal; never retried or caught.
    Validation,
    /// Template or condition parse/evaluation failure at runtime. Fatal to
    /// the step; never retried; may be caught by an explicit tag.
    Expression,
    /// Generic activity failure with no more specific tag.
    Activity,
    /// Activity or context deadline exceeded.
    Timeout,
    /// Cooperative cancellation. Never retried, never caught.
    Canceled,
    /// Wildcard for retry/catch configs; matches any non-fatal kind.
    All,
}

impl ErrorKind {
    /// Stable string tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Expression => "expression",
            ErrorKind::Activity => "activity",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Canceled => "canceled",
            ErrorKind::All => "all",
        }
    }

    /// Fatal kinds are excluded from the `All` wildcard.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation | ErrorKind::Expression | ErrorKind::Canceled
        )
    }

    /// Whether an error of this kind may be retried at all.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Activity | ErrorKind::Timeout)
    }

    /// Whether an error of this kind may be routed to a catch handler.
    ///
    /// `Expression` is catchable (by an explicit tag); `Validation` and
    /// `Canceled` always propagate.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, ErrorKind::Validation | ErrorKind::Canceled)
    }

    /// Whether `self`, appearing in an `error_equals` list, matches an
    /// observed error of kind `other`.
    pub fn matches(&self, other: ErrorKind) -> bool {
        match self {
            ErrorKind::All => !other.is_fatal(),
            kind => *kind == other,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tags_are_snake_case() {
        for (kind, tag) in [
            (ErrorKind::Validation, "\"validation\""),
            (ErrorKind::Expression, "\"expression\""),
            (ErrorKind::Activity, "\"activity\""),
            (ErrorKind::Timeout, "\"timeout\""),
            (ErrorKind::Canceled, "\"canceled\""),
            (ErrorKind::All, "\"all\""),
        ] {
            assert_eq!(serde_json::to_string(&kind).unwrap(), tag);
            let parsed: ErrorKind = serde_json::from_str(tag).unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn display_matches_serde_tag() {
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
    }

    #[test]
    fn wildcard_matches_non_fatal_kinds_only() {
        assert!(ErrorKind::All.matches(ErrorKind::Activity));
        assert!(ErrorKind::All.matches(ErrorKind::Timeout));
        assert!(!ErrorKind::All.matches(ErrorKind::Validation));
        assert!(!ErrorKind::All.matches(ErrorKind::Expression));
        assert!(!ErrorKind::All.matches(ErrorKind::Canceled));
    }

    #[test]
    fn exact_tags_match_themselves() {
        assert!(ErrorKind::Timeout.matches(ErrorKind::Timeout));
        assert!(!ErrorKind::Timeout.matches(ErrorKind::Activity));
        // An explicit expression tag does match, unlike the wildcard.
        assert!(ErrorKind::Expression.matches(ErrorKind::Expression));
    }

    #[test]
    fn retryable_and_catchable_partitions() {
        assert!(ErrorKind::Activity.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Expression.is_retryable());
        assert!(!ErrorKind::Canceled.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());

        assert!(ErrorKind::Expression.is_catchable());
        assert!(ErrorKind::Activity.is_catchable());
        assert!(!ErrorKind::Validation.is_catchable());
        assert!(!ErrorKind::Canceled.is_catchable());
    }
}
