//! Retry and catch policy selection.
//!
//! Stateless: all logic lives in associated functions taking configuration
//! as parameters. Policies are consulted in declared order and only the
//! first match applies; the `all` wildcard matches any non-fatal kind.
//! Backoff is deterministic exponential: `base_delay * backoff_rate^attempt`.

use std::time::Duration;

use traverse_types::error::ErrorKind;
use traverse_types::workflow::{CatchPolicy, RetryPolicy};

/// Stateless retry/catch selector.
pub struct RetrySelector;

impl RetrySelector {
    /// Backoff delay before retry `attempt + 1` (attempt is 0-based).
    pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
        let base = policy.base_delay_ms as f64 / 1000.0;
        let delay = base * policy.backoff_rate.powi(attempt as i32);
        Duration::from_secs_f64(delay)
    }

    /// Select the retry delay for a failure, if any policy applies.
    ///
    /// Returns `None` when the error kind is not retryable, no policy's
    /// `error_equals` matches, or the first matching policy has exhausted
    /// its retries. `attempt` counts retries already performed for the
    /// current step (0 on the first failure).
    pub fn select_retry(
        policies: &[RetryPolicy],
        kind: ErrorKind,
        attempt: u32,
    ) -> Option<Duration> {
        if !kind.is_retryable() {
            return None;
        }
        let policy = policies
            .iter()
            .find(|p| Self::list_matches(&p.error_equals, kind))?;
        if attempt < policy.max_retries {
            Some(Self::backoff_delay(policy, attempt))
        } else {
            None
        }
    }

    /// Select the catch target for a failure, if any handler applies.
    pub fn select_catch(policies: &[CatchPolicy], kind: ErrorKind) -> Option<&str> {
        if !kind.is_catchable() {
            return None;
        }
        policies
            .iter()
            .find(|p| Self::list_matches(&p.error_equals, kind))
            .map(|p| p.next.as_str())
    }

    fn list_matches(list: &[ErrorKind], kind: ErrorKind) -> bool {
        list.iter().any(|tag| tag.matches(kind))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(kinds: Vec<ErrorKind>, max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            error_equals: kinds,
            max_retries,
            base_delay_ms: 100,
            backoff_rate: 2.0,
        }
    }

    // -------------------------------------------------------------------
    // Backoff math
    // -------------------------------------------------------------------

    #[test]
    fn test_backoff_is_exponential_and_monotone() {
        let p = policy(vec![ErrorKind::All], 5);
        let delays: Vec<Duration> = (0..4).map(|i| RetrySelector::backoff_delay(&p, i)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(800));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_backoff_rate_one_is_constant() {
        let mut p = policy(vec![ErrorKind::All], 5);
        p.backoff_rate = 1.0;
        assert_eq!(
            RetrySelector::backoff_delay(&p, 0),
            RetrySelector::backoff_delay(&p, 3)
        );
    }

    // -------------------------------------------------------------------
    // Retry selection
    // -------------------------------------------------------------------

    #[test]
    fn test_retry_bound_honored() {
        let policies = vec![policy(vec![ErrorKind::All], 2)];
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Activity, 0).is_some());
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Activity, 1).is_some());
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Activity, 2).is_none());
    }

    #[test]
    fn test_non_matching_kind_selects_nothing() {
        // A timeout-only policy does not apply to plain activity failures.
        let policies = vec![policy(vec![ErrorKind::Timeout], 2)];
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Activity, 0).is_none());
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Timeout, 0).is_some());
    }

    #[test]
    fn test_fatal_kinds_are_never_retried() {
        let policies = vec![policy(
            vec![
                ErrorKind::All,
                ErrorKind::Validation,
                ErrorKind::Expression,
                ErrorKind::Canceled,
            ],
            5,
        )];
        for kind in [ErrorKind::Validation, ErrorKind::Expression, ErrorKind::Canceled] {
            assert!(
                RetrySelector::select_retry(&policies, kind, 0).is_none(),
                "{kind} must not retry"
            );
        }
    }

    #[test]
    fn test_only_first_matching_policy_applies() {
        // The second policy would still have retries left, but the first
        // match wins and it is exhausted.
        let policies = vec![
            policy(vec![ErrorKind::Timeout], 1),
            policy(vec![ErrorKind::All], 10),
        ];
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Timeout, 1).is_none());
        // Non-timeout errors skip to the wildcard policy.
        assert!(RetrySelector::select_retry(&policies, ErrorKind::Activity, 1).is_some());
    }

    // -------------------------------------------------------------------
    // Catch selection
    // -------------------------------------------------------------------

    fn catch(kinds: Vec<ErrorKind>, next: &str) -> CatchPolicy {
        CatchPolicy {
            error_equals: kinds,
            next: next.to_string(),
        }
    }

    #[test]
    fn test_catch_first_match_wins() {
        let policies = vec![
            catch(vec![ErrorKind::Timeout], "slow-path"),
            catch(vec![ErrorKind::All], "recovery"),
        ];
        assert_eq!(
            RetrySelector::select_catch(&policies, ErrorKind::Timeout),
            Some("slow-path")
        );
        assert_eq!(
            RetrySelector::select_catch(&policies, ErrorKind::Activity),
            Some("recovery")
        );
    }

    #[test]
    fn test_catch_wildcard_skips_expression_but_explicit_tag_catches_it() {
        let wildcard_only = vec![catch(vec![ErrorKind::All], "recovery")];
        assert_eq!(
            RetrySelector::select_catch(&wildcard_only, ErrorKind::Expression),
            None
        );

        let explicit = vec![catch(vec![ErrorKind::Expression], "fix-expr")];
        assert_eq!(
            RetrySelector::select_catch(&explicit, ErrorKind::Expression),
            Some("fix-expr")
        );
    }

    #[test]
    fn test_canceled_and_validation_are_never_caught() {
        let policies = vec![catch(
            vec![ErrorKind::All, ErrorKind::Canceled, ErrorKind::Validation],
            "recovery",
        )];
        assert_eq!(RetrySelector::select_catch(&policies, ErrorKind::Canceled), None);
        assert_eq!(
            RetrySelector::select_catch(&policies, ErrorKind::Validation),
            None
        );
    }
}
