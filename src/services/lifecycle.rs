//! Post publish lifecycle
//!
//! A post is either draft or published. `published_at` is stamped the first
//! time a post is saved as published, kept on later published saves and
//! cleared whenever the post goes back to draft.

use chrono::{DateTime, Utc};

use super::clock::Clock;
use crate::models::PostStatus;

/// Decide the `published_at` value to store for a post being saved.
pub fn apply_status_transition(
    status: PostStatus,
    current: Option<DateTime<Utc>>,
    clock: &dyn Clock,
) -> Option<DateTime<Utc>> {
    match status {
        PostStatus::Published => Some(current.unwrap_or_else(|| clock.now())),
        PostStatus::Draft => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_first_publish_stamps_now() {
        let clock = ManualClock::new(t0());
        assert_eq!(apply_status_transition(PostStatus::Published, None, &clock), Some(t0()));
    }

    #[test]
    fn test_republish_keeps_original_timestamp() {
        let clock = ManualClock::new(t0() + Duration::days(3));
        assert_eq!(
            apply_status_transition(PostStatus::Published, Some(t0()), &clock),
            Some(t0())
        );
    }

    #[test]
    fn test_draft_clears_timestamp() {
        let clock = ManualClock::new(t0());
        assert_eq!(apply_status_transition(PostStatus::Draft, Some(t0()), &clock), None);
        assert_eq!(apply_status_transition(PostStatus::Draft, None, &clock), None);
    }

    #[test]
    fn test_unpublish_then_publish_restamps() {
        let clock = ManualClock::new(t0());
        let first = apply_status_transition(PostStatus::Published, None, &clock);
        let cleared = apply_status_transition(PostStatus::Draft, first, &clock);

        clock.advance(Duration::hours(6));
        let second = apply_status_transition(PostStatus::Published, cleared, &clock);
        assert_eq!(second, Some(t0() + Duration::hours(6)));
    }

    fn status_strategy() -> impl Strategy<Value = PostStatus> {
        prop_oneof![Just(PostStatus::Draft), Just(PostStatus::Published)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn timestamp_present_iff_published(
            status in status_strategy(),
            prior in prop::option::of(0i64..1_000_000),
            now_offset in 0i64..1_000_000,
        ) {
            let clock = ManualClock::new(t0() + Duration::seconds(now_offset));
            let prior = prior.map(|s| t0() + Duration::seconds(s));
            let result = apply_status_transition(status, prior, &clock);
            prop_assert_eq!(result.is_some(), status == PostStatus::Published);
        }

        #[test]
        fn saves_are_idempotent(
            status in status_strategy(),
            prior in prop::option::of(0i64..1_000_000),
        ) {
            let clock = ManualClock::new(t0());
            let prior = prior.map(|s| t0() + Duration::seconds(s));
            let once = apply_status_transition(status, prior, &clock);
            clock.advance(Duration::minutes(1));
            let twice = apply_status_transition(status, once, &clock);
            prop_assert_eq!(once, twice);
        }
    }
}
