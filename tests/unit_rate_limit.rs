// Behavioral tests for the rate limiter's admission rules.
//
// Time is injected as Instant offsets from a fixed origin, so every
// scenario runs instantly and deterministically.

use std::time::{Duration, Instant};

use chatgate::ratelimit::{Decision, RateLimitConfig, RateLimiter, RejectReason, Role};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn reason(decision: &Decision) -> Option<RejectReason> {
    match decision {
        Decision::Reject { reason, .. } => Some(*reason),
        _ => None,
    }
}

/// Only the policy under test is tight; everything else is out of the way.
fn loose() -> RateLimitConfig {
    RateLimitConfig {
        messages_per_minute: 10_000,
        burst_limit: 10_000,
        cooldown: secs(60),
        max_requests_per_window: 10_000,
        window_size: secs(5),
        min_interval: Duration::ZERO,
        block_duration: secs(10),
        max_pending: 10_000,
    }
}

// ============================================================
// Pending accounting
// ============================================================

#[test]
fn pending_tracks_admissions_minus_completions_floored_at_zero() {
    let limiter = RateLimiter::new(loose());
    let t0 = Instant::now();
    let mut expected: u32 = 0;

    for i in 0..200u64 {
        let now = t0 + Duration::from_millis(i * 10);
        match i % 5 {
            0 | 3 => {
                limiter.complete("u");
                limiter.complete("u");
                expected = expected.saturating_sub(2);
            }
            _ => {
                if limiter.check("u", Role::User, now).is_admitted() {
                    expected += 1;
                }
            }
        }
        let pending = limiter.snapshot("u").map_or(0, |s| s.pending_count);
        assert_eq!(pending, expected, "step {i}");
    }
}

#[test]
fn extra_completions_never_go_below_zero() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();
    assert!(limiter.check("u", Role::User, t0).is_admitted());
    for _ in 0..5 {
        limiter.complete("u");
    }
    assert_eq!(limiter.snapshot("u").unwrap().pending_count, 0);

    assert!(limiter.check("u", Role::User, t0 + secs(5)).is_admitted());
    assert_eq!(limiter.snapshot("u").unwrap().pending_count, 1);
}

#[test]
fn fifth_request_waits_for_a_pending_slot() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();

    for i in 0..4 {
        let decision = limiter.check("u", Role::User, t0 + secs(5 * i));
        assert!(decision.is_admitted(), "request {i}: {decision:?}");
    }
    assert!(limiter.pending_overflow("u"));

    let fifth = limiter.check("u", Role::User, t0 + secs(20));
    assert_eq!(reason(&fifth), Some(RejectReason::TooManyPending));

    limiter.complete("u");
    assert!(!limiter.pending_overflow("u"));
    assert!(limiter.check("u", Role::User, t0 + secs(20)).is_admitted());
}

// ============================================================
// Sliding window and blocking
// ============================================================

#[test]
fn filling_the_window_blocks_for_block_duration() {
    for max in 2..=5u32 {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests_per_window: max,
            ..loose()
        });
        let t0 = Instant::now();

        for i in 0..u64::from(max) - 1 {
            assert!(limiter.check("u", Role::User, t0 + secs(i)).is_admitted());
        }

        let last = t0 + secs(u64::from(max) - 1);
        let decision = limiter.check("u", Role::User, last);
        assert_eq!(
            decision,
            Decision::Reject {
                reason: RejectReason::WindowExceeded,
                retry_after: secs(10),
            },
            "max_requests_per_window = {max}"
        );
        assert_eq!(
            limiter.snapshot("u").unwrap().blocked_until,
            Some(last + secs(10))
        );
    }
}

#[test]
fn blocked_identity_sees_shrinking_retry_after_then_resumes() {
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests_per_window: 2,
        ..loose()
    });
    let t0 = Instant::now();
    limiter.check("u", Role::User, t0);
    let blocked_at = t0 + secs(1);
    assert_eq!(
        reason(&limiter.check("u", Role::User, blocked_at)),
        Some(RejectReason::WindowExceeded)
    );

    let mut previous = Duration::MAX;
    for offset in 1..10 {
        match limiter.check("u", Role::User, blocked_at + secs(offset)) {
            Decision::Reject {
                reason: RejectReason::StillBlocked,
                retry_after,
            } => {
                assert!(retry_after < previous);
                assert_eq!(retry_after, secs(10 - offset));
                previous = retry_after;
            }
            other => panic!("expected StillBlocked at +{offset}s, got {other:?}"),
        }
    }

    assert!(limiter
        .check("u", Role::User, blocked_at + secs(10))
        .is_admitted());
}

#[test]
fn block_is_per_identity() {
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests_per_window: 2,
        ..loose()
    });
    let t0 = Instant::now();
    limiter.check("noisy", Role::User, t0);
    limiter.check("noisy", Role::User, t0 + secs(1));

    assert!(limiter.check("quiet", Role::User, t0 + secs(2)).is_admitted());
    assert_eq!(
        reason(&limiter.check("noisy", Role::User, t0 + secs(2))),
        Some(RejectReason::StillBlocked)
    );
}

// ============================================================
// Minimum interval
// ============================================================

#[test]
fn second_request_within_min_interval_is_too_frequent() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();
    assert!(limiter.check("u", Role::User, t0).is_admitted());
    assert_eq!(
        reason(&limiter.check("u", Role::User, t0 + secs(1))),
        Some(RejectReason::TooFrequent)
    );
}

// ============================================================
// Per-minute counter and cooldown
// ============================================================

#[test]
fn sixth_message_in_a_minute_triggers_cooldown() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();

    for i in 0..5u64 {
        let decision = limiter.check("u", Role::User, t0 + secs(5 * i));
        assert!(decision.is_admitted(), "message {i}: {decision:?}");
        limiter.complete("u");
    }

    let sixth_at = t0 + secs(25);
    assert_eq!(
        limiter.check("u", Role::User, sixth_at),
        Decision::Reject {
            reason: RejectReason::RateExceeded,
            retry_after: secs(60),
        }
    );

    for offset in [5u64, 30, 59] {
        assert_eq!(
            reason(&limiter.check("u", Role::User, sixth_at + secs(offset))),
            Some(RejectReason::StillBlocked),
            "+{offset}s"
        );
    }

    assert!(limiter
        .check("u", Role::User, sixth_at + secs(60))
        .is_admitted());
}

#[test]
fn burst_warnings_precede_the_hard_limit() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();
    let mut warnings = 0;

    for i in 0..5u64 {
        match limiter.check("u", Role::User, t0 + secs(5 * i)) {
            Decision::Admit => {}
            Decision::AdmitWithWarning(text) => {
                assert!(!text.is_empty());
                warnings += 1;
            }
            other => panic!("message {i} rejected: {other:?}"),
        }
        limiter.complete("u");
    }

    // Messages 3, 4 and 5 exceed the burst limit of 2
    assert_eq!(warnings, 3);
}

// ============================================================
// Admin bypass
// ============================================================

#[test]
fn admin_is_always_admitted() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();
    for i in 0..500u64 {
        assert_eq!(
            limiter.check("root", Role::Admin, t0 + Duration::from_millis(i)),
            Decision::Admit
        );
    }
}
