// Per-identity admission control combining three overlapping policies.
//
// Every identity gets a lazily-created UserState. A request is checked,
// in order, against: an active block, the pending-request ceiling, the
// minimum interval since the last admitted request, a sliding window
// (which blocks for block_duration when it fills), and a fixed 60-second
// message counter (which blocks for the cooldown when exceeded). Admitted
// requests past the burst limit get a soft warning.
//
// Time is always passed in by the caller, so the limiter never reads the
// clock itself and never sleeps. The state map sits behind one Mutex; no
// lock is held across an await point because nothing here is async. A
// panic while the lock is held poisons it; the map is recovered and keeps
// enforcing limits rather than switching them off.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::decision::{Decision, RejectReason, Role};

/// Bucket shared by every request that arrives without a usable identity.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Length of the fixed window behind `messages_per_minute`.
const FIXED_WINDOW: Duration = Duration::from_secs(60);

const BURST_WARNING: &str =
    "Please slow down your messages to avoid being temporarily blocked.";

/// Tunable limits. Defaults match the values the filters ship with.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Messages allowed per fixed 60-second window (default 5)
    pub messages_per_minute: u32,
    /// Per-minute count above which admissions carry a warning (default 2)
    pub burst_limit: u32,
    /// Block applied when `messages_per_minute` is exceeded (default 60s)
    pub cooldown: Duration,
    /// Sliding-window size at which the identity gets blocked (default 2)
    pub max_requests_per_window: u32,
    /// Sliding-window horizon (default 5s)
    pub window_size: Duration,
    /// Minimum gap between two admitted requests (default 2s)
    pub min_interval: Duration,
    /// Block applied when the sliding window fills (default 10s)
    pub block_duration: Duration,
    /// Outstanding requests allowed before new ones are refused (default 4)
    pub max_pending: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            messages_per_minute: 5,
            burst_limit: 2,
            cooldown: Duration::from_secs(60),
            max_requests_per_window: 2,
            window_size: Duration::from_secs(5),
            min_interval: Duration::from_secs(2),
            block_duration: Duration::from_secs(10),
            max_pending: 4,
        }
    }
}

/// Tracking state for a single identity.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    /// Admitted request times still inside the sliding window, oldest first.
    pub recent_timestamps: VecDeque<Instant>,
    /// Admitted requests in the current fixed window.
    pub window_count: u32,
    /// Start of the current fixed window (None until the first check).
    pub window_start: Option<Instant>,
    /// Admitted requests not yet completed.
    pub pending_count: u32,
    /// Requests are refused until this instant.
    pub blocked_until: Option<Instant>,
    /// Time of the most recent admitted request.
    pub last_admitted: Option<Instant>,
}

impl UserState {
    /// Extend the block to `until`. Never shortens an active block.
    fn block(&mut self, until: Instant) {
        self.blocked_until = Some(match self.blocked_until {
            Some(current) => current.max(until),
            None => until,
        });
    }

    /// Block for `wait` from `now` and return the wait actually applied.
    /// A wait too long to represent as an `Instant` is shortened until it
    /// fits, which in practice is a block that never lapses.
    fn block_for(&mut self, now: Instant, wait: Duration) -> Duration {
        let until = deadline(now, wait);
        self.block(until);
        until - now
    }

    /// Drop timestamps whose age has reached the window horizon.
    ///
    /// An entry exactly `window` old is already outside the window, so a
    /// request spaced exactly `window_size` after the previous one sees an
    /// empty window.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.recent_timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.recent_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-identity rate limiter. Share it across tasks with `Arc<RateLimiter>`.
pub struct RateLimiter {
    config: RateLimitConfig,
    states: Mutex<HashMap<String, UserState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a request from `identity` at `now` is admitted.
    ///
    /// Admitted requests are recorded and occupy a pending slot until
    /// `complete` is called for them.
    pub fn check(&self, identity: &str, role: Role, now: Instant) -> Decision {
        let key = normalize_identity(identity);

        if role == Role::Admin {
            debug!(identity = key, "Admin request admitted without limits");
            return Decision::Admit;
        }

        let mut states = self.lock_states();
        let state = states.entry(key.to_string()).or_default();
        let decision = self.evaluate(key, state, now);

        match &decision {
            Decision::Reject {
                reason,
                retry_after,
            } => warn!(
                identity = key,
                reason = %reason,
                retry_after_secs = retry_after.as_secs_f64(),
                "Request rejected"
            ),
            Decision::AdmitWithWarning(_) => warn!(
                identity = key,
                window_count = state.window_count,
                "Burst limit reached, request admitted with warning"
            ),
            Decision::Admit => debug!(
                identity = key,
                window_count = state.window_count,
                pending = state.pending_count,
                "Request admitted"
            ),
        }

        decision
    }

    /// Mark one previously admitted request from `identity` as finished.
    /// Extra calls are harmless: the pending count never drops below zero.
    pub fn complete(&self, identity: &str) {
        let key = normalize_identity(identity);
        let mut states = self.lock_states();
        if let Some(state) = states.get_mut(key) {
            state.pending_count = state.pending_count.saturating_sub(1);
            debug!(
                identity = key,
                pending = state.pending_count,
                "Request completed"
            );
        }
    }

    /// Whether `identity` already holds as many pending requests as allowed,
    /// so one more admission would overflow the ceiling.
    pub fn pending_overflow(&self, identity: &str) -> bool {
        let key = normalize_identity(identity);
        self.lock_states()
            .get(key)
            .is_some_and(|s| s.pending_count >= self.config.max_pending)
    }

    /// Copy of the tracked state for `identity`, if it has made any request.
    pub fn snapshot(&self, identity: &str) -> Option<UserState> {
        let key = normalize_identity(identity);
        self.lock_states().get(key).cloned()
    }

    /// Lock the state map, recovering it if a panicking thread poisoned it.
    /// Every mutation leaves the per-identity state self-consistent, so the
    /// recovered map is safe to keep using.
    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, UserState>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            error!("Rate limiter state was poisoned by a panic, recovering it");
            self.states.clear_poison();
            poisoned.into_inner()
        })
    }

    fn evaluate(&self, key: &str, state: &mut UserState, now: Instant) -> Decision {
        let cfg = &self.config;

        if let Some(until) = state.blocked_until {
            if now < until {
                return reject(RejectReason::StillBlocked, until - now);
            }
            info!(identity = key, "Block expired, identity unblocked");
            state.blocked_until = None;
        }

        if state.pending_count >= cfg.max_pending {
            return reject(RejectReason::TooManyPending, Duration::ZERO);
        }

        if let Some(last) = state.last_admitted {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < cfg.min_interval {
                return reject(RejectReason::TooFrequent, cfg.min_interval - elapsed);
            }
        }

        state.prune(now, cfg.window_size);
        if state.recent_timestamps.len() as u64 + 1 >= u64::from(cfg.max_requests_per_window) {
            let wait = state.block_for(now, cfg.block_duration);
            return reject(RejectReason::WindowExceeded, wait);
        }

        let rolled = state
            .window_start
            .is_none_or(|start| now.saturating_duration_since(start) >= FIXED_WINDOW);
        if rolled {
            if state.window_count > 0 {
                info!(identity = key, "Per-minute counter reset");
            }
            state.window_start = Some(now);
            state.window_count = 0;
        }

        let count = state.window_count + 1;
        if count > cfg.messages_per_minute {
            let wait = state.block_for(now, cfg.cooldown);
            return reject(RejectReason::RateExceeded, wait);
        }

        state.recent_timestamps.push_back(now);
        state.last_admitted = Some(now);
        state.window_count = count;
        state.pending_count += 1;

        if count > cfg.burst_limit {
            Decision::AdmitWithWarning(BURST_WARNING.to_string())
        } else {
            Decision::Admit
        }
    }
}

/// `now + wait`, halving `wait` until the sum fits in an `Instant`.
fn deadline(now: Instant, wait: Duration) -> Instant {
    let mut wait = wait;
    loop {
        if let Some(until) = now.checked_add(wait) {
            return until;
        }
        wait /= 2;
    }
}

fn reject(reason: RejectReason, retry_after: Duration) -> Decision {
    Decision::Reject {
        reason,
        retry_after,
    }
}

/// Map empty or whitespace-only identities onto the shared unknown bucket.
pub fn normalize_identity(identity: &str) -> &str {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        UNKNOWN_IDENTITY
    } else {
        trimmed
    }
}
