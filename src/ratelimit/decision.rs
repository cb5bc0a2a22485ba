// Admission decisions produced by the rate limiter.
//
// A rejection is a value, not an error: the caller turns it into an
// error-shaped chat response. Each reason has a stable machine-readable
// kind (for the host) and a human-readable message (for the user).

use std::fmt;
use std::time::Duration;

/// Role of the identity making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Administrators bypass every limit.
    Admin,
    #[default]
    User,
}

impl Role {
    /// Parse a host-supplied role string. Anything other than "admin"
    /// (case-insensitive) is treated as a regular user.
    pub fn parse(role: Option<&str>) -> Self {
        match role.map(str::trim) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::User,
        }
    }
}

/// Why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Too many admitted requests have not been completed yet.
    TooManyPending,
    /// The request came sooner than the minimum interval after the last one.
    TooFrequent,
    /// The sliding window filled up; the identity is now blocked.
    WindowExceeded,
    /// The per-minute message count was exceeded; the identity is now cooling down.
    RateExceeded,
    /// An earlier violation is still being served.
    StillBlocked,
}

impl RejectReason {
    /// Machine-readable kind, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TooManyPending => "too_many_pending",
            RejectReason::TooFrequent => "too_frequent",
            RejectReason::WindowExceeded => "window_exceeded",
            RejectReason::RateExceeded => "rate_exceeded",
            RejectReason::StillBlocked => "still_blocked",
        }
    }

    /// Text shown to the user, with the wait rounded up to whole seconds.
    pub fn message(&self, retry_after: Duration) -> String {
        let secs = whole_seconds(retry_after);
        match self {
            RejectReason::TooManyPending => {
                "Too many pending requests. Please wait for the previous ones to finish."
                    .to_string()
            }
            RejectReason::TooFrequent => format!(
                "You are sending messages too quickly. Please wait {secs} seconds between messages."
            ),
            RejectReason::WindowExceeded => format!(
                "Too many messages in a short period. Please wait {secs} seconds before sending more."
            ),
            RejectReason::RateExceeded => format!(
                "You have exceeded the per-minute message limit. Please wait {secs} seconds."
            ),
            RejectReason::StillBlocked => {
                format!("Please wait {secs} seconds before sending more messages.")
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of `RateLimiter::check`.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Admit,
    /// Admitted, but the identity is close to being throttled.
    AdmitWithWarning(String),
    Reject {
        reason: RejectReason,
        /// Advisory wait before retrying.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Decision::Reject { .. })
    }
}

/// Round a wait up to whole seconds so "0 seconds" is never shown while
/// the block is still active.
pub fn whole_seconds(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
