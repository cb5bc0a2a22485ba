// Per-identity rate limiting: admission decisions, temporary blocks and
// pending-request accounting for chat requests.

pub mod decision;
pub mod limiter;

pub use decision::{Decision, RejectReason, Role};
pub use limiter::{RateLimitConfig, RateLimiter, UserState, UNKNOWN_IDENTITY};
