// Rate-limit filter: the host-facing wrapper around RateLimiter.
//
// inlet admits or refuses each request; outlet releases the pending slot
// the request took. The host calls outlet for every response, failed or
// not, so completion is unconditional there.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::body;
use super::{Filter, Inlet, UserInfo};
use crate::output::truncate_chars;
use crate::ratelimit::decision::whole_seconds;
use crate::ratelimit::{Decision, RateLimiter, Role, UNKNOWN_IDENTITY};

pub struct RateLimitFilter {
    limiter: Arc<RateLimiter>,
}

impl RateLimitFilter {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

fn identity_of(user: Option<&UserInfo>) -> (&str, Role) {
    match user {
        Some(user) => (user.identity(), user.role()),
        None => (UNKNOWN_IDENTITY, Role::User),
    }
}

#[async_trait]
impl Filter for RateLimitFilter {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn inlet(&self, body: Value, user: Option<&UserInfo>) -> Inlet {
        let (identity, role) = identity_of(user);
        let name = user.map(UserInfo::display_name).unwrap_or_default();
        let preview = body::last_message_content(&body)
            .map(|c| truncate_chars(c, 50))
            .unwrap_or_default();
        debug!(identity, user = %name, message_preview = %preview, "Checking rate limit");

        match self.limiter.check(identity, role, Instant::now()) {
            Decision::Admit => Inlet::Forward(body),
            Decision::AdmitWithWarning(warning) => {
                let mut body = body;
                if !body::annotate_last_message(&mut body, &warning) {
                    debug!(identity, "No message to attach burst warning to");
                }
                Inlet::Forward(body)
            }
            Decision::Reject {
                reason,
                retry_after,
            } => Inlet::Respond(body::error_response(
                &reason.message(retry_after),
                reason.as_str(),
                whole_seconds(retry_after),
            )),
        }
    }

    async fn outlet(&self, response: Value, user: Option<&UserInfo>) -> Value {
        let (identity, _) = identity_of(user);
        self.limiter.complete(identity);
        response
    }
}
