// Filter pipeline: the hook surface exposed to the chat host.
//
// The host calls `inlet` with the request body before it reaches the model
// and `outlet` with the model's response afterwards. Each Filter may rewrite
// the body, or answer the request itself with an error-shaped response.
// Pipeline chains filters in priority order, lowest first.

pub mod body;
pub mod rate_limit;
pub mod toxicity;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::ratelimit::{Role, UNKNOWN_IDENTITY};

/// Result of running a request through a filter's inlet.
#[derive(Debug, Clone, PartialEq)]
pub enum Inlet {
    /// Pass the (possibly modified) body on to the next stage.
    Forward(Value),
    /// Stop here and return this response to the user instead.
    Respond(Value),
}

impl Inlet {
    pub fn into_value(self) -> Value {
        match self {
            Inlet::Forward(v) | Inlet::Respond(v) => v,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Inlet::Respond(_))
    }
}

/// Identity info the host attaches to each call. Every field is optional
/// because hosts disagree on what they send.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub id: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl UserInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Lenient parse of the host's user object. Anything that isn't a JSON
    /// object yields `None`; wrong-typed fields are dropped individually.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            id: obj.get("id").and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
            role: field("role"),
            name: field("name"),
            username: field("username"),
            display_name: field("display_name"),
        })
    }

    /// Rate-limiting key: the id, or the shared unknown bucket.
    pub fn identity(&self) -> &str {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => UNKNOWN_IDENTITY,
        }
    }

    pub fn role(&self) -> Role {
        Role::parse(self.role.as_deref())
    }

    /// Name for log lines: display name, then username, then name.
    pub fn display_name(&self) -> String {
        self.display_name
            .as_ref()
            .or(self.username.as_ref())
            .or(self.name.as_ref())
            .cloned()
            .unwrap_or_else(|| format!("User {}", self.identity()))
    }
}

/// A request/response hook pair installed in the host.
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    async fn inlet(&self, body: Value, user: Option<&UserInfo>) -> Inlet;

    async fn outlet(&self, response: Value, user: Option<&UserInfo>) -> Value;
}

/// Ordered chain of filters.
#[derive(Default, Clone)]
pub struct Pipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a filter, keeping the chain sorted by priority. Filters with
    /// equal priority keep insertion order.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        let pos = self
            .filters
            .iter()
            .position(|f| f.priority() > filter.priority())
            .unwrap_or(self.filters.len());
        self.filters.insert(pos, filter);
        self
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run the body through every inlet in order. The first filter that
    /// responds ends the chain; filters that already forwarded the request
    /// see the response through their outlet so they can release any state
    /// they took for it.
    pub async fn inlet(&self, body: Value, user: Option<&UserInfo>) -> Inlet {
        let mut body = body;
        for (i, filter) in self.filters.iter().enumerate() {
            match filter.inlet(body, user).await {
                Inlet::Forward(next) => body = next,
                Inlet::Respond(response) => {
                    debug!(filter = filter.name(), "Inlet short-circuited");
                    let mut response = response;
                    for earlier in self.filters[..i].iter().rev() {
                        response = earlier.outlet(response, user).await;
                    }
                    return Inlet::Respond(response);
                }
            }
        }
        Inlet::Forward(body)
    }

    /// Run the response through every outlet, last filter first.
    pub async fn outlet(&self, response: Value, user: Option<&UserInfo>) -> Value {
        let mut response = response;
        for filter in self.filters.iter().rev() {
            response = filter.outlet(response, user).await;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_info_identity_falls_back_to_unknown() {
        assert_eq!(UserInfo::default().identity(), UNKNOWN_IDENTITY);
        assert_eq!(UserInfo::new("  ").identity(), UNKNOWN_IDENTITY);
        assert_eq!(UserInfo::new("u-1").identity(), "u-1");
    }

    #[test]
    fn test_user_info_from_value_is_lenient() {
        let user = UserInfo::from_value(&json!({
            "id": 42,
            "role": "admin",
            "name": ["not", "a", "string"],
            "username": "ana"
        }))
        .unwrap();
        assert_eq!(user.identity(), "42");
        assert_eq!(user.role(), Role::Admin);
        assert!(user.name.is_none());
        assert_eq!(user.display_name(), "ana");

        assert!(UserInfo::from_value(&json!("nobody")).is_none());
    }

    #[test]
    fn test_display_name_precedence() {
        let mut user = UserInfo::new("7");
        assert_eq!(user.display_name(), "User 7");
        user.name = Some("Name".into());
        assert_eq!(user.display_name(), "Name");
        user.username = Some("handle".into());
        assert_eq!(user.display_name(), "handle");
        user.display_name = Some("Display".into());
        assert_eq!(user.display_name(), "Display");
    }
}
