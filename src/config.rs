use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::toxicity::LanguageGuard;
use crate::ratelimit::RateLimitConfig;

/// Central configuration loaded from environment variables.
///
/// Every rate limit has a default, so an empty environment yields the
/// stock limits. The .env file is loaded at startup via dotenvy.
pub struct Config {
    pub rate_limit: RateLimitConfig,
    /// Perspective API key. The toxicity filter is only installed when set.
    pub perspective_api_key: Option<String>,
    /// Language hints sent to the scorer (CHATGATE_LANGUAGES, comma-separated)
    pub languages: Vec<String>,
    /// Sentence appended to conduct reminders (CHATGATE_ETHICS_CONTACT)
    pub ethics_contact: Option<String>,
    /// Rewrite responses not written in the first of `languages`
    /// (CHATGATE_REQUIRE_LANGUAGE=true)
    pub language_guard: Option<LanguageGuard>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RateLimitConfig::default();
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            parse_var(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        let rate_limit = RateLimitConfig {
            messages_per_minute: parse_var(
                &lookup,
                "CHATGATE_MESSAGES_PER_MINUTE",
                defaults.messages_per_minute,
            )?,
            burst_limit: parse_var(&lookup, "CHATGATE_BURST_LIMIT", defaults.burst_limit)?,
            cooldown: secs("CHATGATE_COOLDOWN_SECONDS", defaults.cooldown)?,
            max_requests_per_window: parse_var(
                &lookup,
                "CHATGATE_MAX_REQUESTS_PER_WINDOW",
                defaults.max_requests_per_window,
            )?,
            window_size: secs("CHATGATE_WINDOW_SIZE_SECONDS", defaults.window_size)?,
            min_interval: secs("CHATGATE_MIN_INTERVAL_SECONDS", defaults.min_interval)?,
            block_duration: secs("CHATGATE_BLOCK_DURATION_SECONDS", defaults.block_duration)?,
            max_pending: parse_var(&lookup, "CHATGATE_MAX_PENDING", defaults.max_pending)?,
        };

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let languages: Vec<String> = non_empty("CHATGATE_LANGUAGES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let language_guard = if parse_var(&lookup, "CHATGATE_REQUIRE_LANGUAGE", false)? {
            let language = languages
                .first()
                .context("CHATGATE_REQUIRE_LANGUAGE needs CHATGATE_LANGUAGES to name a language")?;
            let guard = LanguageGuard::for_language(language).with_context(|| {
                format!("CHATGATE_REQUIRE_LANGUAGE: no response check for language {language:?}")
            })?;
            Some(guard)
        } else {
            None
        };

        Ok(Self {
            rate_limit,
            perspective_api_key: non_empty("PERSPECTIVE_API_KEY"),
            languages,
            ethics_contact: non_empty("CHATGATE_ETHICS_CONTACT"),
            language_guard,
        })
    }

    pub fn toxicity_enabled(&self) -> bool {
        self.perspective_api_key.is_some()
    }
}

/// Parse `key` if set, otherwise fall back to `default`. A value that is
/// set but unparseable is an error rather than silently ignored.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        _ => Ok(default),
    }
}
