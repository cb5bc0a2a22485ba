// Newline-delimited JSON host adapter.
//
// Each input line is an envelope naming the hook to run:
//   {"stage": "inlet" | "outlet", "body": <json>, "user": <json | null>}
// and produces exactly one output line:
//   {"stage": ..., "rejected": bool, "body": <json>}
// A line that can't be parsed gets {"error": "..."} back; the loop keeps
// going so one bad caller can't take the filters down.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::rate_limit::RateLimitFilter;
use crate::pipeline::toxicity::{ToxicityFilter, ToxicityFilterConfig};
use crate::pipeline::{Inlet, Pipeline, UserInfo};
use crate::ratelimit::RateLimiter;
use crate::toxicity::perspective::PerspectiveScorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Inlet,
    Outlet,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stage: Stage,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    user: Value,
}

/// Assemble the filter chain described by `config`.
pub fn build_pipeline(config: &Config) -> Pipeline {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let mut pipeline = Pipeline::new().with_filter(Arc::new(RateLimitFilter::new(limiter)));

    if let Some(key) = &config.perspective_api_key {
        let scorer = PerspectiveScorer::new(key.clone(), config.languages.clone());
        let filter_config = ToxicityFilterConfig {
            ethics_contact: config.ethics_contact.clone(),
            language_guard: config.language_guard.clone(),
            ..ToxicityFilterConfig::default()
        };
        pipeline = pipeline.with_filter(Arc::new(ToxicityFilter::new(
            Arc::new(scorer),
            filter_config,
        )));
    }

    pipeline
}

/// Run one envelope line through the pipeline and build the reply.
pub async fn handle_line(pipeline: &Pipeline, line: &str) -> Value {
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed envelope");
            return json!({ "error": format!("malformed envelope: {e}") });
        }
    };

    let user = UserInfo::from_value(&envelope.user);
    let (rejected, body) = match envelope.stage {
        Stage::Inlet => {
            let outcome = pipeline.inlet(envelope.body, user.as_ref()).await;
            (outcome.is_rejected(), outcome.into_value())
        }
        Stage::Outlet => (false, pipeline.outlet(envelope.body, user.as_ref()).await),
    };

    json!({ "stage": envelope.stage, "rejected": rejected, "body": body })
}

/// Serve envelopes from `reader` until EOF, writing one reply per line.
pub async fn serve<R, W>(pipeline: &Pipeline, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(filters = ?pipeline.filter_names(), "Filter host ready");

    let mut lines = reader.lines();
    let mut handled = 0u64;
    while let Some(line) = lines.next_line().await.context("Failed to read envelope")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(pipeline, &line).await;
        let mut out = serde_json::to_vec(&reply).context("Failed to encode reply")?;
        out.push(b'\n');
        writer
            .write_all(&out)
            .await
            .context("Failed to write reply")?;
        writer.flush().await.context("Failed to flush reply")?;
        handled += 1;
    }

    info!(handled, "Input closed, filter host stopping");
    Ok(())
}
