// Chatgate: rate limiting and toxicity filters for chat pipelines
//
// This is the library root. `ratelimit` holds the per-identity admission
// state machine; `pipeline` exposes it (and the toxicity filter) through
// the inlet/outlet hooks a chat host calls.

pub mod config;
pub mod host;
pub mod output;
pub mod pipeline;
pub mod ratelimit;
pub mod toxicity;
