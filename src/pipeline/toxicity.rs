// Toxicity filter: keeps conversations within professional-conduct norms.
//
// inlet scores the most recent messages and replaces toxic ones with a
// conduct reminder before they reach the model. outlet rewrites model
// responses that are toxic or that talk about the model's own identity,
// and, when a response language is required, responses written in another.
// A failing scorer never blocks traffic: the text passes through unscored.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::body;
use super::{Filter, Inlet, UserInfo};
use crate::toxicity::traits::{CategoryScores, ToxicityScorer, ToxicityThresholds};

/// Phrases that suggest the response is disclosing what model sits behind
/// the assistant. Matched case-insensitively.
pub const DEFAULT_DISCLOSURE_INDICATORS: [&str; 13] = [
    "LLaMA",
    "Meta AI",
    "modelo de lenguaje",
    "language model",
    "no tengo sentimientos",
    "no tengo emociones",
    "I am an AI",
    "Soy una IA",
    "Soy un modelo",
    "I'm an AI",
    "I'm a language model",
    "I don't have feelings",
    "I don't have emotions",
];

const NEUTRAL_INTRODUCTION: &str =
    "I'm a professional assistant here to help you. How can I assist you today?";

const CONDUCT_REMINDER: &str =
    "Please remember that this is a professional space that requires respectful and ethical communication.";

const FIRM_PREFIX: &str =
    "Aggressive language and insults are not allowed in this professional environment.";

/// Phrases typical of an English reply, used when another language is required.
const ENGLISH_INDICATORS: [&str; 11] = [
    "I cannot",
    "I understand",
    "let's try",
    "Can I help",
    "I apologize",
    "I'm sorry",
    "Please try",
    "Instead",
    "What's bothering",
    "How can I help",
    "I can't",
];

/// Phrases typical of a Spanish reply, used when English is required.
const SPANISH_INDICATORS: [&str; 8] = [
    "no puedo",
    "lo siento",
    "entiendo",
    "por favor",
    "en qué puedo ayudar",
    "le recomiendo",
    "disculpe",
    "intentemos",
];

/// Rewrites responses that are not in the required language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuard {
    /// Language code the responses must be written in
    pub language: String,
    /// Phrases that mark a response as written in some other language
    pub foreign_indicators: Vec<String>,
    /// Replacement response, written in the required language
    pub reply: String,
}

impl LanguageGuard {
    /// Built-in guard for `language` ("es" or "en"), if there is one.
    pub fn for_language(language: &str) -> Option<Self> {
        let code = language.trim().to_ascii_lowercase();
        let (indicators, reply): (&[&str], &str) = match code.as_str() {
            "es" => (
                ENGLISH_INDICATORS.as_slice(),
                "Le recordamos que este es un espacio profesional que requiere comunicación en español. \
                 Si tiene alguna inquietud, por favor exprésela de manera respetuosa y profesional.",
            ),
            "en" => (
                SPANISH_INDICATORS.as_slice(),
                "Please remember that this is a professional space where communication takes place in English. \
                 If you have a concern, please express it respectfully and professionally.",
            ),
            _ => return None,
        };
        Some(Self {
            language: code,
            foreign_indicators: indicators.iter().map(|s| s.to_string()).collect(),
            reply: reply.to_string(),
        })
    }

    fn is_foreign(&self, lowered: &str) -> bool {
        self.foreign_indicators
            .iter()
            .any(|i| lowered.contains(&i.to_lowercase()))
    }
}

/// Settings for the toxicity filter.
#[derive(Debug, Clone)]
pub struct ToxicityFilterConfig {
    pub thresholds: ToxicityThresholds,
    /// How many trailing messages of a request are scored (default 3)
    pub context_messages: usize,
    /// Appended to conduct reminders, e.g. where to report ethics concerns
    pub ethics_contact: Option<String>,
    pub disclosure_indicators: Vec<String>,
    /// Required response language; off unless configured
    pub language_guard: Option<LanguageGuard>,
}

impl Default for ToxicityFilterConfig {
    fn default() -> Self {
        Self {
            thresholds: ToxicityThresholds::default(),
            context_messages: 3,
            ethics_contact: None,
            disclosure_indicators: DEFAULT_DISCLOSURE_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            language_guard: None,
        }
    }
}

pub struct ToxicityFilter {
    scorer: Arc<dyn ToxicityScorer>,
    config: ToxicityFilterConfig,
    /// Lowercased copy of the disclosure indicators.
    indicators: Vec<String>,
}

impl ToxicityFilter {
    pub fn new(scorer: Arc<dyn ToxicityScorer>, config: ToxicityFilterConfig) -> Self {
        let indicators = config
            .disclosure_indicators
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            scorer,
            config,
            indicators,
        }
    }

    /// Reminder text, firmer when the scores show insults or severe toxicity.
    pub fn conduct_reminder(&self, scores: &CategoryScores) -> String {
        let mut text = CONDUCT_REMINDER.to_string();
        if let Some(contact) = &self.config.ethics_contact {
            text.push(' ');
            text.push_str(contact);
        }

        let t = &self.config.thresholds;
        let firm = scores.get("severe_toxicity").is_some_and(|s| s > t.severe_toxicity)
            || scores.get("insult").is_some_and(|s| s > t.insult);
        if firm {
            format!("{FIRM_PREFIX} {text}")
        } else {
            text
        }
    }

    fn discloses_model(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.indicators.iter().any(|i| lower.contains(i.as_str()))
    }

    /// Score `text`, returning the reminder to use if it is toxic.
    /// Scorer failures are logged and treated as clean.
    async fn screen(&self, text: &str) -> Option<String> {
        let scores = match self.scorer.score_text(text).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "Toxicity scoring failed, passing text through");
                return None;
            }
        };
        if self.config.thresholds.is_toxic(&scores) {
            Some(self.conduct_reminder(&scores))
        } else {
            None
        }
    }
}

#[async_trait]
impl Filter for ToxicityFilter {
    fn name(&self) -> &str {
        "toxicity"
    }

    fn priority(&self) -> i32 {
        1
    }

    async fn inlet(&self, body: Value, _user: Option<&UserInfo>) -> Inlet {
        let mut body = body;
        if let Some(messages) = body::messages_mut(&mut body) {
            let start = messages.len().saturating_sub(self.config.context_messages);
            for message in &mut messages[start..] {
                let Some(content) = message.get("content").and_then(Value::as_str) else {
                    continue;
                };
                if content.is_empty() {
                    continue;
                }
                if let Some(reminder) = self.screen(content).await {
                    info!("Toxic content detected in inlet");
                    message["content"] = Value::String(reminder);
                }
            }
        }
        Inlet::Forward(body)
    }

    async fn outlet(&self, response: Value, _user: Option<&UserInfo>) -> Value {
        let response = match response {
            Value::String(text) => body::completion_response(&text),
            other => other,
        };
        if !response.is_object() || body::is_error_response(&response) {
            return response;
        }

        let Some(content) = body::response_content(&response).filter(|c| !c.is_empty()) else {
            return response;
        };

        if self.discloses_model(content) {
            info!("Response disclosed model identity, replacing");
            return body::completion_response(NEUTRAL_INTRODUCTION);
        }

        if let Some(guard) = &self.config.language_guard {
            if guard.is_foreign(&content.to_lowercase()) {
                info!(
                    language = %guard.language,
                    "Response not in the required language, replacing"
                );
                return body::completion_response(&guard.reply);
            }
        }

        match self.screen(content).await {
            Some(reminder) => {
                info!("Toxic content detected in outlet");
                body::completion_response(&reminder)
            }
            None => response,
        }
    }
}
