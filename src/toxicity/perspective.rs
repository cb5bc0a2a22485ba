// Google Perspective API implementation of ToxicityScorer.
//
// Perspective labels its attributes in SCREAMING_SNAKE_CASE and calls a
// couple of them differently from Detoxify (PROFANITY, SEXUALLY_EXPLICIT);
// responses are translated to the lowercase category names the thresholds
// understand.
//
// API docs: https://developers.perspectiveapi.com/s/about-the-api-methods

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{CategoryScores, ToxicityScorer};

const ENDPOINT: &str = "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

/// Perspective attribute name → category name.
const ATTRIBUTES: [(&str, &str); 7] = [
    ("TOXICITY", "toxicity"),
    ("SEVERE_TOXICITY", "severe_toxicity"),
    ("PROFANITY", "obscene"),
    ("THREAT", "threat"),
    ("INSULT", "insult"),
    ("IDENTITY_ATTACK", "identity_attack"),
    ("SEXUALLY_EXPLICIT", "sexual_explicit"),
];

pub struct PerspectiveScorer {
    client: Client,
    api_key: String,
    languages: Vec<String>,
}

impl PerspectiveScorer {
    /// `languages` are ISO codes passed as hints; empty lets the API detect.
    pub fn new(api_key: String, languages: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            languages,
        }
    }
}

#[async_trait]
impl ToxicityScorer for PerspectiveScorer {
    async fn score_text(&self, text: &str) -> Result<CategoryScores> {
        let request = PerspectiveRequest {
            comment: Comment { text },
            requested_attributes: ATTRIBUTES
                .iter()
                .map(|(attr, _)| (*attr, AttributeConfig {}))
                .collect(),
            languages: &self.languages,
        };

        let response = self
            .client
            .post(ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("Failed to call Perspective API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Perspective API returned {}: {}", status, body);
        }

        let result: PerspectiveResponse = response
            .json()
            .await
            .context("Failed to parse Perspective API response")?;

        let scores = translate_scores(&result);
        debug!(
            categories = scores.0.len(),
            toxicity = ?scores.get("toxicity"),
            "Scored text"
        );
        Ok(scores)
    }
}

fn translate_scores(response: &PerspectiveResponse) -> CategoryScores {
    let map: BTreeMap<String, f64> = ATTRIBUTES
        .iter()
        .filter_map(|(attr, category)| {
            response
                .attribute_scores
                .get(*attr)
                .map(|score| (category.to_string(), score.summary_score.value))
        })
        .collect();
    CategoryScores(map)
}

// --- Perspective API request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PerspectiveRequest<'a> {
    comment: Comment<'a>,
    requested_attributes: BTreeMap<&'static str, AttributeConfig>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    languages: &'a [String],
}

#[derive(Serialize)]
struct Comment<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct AttributeConfig {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerspectiveResponse {
    attribute_scores: HashMap<String, AttributeScore>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttributeScore {
    summary_score: SummaryScore,
}

#[derive(Deserialize)]
struct SummaryScore {
    value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_renames_perspective_attributes() {
        let response: PerspectiveResponse = serde_json::from_str(
            r#"{"attributeScores": {
                "PROFANITY": {"summaryScore": {"value": 0.7}},
                "INSULT": {"summaryScore": {"value": 0.2}},
                "FLIRTATION": {"summaryScore": {"value": 0.9}}
            }}"#,
        )
        .unwrap();

        let scores = translate_scores(&response);
        assert_eq!(scores.get("obscene"), Some(0.7));
        assert_eq!(scores.get("insult"), Some(0.2));
        assert_eq!(scores.0.len(), 2);
    }

    #[test]
    fn test_request_omits_empty_languages() {
        let langs: Vec<String> = Vec::new();
        let request = PerspectiveRequest {
            comment: Comment { text: "hola" },
            requested_attributes: BTreeMap::from([("TOXICITY", AttributeConfig {})]),
            languages: &langs,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("languages").is_none());
        assert_eq!(json["comment"]["text"], "hola");
        assert!(json["requestedAttributes"]["TOXICITY"].is_object());
    }
}
