//! Scorers assign a classification and confidence to a candidate sentence.
//!
//! The rule-based scorer is always available. An external model may be
//! configured in front of it; any failure of the external model falls back
//! to the rule verdict.

use std::time::Duration;

use reqwest::{
    blocking::Client,
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Classification, ExternalScorerConfig, Verdict},
    extraction::classifier::{RuleClassifier, RULES_SCORER},
};

/// Errors from a scorer.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    /// The API key environment variable is unset or empty.
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// The API key is not a valid header value.
    #[error("invalid API key in {0}")]
    InvalidApiKey(String),

    /// The request failed or timed out.
    #[error("request to {endpoint} failed: {source}")]
    Http {
        /// The endpoint called.
        endpoint: String,
        /// The transport error.
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// The endpoint called.
        endpoint: String,
        /// The HTTP status.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The response did not contain a usable verdict.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// The endpoint called.
        endpoint: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Something that can classify a candidate requirement sentence.
///
/// Implementations must be safe to call from several threads at once.
pub trait Scorer: Send + Sync {
    /// Name recorded on the verdicts this scorer produces.
    fn name(&self) -> &str;

    /// Classify a sentence, optionally knowing the section it came from.
    ///
    /// # Errors
    ///
    /// Returns an error if the scorer could not produce a verdict.
    fn score(&self, text: &str, section: Option<&str>) -> Result<Verdict, ScorerError>;
}

/// The deterministic catalog-driven scorer.
#[derive(Debug, Clone)]
pub struct RuleBased {
    classifier: RuleClassifier,
}

impl RuleBased {
    /// Wraps a rule classifier.
    #[must_use]
    pub const fn new(classifier: RuleClassifier) -> Self {
        Self { classifier }
    }

    /// The underlying classifier.
    #[must_use]
    pub const fn classifier(&self) -> &RuleClassifier {
        &self.classifier
    }

    fn verdict(&self, text: &str, section: Option<&str>) -> Verdict {
        self.classifier.classify_in_section(text, section).verdict
    }
}

impl Scorer for RuleBased {
    fn name(&self) -> &str {
        RULES_SCORER
    }

    fn score(&self, text: &str, section: Option<&str>) -> Result<Verdict, ScorerError> {
        Ok(self.verdict(text, section))
    }
}

const SYSTEM_PROMPT: &str = "You classify sentences from government solicitations. Answer with a \
                             JSON object {\"classification\": LABEL, \"confidence\": NUMBER} where \
                             LABEL is one of PERFORMANCE_REQUIREMENT, COMPLIANCE_REQUIREMENT, \
                             DELIVERABLE_REQUIREMENT, EVALUATION_CRITERIA, INSTRUCTION, \
                             FAR_CLAUSE or OTHER, and NUMBER is between 0 and 1.";

/// A classifier behind an OpenAI-compatible chat completions endpoint.
///
/// Each call is bounded by the client timeout.
#[derive(Debug, Clone)]
pub struct ExternalModel {
    client: Client,
    endpoint: String,
    model: String,
    name: String,
}

impl ExternalModel {
    /// Builds a client from configuration, reading the API key from the
    /// configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is missing or the HTTP client cannot be
    /// built.
    pub fn from_config(config: &ExternalScorerConfig) -> Result<Self, ScorerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ScorerError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            &api_key,
            &config.base_url,
            &config.model,
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Builds a client for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ScorerError> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| ScorerError::InvalidApiKey(model.to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ScorerError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            name: format!("external:{model}"),
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> ScorerError {
        ScorerError::MalformedResponse {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
    }
}

impl Scorer for ExternalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, text: &str, section: Option<&str>) -> Result<Verdict, ScorerError> {
        let user = section.map_or_else(
            || text.to_string(),
            |section| format!("[{section}] {text}"),
        );
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|source| ScorerError::Http {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ScorerError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| self.malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| self.malformed("no choices"))?;

        parse_answer(&content).map_err(|reason| self.malformed(reason)).map(
            |(classification, confidence)| Verdict::new(classification, confidence, &self.name),
        )
    }
}

/// Extract `(classification, confidence)` from the model's reply, which may
/// wrap the JSON object in prose or a code fence.
fn parse_answer(content: &str) -> Result<(Classification, f64), String> {
    let start = content.find('{').ok_or("no JSON object in reply")?;
    let end = content.rfind('}').ok_or("no JSON object in reply")?;
    if end < start {
        return Err("no JSON object in reply".to_string());
    }
    let answer: Answer =
        serde_json::from_str(&content[start..=end]).map_err(|e| format!("invalid JSON: {e}"))?;
    let classification = answer
        .classification
        .parse::<Classification>()
        .map_err(|e| e.to_string())?;
    if !answer.confidence.is_finite() {
        return Err(format!("confidence {} is not a number", answer.confidence));
    }
    Ok((classification, answer.confidence))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Deserialize)]
struct Answer {
    classification: String,
    confidence: f64,
}

/// The verdict used for a requirement and the rule verdict kept beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    /// The verdict the requirement takes.
    pub verdict: Verdict,
    /// The rule-based verdict.
    pub baseline: Verdict,
}

/// Rule-based scoring, optionally preceded by an external scorer.
pub struct ScoringChain {
    rules: RuleBased,
    external: Option<Box<dyn Scorer>>,
}

impl ScoringChain {
    /// Rule-based scoring only.
    #[must_use]
    pub const fn rules_only(classifier: RuleClassifier) -> Self {
        Self {
            rules: RuleBased::new(classifier),
            external: None,
        }
    }

    /// Try `external` first and fall back to the rules when it fails.
    #[must_use]
    pub fn with_external(classifier: RuleClassifier, external: Box<dyn Scorer>) -> Self {
        Self {
            rules: RuleBased::new(classifier),
            external: Some(external),
        }
    }

    /// The rule classifier.
    #[must_use]
    pub const fn classifier(&self) -> &RuleClassifier {
        self.rules.classifier()
    }

    /// Name of the scorer tried first.
    #[must_use]
    pub fn primary_name(&self) -> &str {
        self.external
            .as_deref()
            .map_or_else(|| self.rules.name(), Scorer::name)
    }

    /// Score a sentence.
    ///
    /// Never fails: an external scorer error is logged and the rule verdict
    /// is used instead.
    #[must_use]
    pub fn score(&self, text: &str, section: Option<&str>) -> Scored {
        let baseline = self.rules.verdict(text, section);
        let verdict = match &self.external {
            None => baseline.clone(),
            Some(external) => match external.score(text, section) {
                Ok(verdict) => verdict,
                Err(e) => {
                    tracing::warn!(
                        "{} failed, using rule verdict: {e}",
                        external.name()
                    );
                    baseline.clone()
                }
            },
        };
        Scored { verdict, baseline }
    }
}

impl std::fmt::Debug for ScoringChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringChain")
            .field("rules", &self.rules)
            .field("external", &self.external.as_ref().map(|e| e.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{domain::Confidence, extraction::catalog::PatternCatalog};

    fn classifier() -> RuleClassifier {
        RuleClassifier::new(PatternCatalog::builtin().unwrap())
    }

    struct Failing;

    impl Scorer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn score(&self, _text: &str, _section: Option<&str>) -> Result<Verdict, ScorerError> {
            Err(ScorerError::MalformedResponse {
                endpoint: "http://test".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    struct Fixed;

    impl Scorer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _text: &str, _section: Option<&str>) -> Result<Verdict, ScorerError> {
            Ok(Verdict::new(Classification::Compliance, 0.9, "fixed"))
        }
    }

    const UPTIME: &str = "The contractor shall maintain 99.9% uptime for production systems.";

    #[test]
    fn rules_only_uses_rule_verdict_for_both() {
        let chain = ScoringChain::rules_only(classifier());
        let scored = chain.score(UPTIME, None);
        assert_eq!(scored.verdict, scored.baseline);
        assert_eq!(scored.verdict.scorer, "rules");
        assert_eq!(chain.primary_name(), "rules");
    }

    #[test]
    fn external_verdict_wins_and_baseline_is_kept() {
        let chain = ScoringChain::with_external(classifier(), Box::new(Fixed));
        let scored = chain.score(UPTIME, None);
        assert_eq!(scored.verdict.classification, Classification::Compliance);
        assert_eq!(scored.verdict.confidence, Confidence::High);
        assert_eq!(scored.baseline.classification, Classification::Performance);
        assert_eq!(chain.primary_name(), "fixed");
    }

    #[test]
    fn external_failure_falls_back_to_rules() {
        let chain = ScoringChain::with_external(classifier(), Box::new(Failing));
        let scored = chain.score(UPTIME, None);
        assert_eq!(scored.verdict, scored.baseline);
        assert_eq!(scored.verdict.classification, Classification::Performance);
    }

    #[test]
    fn unreachable_endpoint_is_an_error() {
        let model = ExternalModel::new(
            "key",
            "http://127.0.0.1:9",
            "test-model",
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(model.score(UPTIME, None).is_err());
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = ExternalScorerConfig {
            base_url: "http://localhost".to_string(),
            model: "m".to_string(),
            api_key_env: "SHALL_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            timeout_ms: 100,
        };
        assert!(matches!(
            ExternalModel::from_config(&config),
            Err(ScorerError::MissingApiKey(_))
        ));
    }

    #[test_case(r#"{"classification": "FAR_CLAUSE", "confidence": 0.8}"#, Classification::FarClause; "bare object")]
    #[test_case("```json\n{\"classification\": \"instruction\", \"confidence\": 0.4}\n```", Classification::Instruction; "fenced and lower case")]
    fn parses_model_answers(content: &str, expected: Classification) {
        let (classification, _) = parse_answer(content).unwrap();
        assert_eq!(classification, expected);
    }

    #[test_case("I think it's a performance requirement."; "no json")]
    #[test_case(r#"{"classification": "MYSTERY", "confidence": 0.5}"#; "unknown label")]
    #[test_case(r#"{"classification": "OTHER"}"#; "missing confidence")]
    fn rejects_unusable_answers(content: &str) {
        assert!(parse_answer(content).is_err());
    }
}
