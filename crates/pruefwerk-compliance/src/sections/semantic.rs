// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Semantic section detection through an external text-generation model.
//
// The document text goes out as `Page N:` blocks capped at a character budget;
// the model answers with a JSON object of section name → page count. Every
// failure (transport, HTTP status, malformed answer, timeout) surfaces as an
// error the analyzer turns into a diagnostic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pruefwerk_core::config::{DetectorConfig, SectionRule};
use pruefwerk_core::error::PruefwerkError;
use pruefwerk_core::{Page, SectionCounts};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::{SectionDetector, normalize};

/// Anything that turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PruefwerkError>;
}

// ---------------------------------------------------------------------------
// Gemini client
// ---------------------------------------------------------------------------

/// Google Gemini `generateContent` over REST, authenticated with an API key.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(config: &DetectorConfig) -> Result<Self, PruefwerkError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PruefwerkError::DetectorUnavailable("no API key configured".into()))?
            .to_string();

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| PruefwerkError::DetectorUnavailable(format!("HTTP client setup failed: {}", err)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, PruefwerkError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(self.url())
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    PruefwerkError::DetectorUnavailable(format!("request timed out: {}", err))
                } else {
                    PruefwerkError::DetectorUnavailable(format!("request failed: {}", err))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &text));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|err| PruefwerkError::DetectorUnavailable(format!("malformed response body: {}", err)))?;

        candidate_text(&json)
    }
}

fn status_error(status: u16, body: &str) -> PruefwerkError {
    let snippet: String = body.chars().take(200).collect();
    PruefwerkError::DetectorUnavailable(format!("HTTP {}: {}", status, snippet))
}

/// Text of the first candidate in a `generateContent` response.
fn candidate_text(body: &Value) -> Result<String, PruefwerkError> {
    if let Some(text) = body["candidates"][0]["content"]["parts"][0]["text"].as_str() {
        return Ok(text.to_string());
    }
    if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
        return Err(PruefwerkError::DetectorUnavailable(format!("prompt blocked: {}", reason)));
    }
    if let Some(reason) = body["candidates"][0]["finishReason"].as_str() {
        return Err(PruefwerkError::DetectorUnavailable(format!(
            "malformed response: candidate has no text (finish reason {})",
            reason
        )));
    }
    Err(PruefwerkError::DetectorUnavailable("malformed response: no candidate text".into()))
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Section detector backed by a [`TextGenerator`].
pub struct SemanticDetector {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    max_chars: usize,
}

impl SemanticDetector {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &DetectorConfig) -> Self {
        Self {
            generator,
            timeout: config.timeout(),
            max_chars: config.max_chars,
        }
    }

    /// Detector talking to Gemini with the configured credentials.
    pub fn gemini(config: &DetectorConfig) -> Result<Self, PruefwerkError> {
        let client = GeminiClient::new(config)?;
        Ok(Self::new(Arc::new(client), config))
    }

    /// `Page N:` blocks joined by blank lines, cut to `max_chars` characters.
    pub fn document_text(pages: &[Page], max_chars: usize) -> String {
        let joined = pages
            .iter()
            .map(|page| format!("Page {}:\n{}", page.index, page.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        match joined.char_indices().nth(max_chars) {
            Some((cut, _)) => joined[..cut].to_string(),
            None => joined,
        }
    }

    pub fn prompt(sections: &[SectionRule], text: &str) -> String {
        let names: Vec<String> = sections.iter().map(|rule| normalize(&rule.name)).collect();
        let list = names
            .iter()
            .map(|name| format!("- {}", name))
            .collect::<Vec<_>>()
            .join("\n");
        let example = names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("  \"{}\": {}", name, i + 2))
            .collect::<Vec<_>>()
            .join(",\n");

        format!(
            "You are a document analysis assistant. Determine how many pages each of \
             the following sections spans in the document text below:\n{list}\n\n\
             Answer with a JSON object mapping each section name, in lowercase, to its \
             page count as an integer. Use 0 for sections that are absent. Example:\n\
             {{\n{example}\n}}\n\nText:\n{text}"
        )
    }

    /// Parse a model answer into counts.
    ///
    /// Accepts a bare or ```json fenced object. Keys are normalized; values
    /// that are not non-negative integers are dropped.
    pub fn parse_counts(response: &str) -> Result<SectionCounts, PruefwerkError> {
        let body = strip_fence(response);
        let value: Value = serde_json::from_str(body)
            .or_else(|_| {
                // Some answers wrap the object in prose.
                match (body.find('{'), body.rfind('}')) {
                    (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
                    _ => serde_json::from_str(body),
                }
            })
            .map_err(|err| PruefwerkError::DetectorUnavailable(format!("malformed answer, cannot parse JSON: {}", err)))?;

        let Value::Object(map) = value else {
            return Err(PruefwerkError::DetectorUnavailable(
                "malformed answer: expected a JSON object".into(),
            ));
        };

        let mut counts = SectionCounts::new();
        for (key, value) in map {
            match value.as_u64() {
                Some(pages) => {
                    counts.insert(normalize(&key), u32::try_from(pages).unwrap_or(u32::MAX));
                }
                None => debug!(section = %key, %value, "ignoring non-integer page count"),
            }
        }
        Ok(counts)
    }
}

fn strip_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl SectionDetector for SemanticDetector {
    fn name(&self) -> &'static str {
        "semantic"
    }

    #[instrument(skip_all, fields(pages = pages.len(), timeout_secs = self.timeout.as_secs()))]
    async fn detect(
        &self,
        pages: &[Page],
        sections: &[SectionRule],
    ) -> Result<SectionCounts, PruefwerkError> {
        let text = Self::document_text(pages, self.max_chars);
        let prompt = Self::prompt(sections, &text);

        let response = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("semantic detector timed out");
                return Err(PruefwerkError::DetectorTimeout(self.timeout));
            }
        };

        let counts = Self::parse_counts(&response)?;
        info!(sections = counts.len(), "semantic detector answered");
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pruefwerk_core::{BoundingBox, Policy};
    use std::sync::Mutex;

    fn unavailable_message(result: Result<String, PruefwerkError>) -> String {
        match result {
            Err(PruefwerkError::DetectorUnavailable(message)) => message,
            other => panic!("expected DetectorUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn candidate_text_reads_the_first_part() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"budget\": 2}" }], "role": "model" },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(candidate_text(&body).unwrap(), "{\"budget\": 2}");
    }

    #[test]
    fn empty_candidates_are_unavailable() {
        let message = unavailable_message(candidate_text(&json!({ "candidates": [] })));
        assert!(message.contains("no candidate text"), "{message}");
    }

    #[test]
    fn blocked_prompt_reports_the_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let message = unavailable_message(candidate_text(&body));
        assert!(message.contains("SAFETY"), "{message}");
    }

    #[test]
    fn candidate_without_text_reports_finish_reason() {
        let body = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        let message = unavailable_message(candidate_text(&body));
        assert!(message.contains("MAX_TOKENS"), "{message}");
    }

    #[test]
    fn status_error_keeps_a_short_snippet() {
        let body = "x".repeat(1000);
        let PruefwerkError::DetectorUnavailable(message) = status_error(429, &body) else {
            panic!("expected DetectorUnavailable");
        };
        assert!(message.starts_with("HTTP 429: "));
        assert_eq!(message.len(), "HTTP 429: ".len() + 200);
    }

    struct Canned {
        answer: Result<String, String>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer.to_string()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> Result<String, PruefwerkError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.clone().map_err(PruefwerkError::DetectorUnavailable)
        }
    }

    fn pages() -> Vec<Page> {
        vec![
            Page::ocr(1, "Technical Requirements".into(), BoundingBox::letter()),
            Page::ocr(2, "Budget".into(), BoundingBox::letter()),
        ]
    }

    fn config(timeout_secs: u64) -> DetectorConfig {
        DetectorConfig {
            timeout_secs,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn document_text_uses_page_blocks_and_budget() {
        let text = SemanticDetector::document_text(&pages(), 10_000);
        assert_eq!(text, "Page 1:\nTechnical Requirements\n\nPage 2:\nBudget");

        let cut = SemanticDetector::document_text(&pages(), 9);
        assert_eq!(cut, "Page 1:\nT");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let page = vec![Page::ocr(1, "Überprüfung".into(), BoundingBox::letter())];
        // "Page 1:\n" is 8 characters, so the 9th is the multi-byte Ü.
        let cut = SemanticDetector::document_text(&page, 9);
        assert_eq!(cut.chars().count(), 9);
        assert!(cut.ends_with('Ü'));
    }

    #[test]
    fn prompt_lists_every_section() {
        let prompt = SemanticDetector::prompt(&Policy::default().sections, "Page 1:\nx");
        assert!(prompt.contains("- technical requirements"));
        assert!(prompt.contains("- budget"));
        assert!(prompt.contains("- qualification"));
        assert!(prompt.ends_with("Text:\nPage 1:\nx"));
    }

    #[test]
    fn parses_fenced_json() {
        let counts =
            SemanticDetector::parse_counts("```json\n{\"Technical Requirements\": 7, \"budget\": 3}\n```").unwrap();
        assert_eq!(counts.get("technical requirements"), Some(&7));
        assert_eq!(counts.get("budget"), Some(&3));
        assert_eq!(counts.get("qualification"), None);
    }

    #[test]
    fn ignores_non_integer_counts() {
        let counts =
            SemanticDetector::parse_counts(r#"{"budget": -2, "qualification": "four", "technical requirements": 2.5, "x": 1}"#)
                .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("x"), Some(&1));
    }

    #[test]
    fn finds_object_inside_prose() {
        let counts = SemanticDetector::parse_counts("Sure! Here you go: {\"budget\": 2} Hope that helps.").unwrap();
        assert_eq!(counts.get("budget"), Some(&2));
    }

    #[test]
    fn rejects_garbage_and_non_objects() {
        assert!(matches!(
            SemanticDetector::parse_counts("I could not find any sections."),
            Err(PruefwerkError::DetectorUnavailable(_))
        ));
        assert!(matches!(
            SemanticDetector::parse_counts("[1, 2, 3]"),
            Err(PruefwerkError::DetectorUnavailable(_))
        ));
    }

    #[test]
    fn gemini_requires_a_key() {
        let result = GeminiClient::new(&DetectorConfig {
            api_key: Some("   ".into()),
            ..DetectorConfig::default()
        });
        assert!(matches!(result, Err(PruefwerkError::DetectorUnavailable(_))));
    }

    #[test]
    fn gemini_url_includes_model() {
        let client = GeminiClient::new(&DetectorConfig {
            endpoint: "https://example.test/v1beta/models/".into(),
            api_key: Some("k".into()),
            ..DetectorConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn detect_sends_document_and_parses_answer() {
        let generator = Canned::answering("{\"budget\": 1}");
        let detector = SemanticDetector::new(generator.clone(), &config(5));
        let counts = detector.detect(&pages(), &Policy::default().sections).await.unwrap();
        assert_eq!(counts.get("budget"), Some(&1));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Page 2:\nBudget"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_times_out() {
        let generator = Arc::new(Canned {
            answer: Ok("{\"budget\": 1}".into()),
            delay: Duration::from_secs(60),
            prompts: Mutex::new(Vec::new()),
        });
        let detector = SemanticDetector::new(generator, &config(2));
        let result = detector.detect(&pages(), &Policy::default().sections).await;
        assert!(matches!(result, Err(PruefwerkError::DetectorTimeout(d)) if d == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn generator_errors_propagate() {
        let generator = Arc::new(Canned {
            answer: Err("HTTP 503: overloaded".into()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        });
        let detector = SemanticDetector::new(generator, &config(5));
        let result = detector.detect(&pages(), &Policy::default().sections).await;
        assert!(matches!(result, Err(PruefwerkError::DetectorUnavailable(_))));
    }
}
