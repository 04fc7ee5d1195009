//! Vision inference using Google Gemini
//! Sends the screenshot plus a fixed instruction prompt, receives a JSON hint payload.
//! Keys are rotated round-robin on any failure; each key is tried at most once per call.
//! Latency: 1-5s (network and model dependent)

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::credentials::CredentialPool;
use crate::error::{HintError, truncate};
use crate::hint::{self, AnalysisResult};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const LAST_ERROR_MAX_CHARS: usize = 80;
const ERROR_BODY_MAX_CHARS: usize = 200;

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

// *************** Transport ***************

/// Submits one prompt + image to a model and returns the raw text reply.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        png: &[u8],
    ) -> Result<String, HintError>;
}

/// REST transport for the Generative Language API.
pub struct GeminiBackend {
    http: Client,
    api_base: String,
}

impl GeminiBackend {
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        png: &[u8],
    ) -> Result<String, HintError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        let request = build_request(prompt, png);

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| HintError::Inference(format!("Failed to reach Gemini: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HintError::Inference(format!(
                "Gemini API error {}: {}",
                status,
                truncate(body.trim(), ERROR_BODY_MAX_CHARS)
            )));
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| HintError::Inference(format!("Failed to decode Gemini response: {}", e.without_url())))?;

        extract_text(api_response)
            .ok_or_else(|| HintError::Inference("Gemini returned no text".to_string()))
    }
}

// *************** Client ***************

/// Key-rotating analysis client. The pool index persists across calls.
pub struct InferenceClient {
    pool: CredentialPool,
    model: String,
    backend: Box<dyn VisionBackend>,
}

impl InferenceClient {
    pub fn new(pool: CredentialPool, model: impl Into<String>, backend: Box<dyn VisionBackend>) -> Self {
        Self {
            pool,
            model: model.into(),
            backend,
        }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Analyzes one PNG screenshot.
    ///
    /// Every key in the pool is tried at most once, starting at the current index.
    /// Transport, API and parse failures all rotate to the next key immediately.
    pub async fn analyze(&mut self, png: &[u8]) -> Result<AnalysisResult, HintError> {
        if self.pool.is_empty() {
            return Err(HintError::NoCredentials);
        }

        let prompt = build_prompt();
        let attempts = self.pool.len();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let Some(key) = self.pool.current() else {
                return Err(HintError::NoCredentials);
            };

            let outcome = self
                .backend
                .generate(key, &self.model, &prompt, png)
                .await
                .and_then(|text| hint::parse_response(&text));

            match outcome {
                Ok(result) => {
                    info!(
                        "Key {} returned a {} hint with {} item(s)",
                        self.pool.index(),
                        result.kind,
                        result.items.len()
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{} with key {} failed: {}",
                        attempt,
                        attempts,
                        self.pool.index(),
                        e
                    );
                    last_error = e.to_string();
                    self.pool.advance();
                    info!("Rotated to API key index {} (model {})", self.pool.index(), self.model);
                }
            }
        }

        Err(HintError::KeysExhausted {
            attempts,
            last: truncate(&last_error, LAST_ERROR_MAX_CHARS),
        })
    }
}

// *************** Internal Functions ***************

/// Instruction prompt describing the three hint types and the reply schema.
fn build_prompt() -> String {
    r#"Analyze this screenshot. Determine which kind of task is shown and reply with strict JSON only.
Coordinates must be normalized to 0-1000 as [ymin, xmin, ymax, xmax] relative to the full screenshot.

JSON structure: {"type": "A"|"B"|"C", "results": [{"box": [ymin, xmin, ymax, xmax], "text": "..."}]}

- Type A (single choice): return the box of the correct option.
- Type B (ordering / drag and drop): return the boxes of the movable items in their correct order, first item first.
- Type C (text input): return the box of the input field and the "text" to type into it.

Output ONLY the JSON object, no explanation."#
        .to_string()
}

fn build_request<'a>(prompt: &'a str, png: &[u8]) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: "image/png",
                        data: general_purpose::STANDARD.encode(png),
                    },
                },
            ],
        }],
    }
}

fn extract_text(response: GenerateResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    (!text.trim().is_empty()).then(|| text.trim().to_string())
}

// *************** Tests ***************

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::HintKind;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted replies and records which key each call used.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, HintError>>>,
        keys_used: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, HintError>>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let keys_used = Arc::new(Mutex::new(Vec::new()));
            let backend = Self {
                replies: Mutex::new(replies.into()),
                keys_used: Arc::clone(&keys_used),
            };
            (backend, keys_used)
        }
    }

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        async fn generate(&self, api_key: &str, _model: &str, _prompt: &str, _png: &[u8]) -> Result<String, HintError> {
            self.keys_used.lock().unwrap().push(api_key.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(HintError::Inference("script exhausted".to_string())))
        }
    }

    const CHOICE_REPLY: &str = r#"{"type":"A","results":[{"box":[100,200,300,400]}]}"#;

    fn client(keys: &[&str], replies: Vec<Result<String, HintError>>) -> (InferenceClient, Arc<Mutex<Vec<String>>>) {
        let (backend, used) = ScriptedBackend::new(replies);
        let client = InferenceClient::new(CredentialPool::new(keys.iter().copied()), "test-model", Box::new(backend));
        (client, used)
    }

    fn quota() -> Result<String, HintError> {
        Err(HintError::Inference("429 quota exceeded".to_string()))
    }

    #[tokio::test]
    async fn test_first_key_success() {
        let (mut client, used) = client(&["k0", "k1"], vec![Ok(CHOICE_REPLY.to_string())]);
        let result = client.analyze(b"png").await.unwrap();
        assert_eq!(result.kind, HintKind::Choice);
        assert_eq!(*used.lock().unwrap(), vec!["k0"]);
        assert_eq!(client.pool().index(), 0);
    }

    #[tokio::test]
    async fn test_rotates_on_failure_then_succeeds() {
        let (mut client, used) = client(&["k0", "k1", "k2"], vec![quota(), Ok(CHOICE_REPLY.to_string())]);
        client.analyze(b"png").await.unwrap();
        assert_eq!(*used.lock().unwrap(), vec!["k0", "k1"]);
        assert_eq!(client.pool().index(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_rotates() {
        let (mut client, used) = client(
            &["k0", "k1"],
            vec![Ok("Sorry, no idea.".to_string()), Ok(CHOICE_REPLY.to_string())],
        );
        client.analyze(b"png").await.unwrap();
        assert_eq!(*used.lock().unwrap(), vec!["k0", "k1"]);
    }

    #[tokio::test]
    async fn test_all_keys_fail_once_each() {
        let (mut client, used) = client(&["k0", "k1", "k2"], vec![quota(), quota(), quota()]);
        let err = client.analyze(b"png").await.unwrap_err();
        match err {
            HintError::KeysExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("429 quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*used.lock().unwrap(), vec!["k0", "k1", "k2"]);
        assert_eq!(client.pool().index(), 0);
    }

    #[tokio::test]
    async fn test_rotation_persists_across_calls() {
        let (mut client, used) = client(
            &["k0", "k1", "k2"],
            vec![quota(), Ok(CHOICE_REPLY.to_string()), quota(), Ok(CHOICE_REPLY.to_string())],
        );
        client.analyze(b"png").await.unwrap();
        client.analyze(b"png").await.unwrap();
        assert_eq!(*used.lock().unwrap(), vec!["k0", "k1", "k1", "k2"]);
        assert_eq!(client.pool().index(), 2);
    }

    #[tokio::test]
    async fn test_last_error_is_truncated() {
        let long = "x".repeat(500);
        let (mut client, _) = client(&["k0"], vec![Err(HintError::Inference(long))]);
        match client.analyze(b"png").await.unwrap_err() {
            HintError::KeysExhausted { last, .. } => {
                assert_eq!(last.chars().count(), LAST_ERROR_MAX_CHARS + 3);
                assert!(last.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_pool_fails_immediately() {
        let (mut client, used) = client(&[], vec![Ok(CHOICE_REPLY.to_string())]);
        let err = client.analyze(b"png").await.unwrap_err();
        assert!(matches!(err, HintError::NoCredentials));
        assert!(used.lock().unwrap().is_empty());
    }

    #[test]
    fn test_build_prompt_describes_schema() {
        let prompt = build_prompt();
        assert!(prompt.contains(r#""type": "A"|"B"|"C""#));
        assert!(prompt.contains("0-1000"));
        assert!(prompt.contains("Type C"));
    }

    #[test]
    fn test_build_request_wire_format() {
        let request = build_request("look", &[1, 2, 3]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "look");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"type\":"},{"text":"\"A\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).as_deref(), Some(r#"{"type":"A"}"#));
    }

    #[test]
    fn test_extract_text_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(extract_text(response), None);
    }

    #[tokio::test]
    #[ignore = "requires GEMINI_KEYS and network access"]
    async fn test_real_api_call() {
        // Run with: GEMINI_KEYS=... cargo test test_real_api_call -- --ignored
        let keys = std::env::var("GEMINI_KEYS").unwrap_or_default();
        let backend = GeminiBackend::new(DEFAULT_API_BASE, Duration::from_secs(60)).unwrap();
        let mut client = InferenceClient::new(CredentialPool::new(keys.split(',')), "gemini-2.5-flash", Box::new(backend));
        let png = crate::capture::encode_png(&image::DynamicImage::new_rgba8(64, 64)).unwrap();
        let result = client.analyze(&png).await;
        println!("Result: {:?}", result);
    }
}
