use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::retry::{is_rate_limited, retry_after, wait_with_backoff};
use super::{MessagePart, Provider, ProviderFuture, ProviderResponse, ProviderUsage};
use crate::image::ImageData;
use crate::settings::RetryPolicy;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub(crate) const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const JSON_MIME: &str = "application/json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct Gemini {
    key: String,
    model: String,
    base_url: String,
    parts: Vec<MessagePart>,
    json_response: bool,
    temperature: Option<f32>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Gemini {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
            parts: Vec::new(),
            json_response: false,
            temperature: None,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Applies to each attempt separately.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request_body(&self) -> Value {
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                MessagePart::Text(text) => json!({ "text": text }),
                MessagePart::Data(data) => json!({
                    "inline_data": {
                        "mime_type": data.mime,
                        "data": data.to_base64()
                    }
                }),
            })
            .collect::<Vec<_>>();

        let mut generation = Map::new();
        if self.json_response {
            generation.insert("responseMimeType".to_string(), json!(JSON_MIME));
        }
        if let Some(temperature) = self.temperature {
            generation.insert("temperature".to_string(), json!(temperature));
        }

        let mut body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ]
        });
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }
        body
    }
}

impl Provider for Gemini {
    fn append_user_input(mut self, input: String) -> Self {
        self.parts.push(MessagePart::Text(input));
        self
    }

    fn append_user_data(mut self, data: ImageData) -> Self {
        self.parts.push(MessagePart::Data(data));
        self
    }

    fn with_json_response(mut self) -> Self {
        self.json_response = true;
        self
    }

    fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn generate(self) -> ProviderFuture {
        Box::pin(async move {
            if self.parts.is_empty() {
                return Err(anyhow!("nothing to send to Gemini"));
            }
            let client = reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .with_context(|| "failed to build HTTP client")?;
            let url = format!("{}/{}:generateContent", self.base_url, self.model);
            let body = self.request_body();

            let mut attempt = 0usize;
            let mut delay = self.retry.base_delay;
            loop {
                attempt += 1;
                debug!("calling Gemini {} (attempt {})", self.model, attempt);
                let response = client
                    .post(&url)
                    .header("x-goog-api-key", self.key.as_str())
                    .json(&body)
                    .send()
                    .await
                    .with_context(|| format!("failed to reach Gemini at {}", url))?;

                let status = response.status();
                let retry_after = retry_after(response.headers());
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    return extract_text_response(&text, &self.model);
                }
                if is_rate_limited(status, &text) && attempt <= self.retry.max_retries {
                    delay = wait_with_backoff("Gemini", attempt, delay, retry_after, &self.retry)
                        .await;
                    continue;
                }
                return Err(anyhow!(
                    "Gemini API error ({}): {}",
                    status,
                    extract_gemini_error(&text).unwrap_or(text)
                ));
            }
        })
    }
}

fn extract_text_response(text: &str, fallback_model: &str) -> anyhow::Result<ProviderResponse> {
    let payload: GeminiResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Gemini response JSON: {}", err))?;

    if let Some(reason) = payload
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(anyhow!("Gemini blocked the request: {}", reason));
    }

    let candidate = payload
        .candidates
        .first()
        .ok_or_else(|| anyhow!("no candidate returned from Gemini"))?;
    let text = candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    let model = payload
        .model_version
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage_metadata.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    });
    Ok(ProviderResponse { text, model, usage })
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let parts = [
        error.message,
        error.status.map(|status| format!("type: {}", status)),
        error.code.map(|code| format!("code: {}", code)),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .collect::<Vec<_>>();
    if parts.is_empty() {
        Some("unknown error".to_string())
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const OK_REPLY: &str = r#"{"candidates": [{"content": {"parts": [{"text": "{}"}]}}]}"#;

    /// Answers 429 for the first `throttled` hits, then a normal reply.
    async fn serve_throttled(throttled: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().fallback(move || {
            let counter = counter.clone();
            async move {
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                if seen < throttled {
                    (
                        StatusCode::TOO_MANY_REQUESTS,
                        Json(json!({"error": {"code": 429, "message": "slow down"}})),
                    )
                } else {
                    (StatusCode::OK, Json(serde_json::from_str(OK_REPLY).unwrap()))
                }
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    fn quick_retry(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn retries_after_rate_limit_and_succeeds() {
        let (base, hits) = serve_throttled(1).await;
        let response = Gemini::new("key")
            .with_base_url(base)
            .with_retry(quick_retry(2))
            .append_user_input("hi".to_string())
            .generate()
            .await
            .unwrap();

        assert_eq!(response.text, "{}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (base, hits) = serve_throttled(usize::MAX).await;
        let err = Gemini::new("key")
            .with_base_url(base)
            .with_retry(quick_retry(2))
            .append_user_input("hi".to_string())
            .generate()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("slow down"), "{:#}", err);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stalled_request_times_out() {
        let app = Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(serde_json::from_str::<Value>(OK_REPLY).unwrap())
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let started = std::time::Instant::now();
        let result = Gemini::new("key")
            .with_base_url(format!("http://{}", addr))
            .with_timeout(Duration::from_millis(200))
            .append_user_input("hi".to_string())
            .generate()
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn request_body_carries_image_prompt_and_generation_config() {
        let image = ImageData {
            mime: "image/png".to_string(),
            bytes: b"hello".to_vec(),
        };
        let gemini = Gemini::new("key")
            .append_user_data(image)
            .append_user_input("describe".to_string())
            .with_json_response()
            .with_temperature(0.25);
        let body = gemini.request_body();

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[0]["inline_data"]["data"], "aGVsbG8=");
        assert_eq!(parts[1]["text"], "describe");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.25);
    }

    #[test]
    fn request_body_omits_empty_generation_config() {
        let body = Gemini::new("key")
            .append_user_input("hi".to_string())
            .request_body();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn extracts_concatenated_candidate_text() {
        let payload = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"itemName\":"}, {"text": "\"Doombringer\"}"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 1200, "candidatesTokenCount": 300, "totalTokenCount": 1500},
            "modelVersion": "gemini-2.5-flash-001"
        }"#;
        let response = extract_text_response(payload, DEFAULT_MODEL).unwrap();
        assert_eq!(response.text, r#"{"itemName":"Doombringer"}"#);
        assert_eq!(response.model.as_deref(), Some("gemini-2.5-flash-001"));
        assert_eq!(
            response.usage,
            Some(ProviderUsage {
                prompt_tokens: Some(1200),
                completion_tokens: Some(300),
                total_tokens: Some(1500),
            })
        );
    }

    #[test]
    fn missing_candidates_and_blocked_prompts_are_errors() {
        assert!(extract_text_response(r#"{"candidates": []}"#, DEFAULT_MODEL).is_err());
        let blocked = extract_text_response(
            r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#,
            DEFAULT_MODEL,
        )
        .unwrap_err();
        assert!(blocked.to_string().contains("SAFETY"));
    }

    #[test]
    fn summarizes_error_envelope() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(
            extract_gemini_error(body).as_deref(),
            Some("API key not valid | type: INVALID_ARGUMENT | code: 400")
        );
        assert_eq!(extract_gemini_error("<html>"), None);
    }
}
