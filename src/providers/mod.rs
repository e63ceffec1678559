use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::image::ImageData;

mod gemini;
mod retry;

pub use gemini::Gemini;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone)]
pub enum MessagePart {
    Text(String),
    Data(ImageData),
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse>> + Send>>;

/// A vision-language model reached over the network. Builders consume and
/// return `self` so a configured prototype can be cloned per request.
pub trait Provider: Clone + Send + Sync {
    fn append_user_input(self, input: String) -> Self;
    fn append_user_data(self, data: ImageData) -> Self;
    fn with_json_response(self) -> Self;
    fn with_temperature(self, temperature: f32) -> Self;
    fn generate(self) -> ProviderFuture;
}

/// Explicit key first, then the environment. Blank values count as unset.
pub fn resolve_key(override_key: Option<&str>) -> Option<String> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Some(key.trim().to_string());
    }
    ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"]
        .into_iter()
        .find_map(get_env)
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
