use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::analysis::{self, failure_result, AnalysisResult, Failure};
use crate::i18n::TranslationStore;
use crate::image::ImageData;
use crate::languages::Language;
use crate::prompt;
use crate::providers::{Provider, ProviderResponse, ProviderUsage};

pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Runs one image through prompt building, the model call, parsing and
/// normalization. Every outcome is an [`AnalysisResult`]; nothing is
/// returned as an error.
pub struct Analyzer<P: Provider> {
    provider: Option<P>,
    store: Arc<TranslationStore>,
    temperature: f32,
    in_flight: AtomicBool,
}

impl<P: Provider> Analyzer<P> {
    /// `provider` is `None` when no credential is configured.
    pub fn new(provider: Option<P>, store: Arc<TranslationStore>) -> Self {
        Self {
            provider,
            store,
            temperature: DEFAULT_TEMPERATURE,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn store(&self) -> &Arc<TranslationStore> {
        &self.store
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Analyzes a `data:` URI image. A call made while another is still
    /// running on this analyzer is answered with a busy result.
    pub async fn analyze(&self, image_data: &str, language: Language) -> AnalysisResult {
        let Some(provider) = self.provider.clone() else {
            error!("no API key configured; analysis cannot proceed");
            return failure_result(Failure::Configuration, &self.store);
        };
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!("analysis already in progress; rejecting concurrent request");
            return failure_result(Failure::Busy, &self.store);
        };

        let response = match self.invoke(provider, image_data, language).await {
            Ok(response) => response,
            Err(err) => {
                let message = format!("{:#}", err);
                error!("analysis request failed: {}", message);
                return failure_result(Failure::Transport(&message), &self.store);
            }
        };
        info!(
            "model {} replied ({} chars, {})",
            response.model.as_deref().unwrap_or("unknown"),
            response.text.len(),
            describe_usage(response.usage.as_ref())
        );

        match analysis::parse(&response.text) {
            Some(payload) => analysis::normalize(&payload, &response.text, &self.store),
            None => {
                error!("model reply could not be parsed as an analysis object");
                failure_result(
                    Failure::Parse {
                        raw_text: &response.text,
                        language,
                    },
                    &self.store,
                )
            }
        }
    }

    async fn invoke(
        &self,
        provider: P,
        image_data: &str,
        language: Language,
    ) -> Result<ProviderResponse> {
        let image = ImageData::from_data_uri(image_data)?;
        let prompt = prompt::build(language)?;
        provider
            .append_user_data(image)
            .append_user_input(prompt)
            .with_json_response()
            .with_temperature(self.temperature)
            .generate()
            .await
    }
}

fn describe_usage(usage: Option<&ProviderUsage>) -> String {
    let Some(usage) = usage else {
        return "tokens: unavailable".to_string();
    };
    let parts = [
        usage.prompt_tokens.map(|count| format!("prompt={}", count)),
        usage.completion_tokens.map(|count| format!("completion={}", count)),
        usage.total_tokens.map(|count| format!("total={}", count)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if parts.is_empty() {
        "tokens: unavailable".to_string()
    } else {
        format!("tokens: {}", parts.join(", "))
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
