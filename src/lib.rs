use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod analysis;
pub mod analyzer;
pub mod i18n;
pub mod image;
pub mod languages;
pub mod logging;
mod paths;
pub mod preferences;
pub mod prompt;
pub mod providers;
pub mod render;
pub mod server;
pub mod settings;

pub use analysis::AnalysisResult;
pub use analyzer::Analyzer;
pub use i18n::TranslationStore;
pub use image::ImageData;
pub use languages::Language;
pub use providers::{Gemini, Provider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lang: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    pub format: OutputFormat,
    pub show_enabled_languages: bool,
    /// Print a random waiting line to stderr while the model works.
    pub announce: bool,
}

pub async fn run(config: Config, image: Option<ImageData>) -> Result<String> {
    let requested = config
        .lang
        .as_deref()
        .map(str::parse::<Language>)
        .transpose()?;
    if config.show_enabled_languages {
        return Ok(format_languages());
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let image =
        image.ok_or_else(|| anyhow!("no image given; pass --data or pipe an image on stdin"))?;
    let store = prepare_store(&settings, requested).await;
    let language = store.language().unwrap_or(settings.language);
    let analyzer = build_analyzer(
        &settings,
        config.key.as_deref(),
        config.model.clone(),
        store.clone(),
    );

    if config.announce {
        eprintln!("{}", announcement(&store, language));
    }
    let result = analyzer.analyze(&image.to_data_uri(), language).await;

    match config.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => Ok(render::render_report(&result, &store)),
    }
}

/// Builds the store from settings and loads its first language: the
/// requested one (remembered for next time), else the last one used, else
/// the configured default.
pub async fn prepare_store(
    settings: &settings::Settings,
    requested: Option<Language>,
) -> Arc<TranslationStore> {
    let store = TranslationStore::from_boxed(i18n::source::from_settings(settings))
        .with_preferences(preferences::Preferences::default_location());
    match requested {
        Some(language) => store.select(language).await,
        None => {
            let language = store.initial_language(settings.language);
            debug!("starting with language {}", language);
            store.load(language).await;
        }
    }
    Arc::new(store)
}

/// An analyzer backed by Gemini when a key can be found, or an unconfigured
/// one whose every call reports the missing credential.
pub fn build_analyzer(
    settings: &settings::Settings,
    key: Option<&str>,
    model: Option<String>,
    store: Arc<TranslationStore>,
) -> Analyzer<Gemini> {
    let provider = providers::resolve_key(key).map(|key| {
        Gemini::new(key)
            .with_model(model.unwrap_or_else(|| settings.model.clone()))
            .with_retry(settings.retry)
            .with_timeout(settings.model_timeout)
    });
    if provider.is_none() {
        warn!("no API key found (checked GEMINI_API_KEY, GOOGLE_API_KEY, API_KEY)");
    }
    Analyzer::new(provider, store).with_temperature(settings.temperature)
}

fn announcement(store: &TranslationStore, language: Language) -> String {
    let current = store.resolve_with(
        "language.current",
        &i18n::Params::new().with("language", language.native_name()),
    );
    format!(
        "{}\n{} {}",
        current,
        store.resolve("loading.analyzing"),
        store.pick("loading.waitMessages")
    )
}

fn format_languages() -> String {
    Language::ALL
        .iter()
        .map(|language| format!("{}\t{}", language.code(), language.native_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_languages_with_native_names() {
        let listing = format_languages();
        assert_eq!(listing.lines().count(), Language::ALL.len());
        assert!(listing.starts_with("en\tEnglish"));
        assert!(listing.contains("ko\t한국어"));
    }

    #[tokio::test]
    async fn announcement_names_language_and_progress() {
        let store = i18n::test_support::loaded_store(
            Language::Ja,
            r#"{"language.current": "言語: {language}", "loading.analyzing": "分析中...", "loading.waitMessages": ["少々お待ちください"]}"#,
        )
        .await;
        assert_eq!(
            announcement(&store, Language::Ja),
            "言語: 日本語\n分析中... 少々お待ちください"
        );
    }

    #[tokio::test]
    async fn unknown_language_is_rejected_before_analysis() {
        let config = Config {
            lang: Some("xx".to_string()),
            ..Config::default()
        };
        let err = run(config, None).await.unwrap_err();
        assert!(err.to_string().contains("unsupported language code 'xx'"));
    }
}
