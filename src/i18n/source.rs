use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::languages::Language;
use crate::settings::Settings;

include!(concat!(env!("OUT_DIR"), "/embedded_locales.rs"));

pub type LocaleFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Where locale files come from. One resource per language code.
pub trait LocaleSource: Send + Sync {
    fn fetch(&self, language: Language) -> LocaleFuture;
}

/// Locale files compiled into the binary from `src/locales`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedLocales;

impl LocaleSource for EmbeddedLocales {
    fn fetch(&self, language: Language) -> LocaleFuture {
        let raw = embedded_locale(language.code());
        Box::pin(async move {
            raw.map(str::to_string)
                .ok_or_else(|| anyhow!("no embedded locale for '{}'", language))
        })
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryLocales {
    dir: PathBuf,
}

impl DirectoryLocales {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LocaleSource for DirectoryLocales {
    fn fetch(&self, language: Language) -> LocaleFuture {
        let path = self.dir.join(format!("{}.json", language.code()));
        Box::pin(async move {
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read locale file: {}", path.display()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpLocales {
    base_url: String,
    timeout: Duration,
}

impl HttpLocales {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    fn url_for(&self, language: Language) -> String {
        format!(
            "{}/{}.json",
            self.base_url.trim_end_matches('/'),
            language.code()
        )
    }
}

impl LocaleSource for HttpLocales {
    fn fetch(&self, language: Language) -> LocaleFuture {
        let url = self.url_for(language);
        let timeout = self.timeout;
        Box::pin(async move {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .with_context(|| "failed to build HTTP client")?;
            let response = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("failed to fetch locale: {}", url))?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("failed to fetch locale {} ({})", url, status));
            }
            response
                .text()
                .await
                .with_context(|| format!("failed to read locale body: {}", url))
        })
    }
}

/// `[locales] url` wins over `[locales] dir`; neither means embedded files.
pub fn from_settings(settings: &Settings) -> Box<dyn LocaleSource> {
    if let Some(url) = settings.locales_url.as_deref() {
        return Box::new(HttpLocales::new(url, settings.locales_timeout));
    }
    if let Some(dir) = settings.locales_dir.as_deref() {
        return Box::new(DirectoryLocales::new(dir));
    }
    Box::new(EmbeddedLocales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{Dictionary, TranslationStore};
    use axum::routing::get;
    use axum::Router;

    #[tokio::test]
    async fn every_language_has_an_embedded_locale() {
        for language in Language::ALL {
            let raw = EmbeddedLocales.fetch(language).await.unwrap();
            let dict = Dictionary::parse(&raw).unwrap();
            assert!(!dict.is_empty(), "{} locale is empty", language);
        }
    }

    #[tokio::test]
    async fn directory_source_reads_code_named_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ja.json"), r#"{"a":"b"}"#).unwrap();
        let source = DirectoryLocales::new(dir.path());

        assert_eq!(source.fetch(Language::Ja).await.unwrap(), r#"{"a":"b"}"#);
        assert!(source.fetch(Language::Zh).await.is_err());
    }

    #[test]
    fn http_source_addresses_by_code() {
        let source = HttpLocales::new("https://example.test/locales/", Duration::from_secs(1));
        assert_eq!(
            source.url_for(Language::Ko),
            "https://example.test/locales/ko.json"
        );
    }

    #[tokio::test]
    async fn http_source_serves_files_and_treats_error_status_as_failure() {
        let app = Router::new().route("/locales/en.json", get(|| async { r#"{"k": "v"}"# }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let source = HttpLocales::new(format!("http://{}/locales", addr), Duration::from_secs(5));

        let missing = source.fetch(Language::Ko).await.unwrap_err();
        assert!(missing.to_string().contains("404"), "{:#}", missing);

        let store = TranslationStore::new(source);
        store.load(Language::En).await;
        assert_eq!(store.resolve("k"), "v");
        store.load(Language::Ko).await;
        assert_eq!(store.resolve("k"), "k");
    }
}
