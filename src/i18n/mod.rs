//! Per-language flat string dictionaries.
//!
//! A [`TranslationStore`] holds exactly one active dictionary. Loads replace it
//! wholesale; lookups fail open by returning the key itself, so a missing or
//! broken locale file degrades the output instead of breaking it.

use anyhow::Result;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

mod dictionary;
pub mod source;

pub use dictionary::{interpolate, Dictionary, Entry, Params};
pub use source::{DirectoryLocales, EmbeddedLocales, HttpLocales, LocaleFuture, LocaleSource};

use crate::languages::Language;
use crate::preferences::Preferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Ready,
}

#[derive(Debug)]
struct Snapshot {
    language: Option<Language>,
    status: LoadStatus,
    dictionary: Arc<Dictionary>,
}

impl Snapshot {
    fn pending(language: Option<Language>) -> Self {
        Self {
            language,
            status: LoadStatus::Loading,
            dictionary: Arc::new(Dictionary::default()),
        }
    }
}

pub struct TranslationStore {
    source: Box<dyn LocaleSource>,
    preferences: Option<Preferences>,
    generation: AtomicU64,
    current: RwLock<Arc<Snapshot>>,
}

impl TranslationStore {
    pub fn new(source: impl LocaleSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    pub fn from_boxed(source: Box<dyn LocaleSource>) -> Self {
        Self {
            source,
            preferences: None,
            generation: AtomicU64::new(0),
            current: RwLock::new(Arc::new(Snapshot::pending(None))),
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Language to start a session with: the persisted choice, else `fallback`.
    pub fn initial_language(&self, fallback: Language) -> Language {
        self.preferences
            .as_ref()
            .and_then(Preferences::last_language)
            .unwrap_or(fallback)
    }

    pub fn status(&self) -> LoadStatus {
        self.snapshot().status
    }

    /// The most recently requested language, loaded or not.
    pub fn language(&self) -> Option<Language> {
        self.snapshot().language
    }

    /// Starts loading `language`, superseding every earlier load.
    ///
    /// The request is claimed when this is called, not when the future is
    /// first polled, so call order decides which dictionary ends up active.
    pub fn load(&self, language: Language) -> impl Future<Output = ()> + Send + '_ {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.install_if_current(generation, Snapshot::pending(Some(language)));
        debug!("loading translations for {} (generation {})", language, generation);
        let fetch = self.source.fetch(language);
        async move {
            let raw = fetch.await;
            self.finish_load(generation, language, raw);
        }
    }

    /// Persists `language` as the last selection, then loads it.
    pub async fn select(&self, language: Language) {
        if let Some(preferences) = &self.preferences {
            if let Err(err) = preferences.set_last_language(language) {
                warn!("failed to persist language {}: {:#}", language, err);
            }
        }
        self.load(language).await;
    }

    pub fn resolve(&self, key: &str) -> String {
        self.resolve_with(key, &Params::default())
    }

    pub fn resolve_with(&self, key: &str, params: &Params) -> String {
        let snapshot = self.snapshot();
        if snapshot.status == LoadStatus::Loading || snapshot.dictionary.is_empty() {
            return key.to_string();
        }
        let Some(entry) = snapshot.dictionary.get(key) else {
            debug!("translation key '{}' missing for {:?}", key, snapshot.language);
            return key.to_string();
        };
        match entry.as_scalar() {
            Some(value) => interpolate(&value, params),
            None => {
                warn!("translation key '{}' is not a string; returning key", key);
                key.to_string()
            }
        }
    }

    /// List-valued entries. A plain string counts as a one-element list.
    pub fn resolve_list(&self, key: &str) -> Vec<String> {
        let snapshot = self.snapshot();
        if snapshot.status == LoadStatus::Loading {
            return Vec::new();
        }
        match snapshot.dictionary.get(key) {
            Some(Entry::List(items)) => items.clone(),
            Some(Entry::Text(text)) => vec![text.clone()],
            _ => Vec::new(),
        }
    }

    /// A random member of a list-valued entry.
    pub fn pick(&self, key: &str) -> String {
        let items = self.resolve_list(key);
        match items.choose(&mut rand::rng()) {
            Some(item) => item.clone(),
            None => self.resolve(key),
        }
    }

    fn finish_load(&self, generation: u64, language: Language, raw: Result<String>) {
        let dictionary = match raw.and_then(|raw| Dictionary::parse(&raw)) {
            Ok(dictionary) => dictionary,
            Err(err) => {
                warn!("failed to load translations for {}: {:#}", language, err);
                Dictionary::default()
            }
        };
        let entries = dictionary.len();
        let installed = self.install_if_current(
            generation,
            Snapshot {
                language: Some(language),
                status: LoadStatus::Ready,
                dictionary: Arc::new(dictionary),
            },
        );
        if installed {
            info!("translations ready for {} ({} keys)", language, entries);
        } else {
            debug!(
                "discarding superseded translations for {} (generation {})",
                language, generation
            );
        }
    }

    fn install_if_current(&self, generation: u64, snapshot: Snapshot) -> bool {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *current = Arc::new(snapshot);
        true
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Serves fixed JSON per language.
    pub(crate) struct StaticLocales(pub HashMap<Language, String>);

    impl StaticLocales {
        pub(crate) fn single(language: Language, raw: &str) -> Self {
            Self(HashMap::from([(language, raw.to_string())]))
        }
    }

    impl LocaleSource for StaticLocales {
        fn fetch(&self, language: Language) -> LocaleFuture {
            let raw = self.0.get(&language).cloned();
            Box::pin(async move { raw.ok_or_else(|| anyhow!("no locale for {}", language)) })
        }
    }

    /// Each language answers only when the test sends its body.
    pub(crate) struct GatedLocales(Mutex<HashMap<Language, oneshot::Receiver<String>>>);

    impl GatedLocales {
        pub(crate) fn new(gates: Vec<(Language, oneshot::Receiver<String>)>) -> Self {
            Self(Mutex::new(gates.into_iter().collect()))
        }
    }

    impl LocaleSource for GatedLocales {
        fn fetch(&self, language: Language) -> LocaleFuture {
            let gate = self.0.lock().unwrap().remove(&language);
            Box::pin(async move {
                let gate = gate.ok_or_else(|| anyhow!("no gate for {}", language))?;
                gate.await.map_err(|_| anyhow!("gate for {} dropped", language))
            })
        }
    }

    pub(crate) async fn loaded_store(language: Language, raw: &str) -> TranslationStore {
        let store = TranslationStore::new(StaticLocales::single(language, raw));
        store.load(language).await;
        store
    }
}
