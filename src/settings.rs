use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::languages::Language;
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub language: Language,
    pub model: String,
    pub temperature: f32,
    /// Upper bound on one model request, connect to last byte.
    pub model_timeout: Duration,
    pub locales_dir: Option<String>,
    pub locales_url: Option<String>,
    pub locales_timeout: Duration,
    pub retry: RetryPolicy,
    pub server_addr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::default(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            model_timeout: Duration::from_secs(120),
            locales_dir: None,
            locales_url: None,
            locales_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            server_addr: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    system: Option<SystemSettings>,
    model: Option<ModelSettings>,
    locales: Option<LocaleSettings>,
    retry: Option<RetrySettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSettings {
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelSettings {
    name: Option<String>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LocaleSettings {
    dir: Option<String>,
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySettings {
    max_retries: Option<usize>,
    base_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = paths::app_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(system) = incoming.system {
            if let Some(code) = non_blank(system.language) {
                self.language = code.parse()?;
            }
        }
        if let Some(model) = incoming.model {
            if let Some(name) = non_blank(model.name) {
                self.model = name;
            }
            if let Some(temperature) = model.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(anyhow!(
                        "model temperature must be between 0.0 and 2.0 (got {})",
                        temperature
                    ));
                }
                self.temperature = temperature;
            }
            if let Some(secs) = model.timeout_secs.filter(|secs| *secs > 0) {
                self.model_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(locales) = incoming.locales {
            if let Some(dir) = non_blank(locales.dir) {
                self.locales_dir = Some(dir);
            }
            if let Some(url) = non_blank(locales.url) {
                self.locales_url = Some(url);
            }
            if let Some(secs) = locales.timeout_secs.filter(|secs| *secs > 0) {
                self.locales_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(retry) = incoming.retry {
            if let Some(max) = retry.max_retries {
                self.retry.max_retries = max;
            }
            if let Some(secs) = retry.base_delay_secs {
                if secs > 0 {
                    self.retry.base_delay = Duration::from_secs(secs);
                }
            }
            if let Some(secs) = retry.max_delay_secs {
                if secs > 0 {
                    self.retry.max_delay = Duration::from_secs(secs);
                }
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = non_blank(server.addr) {
                self.server_addr = addr;
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::app_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
