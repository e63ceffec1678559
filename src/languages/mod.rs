use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Ko,
    Ja,
    Zh,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Ko, Language::Ja, Language::Zh];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Ja => "ja",
            Language::Zh => "zh",
        }
    }

    /// Name used inside model instructions.
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "Korean",
            Language::Ja => "Japanese",
            Language::Zh => "Chinese",
        }
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "한국어",
            Language::Ja => "日本語",
            Language::Zh => "中文",
        }
    }

    pub fn parse_code(code: &str) -> Option<Language> {
        let code = normalize_code(code);
        Language::ALL
            .into_iter()
            .find(|language| language.code() == code)
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Language::parse_code(value).ok_or_else(|| {
            anyhow!(
                "unsupported language code '{}' (expected one of: {})",
                value.trim(),
                supported_codes().join(", ")
            )
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

pub fn supported_codes() -> Vec<&'static str> {
    Language::ALL.iter().map(|language| language.code()).collect()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(" KO ".parse::<Language>().unwrap(), Language::Ko);
        assert_eq!(Language::parse_code("zh"), Some(Language::Zh));
    }

    #[test]
    fn rejects_unknown_code_with_supported_list() {
        let err = "fr".parse::<Language>().unwrap_err().to_string();
        assert!(err.contains("'fr'"));
        assert!(err.contains("en, ko, ja, zh"));
    }

    #[test]
    fn defaults_to_korean() {
        assert_eq!(Language::default(), Language::Ko);
    }
}
