use serde::{Deserialize, Serialize};

use crate::i18n::LoadStatus;
use crate::languages::Language;

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeRequest {
    /// `data:<mime>;base64,<payload>`
    pub(crate) image: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LanguageRequest {
    pub(crate) lang: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LanguageInfo {
    pub(crate) code: Language,
    pub(crate) name: &'static str,
    pub(crate) english_name: &'static str,
}

impl From<Language> for LanguageInfo {
    fn from(language: Language) -> Self {
        Self {
            code: language,
            name: language.native_name(),
            english_name: language.english_name(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LanguagesResponse {
    pub(crate) active: Option<Language>,
    pub(crate) status: LoadStatus,
    pub(crate) languages: Vec<LanguageInfo>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LanguageResponse {
    pub(crate) language: Language,
    pub(crate) status: LoadStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
