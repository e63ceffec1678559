use serde_json::{Map, Value};

use super::{AnalysisResult, Attribute, Effect, FailureKind, StatValue};
use crate::i18n::{Params, TranslationStore};
use crate::languages::Language;

const GAME_NAME_UNKNOWN: &str = "analysis.gameNameUnknown";
const GAME_NAME_ERROR: &str = "analysis.gameNameError";
const ITEM_NAME_ERROR: &str = "analysis.itemNameError";
const ITEM_NAME_PARSING_ERROR: &str = "analysis.itemNameParsingError";
const ITEM_NAME_MISSING: &str = "analysis.itemNameMissing";
const ITEM_TYPE_ERROR: &str = "analysis.itemTypeError";
const ITEM_TYPE_MISSING: &str = "analysis.itemTypeMissing";
const USAGE_GUIDE_MISSING: &str = "analysis.usageGuideMissing";
const OPTION_ANALYSIS_MISSING: &str = "analysis.optionAnalysisMissing";
const OPTION_ANALYSIS_CONFIG_ERROR: &str = "analysis.optionAnalysisConfigError";
const OPTION_ANALYSIS_PARSING_ERROR: &str = "analysis.optionAnalysisParsingError";
const NOT_AVAILABLE: &str = "analysis.analysisNotAvailable";
const NOT_AVAILABLE_ON_ERROR: &str = "analysis.analysisNotAvailableOnError";
const API_KEY_MISSING_USER: &str = "analysis.error.apiKeyMissingUser";
const API_ERROR_USER: &str = "analysis.error.apiErrorUser";
const PARSING_ERROR_USER: &str = "analysis.error.parsingErrorUser";
const BUSY_USER: &str = "analysis.error.busyUser";
const NO_RAW_TEXT: &str = "analysis.error.noRawText";
const RAW_TEXT_API_KEY_MISSING: &str = "analysis.rawTextApiKeyMissing";
const RAW_TEXT_API_ERROR: &str = "analysis.rawTextApiError";
const RAW_TEXT_FULL_RESPONSE: &str = "analysis.rawTextFullResponse";

/// A failure path of the pipeline, with whatever diagnostics it carries.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    Configuration,
    Transport(&'a str),
    Parse {
        raw_text: &'a str,
        language: Language,
    },
    Busy,
}

impl Failure<'_> {
    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Configuration => FailureKind::Configuration,
            Failure::Transport(_) => FailureKind::Transport,
            Failure::Parse { .. } => FailureKind::Parse,
            Failure::Busy => FailureKind::Busy,
        }
    }
}

/// Shapes a parsed model reply into a complete result. Content is taken as
/// given; only missing or malformed fields are replaced.
pub fn normalize(
    payload: &Map<String, Value>,
    raw_text: &str,
    store: &TranslationStore,
) -> AnalysisResult {
    let identified_successfully = payload
        .get("identifiedSuccessfully")
        .is_some_and(truthy);

    let identified_game_name = text_field(payload, "identifiedGameName").or_else(|| {
        identified_successfully.then(|| store.resolve(GAME_NAME_UNKNOWN))
    });

    let raw_identified_text = text_field(payload, "rawIdentifiedText").or_else(|| {
        (!raw_text.trim().is_empty()).then(|| {
            store.resolve_with(
                RAW_TEXT_FULL_RESPONSE,
                &Params::new().with("response", raw_text),
            )
        })
    });

    AnalysisResult {
        identified_game_name,
        item_name: required_text(payload, "itemName", ITEM_NAME_MISSING, store),
        item_type: required_text(payload, "itemType", ITEM_TYPE_MISSING, store),
        rarity: text_field(payload, "rarity"),
        level_requirement: payload.get("levelRequirement").and_then(stat_value),
        flavor_text: text_field(payload, "flavorText"),
        attributes: attributes(payload.get("attributes")).unwrap_or_default(),
        effects: effects(payload.get("effects")),
        options: attributes(payload.get("options")),
        usage_guide: required_text(payload, "usageGuide", USAGE_GUIDE_MISSING, store),
        option_analysis: required_text(payload, "optionAnalysis", OPTION_ANALYSIS_MISSING, store),
        identified_successfully,
        raw_identified_text,
        scarcity_analysis: text_field(payload, "scarcityAnalysis"),
        popularity_demand: text_field(payload, "popularityDemand"),
        optimal_options_summary: text_field(payload, "optimalOptionsSummary"),
        item_value_assessment: text_field(payload, "itemValueAssessment"),
        failure_kind: None,
    }
}

/// The well-formed result reported for a pipeline failure.
pub fn failure_result(failure: Failure<'_>, store: &TranslationStore) -> AnalysisResult {
    let t = |key: &str| store.resolve(key);
    let (game, item_name, usage_guide, option_analysis, raw_text, unavailable) = match failure {
        Failure::Configuration => (
            t(GAME_NAME_UNKNOWN),
            t(ITEM_NAME_ERROR),
            t(API_KEY_MISSING_USER),
            t(OPTION_ANALYSIS_CONFIG_ERROR),
            Some(t(RAW_TEXT_API_KEY_MISSING)),
            t(NOT_AVAILABLE),
        ),
        Failure::Transport(message) => (
            t(GAME_NAME_ERROR),
            t(ITEM_NAME_ERROR),
            t(API_ERROR_USER),
            t(API_ERROR_USER),
            Some(store.resolve_with(
                RAW_TEXT_API_ERROR,
                &Params::new().with("errorMessage", message),
            )),
            t(NOT_AVAILABLE_ON_ERROR),
        ),
        Failure::Parse { raw_text, language } => {
            let raw = if raw_text.trim().is_empty() {
                store.resolve_with(NO_RAW_TEXT, &Params::new().with("lang", language))
            } else {
                raw_text.to_string()
            };
            (
                t(GAME_NAME_ERROR),
                t(ITEM_NAME_PARSING_ERROR),
                t(PARSING_ERROR_USER),
                t(OPTION_ANALYSIS_PARSING_ERROR),
                Some(raw),
                t(NOT_AVAILABLE_ON_ERROR),
            )
        }
        Failure::Busy => (
            t(GAME_NAME_UNKNOWN),
            t(ITEM_NAME_ERROR),
            t(BUSY_USER),
            t(NOT_AVAILABLE),
            None,
            t(NOT_AVAILABLE),
        ),
    };

    AnalysisResult {
        identified_game_name: Some(game),
        item_name,
        item_type: t(ITEM_TYPE_ERROR),
        rarity: None,
        level_requirement: None,
        flavor_text: None,
        attributes: Vec::new(),
        effects: Vec::new(),
        options: None,
        usage_guide,
        option_analysis,
        identified_successfully: false,
        raw_identified_text: raw_text,
        scarcity_analysis: Some(unavailable.clone()),
        popularity_demand: Some(unavailable.clone()),
        optimal_options_summary: Some(unavailable.clone()),
        item_value_assessment: Some(unavailable),
        failure_kind: Some(failure.kind()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(scalar_text)
}

fn required_text(
    payload: &Map<String, Value>,
    key: &str,
    fallback_key: &str,
    store: &TranslationStore,
) -> String {
    text_field(payload, key).unwrap_or_else(|| store.resolve(fallback_key))
}

fn stat_value(value: &Value) -> Option<StatValue> {
    match value {
        Value::Number(number) => Some(StatValue::Number(number.clone())),
        Value::String(text) if !text.trim().is_empty() => Some(StatValue::Text(text.clone())),
        _ => None,
    }
}

/// `None` when the key is absent or not a list; bare strings become
/// attributes with an empty value.
fn attributes(value: Option<&Value>) -> Option<Vec<Attribute>> {
    let Value::Array(items) = value? else {
        return None;
    };
    let parsed = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(Attribute {
                name: text_field(map, "name")?,
                value: map
                    .get("value")
                    .and_then(stat_value)
                    .unwrap_or_else(|| StatValue::Text(String::new())),
                description: text_field(map, "description"),
            }),
            Value::String(text) if !text.trim().is_empty() => Some(Attribute {
                name: text.clone(),
                value: StatValue::Text(String::new()),
                description: None,
            }),
            _ => None,
        })
        .collect();
    Some(parsed)
}

fn effects(value: Option<&Value>) -> Vec<Effect> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(Effect {
                name: text_field(map, "name")?,
                description: text_field(map, "description").unwrap_or_default(),
            }),
            Value::String(text) if !text.trim().is_empty() => Some(Effect {
                name: text.clone(),
                description: String::new(),
            }),
            _ => None,
        })
        .collect()
}
