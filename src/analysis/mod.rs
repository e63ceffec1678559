//! Result types of an item analysis and the two steps that turn model text
//! into them: [`parse`] and [`normalize`].

use serde::{Deserialize, Serialize};
use std::fmt;

mod normalize;
mod parse;

pub use normalize::{failure_result, normalize, Failure};
pub use parse::{parse, unwrap_fence};

/// A stat value as printed on the item: `+127` or `"18%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(number) => write!(f, "{}", number),
            StatValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: StatValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    pub description: String,
}

/// Which failure path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Configuration,
    Transport,
    Parse,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified_game_name: Option<String>,
    pub item_name: String,
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_requirement: Option<StatValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_text: Option<String>,
    pub attributes: Vec<Attribute>,
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Attribute>>,
    pub usage_guide: String,
    pub option_analysis: String,
    pub identified_successfully: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_identified_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scarcity_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_demand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_options_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_value_assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl AnalysisResult {
    /// The model's own explanation when it answered but reported the item
    /// as unidentified. `None` for successes and for system failures.
    pub fn identification_issue(&self) -> Option<&str> {
        if self.identified_successfully || self.failure_kind.is_some() {
            return None;
        }
        Some(self.usage_guide.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            identified_game_name: Some("Diablo IV".to_string()),
            item_name: "Doombringer".to_string(),
            item_type: "Sword".to_string(),
            rarity: None,
            level_requirement: Some(StatValue::Number(serde_json::Number::from(80u64))),
            flavor_text: None,
            attributes: vec![Attribute {
                name: "Strength".to_string(),
                value: StatValue::Text("+127".to_string()),
                description: None,
            }],
            effects: Vec::new(),
            options: None,
            usage_guide: "Barbarian".to_string(),
            option_analysis: "High roll".to_string(),
            identified_successfully: true,
            raw_identified_text: None,
            scarcity_analysis: None,
            popularity_demand: None,
            optimal_options_summary: None,
            item_value_assessment: None,
            failure_kind: None,
        }
    }

    #[test]
    fn serializes_camel_case_and_omits_absent_optionals() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "identifiedGameName": "Diablo IV",
                "itemName": "Doombringer",
                "itemType": "Sword",
                "levelRequirement": 80,
                "attributes": [{"name": "Strength", "value": "+127"}],
                "effects": [],
                "usageGuide": "Barbarian",
                "optionAnalysis": "High roll",
                "identifiedSuccessfully": true
            })
        );
    }

    #[test]
    fn identification_issue_only_for_model_reported_failures() {
        let mut result = sample();
        assert_eq!(result.identification_issue(), None);

        result.identified_successfully = false;
        result.usage_guide = "Tooltip is cropped".to_string();
        assert_eq!(result.identification_issue(), Some("Tooltip is cropped"));

        result.failure_kind = Some(FailureKind::Transport);
        assert_eq!(result.identification_issue(), None);
    }

    #[test]
    fn stat_values_display_verbatim() {
        assert_eq!(StatValue::Number(serde_json::Number::from(18u64)).to_string(), "18");
        assert_eq!(StatValue::Text("18%".to_string()).to_string(), "18%");
    }
}
