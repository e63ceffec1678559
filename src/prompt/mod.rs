use anyhow::{Context, Result};
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::languages::Language;

const ITEM_ANALYSIS_TEMPLATE: &str = include_str!("templates/item_analysis.tera");

/// One key of the JSON object the model must return.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchemaField {
    pub name: &'static str,
    pub shape: &'static str,
    pub required: bool,
    pub note: &'static str,
}

const fn field(
    name: &'static str,
    shape: &'static str,
    required: bool,
    note: &'static str,
) -> SchemaField {
    SchemaField {
        name,
        shape,
        required,
        note,
    }
}

pub const SCHEMA_FIELDS: &[SchemaField] = &[
    field("identifiedGameName", "string", false, "game name, or \"Unknown Game\" in the target language"),
    field("itemName", "string", true, "exact item name"),
    field("itemType", "string", true, "item type"),
    field("rarity", "string", false, "rarity"),
    field("levelRequirement", "number | string", false, "only when printed on the item"),
    field("flavorText", "string", false, "visible lore text, translated"),
    field("attributes", "Attribute[]", true, "clearly visible stats only"),
    field("effects", "Effect[]", true, "clearly visible special effects only"),
    field("options", "Attribute[]", false, "variable affixes with their exact values"),
    field("usageGuide", "string", true, "usage recommendations, or the reason identification failed"),
    field("optionAnalysis", "string", true, "roll quality analysis per variable stat"),
    field("identifiedSuccessfully", "boolean", true, "true only when 70%+ of the item is identified with certainty"),
    field("rawIdentifiedText", "string", false, "all visible text in its original language"),
    field("scarcityAnalysis", "string", false, "scarcity category with reasons"),
    field("popularityDemand", "string", false, "demand category with reasons"),
    field("optimalOptionsSummary", "string", false, "priority stats for a perfect roll"),
    field("itemValueAssessment", "string", false, "value category with justification"),
];

#[derive(Serialize)]
struct PromptField {
    name: &'static str,
    shape: String,
    note: &'static str,
}

/// Renders the full instruction document for `language`. Pure: the same
/// language always yields the same text.
pub fn build(language: Language) -> Result<String> {
    let fields = SCHEMA_FIELDS
        .iter()
        .map(|field| PromptField {
            name: field.name,
            shape: if field.required {
                field.shape.to_string()
            } else {
                format!("{} (optional)", field.shape)
            },
            note: field.note,
        })
        .collect::<Vec<_>>();

    let mut context = TeraContext::new();
    context.insert("lang_name", language.english_name());
    context.insert("fields", &fields);
    Tera::one_off(ITEM_ANALYSIS_TEMPLATE, &context, false)
        .with_context(|| format!("failed to render analysis prompt for {}", language))
}
