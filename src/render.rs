use crate::analysis::{AnalysisResult, Attribute};
use crate::i18n::{Params, TranslationStore};

const FAILURE_PLACEHOLDERS: &[&str] = &[
    "analysis.gameNameUnknown",
    "analysis.gameNameError",
    "analysis.itemNameError",
    "analysis.itemNameParsingError",
    "analysis.itemNameMissing",
];

/// Plain-text report of a result, labelled in the store's language.
pub fn render_report(result: &AnalysisResult, store: &TranslationStore) -> String {
    let mut out = Report::default();
    if result.failure_kind.is_some() {
        out.line(store.resolve("error.analysisFailedTitle"));
        out.blank();
        out.line(&result.usage_guide);
        if let Some(raw) = result.raw_identified_text.as_deref() {
            out.section(store.resolve("report.rawTextTitle"), raw);
        }
        return out.finish();
    }
    if !result.identified_successfully {
        return render_identification_issue(result, store);
    }

    out.line(store.resolve_with(
        "report.identifiedAs",
        &Params::new().with("itemName", &result.item_name),
    ));
    if let Some(game) = result.identified_game_name.as_deref() {
        out.labelled(store.resolve("report.label.gameName"), game);
    }
    out.labelled(store.resolve("report.label.type"), &result.item_type);
    if let Some(rarity) = result.rarity.as_deref() {
        out.labelled(store.resolve("report.label.rarity"), rarity);
    }
    if let Some(level) = &result.level_requirement {
        out.labelled(store.resolve("report.label.levelReq"), &level.to_string());
    }
    if let Some(flavor) = result.flavor_text.as_deref() {
        out.section(store.resolve("report.flavorTextTitle"), &format!("\"{}\"", flavor));
    }
    if !result.attributes.is_empty() {
        out.section(store.resolve("report.attributesTitle"), &bullets(&result.attributes));
    }
    if let Some(options) = result.options.as_ref().filter(|options| !options.is_empty()) {
        out.section(store.resolve("report.optionsAffixesTitle"), &bullets(options));
    }
    if !result.effects.is_empty() {
        let effects = result
            .effects
            .iter()
            .map(|effect| format!("- {}: {}", effect.name, effect.description))
            .collect::<Vec<_>>()
            .join("\n");
        out.section(store.resolve("report.specialEffectsTitle"), &effects);
    }
    out.section(store.resolve("report.optionAnalysisTitle"), &result.option_analysis);
    out.section(store.resolve("report.usageGuideTitle"), &result.usage_guide);

    for (key, body) in [
        ("report.scarcityAnalysisTitle", &result.scarcity_analysis),
        ("report.popularityDemandTitle", &result.popularity_demand),
        ("report.optimalOptionsSummaryTitle", &result.optimal_options_summary),
        ("report.itemValueAssessmentTitle", &result.item_value_assessment),
    ] {
        if let Some(body) = body.as_deref() {
            out.section(store.resolve(key), body);
        }
    }
    out.finish()
}

fn render_identification_issue(result: &AnalysisResult, store: &TranslationStore) -> String {
    let placeholders = FAILURE_PLACEHOLDERS
        .iter()
        .map(|key| store.resolve(key))
        .collect::<Vec<_>>();
    let is_placeholder = |value: &str| placeholders.iter().any(|known| known == value);

    let mut out = Report::default();
    out.line(store.resolve("report.identificationIssueTitle"));
    out.blank();
    if result.usage_guide.trim().is_empty() {
        out.line(store.resolve("report.identificationIssueMessage"));
    } else {
        out.line(&result.usage_guide);
    }
    if let Some(game) = result
        .identified_game_name
        .as_deref()
        .filter(|game| !is_placeholder(game))
    {
        out.labelled(store.resolve("report.label.gameName"), game);
    }
    if !result.item_name.trim().is_empty() && !is_placeholder(&result.item_name) {
        out.line(store.resolve_with(
            "report.identifiedAs",
            &Params::new().with("itemName", &result.item_name),
        ));
    }
    if result.usage_guide.trim().is_empty() {
        out.blank();
        out.line(store.resolve("report.tryClearerImage"));
    }
    out.finish()
}

fn bullets(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(|attribute| match attribute.description.as_deref() {
            Some(description) => {
                format!("- {}: {} ({})", attribute.name, attribute.value, description)
            }
            None => format!("- {}: {}", attribute.name, attribute.value),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Default)]
struct Report {
    lines: Vec<String>,
}

impl Report {
    fn line(&mut self, text: impl AsRef<str>) {
        self.lines.push(text.as_ref().to_string());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn labelled(&mut self, label: String, value: &str) {
        self.lines.push(format!("{}: {}", label, value));
    }

    fn section(&mut self, title: String, body: &str) {
        self.blank();
        self.lines.push(format!("[{}]", title));
        self.lines.push(body.to_string());
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}
