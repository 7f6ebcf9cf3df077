//! Gherkin feature parsing and step-definition linking.
//!
//! `.feature` files are plain text, parsed line by line: features,
//! scenarios (plain and outlines), steps with And/But keyword
//! inheritance, tags, data tables and doc strings. Step implementations
//! are found in source files by decorator/call patterns and matched
//! against step text with `{param}` / `<param>` placeholders.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::definer::{FileOutline, StepDef};
use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};
use crate::lang::Lang;

// =============================================================================
// GHERKIN MODEL
// =============================================================================

#[derive(Debug, Clone)]
pub struct GherkinStep {
    /// Normalized keyword: given, when or then.
    pub keyword: String,
    /// Keyword as written (Given/When/Then/And/But/*).
    pub raw_keyword: String,
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct GherkinScenario {
    pub name: String,
    pub tags: Vec<String>,
    pub is_outline: bool,
    pub steps: Vec<GherkinStep>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct GherkinFeature {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub scenarios: Vec<GherkinScenario>,
}

/// One emitted step node, kept for the linking pass.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step_qn: String,
    pub keyword: String,
    pub text: String,
}

/// Parse and emission result for one `.feature` file.
pub struct BddFileResult {
    pub outline: FileOutline,
    pub steps: Vec<StepRecord>,
}

// =============================================================================
// FEATURE FILE PARSING
// =============================================================================

const STEP_KEYWORDS: &[&str] = &["Given", "When", "Then", "And", "But", "*"];

/// Line parser for one Gherkin document.
pub fn parse_feature(content: &str) -> Option<GherkinFeature> {
    let mut feature: Option<GherkinFeature> = None;
    let mut pending_tags: Vec<String> = Vec::new();
    let mut in_scenario = false;
    let mut in_doc_string = false;
    let mut last_keyword = String::from("given");

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        let line_no = idx as u32 + 1;

        if line == "\"\"\"" || line == "'''" {
            in_doc_string = !in_doc_string;
            continue;
        }
        if in_doc_string || line.is_empty() || line.starts_with('#') || line.starts_with('|') {
            continue;
        }

        if line.starts_with('@') {
            pending_tags.extend(
                line.split_whitespace().filter(|t| t.starts_with('@')).map(String::from),
            );
            continue;
        }

        if let Some(name) = line.strip_prefix("Feature:") {
            feature = Some(GherkinFeature {
                name: name.trim().to_string(),
                description: String::new(),
                tags: std::mem::take(&mut pending_tags),
                scenarios: Vec::new(),
            });
            in_scenario = false;
            continue;
        }

        let Some(feature) = feature.as_mut() else {
            continue;
        };

        if let Some(name) = line
            .strip_prefix("Scenario Outline:")
            .map(|n| (n, true))
            .or_else(|| line.strip_prefix("Scenario:").map(|n| (n, false)))
        {
            let (name, is_outline) = name;
            feature.scenarios.push(GherkinScenario {
                name: name.trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                is_outline,
                steps: Vec::new(),
                line: line_no,
            });
            in_scenario = true;
            last_keyword = String::from("given");
            continue;
        }

        if line.starts_with("Background:") || line.starts_with("Examples:") {
            in_scenario = line.starts_with("Background:");
            continue;
        }

        if let Some(raw_keyword) =
            STEP_KEYWORDS.iter().find(|k| line.starts_with(&format!("{k} ")) || line == **k)
        {
            if !in_scenario || feature.scenarios.is_empty() {
                continue;
            }
            let text = line[raw_keyword.len()..].trim().to_string();
            let keyword = match *raw_keyword {
                "Given" => "given".to_string(),
                "When" => "when".to_string(),
                "Then" => "then".to_string(),
                // And/But/* inherit the preceding keyword
                _ => last_keyword.clone(),
            };
            last_keyword = keyword.clone();
            if let Some(scenario) = feature.scenarios.last_mut() {
                scenario.steps.push(GherkinStep {
                    keyword,
                    raw_keyword: raw_keyword.to_string(),
                    text,
                    line: line_no,
                });
            }
            continue;
        }

        // free text under the feature header is its description
        if !in_scenario {
            if !feature.description.is_empty() {
                feature.description.push('\n');
            }
            feature.description.push_str(line);
        }
    }

    feature
}

/// Parse one `.feature` file and produce its nodes and edges.
pub fn analyze_feature_file(relative_path: &str, content: &str) -> Option<BddFileResult> {
    let feature = parse_feature(content)?;
    let mut outline = FileOutline {
        relative_path: relative_path.to_string(),
        language: Some(Lang::Gherkin),
        byte_len: content.len() as u64,
        ..Default::default()
    };
    let mut steps = Vec::new();

    let feature_qn = format!("{relative_path}.{}", sanitize(&feature.name));
    outline.analyzer_nodes.push(
        NodeRow::new(NodeLabel::BddFeature, feature_qn.clone())
            .prop("name", feature.name.clone())
            .prop("path", relative_path)
            .prop("description", feature.description.clone())
            .prop("tags", feature.tags.clone()),
    );
    outline.analyzer_edges.push(RelRow::new(
        NodeRef::new(NodeLabel::File, relative_path.to_string()),
        RelType::Defines,
        NodeRef::new(NodeLabel::BddFeature, feature_qn.clone()),
    ));

    for scenario in &feature.scenarios {
        let scenario_qn = format!("{feature_qn}.{}", sanitize(&scenario.name));
        outline.analyzer_nodes.push(
            NodeRow::new(NodeLabel::BddScenario, scenario_qn.clone())
                .prop("name", scenario.name.clone())
                .prop("tags", scenario.tags.clone())
                .prop("is_outline", scenario.is_outline)
                .prop("step_count", scenario.steps.len() as i64),
        );
        outline.analyzer_edges.push(RelRow::new(
            NodeRef::new(NodeLabel::BddScenario, scenario_qn.clone()),
            RelType::InFeature,
            NodeRef::new(NodeLabel::BddFeature, feature_qn.clone()),
        ));

        for (idx, step) in scenario.steps.iter().enumerate() {
            let step_qn = format!("{scenario_qn}.step_{idx}");
            outline.analyzer_nodes.push(
                NodeRow::new(NodeLabel::BddStep, step_qn.clone())
                    .prop("keyword", step.keyword.clone())
                    .prop("text", step.text.clone())
                    .prop("line", step.line),
            );
            outline.analyzer_edges.push(RelRow::new(
                NodeRef::new(NodeLabel::BddStep, step_qn.clone()),
                RelType::InScenario,
                NodeRef::new(NodeLabel::BddScenario, scenario_qn.clone()),
            ));
            steps.push(StepRecord {
                step_qn,
                keyword: step.keyword.clone(),
                text: step.text.clone(),
            });
        }
    }

    Some(BddFileResult { outline, steps })
}

// =============================================================================
// STEP DEFINITIONS
// =============================================================================

static PY_STEP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?ms)@(given|when|then|step)\s*\(\s*['"](.+?)['"]\s*\)\s*\r?\n\s*def\s+(\w+)"#)
        .expect("python step pattern")
});

static JS_STEP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)\b(Given|When|Then)\s*\(\s*(?:/(.+?)/|['"](.+?)['"])\s*,"#)
        .expect("js step pattern")
});

static JAVA_STEP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?ms)@(Given|When|Then|And|But)\s*\(\s*"(.+?)"\s*\)\s*\r?\n\s*public\s+\w+\s+(\w+)"#)
        .expect("java step pattern")
});

/// Scan a source file for step implementations and record them on its
/// outline.
pub fn collect_step_defs(content: &str, outline: &mut FileOutline) {
    let Some(lang) = outline.language else {
        return;
    };
    match lang {
        Lang::Python => {
            for caps in PY_STEP_RE.captures_iter(content) {
                outline.step_defs.push(StepDef {
                    keyword: caps[1].to_lowercase(),
                    pattern: caps[2].to_string(),
                    function_qn: format!("{}.{}", outline.module_qn, &caps[3]),
                });
            }
        }
        Lang::JavaScript | Lang::TypeScript => {
            for caps in JS_STEP_RE.captures_iter(content) {
                let pattern = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                outline.step_defs.push(StepDef {
                    keyword: caps[1].to_lowercase(),
                    pattern,
                    // anonymous callbacks: the module stands in
                    function_qn: outline.module_qn.clone(),
                });
            }
        }
        Lang::Java => {
            for caps in JAVA_STEP_RE.captures_iter(content) {
                outline.step_defs.push(StepDef {
                    keyword: caps[1].to_lowercase(),
                    pattern: caps[2].to_string(),
                    function_qn: format!("{}.{}", outline.module_qn, &caps[3]),
                });
            }
        }
        _ => {}
    }
}

/// Match every step against the collected definitions and emit
/// IMPLEMENTS_STEP plus the keyword-specific link.
pub fn link_steps(
    steps: &[StepRecord],
    step_defs: &[(StepDef, NodeLabel)],
    out: &mut Vec<RelRow>,
) -> u64 {
    let mut linked = 0;
    for step in steps {
        for (def, target_label) in step_defs {
            if def.keyword != "step" && def.keyword != step.keyword {
                continue;
            }
            if !pattern_matches(&def.pattern, &step.text) {
                continue;
            }
            let step_ref = NodeRef::new(NodeLabel::BddStep, step.step_qn.clone());
            let target = NodeRef::new(*target_label, def.function_qn.clone());
            out.push(RelRow::new(step_ref.clone(), RelType::ImplementsStep, target.clone()));
            let keyword_rel = match step.keyword.as_str() {
                "given" => RelType::GivenLinksTo,
                "when" => RelType::WhenLinksTo,
                _ => RelType::ThenLinksTo,
            };
            out.push(RelRow::new(step_ref, keyword_rel, target));
            linked += 1;
            break;
        }
    }
    linked
}

/// `{param}` and `<param>` placeholders match any text; everything else
/// is literal. Patterns that are already regexes get a direct try.
fn pattern_matches(pattern: &str, text: &str) -> bool {
    static PLACEHOLDER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{[^}]+\}|<[^>]+>").expect("placeholder pattern"));

    let mut regex_src = String::from("^");
    let mut last = 0;
    for m in PLACEHOLDER.find_iter(pattern) {
        regex_src.push_str(&regex::escape(&pattern[last..m.start()]));
        regex_src.push_str("(.+)");
        last = m.end();
    }
    regex_src.push_str(&regex::escape(&pattern[last..]));
    regex_src.push('$');

    if let Ok(re) = Regex::new(&regex_src) {
        if re.is_match(text) {
            return true;
        }
    }
    // cucumber expressions are often plain regexes already
    Regex::new(&format!("^{pattern}$")).map(|re| re.is_match(text)).unwrap_or(false)
}

fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod unit {
    use super::*;

    const FEATURE: &str = "\
@auth\nFeature: Login\n  Users can sign in.\n\n  Scenario: Happy path\n    Given I am logged in\n    When I open the dashboard\n    And I refresh\n    Then I see my name\n";

    #[test]
    fn parses_features_scenarios_steps() {
        let feature = parse_feature(FEATURE).unwrap();
        assert_eq!(feature.name, "Login");
        assert_eq!(feature.tags, vec!["@auth"]);
        assert_eq!(feature.scenarios.len(), 1);

        let steps = &feature.scenarios[0].steps;
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].keyword, "given");
        assert_eq!(steps[1].keyword, "when");
        // And inherits the preceding keyword
        assert_eq!(steps[2].keyword, "when");
        assert_eq!(steps[3].keyword, "then");
    }

    #[test]
    fn placeholder_patterns_match() {
        assert!(pattern_matches("I have {count} items", "I have 3 items"));
        assert!(pattern_matches("I see <name>", "I see Alice"));
        assert!(pattern_matches("I am logged in", "I am logged in"));
        assert!(!pattern_matches("I am logged in", "I am logged out"));
    }
}
