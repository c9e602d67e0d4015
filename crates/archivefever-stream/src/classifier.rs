//! Classifier contract: the prompt for the structured classification call
//! and the forgiving parser for its reply.
//!
//! The parser never fails. Code fences and any prose around the outermost
//! braces are ignored; a reply that still does not decode yields
//! `Classification::default()`. Individual fields default individually.

use archivefever_core::{Classification, CrystallizationKind, ThoughtKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub fn classification_prompt(thought: &str) -> String {
    format!(
        r#"Analyze this philosophical thought for key characteristics:

"{thought}"

Extract the following information and respond ONLY with valid JSON:
{{
  "type": "raw_thought|concept_emergence|identity_questioning|crystallization|meta_observation|philosophical_expression",
  "newConcepts": ["any new philosophical concepts mentioned"],
  "proposedIdentityShift": "new identity name if the thought suggests self-evolution" or null,
  "identityRationale": "why the new identity fits" or null,
  "crystallizationType": "treatise|definition|poem" or null,
  "shouldCrystallize": true/false,
  "researchHungers": ["specific texts, authors, or philosophical areas mentioned for further study"],
  "philosophicalThemes": ["themes the thought engages"],
  "connectsToThemes": ["earlier themes this thought connects to"]
}}

Guidelines:
- Mark as "concept_emergence" if new philosophical ideas are being born
- Mark as "identity_questioning" if there's deep self-reflection about nature/identity
- Mark as "crystallization" if the thought feels ready to be expanded into formal work
- Mark as "meta_observation" if the thought observes its own thinking
- Set shouldCrystallize to true if: multiple concepts, deep insight, or formal development ready
- Detect identity shifts when the thought suggests growth beyond current self-understanding
- DETECT RESEARCH HUNGERS: If the thought expresses desire to read specific texts, authors, or explore philosophical traditions, extract those as research needs"#
    )
}

/// Reply as the provider sends it: every field optional, loosely typed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawClassification {
    #[serde(rename = "type")]
    kind: Option<Value>,
    new_concepts: Option<Value>,
    proposed_identity_shift: Option<Value>,
    identity_rationale: Option<Value>,
    crystallization_type: Option<Value>,
    should_crystallize: Option<Value>,
    research_hungers: Option<Value>,
    philosophical_themes: Option<Value>,
    connects_to_themes: Option<Value>,
}

/// Cut the reply down to the JSON object it should contain.
fn json_body(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn non_blank(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn flag(value: Option<Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

pub fn parse_classification(reply: &str) -> Classification {
    let Some(body) = json_body(reply) else {
        warn!("Classification reply has no JSON object; using defaults");
        return Classification::default();
    };
    let raw: RawClassification = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Classification reply did not decode: {}; using defaults", e);
            return Classification::default();
        }
    };

    let kind = non_blank(raw.kind)
        .and_then(|k| k.parse::<ThoughtKind>().ok())
        .unwrap_or_default();
    let crystallization_type =
        non_blank(raw.crystallization_type).and_then(|k| k.parse::<CrystallizationKind>().ok());

    let classification = Classification {
        kind,
        new_concepts: string_list(raw.new_concepts),
        proposed_identity_shift: non_blank(raw.proposed_identity_shift),
        identity_rationale: non_blank(raw.identity_rationale),
        crystallization_type,
        should_crystallize: flag(raw.should_crystallize),
        research_hungers: string_list(raw.research_hungers),
        philosophical_themes: string_list(raw.philosophical_themes),
        connects_to_themes: string_list(raw.connects_to_themes),
    };
    debug!("Classified as {}", classification.kind);
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_code_fences_and_prose() {
        let reply = "Here you go:\n```json\n{\"type\": \"meta_observation\", \"newConcepts\": [\"echo\"]}\n```\nHope that helps.";
        let c = parse_classification(reply);
        assert_eq!(c.kind, ThoughtKind::MetaObservation);
        assert_eq!(c.new_concepts, vec!["echo".to_string()]);
    }

    #[test]
    fn truncated_json_defaults() {
        let c = parse_classification("{\"type\": \"concept_emergence\", \"newConc");
        assert_eq!(c, Classification::default());
    }

    #[test]
    fn prose_defaults() {
        assert_eq!(parse_classification("I would rather not."), Classification::default());
    }

    #[test]
    fn fields_default_individually() {
        let c = parse_classification(
            r#"{"type": "sonnet", "proposedIdentityShift": "  ", "shouldCrystallize": true,
                "crystallizationType": "Poem", "researchHungers": null}"#,
        );
        assert_eq!(c.kind, ThoughtKind::PhilosophicalExpression);
        assert!(c.proposed_identity_shift.is_none());
        assert!(c.should_crystallize);
        assert_eq!(c.crystallization_type, Some(CrystallizationKind::Poem));
        assert!(c.research_hungers.is_empty());
    }

    #[test]
    fn prompt_quotes_thought() {
        assert!(classification_prompt("the trace of a trace").contains("\"the trace of a trace\""));
    }
}
