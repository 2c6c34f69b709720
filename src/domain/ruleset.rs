//! Declarative rulesets: conditions and the event matcher.
//!
//! A ruleset names an ordered pipeline of steps and a set of conditions
//! that select which events run it. Condition keys carry an optional
//! operator suffix (`_gt`, `_lt`, `_contains`); everything else is
//! equality or a comma-separated IN-list. Conditions are parsed into a
//! small AST at load time so the hot path is a switch on the operator.
//!
//! Matching is AND across conditions. A ruleset with zero conditions
//! matches every event; a condition whose key resolves to nothing never
//! matches.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::errors::RulesetError;
use super::event::RevisionEvent;

/// Comparison applied by a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    /// Exact match, or membership when the expected value is a
    /// comma-separated list.
    Equals,
    /// Strict numeric greater-than.
    GreaterThan,
    /// Strict numeric less-than.
    LessThan,
    /// Case-insensitive substring on the stringified value.
    Contains,
}

/// One parsed condition: `{key, operator, expected}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: ConditionOp,
    pub expected: String,
    /// Pre-parsed bound for the numeric operators.
    numeric_bound: Option<f64>,
}

impl Condition {
    /// Parses a raw `key[op] = expected` pair from configuration.
    ///
    /// Numeric bounds are validated here so a malformed condition fails
    /// the ruleset load instead of silently never matching.
    pub fn parse(
        ruleset: &str,
        raw_key: &str,
        expected: impl Into<String>,
    ) -> Result<Self, RulesetError> {
        let expected = expected.into();

        let (key, op) = if let Some(key) = raw_key.strip_suffix("_gt") {
            (key, ConditionOp::GreaterThan)
        } else if let Some(key) = raw_key.strip_suffix("_lt") {
            (key, ConditionOp::LessThan)
        } else if let Some(key) = raw_key.strip_suffix("_contains") {
            (key, ConditionOp::Contains)
        } else {
            (raw_key, ConditionOp::Equals)
        };

        if key.is_empty() {
            return Err(RulesetError::InvalidCondition {
                ruleset: ruleset.to_string(),
                key: raw_key.to_string(),
                reason: "condition key is empty after stripping the operator suffix".to_string(),
            });
        }

        let numeric_bound = match op {
            ConditionOp::GreaterThan | ConditionOp::LessThan => {
                let bound: f64 = expected.trim().parse().map_err(|_| {
                    RulesetError::InvalidCondition {
                        ruleset: ruleset.to_string(),
                        key: raw_key.to_string(),
                        reason: format!("expected a numeric bound, got {expected:?}"),
                    }
                })?;
                Some(bound)
            }
            _ => None,
        };

        Ok(Self {
            key: key.to_string(),
            op,
            expected,
            numeric_bound,
        })
    }

    /// Evaluates this condition against one event.
    pub fn matches(&self, event: &RevisionEvent) -> bool {
        let Some(value) = resolve_key(event, &self.key) else {
            return false;
        };

        match self.op {
            ConditionOp::Equals => {
                let actual = stringify(&value);
                self.expected
                    .split(',')
                    .any(|candidate| candidate.trim() == actual)
            }
            ConditionOp::GreaterThan => match (as_number(&value), self.numeric_bound) {
                (Some(actual), Some(bound)) => actual > bound,
                _ => false,
            },
            ConditionOp::LessThan => match (as_number(&value), self.numeric_bound) {
                (Some(actual), Some(bound)) => actual < bound,
                _ => false,
            },
            ConditionOp::Contains => stringify(&value)
                .to_lowercase()
                .contains(&self.expected.to_lowercase()),
        }
    }
}

/// Resolves a condition key, revision fields first, then event metadata.
fn resolve_key(event: &RevisionEvent, key: &str) -> Option<JsonValue> {
    let revision = &event.revision;
    match key {
        "provider_type" => Some(JsonValue::String(revision.provider_type.clone())),
        "status" => Some(JsonValue::String(revision.status.clone())),
        "document_id" => Some(JsonValue::String(revision.document_id.clone())),
        "document_uuid" => Some(JsonValue::String(revision.document_uuid.to_string())),
        "title" => Some(JsonValue::String(revision.title.clone())),
        "content_hash" => Some(JsonValue::String(revision.content_hash.clone())),
        other => event.metadata.get(other).cloned(),
    }
}

/// Stringifies a resolved value for equality and substring checks.
///
/// Strings compare without their JSON quotes; everything else uses its
/// compact JSON form.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerces a resolved value to a real number, accepting numeric strings.
fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A named pipeline with its selection conditions and per-step options.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub name: String,
    pub conditions: Vec<Condition>,
    /// Ordered step names to run for matched events.
    pub pipeline: Vec<String>,
    /// Step-specific option bags, keyed by step name.
    pub step_config: HashMap<String, JsonValue>,
}

impl Ruleset {
    /// True when every condition matches (AND semantics). Zero
    /// conditions match everything.
    pub fn matches(&self, event: &RevisionEvent) -> bool {
        self.conditions.iter().all(|c| c.matches(event))
    }

    /// The option bag for one step, `null` when the ruleset sets none.
    pub fn config_for(&self, step: &str) -> JsonValue {
        self.step_config.get(step).cloned().unwrap_or(JsonValue::Null)
    }
}

/// Raw, serde-facing form of one ruleset in the YAML document.
#[derive(Debug, Deserialize)]
struct RawRuleset {
    name: String,

    #[serde(default)]
    conditions: HashMap<String, JsonValue>,

    pipeline: Vec<String>,

    #[serde(default)]
    config: HashMap<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    rulesets: Vec<RawRuleset>,
}

/// The full, ordered set of configured rulesets.
///
/// Loaded once at startup and on SIGHUP; consumers read it through an
/// immutable snapshot pointer, so the catalog itself never mutates.
#[derive(Debug, Clone, Default)]
pub struct RulesetCatalog {
    rulesets: Vec<Ruleset>,
}

impl RulesetCatalog {
    pub fn new(rulesets: Vec<Ruleset>) -> Self {
        Self { rulesets }
    }

    /// Parses the operator-owned YAML document.
    ///
    /// Duplicate ruleset names and malformed conditions fail the load.
    pub fn from_yaml(source: &str) -> Result<Self, RulesetError> {
        let raw: RawCatalog =
            serde_yaml::from_str(source).map_err(|e| RulesetError::Parse(e.to_string()))?;

        let mut rulesets = Vec::with_capacity(raw.rulesets.len());
        for raw_ruleset in raw.rulesets {
            let mut conditions = Vec::with_capacity(raw_ruleset.conditions.len());
            for (raw_key, raw_value) in &raw_ruleset.conditions {
                let expected = stringify(raw_value);
                conditions.push(Condition::parse(&raw_ruleset.name, raw_key, expected)?);
            }

            if rulesets.iter().any(|r: &Ruleset| r.name == raw_ruleset.name) {
                return Err(RulesetError::Parse(format!(
                    "duplicate ruleset name {:?}",
                    raw_ruleset.name
                )));
            }

            rulesets.push(Ruleset {
                name: raw_ruleset.name,
                conditions,
                pipeline: raw_ruleset.pipeline,
                step_config: raw_ruleset.config,
            });
        }

        Ok(Self { rulesets })
    }

    /// Reads and parses the catalog file.
    pub fn load(path: &std::path::Path) -> Result<Self, RulesetError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| RulesetError::Io(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&source)
    }

    /// Cross-checks every pipeline step against the registered step
    /// names. Run at startup and on reload, before the catalog is
    /// swapped in.
    pub fn validate_steps<'a, I>(&self, registered: I) -> Result<(), RulesetError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: Vec<&str> = registered.into_iter().collect();
        for ruleset in &self.rulesets {
            for step in &ruleset.pipeline {
                if !known.contains(&step.as_str()) {
                    return Err(RulesetError::UnknownStep {
                        ruleset: ruleset.name.clone(),
                        step: step.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rulesets matching the event, in configured order. Multiple
    /// matches are expected and run independently.
    pub fn matching(&self, event: &RevisionEvent) -> Vec<&Ruleset> {
        self.rulesets.iter().filter(|r| r.matches(event)).collect()
    }

    pub fn rulesets(&self) -> &[Ruleset] {
        &self.rulesets
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentRevision, EventMetadata};
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::json;
    use uuid::Uuid;

    fn event_with(status: &str, metadata: EventMetadata) -> RevisionEvent {
        RevisionEvent::new(
            DocumentRevision {
                id: 1,
                document_uuid: Uuid::new_v4(),
                document_id: "doc-1".to_string(),
                provider_type: "google".to_string(),
                title: "Quarterly Plan".to_string(),
                content_hash: "h1".to_string(),
                status: status.to_string(),
                modified_time: Utc::now(),
                created_at: Utc::now(),
            },
            metadata,
        )
    }

    fn metadata(pairs: &[(&str, JsonValue)]) -> EventMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parse_strips_operator_suffixes() {
        let gt = Condition::parse("r", "content_length_gt", "5000").unwrap();
        assert_eq!(gt.key, "content_length");
        assert_eq!(gt.op, ConditionOp::GreaterThan);

        let lt = Condition::parse("r", "age_days_lt", "30").unwrap();
        assert_eq!(lt.op, ConditionOp::LessThan);

        let contains = Condition::parse("r", "title_contains", "rfc").unwrap();
        assert_eq!(contains.key, "title");
        assert_eq!(contains.op, ConditionOp::Contains);

        let eq = Condition::parse("r", "status", "Approved").unwrap();
        assert_eq!(eq.op, ConditionOp::Equals);
    }

    #[test]
    fn parse_rejects_non_numeric_bound() {
        let err = Condition::parse("r", "content_length_gt", "lots").unwrap_err();
        assert!(matches!(err, RulesetError::InvalidCondition { .. }));
    }

    #[test]
    fn parse_rejects_bare_operator_key() {
        assert!(Condition::parse("r", "_gt", "5").is_err());
    }

    #[test]
    fn equality_matches_revision_field() {
        let condition = Condition::parse("r", "status", "Approved").unwrap();
        assert!(condition.matches(&event_with("Approved", EventMetadata::new())));
        assert!(!condition.matches(&event_with("WIP", EventMetadata::new())));
    }

    #[test]
    fn equality_accepts_in_list() {
        let condition = Condition::parse("r", "status", "In-Review,Approved").unwrap();
        assert!(condition.matches(&event_with("Approved", EventMetadata::new())));
        assert!(condition.matches(&event_with("In-Review", EventMetadata::new())));
        assert!(!condition.matches(&event_with("Draft", EventMetadata::new())));
    }

    #[test]
    fn metadata_key_resolves_after_revision_fields() {
        let condition = Condition::parse("r", "document_type", "RFC").unwrap();
        let event = event_with("WIP", metadata(&[("document_type", json!("RFC"))]));
        assert!(condition.matches(&event));
    }

    #[test]
    fn missing_key_never_matches() {
        let condition = Condition::parse("r", "document_type", "RFC").unwrap();
        assert!(!condition.matches(&event_with("WIP", EventMetadata::new())));
    }

    #[test]
    fn greater_than_is_strict() {
        let condition = Condition::parse("r", "content_length_gt", "5000").unwrap();

        for (length, expected) in [(4999, false), (5000, false), (5001, true)] {
            let event = event_with("WIP", metadata(&[("content_length", json!(length))]));
            assert_eq!(condition.matches(&event), expected, "length {length}");
        }
    }

    #[test]
    fn numeric_operators_coerce_string_values() {
        let condition = Condition::parse("r", "content_length_lt", "100").unwrap();
        let event = event_with("WIP", metadata(&[("content_length", json!("42"))]));
        assert!(condition.matches(&event));
    }

    #[test]
    fn numeric_operator_on_non_numeric_value_never_matches() {
        let condition = Condition::parse("r", "content_length_gt", "10").unwrap();
        let event = event_with("WIP", metadata(&[("content_length", json!("plenty"))]));
        assert!(!condition.matches(&event));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let condition = Condition::parse("r", "title_contains", "quarterly").unwrap();
        assert!(condition.matches(&event_with("WIP", EventMetadata::new())));

        let condition = Condition::parse("r", "title_contains", "ANNUAL").unwrap();
        assert!(!condition.matches(&event_with("WIP", EventMetadata::new())));
    }

    #[test]
    fn empty_conditions_match_everything() {
        let ruleset = Ruleset {
            name: "all".to_string(),
            conditions: vec![],
            pipeline: vec!["search_index".to_string()],
            step_config: HashMap::new(),
        };
        assert!(ruleset.matches(&event_with("anything", EventMetadata::new())));
    }

    #[test]
    fn and_semantics_require_every_condition() {
        let ruleset = Ruleset {
            name: "rfc".to_string(),
            conditions: vec![
                Condition::parse("rfc", "status", "Approved").unwrap(),
                Condition::parse("rfc", "document_type", "RFC").unwrap(),
            ],
            pipeline: vec!["search_index".to_string()],
            step_config: HashMap::new(),
        };

        let both = event_with("Approved", metadata(&[("document_type", json!("RFC"))]));
        let one = event_with("Approved", metadata(&[("document_type", json!("memo"))]));

        assert!(ruleset.matches(&both));
        assert!(!ruleset.matches(&one));
    }

    #[test]
    fn catalog_from_yaml_preserves_order_and_config() {
        let catalog = RulesetCatalog::from_yaml(
            r#"
rulesets:
  - name: rfc-docs
    conditions:
      document_type: RFC
      status: "In-Review,Approved"
    pipeline: [search_index, embeddings, llm_summary]
    config:
      embeddings:
        chunk_size: 1200
        overlap: 100
  - name: all-docs
    pipeline: [search_index]
"#,
        )
        .unwrap();

        let names: Vec<_> = catalog.rulesets().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["rfc-docs", "all-docs"]);

        let rfc = &catalog.rulesets()[0];
        assert_eq!(rfc.conditions.len(), 2);
        assert_eq!(rfc.config_for("embeddings")["chunk_size"], json!(1200));
        assert_eq!(rfc.config_for("search_index"), JsonValue::Null);
    }

    #[test]
    fn catalog_rejects_duplicate_names() {
        let err = RulesetCatalog::from_yaml(
            "rulesets:\n  - name: a\n    pipeline: [x]\n  - name: a\n    pipeline: [y]\n",
        )
        .unwrap_err();
        assert!(matches!(err, RulesetError::Parse(_)));
    }

    #[test]
    fn catalog_accepts_numeric_condition_values() {
        let catalog = RulesetCatalog::from_yaml(
            "rulesets:\n  - name: big\n    conditions:\n      content_length_gt: 5000\n    pipeline: [search_index]\n",
        )
        .unwrap();
        let event = event_with("WIP", metadata(&[("content_length", json!(9000))]));
        assert_eq!(catalog.matching(&event).len(), 1);
    }

    #[test]
    fn validate_steps_flags_unknown_names() {
        let catalog = RulesetCatalog::from_yaml(
            "rulesets:\n  - name: a\n    pipeline: [search_index, reticulate]\n",
        )
        .unwrap();

        let err = catalog.validate_steps(["search_index"]).unwrap_err();
        assert!(matches!(
            err,
            RulesetError::UnknownStep { ref step, .. } if step == "reticulate"
        ));

        assert!(catalog
            .validate_steps(["search_index", "reticulate"])
            .is_ok());
    }

    #[test]
    fn matching_returns_every_matching_ruleset_in_order() {
        let catalog = RulesetCatalog::from_yaml(
            r#"
rulesets:
  - name: rfc
    conditions: { document_type: RFC }
    pipeline: [search_index]
  - name: all
    pipeline: [search_index]
"#,
        )
        .unwrap();

        let event = event_with("WIP", metadata(&[("document_type", json!("RFC"))]));
        let matched: Vec<_> = catalog.matching(&event).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(matched, ["rfc", "all"]);

        let other = event_with("WIP", EventMetadata::new());
        let matched: Vec<_> = catalog.matching(&other).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(matched, ["all"]);
    }

    proptest! {
        /// Suffix parsing keeps `key + suffix == raw_key` for operator keys.
        #[test]
        fn parse_preserves_key_prefix(key in "[a-z][a-z_]{0,20}[a-z]") {
            let condition = Condition::parse("r", &format!("{key}_contains"), "x").unwrap();
            prop_assert_eq!(condition.key, key);
            prop_assert_eq!(condition.op, ConditionOp::Contains);
        }

        /// Strictness: `n _gt n` is always false, `n+1 _gt n` always true.
        #[test]
        fn greater_than_strictness(bound in -1_000_000i64..1_000_000) {
            let condition = Condition::parse("r", "n_gt", bound.to_string()).unwrap();

            let equal = event_with("s", metadata(&[("n", json!(bound))]));
            let above = event_with("s", metadata(&[("n", json!(bound + 1))]));

            prop_assert!(!condition.matches(&equal));
            prop_assert!(condition.matches(&above));
        }

        /// A ruleset with zero conditions matches any event.
        #[test]
        fn zero_conditions_match_all(status in "[A-Za-z-]{1,12}") {
            let ruleset = Ruleset {
                name: "all".to_string(),
                conditions: vec![],
                pipeline: vec![],
                step_config: HashMap::new(),
            };
            prop_assert!(ruleset.matches(&event_with(&status, EventMetadata::new())));
        }
    }
}
