use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::datatype::{TagValue, DEFAULT_WEIGHT};

/// Simple coordination logic applied during enrichment.
///
/// When the context (or the selection) holds `when`, `value` is evaluated
/// and written to the context under `set`. `value` is either a literal or
/// `ref:<name>.tags.<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub when: String,
    /// Reserved; not evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    pub set: String,
    pub value: String,
}

impl Rule {
    pub fn new(when: impl Into<String>, set: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            when: when.into(),
            logic: None,
            set: set.into(),
            value: value.into(),
        }
    }
}

/// Reusable logic block. Carried through loading and checked for unique
/// names; not executed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    pub processor: Processor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Processor {
    Expression { formula: String },
    RuleSet { rules: Vec<ConditionalRule> },
    Script { language: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub condition: String,
    #[serde(default)]
    pub output: BTreeMap<String, TagValue>,
}

/// A weighted set of top-level render targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rulebook {
    pub name: String,
    #[serde(default)]
    pub entry_points: Vec<EntryPoint>,
    /// Seeds the render context before enrichment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, TagValue>,
}

/// One weighted entry door into a rulebook.
///
/// Deserialization accepts the legacy `prompt_section` field as a synonym
/// for `target`; a non-empty `target` wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEntryPoint")]
pub struct EntryPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl EntryPoint {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }

    /// The target if it is present and not blank.
    pub fn resolved_target(&self) -> Option<&str> {
        self.target.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct RawEntryPoint {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    prompt_section: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
}

impl From<RawEntryPoint> for EntryPoint {
    fn from(raw: RawEntryPoint) -> Self {
        let target = match raw.target {
            Some(t) if !t.is_empty() => Some(t),
            other => raw.prompt_section.or(other),
        };
        Self {
            target,
            weight: raw.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::from_ron;

    #[test]
    fn entry_point_accepts_legacy_field() {
        let ep: EntryPoint = from_ron(r#"(prompt_section: "ns:scene")"#).unwrap();
        assert_eq!(ep.resolved_target(), Some("ns:scene"));
        assert_eq!(ep.weight(), 1.0);
    }

    #[test]
    fn entry_point_prefers_target() {
        let ep: EntryPoint =
            from_ron(r#"(target: "ns:new", prompt_section: "ns:old", weight: 2.0)"#).unwrap();
        assert_eq!(ep.resolved_target(), Some("ns:new"));
        assert_eq!(ep.weight(), 2.0);
    }

    #[test]
    fn entry_point_empty_target_falls_back() {
        let ep: EntryPoint = from_ron(r#"(target: "", prompt_section: "ns:old")"#).unwrap();
        assert_eq!(ep.resolved_target(), Some("ns:old"));
    }

    #[test]
    fn entry_point_without_target() {
        let ep: EntryPoint = from_ron(r#"(weight: 1.0)"#).unwrap();
        assert_eq!(ep.resolved_target(), None);
    }
}
