use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default selection weight for a value with no explicit `weight`.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A scalar tag value attached to a datatype value.
///
/// Tags are a closed set of scalar kinds so filters and rules can match
/// on them exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl TagValue {
    /// Truthiness used by bare `tags.<key>` filter clauses.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            // Whole numbers print without a trailing ".0" so `3` stays `3`.
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for TagValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Tag bag keyed by tag name.
pub type Tags = BTreeMap<String, TagValue>;

/// One selectable text value of a datatype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatatypeValue {
    pub text: String,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl DatatypeValue {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Tags::new(),
            weight: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// The effective selection weight.
    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }
}

/// A weighted set of selectable values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datatype {
    pub name: String,
    #[serde(default)]
    pub values: Vec<DatatypeValue>,
    /// Parent datatype address; only checked by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_tags: Option<Tags>,
}

impl Datatype {
    pub fn new(name: impl Into<String>, values: Vec<DatatypeValue>) -> Self {
        Self {
            name: name.into(),
            values,
            extends: None,
            override_tags: None,
        }
    }

    /// Sum of all effective value weights.
    pub fn weight_sum(&self) -> f64 {
        self.values.iter().map(DatatypeValue::weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::from_ron;

    #[test]
    fn default_weight_is_one() {
        let v = DatatypeValue::new("red");
        assert_eq!(v.weight(), 1.0);
        assert_eq!(v.with_weight(2.5).weight(), 2.5);
    }

    #[test]
    fn weight_sum_uses_defaults() {
        let dt = Datatype::new(
            "colors",
            vec![
                DatatypeValue::new("red"),
                DatatypeValue::new("blue").with_weight(3.0),
            ],
        );
        assert!((dt.weight_sum() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tag_display() {
        assert_eq!(TagValue::from("an").to_string(), "an");
        assert_eq!(TagValue::Number(3.0).to_string(), "3");
        assert_eq!(TagValue::Number(0.5).to_string(), "0.5");
        assert_eq!(TagValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn tag_truthiness() {
        assert!(TagValue::Bool(true).is_truthy());
        assert!(!TagValue::Bool(false).is_truthy());
        assert!(!TagValue::Number(0.0).is_truthy());
        assert!(TagValue::from("x").is_truthy());
        assert!(!TagValue::from("").is_truthy());
    }

    #[test]
    fn tags_deserialize_from_ron_scalars() {
        let v: DatatypeValue =
            from_ron(r#"(text: "elf", tags: {"article": "an", "legs": 2, "magic": true})"#)
                .unwrap();
        assert_eq!(v.tags["article"], TagValue::from("an"));
        assert_eq!(v.tags["legs"], TagValue::Number(2.0));
        assert_eq!(v.tags["magic"], TagValue::Bool(true));
        assert!(v.weight.is_none());
    }
}
