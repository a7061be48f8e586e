use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address prefix that reads from the render context instead of the package.
pub const CONTEXT_PREFIX: &str = "context:";

/// A template plus the definitions of the references it uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSection {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub references: BTreeMap<String, Reference>,
}

impl PromptSection {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            references: BTreeMap::new(),
        }
    }

    pub fn with_reference(mut self, name: impl Into<String>, reference: Reference) -> Self {
        self.references.insert(name.into(), reference);
        self
    }
}

/// A named slot in a template bound to a target address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

impl Reference {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            filter: None,
            min: None,
            max: None,
            separator: None,
            unique: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_range(mut self, min: u32, max: u32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }

    pub fn min(&self) -> u32 {
        self.min.unwrap_or(1)
    }

    pub fn max(&self) -> u32 {
        self.max.unwrap_or(1)
    }

    pub fn is_unique(&self) -> bool {
        self.unique.unwrap_or(false)
    }

    /// The context key this reference reads, if it targets `context:<key>`.
    pub fn context_key(&self) -> Option<&str> {
        self.target.strip_prefix(CONTEXT_PREFIX)
    }
}

/// Joiners used to render a multi-value selection as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatorSet {
    #[serde(default)]
    pub name: String,
    pub primary: String,
    pub secondary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<String>,
}

impl Default for SeparatorSet {
    /// `", "` between items and `" and "` before the last one.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            primary: ", ".to_string(),
            secondary: " and ".to_string(),
            tertiary: None,
        }
    }
}

impl SeparatorSet {
    /// Join items as an Oxford-style list.
    ///
    /// Zero items give `""`, one gives the item, two are joined with
    /// `secondary`, and three or more join all but the last with `primary`
    /// and append the last after `secondary`.
    pub fn join<S: AsRef<str>>(&self, items: &[S]) -> String {
        match items {
            [] => String::new(),
            [only] => only.as_ref().to_string(),
            [first, second] => format!("{}{}{}", first.as_ref(), self.secondary, second.as_ref()),
            [head @ .., last] => {
                let head: Vec<&str> = head.iter().map(AsRef::as_ref).collect();
                format!("{}{}{}", head.join(&self.primary), self.secondary, last.as_ref())
            }
        }
    }
}
