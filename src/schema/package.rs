use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::datatype::Datatype;
use super::rule::{Decision, Rule, Rulebook};
use super::section::{PromptSection, SeparatorSet};

/// Top-level distributable unit of content.
///
/// Immutable once handed to a render or validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub metadata: PackageMetadata,
    /// Declaration order is kept; the first namespace is the default for
    /// bare top-level addresses.
    #[serde(default)]
    pub namespaces: IndexMap<String, Namespace>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Package {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.insert(namespace.id.clone(), namespace);
        self
    }

    pub fn with_dependency(
        mut self,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.dependencies.push(Dependency {
            package: package.into(),
            version: version.into(),
            path: None,
        });
        self
    }

    pub fn namespace(&self, id: &str) -> Option<&Namespace> {
        self.namespaces.get(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Skip every tag filter in this package.
    #[serde(default)]
    pub bypass_filters: bool,
}

/// A required package, matched by id and exact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Named grouping of datatypes, sections, rules and rulebooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub datatypes: BTreeMap<String, Datatype>,
    #[serde(default)]
    pub prompt_sections: BTreeMap<String, PromptSection>,
    #[serde(default)]
    pub separator_sets: BTreeMap<String, SeparatorSet>,
    /// Applied in declaration order during enrichment.
    #[serde(default)]
    pub rules: IndexMap<String, Rule>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub rulebooks: BTreeMap<String, Rulebook>,
}

impl Namespace {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatypes.insert(datatype.name.clone(), datatype);
        self
    }

    pub fn with_section(mut self, section: PromptSection) -> Self {
        self.prompt_sections.insert(section.name.clone(), section);
        self
    }

    pub fn with_separator_set(mut self, separator: SeparatorSet) -> Self {
        self.separator_sets.insert(separator.name.clone(), separator);
        self
    }

    pub fn with_rule(mut self, name: impl Into<String>, rule: Rule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    pub fn with_rulebook(mut self, rulebook: Rulebook) -> Self {
        self.rulebooks.insert(rulebook.name.clone(), rulebook);
        self
    }
}
