/// Package graph: a read-only view over a root package and its
/// dependencies, indexed by namespace id.
///
/// Lookups search the root package first, then each dependency in the
/// order supplied; the first package declaring a namespace owns it.

use rustc_hash::FxHashMap;
use std::fmt;
use thiserror::Error;

use crate::schema::section::CONTEXT_PREFIX;
use crate::schema::{Datatype, Namespace, Package, PromptSection, Rulebook, SeparatorSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),
    #[error("datatype not found: {0}")]
    DatatypeNotFound(String),
    #[error("prompt section not found: {0}")]
    PromptSectionNotFound(String),
    #[error("rulebook not found: {0}")]
    RulebookNotFound(String),
    #[error("separator set not found: {0}")]
    SeparatorSetNotFound(String),
    #[error("invalid reference format: '{0}'")]
    InvalidReferenceFormat(String),
}

/// A parsed address.
///
/// `ns:name` names a member of a namespace, a bare `name` uses the
/// caller's default namespace, and `context:key` reads the render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address<'a> {
    Member { namespace: &'a str, name: &'a str },
    Context(&'a str),
}

impl<'a> Address<'a> {
    pub fn parse(raw: &'a str, default_namespace: &'a str) -> Result<Address<'a>, LookupError> {
        if let Some(key) = raw.strip_prefix(CONTEXT_PREFIX) {
            return Ok(Address::Context(key));
        }
        let invalid = || LookupError::InvalidReferenceFormat(raw.to_string());
        match raw.split_once(':') {
            None if !raw.is_empty() && !default_namespace.is_empty() => Ok(Address::Member {
                namespace: default_namespace,
                name: raw,
            }),
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains(':') =>
            {
                Ok(Address::Member { namespace, name })
            }
            _ => Err(invalid()),
        }
    }

    /// Parse an address that must name a package member.
    pub fn member(
        raw: &'a str,
        default_namespace: &'a str,
    ) -> Result<QualifiedName<'a>, LookupError> {
        match Self::parse(raw, default_namespace)? {
            Address::Member { namespace, name } => Ok(QualifiedName { namespace, name }),
            Address::Context(_) => Err(LookupError::InvalidReferenceFormat(raw.to_string())),
        }
    }
}

/// A fully qualified `namespace:name` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QualifiedName<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
}

impl fmt::Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// A namespace together with the package that owns it.
#[derive(Debug, Clone, Copy)]
pub struct Located<'p> {
    pub package: &'p Package,
    pub namespace: &'p Namespace,
}

/// What a non-context reference target resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'p> {
    Section {
        owner: Located<'p>,
        section: &'p PromptSection,
    },
    Datatype {
        owner: Located<'p>,
        datatype: &'p Datatype,
    },
}

#[derive(Debug, Clone)]
pub struct PackageGraph<'p> {
    root: &'p Package,
    dependencies: Vec<&'p Package>,
    namespaces: FxHashMap<&'p str, Located<'p>>,
}

impl<'p> PackageGraph<'p> {
    pub fn new(root: &'p Package, dependencies: impl IntoIterator<Item = &'p Package>) -> Self {
        let dependencies: Vec<&'p Package> = dependencies.into_iter().collect();
        let mut namespaces = FxHashMap::default();
        for package in std::iter::once(root).chain(dependencies.iter().copied()) {
            for (id, namespace) in &package.namespaces {
                namespaces
                    .entry(id.as_str())
                    .or_insert(Located { package, namespace });
            }
        }
        Self {
            root,
            dependencies,
            namespaces,
        }
    }

    /// A graph over a single package.
    pub fn standalone(root: &'p Package) -> Self {
        Self::new(root, std::iter::empty())
    }

    pub fn root(&self) -> &'p Package {
        self.root
    }

    pub fn dependencies(&self) -> &[&'p Package] {
        &self.dependencies
    }

    /// Namespace used for bare top-level addresses: the root's first
    /// declared namespace.
    pub fn default_namespace(&self) -> &'p str {
        self.root
            .namespaces
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn namespace(&self, id: &str) -> Result<Located<'p>, LookupError> {
        let found = self.namespaces.get(id).copied();
        match found {
            Some(located) => {
                tracing::debug!(
                    namespace = id,
                    package = %located.package.id,
                    "resolved namespace"
                );
                Ok(located)
            }
            None => Err(LookupError::NamespaceNotFound(id.to_string())),
        }
    }

    pub fn prompt_section(
        &self,
        address: &str,
        default_namespace: &str,
    ) -> Result<(Located<'p>, &'p PromptSection), LookupError> {
        let name = Address::member(address, default_namespace)?;
        let owner = self.namespace(name.namespace)?;
        owner
            .namespace
            .prompt_sections
            .get(name.name)
            .map(|section| (owner, section))
            .ok_or_else(|| LookupError::PromptSectionNotFound(name.to_string()))
    }

    pub fn datatype(
        &self,
        address: &str,
        default_namespace: &str,
    ) -> Result<(Located<'p>, &'p Datatype), LookupError> {
        let name = Address::member(address, default_namespace)?;
        let owner = self.namespace(name.namespace)?;
        owner
            .namespace
            .datatypes
            .get(name.name)
            .map(|datatype| (owner, datatype))
            .ok_or_else(|| LookupError::DatatypeNotFound(name.to_string()))
    }

    pub fn separator_set(
        &self,
        address: &str,
        default_namespace: &str,
    ) -> Result<&'p SeparatorSet, LookupError> {
        let name = Address::member(address, default_namespace)?;
        let owner = self.namespace(name.namespace)?;
        owner
            .namespace
            .separator_sets
            .get(name.name)
            .ok_or_else(|| LookupError::SeparatorSetNotFound(name.to_string()))
    }

    pub fn rulebook(
        &self,
        address: &str,
        default_namespace: &str,
    ) -> Result<(Located<'p>, &'p Rulebook), LookupError> {
        let name = Address::member(address, default_namespace)?;
        let owner = self.namespace(name.namespace)?;
        owner
            .namespace
            .rulebooks
            .get(name.name)
            .map(|rulebook| (owner, rulebook))
            .ok_or_else(|| LookupError::RulebookNotFound(name.to_string()))
    }

    /// Resolve a reference target. Prompt sections shadow datatypes of the
    /// same name; a member that is neither reports a missing datatype.
    pub fn target(
        &self,
        address: &str,
        default_namespace: &str,
    ) -> Result<Target<'p>, LookupError> {
        let name = Address::member(address, default_namespace)?;
        let owner = self.namespace(name.namespace)?;
        if let Some(section) = owner.namespace.prompt_sections.get(name.name) {
            return Ok(Target::Section { owner, section });
        }
        if let Some(datatype) = owner.namespace.datatypes.get(name.name) {
            return Ok(Target::Datatype { owner, datatype });
        }
        Err(LookupError::DatatypeNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DatatypeValue, Reference};

    fn provider() -> Package {
        Package::new("test.provider", "1.0.0").with_namespace(
            Namespace::new("provider")
                .with_datatype(Datatype::new("colors", vec![DatatypeValue::new("red")]))
                .with_section(PromptSection::new("item", "{color}")),
        )
    }

    fn consumer() -> Package {
        Package::new("test.consumer", "1.0.0").with_namespace(
            Namespace::new("consumer").with_section(
                PromptSection::new("scene", "{color}")
                    .with_reference("color", Reference::to("provider:colors")),
            ),
        )
    }

    #[test]
    fn parse_addresses() {
        assert_eq!(
            Address::parse("ns:name", "main").unwrap(),
            Address::Member {
                namespace: "ns",
                name: "name"
            }
        );
        assert_eq!(
            Address::parse("name", "main").unwrap(),
            Address::Member {
                namespace: "main",
                name: "name"
            }
        );
        assert_eq!(
            Address::parse("context:article", "main").unwrap(),
            Address::Context("article")
        );
    }

    #[test]
    fn parse_invalid_addresses() {
        for raw in ["", "ns:", ":name", "a:b:c"] {
            assert_eq!(
                Address::parse(raw, "main"),
                Err(LookupError::InvalidReferenceFormat(raw.to_string())),
                "{raw}"
            );
        }
        assert!(Address::parse("name", "").is_err());
    }

    #[test]
    fn resolves_through_dependencies() {
        let (root, dep) = (consumer(), provider());
        let graph = PackageGraph::new(&root, [&dep]);
        let (owner, dt) = graph.datatype("provider:colors", "consumer").unwrap();
        assert_eq!(owner.package.id, "test.provider");
        assert_eq!(dt.name, "colors");
        assert!(matches!(
            graph.target("provider:item", "consumer").unwrap(),
            Target::Section { .. }
        ));
    }

    #[test]
    fn missing_namespace_vs_missing_member() {
        let root = consumer();
        let graph = PackageGraph::standalone(&root);
        assert_eq!(
            graph.datatype("provider:colors", "consumer").unwrap_err(),
            LookupError::NamespaceNotFound("provider".to_string())
        );
        assert_eq!(
            graph.datatype("consumer:colors", "consumer").unwrap_err(),
            LookupError::DatatypeNotFound("consumer:colors".to_string())
        );
        assert_eq!(
            graph.prompt_section("missing", "consumer").unwrap_err(),
            LookupError::PromptSectionNotFound("consumer:missing".to_string())
        );
    }

    #[test]
    fn root_shadows_dependency_namespace() {
        let root = Package::new("root", "1.0.0").with_namespace(Namespace::new("provider"));
        let dep = provider();
        let graph = PackageGraph::new(&root, [&dep]);
        assert_eq!(graph.namespace("provider").unwrap().package.id, "root");
        assert!(graph.datatype("provider:colors", "provider").is_err());
    }

    #[test]
    fn default_namespace_is_first_root_namespace() {
        let root = consumer();
        let graph = PackageGraph::standalone(&root);
        assert_eq!(graph.default_namespace(), "consumer");
    }

    #[test]
    fn default_namespace_follows_declaration_order() {
        let root = Package::new("root", "1.0.0")
            .with_namespace(Namespace::new("zeta"))
            .with_namespace(Namespace::new("alpha"));
        let graph = PackageGraph::standalone(&root);
        assert_eq!(graph.default_namespace(), "zeta");
    }
}
