/// Package loading: RON parsing, reference normalization, and matching
/// declared dependencies against packages that are already loaded.

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

use crate::schema::section::CONTEXT_PREFIX;
use crate::schema::Package;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("package {package} depends on {dependency}, which is not available")]
    MissingDependency { package: String, dependency: String },
    #[error("package {package} requires {dependency} {required}, found {found}")]
    VersionMismatch {
        package: String,
        dependency: String,
        required: String,
        found: String,
    },
}

/// Deserialize any package fragment from RON. Optional fields may be
/// written bare, without `Some(...)`.
pub fn from_ron<T: DeserializeOwned>(input: &str) -> Result<T, ron::error::SpannedError> {
    ron::Options::default()
        .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
        .from_str(input)
}

/// Parse a package from RON text and normalize its references.
pub fn parse_package_ron(input: &str) -> Result<Package, LoadError> {
    let mut package: Package = from_ron(input)?;
    normalize_references(&mut package);
    Ok(package)
}

pub fn load_package_from_ron(path: &Path) -> Result<Package, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    let package = parse_package_ron(&contents)?;
    tracing::debug!(path = %path.display(), package = %package.id, "loaded package");
    Ok(package)
}

/// Load every `.ron` file in `dir`, sorted by file name.
pub fn load_packages_from_dir(dir: &Path) -> Result<Vec<Package>, LoadError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(|p| load_package_from_ron(p)).collect()
}

/// Qualify bare prompt-section reference targets with the namespace that
/// declares them. `context:` and already-qualified targets are untouched.
///
/// Namespace ids always follow their key in the namespace map.
pub fn normalize_references(package: &mut Package) {
    for (namespace_id, namespace) in &mut package.namespaces {
        namespace.id.clone_from(namespace_id);
        for section in namespace.prompt_sections.values_mut() {
            for reference in section.references.values_mut() {
                let target = &reference.target;
                if target.is_empty() || target.starts_with(CONTEXT_PREFIX) || target.contains(':') {
                    continue;
                }
                reference.target = format!("{namespace_id}:{target}");
            }
        }
    }
}

/// Find every package `root` depends on, transitively, among `available`.
///
/// Matching is by id and exact version; a leading `^` or `~` on the
/// declared version is ignored. The result is in first-declared order
/// and suitable for `PackageGraph::new`.
pub fn resolve_dependencies<'a>(
    root: &Package,
    available: &'a [Package],
) -> Result<Vec<&'a Package>, LoadError> {
    let mut resolved: Vec<&'a Package> = Vec::new();
    let mut pending: Vec<(&str, &crate::schema::Dependency)> = root
        .dependencies
        .iter()
        .map(|d| (root.id.as_str(), d))
        .collect();
    pending.reverse();

    while let Some((dependent, dependency)) = pending.pop() {
        if resolved.iter().any(|p| p.id == dependency.package) {
            continue;
        }
        let required = dependency.version.trim_start_matches(['^', '~']);
        let candidates: Vec<&'a Package> = available
            .iter()
            .filter(|p| p.id == dependency.package)
            .collect();
        let package = match candidates.iter().find(|p| p.version == required) {
            Some(package) => *package,
            None => {
                return Err(match candidates.first() {
                    Some(found) => LoadError::VersionMismatch {
                        package: dependent.to_string(),
                        dependency: dependency.package.clone(),
                        required: dependency.version.clone(),
                        found: found.version.clone(),
                    },
                    None => LoadError::MissingDependency {
                        package: dependent.to_string(),
                        dependency: dependency.package.clone(),
                    },
                })
            }
        };

        tracing::debug!(package = %package.id, version = %package.version, "resolved dependency");
        resolved.push(package);
        pending.extend(
            package
                .dependencies
                .iter()
                .rev()
                .map(|d| (package.id.as_str(), d)),
        );
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE: &str = r#"(
        id: "test.colors",
        version: "1.0.0",
        namespaces: {
            "test": (
                datatypes: {
                    "colors": (name: "colors", values: [(text: "red"), (text: "blue", weight: 2.0)]),
                },
                prompt_sections: {
                    "ball": (
                        name: "ball",
                        template: "A {color} ball",
                        references: {
                            "color": (target: "colors"),
                            "mood": (target: "context:mood"),
                            "other": (target: "shared:things"),
                        },
                    ),
                },
            ),
        },
    )"#;

    #[test]
    fn parse_and_normalize() {
        let pkg = parse_package_ron(PACKAGE).unwrap();
        let section = &pkg.namespaces["test"].prompt_sections["ball"];
        assert_eq!(section.references["color"].target, "test:colors");
        assert_eq!(section.references["mood"].target, "context:mood");
        assert_eq!(section.references["other"].target, "shared:things");
        assert_eq!(pkg.namespaces["test"].id, "test");
        assert_eq!(pkg.namespaces["test"].datatypes["colors"].values[1].weight, Some(2.0));
    }

    #[test]
    fn declaration_order_survives_parsing() {
        let pkg = parse_package_ron(
            r#"(
                id: "test.order",
                version: "1.0.0",
                namespaces: {
                    "zeta": (
                        rules: {
                            "z_first": (when: "a", set: "b", value: "1"),
                            "a_second": (when: "b", set: "c", value: "2"),
                        },
                    ),
                    "alpha": (id: "alpha"),
                },
            )"#,
        )
        .unwrap();
        let namespaces: Vec<&str> = pkg.namespaces.keys().map(String::as_str).collect();
        assert_eq!(namespaces, vec!["zeta", "alpha"]);
        let rules: Vec<&str> = pkg.namespaces["zeta"].rules.keys().map(String::as_str).collect();
        assert_eq!(rules, vec!["z_first", "a_second"]);
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(parse_package_ron("(id: "), Err(LoadError::Ron(_))));
    }

    #[test]
    fn resolves_transitively_in_order() {
        let root = Package::new("app", "1.0.0").with_dependency("b", "^1.0.0");
        let available = vec![
            Package::new("c", "2.0.0"),
            Package::new("b", "1.0.0").with_dependency("c", "2.0.0"),
            Package::new("unrelated", "1.0.0"),
        ];
        let deps = resolve_dependencies(&root, &available).unwrap();
        let ids: Vec<&str> = deps.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn missing_and_mismatched_dependencies() {
        let root = Package::new("app", "1.0.0").with_dependency("b", "1.0.0");
        assert!(matches!(
            resolve_dependencies(&root, &[]),
            Err(LoadError::MissingDependency { .. })
        ));
        let available = vec![Package::new("b", "2.0.0")];
        match resolve_dependencies(&root, &available) {
            Err(LoadError::VersionMismatch { found, .. }) => assert_eq!(found, "2.0.0"),
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[test]
    fn dependency_cycles_terminate() {
        let root = Package::new("a", "1.0.0").with_dependency("b", "1.0.0");
        let available = vec![
            Package::new("b", "1.0.0").with_dependency("a", "1.0.0"),
            Package::new("a", "1.0.0").with_dependency("b", "1.0.0"),
        ];
        let deps = resolve_dependencies(&root, &available).unwrap();
        assert_eq!(deps.len(), 2);
    }
}
