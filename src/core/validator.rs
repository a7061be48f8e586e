/// Package validator: static checks over a package and its dependencies.
///
/// Every check runs regardless of what earlier checks found. The validator
/// resolves addresses through the same `PackageGraph` the renderer uses,
/// and never draws random numbers.

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::core::filter::Filter;
use crate::core::graph::{Address, Located, PackageGraph, Target};
use crate::core::report::{
    ErrorKind, ValidationError, ValidationReport, ValidationWarning, WarningKind,
};
use crate::core::template::{Template, TemplateRef};
use crate::schema::{Namespace, Package, PromptSection, Reference};

/// Weight sums above this are flagged as a normalization hint.
const LARGE_WEIGHT_SUM: f64 = 100.0;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_.]*$").expect("identifier regex"));
static PACKAGE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("package version regex"));
static DEPENDENCY_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\^~]?\d+\.\d+\.\d+").expect("dependency version regex"));

/// Validate a package on its own.
pub fn validate(package: &Package) -> ValidationReport {
    validate_with_dependencies(package, &BTreeMap::new())
}

/// Validate a package whose references may point into `dependencies`
/// (keyed by package id).
pub fn validate_with_dependencies(
    package: &Package,
    dependencies: &BTreeMap<String, Package>,
) -> ValidationReport {
    let graph = PackageGraph::new(package, dependencies.values());
    let mut v = Validator {
        graph: &graph,
        report: ValidationReport::new(),
    };

    v.check_schema();
    v.check_dependencies();
    for (namespace_id, namespace) in &package.namespaces {
        for section in namespace.prompt_sections.values() {
            v.check_section(namespace_id, section);
        }
        v.check_rulebooks(namespace_id, namespace);
        v.check_rules(namespace_id, namespace);
        v.check_datatypes(namespace_id, namespace);
    }
    v.check_cycles();
    v.check_unused();

    tracing::debug!(
        package = %package.id,
        errors = v.report.errors.len(),
        warnings = v.report.warnings.len(),
        "validated package"
    );
    v.report
}

struct Validator<'g, 'p> {
    graph: &'g PackageGraph<'p>,
    report: ValidationReport,
}

/// Reference parameters after template-level overrides.
struct Effective<'a> {
    min: u32,
    max: u32,
    unique: bool,
    filter: Option<&'a str>,
}

impl<'a> Effective<'a> {
    fn of(reference: &'a Reference, token: Option<&'a TemplateRef>) -> Self {
        Self {
            min: token.and_then(|t| t.min).unwrap_or(reference.min()),
            max: token.and_then(|t| t.max).unwrap_or(reference.max()),
            unique: token.and_then(|t| t.unique).unwrap_or(reference.is_unique()),
            filter: token
                .and_then(|t| t.filter.as_deref())
                .or(reference.filter.as_deref()),
        }
    }
}

impl<'g, 'p> Validator<'g, 'p> {
    fn package(&self) -> &'p Package {
        self.graph.root()
    }

    fn check_schema(&mut self) {
        let package = self.package();
        if !IDENTIFIER.is_match(&package.id) {
            self.report.error(
                ValidationError::new(
                    ErrorKind::InvalidNaming,
                    format!(
                        "Invalid package ID: '{}' - must start with a lowercase letter and contain only lowercase letters, numbers, dots, and underscores",
                        package.id
                    ),
                )
                .at("package.id"),
            );
        }
        if !PACKAGE_VERSION.is_match(&package.version) {
            self.report.error(
                ValidationError::new(
                    ErrorKind::InvalidNaming,
                    format!(
                        "Invalid version: '{}' - must follow semver format (e.g., 1.0.0)",
                        package.version
                    ),
                )
                .at("package.version"),
            );
        }
        if package.namespaces.is_empty() {
            self.report.error(
                ValidationError::new(
                    ErrorKind::InvalidNaming,
                    "Package must have at least one namespace",
                )
                .at("package.namespaces"),
            );
        }
        for namespace_id in package.namespaces.keys() {
            if !IDENTIFIER.is_match(namespace_id) {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::InvalidNaming,
                        format!(
                            "Invalid namespace ID: '{namespace_id}' - must start with a lowercase letter and contain only lowercase letters, numbers, dots, and underscores"
                        ),
                    )
                    .at(format!("namespaces.{namespace_id}")),
                );
            }
        }
    }

    fn check_dependencies(&mut self) {
        for dependency in &self.package().dependencies {
            if dependency.package.trim().is_empty() {
                self.report.error(ValidationError::new(
                    ErrorKind::InvalidDependency,
                    "Invalid dependency: package '(missing)' - package field is required",
                ));
                continue;
            }
            if dependency.version.trim().is_empty() {
                self.report.error(ValidationError::new(
                    ErrorKind::InvalidDependency,
                    format!(
                        "Invalid dependency: package '{}' - version field is required",
                        dependency.package
                    ),
                ));
                continue;
            }
            if !DEPENDENCY_VERSION.is_match(&dependency.version) {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::InvalidDependencyVersion,
                        format!(
                            "Invalid version format: '{}' in dependency '{}' - expected semver format like 1.0.0, ^1.0.0, or ~1.2.0",
                            dependency.version, dependency.package
                        ),
                    )
                    .at(format!("dependencies[{}]", dependency.package)),
                );
            }
        }
    }

    fn check_section(&mut self, namespace_id: &str, section: &'p PromptSection) {
        let section_path = format!("{namespace_id}:{}", section.name);

        let template = match Template::parse(&section.template) {
            Ok(template) => Some(template),
            Err(err) => {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::InvalidTemplate,
                        format!("Invalid template in {section_path}: {err}"),
                    )
                    .at(&section_path),
                );
                None
            }
        };

        if let Some(template) = &template {
            let names = template.reference_names();
            for name in &names {
                if name.starts_with("context.") || section.references.contains_key(*name) {
                    continue;
                }
                self.report.error(
                    ValidationError::new(
                        ErrorKind::ReferenceNotFound,
                        format!("Reference not found: '{name}' in {section_path}"),
                    )
                    .at(&section_path)
                    .suggest(Some(format!(
                        "Add reference definition for '{name}' in the references section"
                    ))),
                );
            }
            for name in section.references.keys() {
                if names.contains(&name.as_str()) {
                    continue;
                }
                self.report.warn(
                    ValidationWarning::new(
                        WarningKind::UnusedReference,
                        format!(
                            "Unused reference '{name}' in {section_path}: defined but not used in template"
                        ),
                    )
                    .at(&section_path)
                    .suggest(Some(format!(
                        "Add {{{name}}} to template or remove reference definition"
                    ))),
                );
            }
            for token in template.references() {
                if let Some(separator) = &token.separator {
                    let location = format!("{section_path}.template.{}", token.name);
                    self.check_separator(namespace_id, separator, &location);
                }
            }
        }

        for (name, reference) in &section.references {
            let location = format!("{section_path}.references.{name}");
            let token = template
                .as_ref()
                .and_then(|t| t.references().find(|r| &r.name == name));
            let effective = Effective::of(reference, token);

            if let Some(separator) = &reference.separator {
                self.check_separator(namespace_id, separator, &location);
            }
            if effective.min > effective.max {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::MinMaxInvalid,
                        format!(
                            "Min must be <= Max: min={}, max={} in {location}",
                            effective.min, effective.max
                        ),
                    )
                    .at(&location),
                );
            }
            for filter in [reference.filter.as_deref(), token.and_then(|t| t.filter.as_deref())]
                .into_iter()
                .flatten()
            {
                self.check_filter(section, filter, &location);
            }

            if reference.context_key().is_some() {
                continue;
            }
            match self.graph.target(&reference.target, namespace_id) {
                Ok(Target::Datatype { owner, datatype }) if effective.unique => {
                    let filter = effective
                        .filter
                        .filter(|_| !self.package().metadata.bypass_filters)
                        .and_then(|f| Filter::parse(f).ok())
                        .filter(Filter::is_static);
                    let available = match &filter {
                        Some(filter) => datatype
                            .values
                            .iter()
                            .filter(|v| filter.matches(&v.tags, &Default::default()))
                            .count(),
                        None => datatype.values.len(),
                    };
                    if effective.max as usize > available {
                        let datatype_path = format!("{}:{}", owner.namespace.id, datatype.name);
                        self.report.error(
                            ValidationError::new(
                                ErrorKind::UniqueConstraintInfeasible,
                                format!(
                                    "Unique constraint infeasible: requested={}, available={available} in {datatype_path}",
                                    effective.max
                                ),
                            )
                            .at(datatype_path),
                        );
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    let suggestion = self.suggest(&reference.target, namespace_id);
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::ReferenceNotFound,
                            format!(
                                "Reference not found: '{}' in {location} ({err})",
                                reference.target
                            ),
                        )
                        .at(&location)
                        .suggest(suggestion),
                    );
                }
            }
        }
    }

    fn check_separator(&mut self, namespace_id: &str, separator: &str, location: &str) {
        if self.graph.separator_set(separator, namespace_id).is_err() {
            self.report.error(
                ValidationError::new(
                    ErrorKind::SeparatorNotFound,
                    format!("Separator set not found: '{separator}' referenced in {location}"),
                )
                .at(location),
            );
        }
    }

    fn check_filter(&mut self, section: &PromptSection, filter: &str, location: &str) {
        let message = match Filter::parse(filter) {
            Ok(parsed) => match parsed
                .dependencies()
                .into_iter()
                .find(|d| !section.references.contains_key(*d))
            {
                Some(missing) => format!(
                    "Invalid tag filter '{filter}' in {location}: ref:{missing} is not a reference of this section"
                ),
                None => return,
            },
            Err(err) => format!("Invalid tag filter in {location}: {err}"),
        };
        self.report
            .error(ValidationError::new(ErrorKind::InvalidTagFilter, message).at(location));
    }

    fn check_rulebooks(&mut self, namespace_id: &str, namespace: &'p Namespace) {
        for rulebook in namespace.rulebooks.values() {
            let location = format!("{namespace_id}:{}.entry_points", rulebook.name);
            if rulebook.entry_points.is_empty() {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::InvalidNaming,
                        format!(
                            "Rulebook '{namespace_id}:{}' must have at least one entry point",
                            rulebook.name
                        ),
                    )
                    .at(&location),
                );
            }
            for entry in &rulebook.entry_points {
                let Some(target) = entry.resolved_target() else {
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::InvalidNaming,
                            format!(
                                "Entry point in rulebook '{namespace_id}:{}' has invalid or missing target (found: {:?}). Use 'target' or 'prompt_section' field.",
                                rulebook.name, entry.target
                            ),
                        )
                        .at(&location),
                    );
                    continue;
                };
                if entry.weight() < 0.0 {
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::InvalidWeight,
                            format!(
                                "Entry point '{target}' has negative weight {}",
                                entry.weight()
                            ),
                        )
                        .at(&location),
                    );
                }
                if let Err(err) = self.graph.prompt_section(target, namespace_id) {
                    let suggestion = self.suggest(target, namespace_id);
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::ReferenceNotFound,
                            format!("Reference not found: '{target}' in {location} ({err})"),
                        )
                        .at(&location)
                        .suggest(suggestion),
                    );
                }
            }
        }
    }

    fn check_rules(&mut self, namespace_id: &str, namespace: &'p Namespace) {
        for (name, rule) in &namespace.rules {
            if rule.when.trim().is_empty() || rule.set.trim().is_empty() {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::InvalidRule,
                        format!("Rule '{namespace_id}:{name}' needs both 'when' and 'set'"),
                    )
                    .at(format!("{namespace_id}:{name}")),
                );
            }
        }

        let mut seen = FxHashSet::default();
        for decision in &namespace.decisions {
            if !seen.insert(decision.name.as_str()) {
                self.report.error(
                    ValidationError::new(
                        ErrorKind::DuplicateId,
                        format!(
                            "Duplicate decision '{}' in namespace {namespace_id}",
                            decision.name
                        ),
                    )
                    .at(format!("{namespace_id}:{}", decision.name)),
                );
            }
        }
    }

    fn check_datatypes(&mut self, namespace_id: &str, namespace: &'p Namespace) {
        for datatype in namespace.datatypes.values() {
            let path = format!("{namespace_id}:{}", datatype.name);

            if let Some(parent) = &datatype.extends {
                if let Err(err) = self.graph.datatype(parent, namespace_id) {
                    let suggestion = self.suggest(parent, namespace_id);
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::ReferenceNotFound,
                            format!("Reference not found: '{parent}' in {path}.extends ({err})"),
                        )
                        .at(format!("{path}.extends"))
                        .suggest(suggestion),
                    );
                }
            }

            for value in &datatype.values {
                if value.weight() < 0.0 {
                    self.report.error(
                        ValidationError::new(
                            ErrorKind::InvalidWeight,
                            format!(
                                "Value '{}' in {path} has negative weight {}",
                                value.text,
                                value.weight()
                            ),
                        )
                        .at(&path),
                    );
                }
            }

            let sum = datatype.weight_sum();
            if sum > LARGE_WEIGHT_SUM {
                self.report.warn(
                    ValidationWarning::new(
                        WarningKind::LargeWeightSum,
                        format!(
                            "Large weight sum in datatype '{path}': {sum:.2} (consider normalizing)"
                        ),
                    )
                    .at(&path),
                );
            }
        }
    }

    /// Depth-first search over section-to-section edges. Each cycle is
    /// reported once, with the path from its first node back to itself.
    fn check_cycles(&mut self) {
        let mut search = CycleSearch {
            graph: self.graph,
            marks: FxHashMap::default(),
            path: Vec::new(),
            cycles: Vec::new(),
        };
        for (namespace_id, namespace) in &self.package().namespaces {
            let Ok(owner) = self.graph.namespace(namespace_id) else {
                continue;
            };
            for section in namespace.prompt_sections.values() {
                search.visit(owner, section);
            }
        }
        for chain in search.cycles {
            self.report.error(
                ValidationError::new(
                    ErrorKind::CircularReference,
                    format!("Circular reference detected: {}", chain.join(" -> ")),
                )
                .at(chain.first().cloned().unwrap_or_default()),
            );
        }
    }

    fn check_unused(&mut self) {
        let package = self.package();
        let mut used_targets: FxHashSet<String> = FxHashSet::default();
        let mut used_separators: FxHashSet<String> = FxHashSet::default();
        let mark = |set: &mut FxHashSet<String>, raw: &str, namespace_id: &str| {
            if let Ok(name) = Address::member(raw, namespace_id) {
                set.insert(name.to_string());
            }
        };

        for (namespace_id, namespace) in &package.namespaces {
            for section in namespace.prompt_sections.values() {
                for reference in section.references.values() {
                    if reference.context_key().is_none() {
                        mark(&mut used_targets, &reference.target, namespace_id);
                    }
                    if let Some(separator) = &reference.separator {
                        mark(&mut used_separators, separator, namespace_id);
                    }
                }
                if let Ok(template) = Template::parse(&section.template) {
                    for separator in template.references().filter_map(|t| t.separator.as_deref()) {
                        mark(&mut used_separators, separator, namespace_id);
                    }
                }
            }
            for rulebook in namespace.rulebooks.values() {
                for target in rulebook.entry_points.iter().filter_map(|e| e.resolved_target()) {
                    mark(&mut used_targets, target, namespace_id);
                }
            }
            for datatype in namespace.datatypes.values() {
                if let Some(parent) = &datatype.extends {
                    mark(&mut used_targets, parent, namespace_id);
                }
            }
        }

        for (namespace_id, namespace) in &package.namespaces {
            for name in namespace.datatypes.keys() {
                let full = format!("{namespace_id}:{name}");
                if !used_targets.contains(&full) {
                    self.report.warn(
                        ValidationWarning::new(
                            WarningKind::UnusedDatatype,
                            format!("Unused datatype: '{full}' is defined but never referenced"),
                        )
                        .at(full),
                    );
                }
            }
            for name in namespace.separator_sets.keys() {
                let full = format!("{namespace_id}:{name}");
                if !used_separators.contains(&full) {
                    self.report.warn(
                        ValidationWarning::new(
                            WarningKind::UnusedSeparatorSet,
                            format!(
                                "Unused separator set: '{full}' is defined but never referenced"
                            ),
                        )
                        .at(full),
                    );
                }
            }
            // Without rulebooks every section is a potential entry point.
            if namespace.rulebooks.is_empty() {
                continue;
            }
            for name in namespace.prompt_sections.keys() {
                let full = format!("{namespace_id}:{name}");
                if !used_targets.contains(&full) {
                    self.report.warn(
                        ValidationWarning::new(
                            WarningKind::UnusedPromptSection,
                            format!(
                                "Unused prompt section: '{full}' is neither referenced nor an entry point"
                            ),
                        )
                        .at(full),
                    );
                }
            }
        }
    }

    /// A similarly named datatype or section in the target namespace,
    /// searching the root package before its dependencies.
    fn suggest(&self, raw: &str, namespace_id: &str) -> Option<String> {
        let name = Address::member(raw, namespace_id).ok()?;
        let root = self.graph.root();
        std::iter::once(root)
            .chain(self.graph.dependencies().iter().copied())
            .find_map(|package| {
                let namespace = package.namespaces.get(name.namespace)?;
                let found = namespace
                    .datatypes
                    .keys()
                    .find(|candidate| is_similar(candidate, name.name))
                    .map(|n| format!("{}:{n} (datatype)", name.namespace))
                    .or_else(|| {
                        namespace
                            .prompt_sections
                            .keys()
                            .find(|candidate| is_similar(candidate, name.name))
                            .map(|n| format!("{}:{n} (prompt_section)", name.namespace))
                    })?;
                Some(if std::ptr::eq(package, root) {
                    found
                } else {
                    format!("{found} (from dependency {})", package.id)
                })
            })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

struct CycleSearch<'g, 'p> {
    graph: &'g PackageGraph<'p>,
    marks: FxHashMap<String, Mark>,
    path: Vec<String>,
    cycles: Vec<Vec<String>>,
}

impl<'g, 'p> CycleSearch<'g, 'p> {
    fn visit(&mut self, owner: Located<'p>, section: &'p PromptSection) {
        let key = format!("{}:{}", owner.namespace.id, section.name);
        match self.marks.get(&key) {
            Some(Mark::Done) => return,
            Some(Mark::OnPath) => {
                let start = self.path.iter().position(|p| *p == key).unwrap_or(0);
                let mut chain = self.path[start..].to_vec();
                chain.push(key);
                self.cycles.push(chain);
                return;
            }
            None => {}
        }

        self.marks.insert(key.clone(), Mark::OnPath);
        self.path.push(key.clone());
        for reference in section.references.values() {
            if reference.context_key().is_some() {
                continue;
            }
            if let Ok(Target::Section { owner, section }) =
                self.graph.target(&reference.target, &owner.namespace.id)
            {
                self.visit(owner, section);
            }
        }
        self.path.pop();
        self.marks.insert(key, Mark::Done);
    }
}

/// Prefix, containment, or a shared three-character start, ignoring case.
fn is_similar(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a.contains(&b) || b.contains(&a) {
        return true;
    }
    a.len() >= 3 && b.len() >= 3 && a.get(..3).is_some_and(|p| b.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Datatype, DatatypeValue, Decision, EntryPoint, Processor, Rulebook};

    fn colors() -> Datatype {
        Datatype::new(
            "colors",
            vec![DatatypeValue::new("red"), DatatypeValue::new("blue")],
        )
    }

    fn single(namespace: Namespace) -> Package {
        Package::new("test.pkg", "1.0.0").with_namespace(namespace)
    }

    fn kinds(report: &ValidationReport) -> Vec<ErrorKind> {
        report.errors.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn clean_package_is_valid() {
        let pkg = single(
            Namespace::new("test").with_datatype(colors()).with_section(
                PromptSection::new("ball", "A {color} ball")
                    .with_reference("color", Reference::to("test:colors")),
            ),
        );
        let report = validate(&pkg);
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(!report.has_warnings(), "{:?}", report.warnings);
    }

    #[test]
    fn similarity() {
        assert!(is_similar("colors", "color"));
        assert!(is_similar("Colours", "colors"));
        assert!(!is_similar("animals", "colors"));
    }

    #[test]
    fn missing_reference_with_suggestion() {
        let pkg = single(
            Namespace::new("test").with_datatype(colors()).with_section(
                PromptSection::new("ball", "A {color} ball")
                    .with_reference("color", Reference::to("test:colour")),
            ),
        );
        let report = validate(&pkg);
        let error = report.errors_of(ErrorKind::ReferenceNotFound).next().unwrap();
        assert_eq!(error.suggestion.as_deref(), Some("test:colors (datatype)"));
    }

    #[test]
    fn self_reference_is_one_cycle() {
        let pkg = single(
            Namespace::new("test").with_section(
                PromptSection::new("loop", "{again}")
                    .with_reference("again", Reference::to("test:loop")),
            ),
        );
        let report = validate(&pkg);
        let cycles: Vec<_> = report.errors_of(ErrorKind::CircularReference).collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].message.contains("test:loop -> test:loop"));
    }

    #[test]
    fn naming_and_versions() {
        let pkg = Package::new("Bad-Id", "one")
            .with_namespace(Namespace::new("Main"))
            .with_dependency("dep", "latest")
            .with_dependency("", "1.0.0");
        let report = validate(&pkg);
        let kinds = kinds(&report);
        assert_eq!(kinds.iter().filter(|k| **k == ErrorKind::InvalidNaming).count(), 3);
        assert!(kinds.contains(&ErrorKind::InvalidDependencyVersion));
        assert!(kinds.contains(&ErrorKind::InvalidDependency));
    }

    #[test]
    fn no_namespaces() {
        let report = validate(&Package::new("empty", "1.0.0"));
        assert_eq!(kinds(&report), vec![ErrorKind::InvalidNaming]);
    }

    #[test]
    fn template_override_min_max() {
        let pkg = single(
            Namespace::new("test").with_datatype(colors()).with_section(
                PromptSection::new("ball", "{color?min=3,max=1}")
                    .with_reference("color", Reference::to("test:colors")),
            ),
        );
        assert_eq!(kinds(&validate(&pkg)), vec![ErrorKind::MinMaxInvalid]);
    }

    #[test]
    fn static_filter_narrows_unique_pool() {
        let dt = Datatype::new(
            "colors",
            vec![
                DatatypeValue::new("red").with_tag("warm", true),
                DatatypeValue::new("blue"),
                DatatypeValue::new("green"),
            ],
        );
        let pkg = single(
            Namespace::new("test").with_datatype(dt).with_section(
                PromptSection::new("ball", "{color}").with_reference(
                    "color",
                    Reference::to("test:colors")
                        .with_filter("tags.warm")
                        .with_range(2, 2)
                        .unique(),
                ),
            ),
        );
        let report = validate(&pkg);
        let error = report
            .errors_of(ErrorKind::UniqueConstraintInfeasible)
            .next()
            .unwrap();
        assert!(error.message.contains("requested=2, available=1"), "{}", error.message);
    }

    #[test]
    fn filter_errors() {
        let pkg = single(
            Namespace::new("test").with_datatype(colors()).with_section(
                PromptSection::new("ball", "{color} {shade#{tags.x == ref:missing.tags.x}}")
                    .with_reference("color", Reference::to("test:colors").with_filter("tags.a b"))
                    .with_reference("shade", Reference::to("test:colors")),
            ),
        );
        let report = validate(&pkg);
        assert_eq!(report.errors_of(ErrorKind::InvalidTagFilter).count(), 2);
    }

    #[test]
    fn rulebook_rules_and_decisions() {
        let rulebook = Rulebook {
            name: "main".to_string(),
            entry_points: vec![
                EntryPoint::to("test:nowhere"),
                EntryPoint::to("ball").with_weight(-1.0),
            ],
            ..Rulebook::default()
        };
        let empty = Rulebook {
            name: "empty".to_string(),
            ..Rulebook::default()
        };
        let decision = || Decision {
            name: "pick".to_string(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            processor: Processor::Expression {
                formula: "true".to_string(),
            },
        };
        let mut ns = Namespace::new("test")
            .with_section(PromptSection::new("ball", "A ball"))
            .with_rulebook(rulebook)
            .with_rulebook(empty)
            .with_rule("broken", crate::schema::Rule::new("", "x", "y"));
        ns.decisions = vec![decision(), decision()];
        let report = validate(&single(ns));
        let kinds = kinds(&report);
        for expected in [
            ErrorKind::ReferenceNotFound,
            ErrorKind::InvalidWeight,
            ErrorKind::InvalidNaming,
            ErrorKind::InvalidRule,
            ErrorKind::DuplicateId,
        ] {
            assert!(kinds.contains(&expected), "{expected:?} missing from {kinds:?}");
        }
    }

    #[test]
    fn unused_findings() {
        let rulebook = Rulebook {
            name: "main".to_string(),
            entry_points: vec![EntryPoint::to("ball")],
            ..Rulebook::default()
        };
        let pkg = single(
            Namespace::new("test")
                .with_datatype(colors())
                .with_datatype(Datatype::new(
                    "heavy",
                    vec![DatatypeValue::new("x").with_weight(150.0)],
                ))
                .with_separator_set(crate::schema::SeparatorSet {
                    name: "list".to_string(),
                    ..Default::default()
                })
                .with_section(
                    PromptSection::new("ball", "A ball")
                        .with_reference("color", Reference::to("test:colors")),
                )
                .with_section(PromptSection::new("orphan", "alone"))
                .with_rulebook(rulebook),
        );
        let report = validate(&pkg);
        assert!(report.is_valid(), "{:?}", report.errors);
        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::UnusedReference,
                WarningKind::LargeWeightSum,
                WarningKind::UnusedDatatype,
                WarningKind::UnusedSeparatorSet,
                WarningKind::UnusedPromptSection,
            ]
        );
    }
}
