/// The rendering engine: target → text in three phases.
///
/// 1. Selection: pick values for every reference in the template,
///    rendering nested prompt sections recursively.
/// 2. Enrichment: run the namespace's rules once, writing the context.
/// 3. Rendering: walk the template again and emit text.
///
/// A render owns its generator and context; nothing outlives the call.

use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::core::context::{Context, SelectedValue, SelectionContext};
use crate::core::filter::{Filter, FilterError};
use crate::core::graph::{Address, Located, LookupError, PackageGraph, Target};
use crate::core::random::{RandomError, SeededRandom};
use crate::core::template::{ParseError, Template, TemplateRef, Token};
use crate::schema::{Datatype, PromptSection, Reference, Rulebook, SeparatorSet};

/// Nesting limit for prompt sections rendered inside prompt sections.
pub const MAX_RECURSION_DEPTH: usize = 10;

/// Token-name prefix that reads the context without a reference entry.
const CONTEXT_TOKEN_PREFIX: &str = "context.";

#[derive(Debug, Error)]
pub enum RenderError {
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
    #[error("rulebook {0} has no entry points")]
    NoEntryPoints(String),
    #[error("entry point in rulebook {rulebook} has no usable target (found: {found})")]
    InvalidEntryPointTarget { rulebook: String, found: String },
    #[error("maximum recursion depth ({max}) exceeded for: {section}")]
    MaxRecursionDepthExceeded { max: usize, section: String },
    #[error("context variable '{0}' not found; it must be set by a rule that triggers before it is read")]
    ContextVariableNotFound(String),
    #[error("invalid reference format: '{0}'")]
    InvalidReferenceFormat(String),
    #[error("reference '{reference}' is used in {section} but not defined")]
    ReferenceNotDefined { reference: String, section: String },
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),
    #[error("template parse error: {0}")]
    Template(#[from] ParseError),
    #[error("random error: {0}")]
    Random(#[from] RandomError),
}

impl From<LookupError> for RenderError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NamespaceNotFound(s) => Self::NamespaceNotFound(s),
            LookupError::DatatypeNotFound(s) => Self::DatatypeNotFound(s),
            LookupError::PromptSectionNotFound(s) => Self::PromptSectionNotFound(s),
            LookupError::RulebookNotFound(s) => Self::RulebookNotFound(s),
            LookupError::SeparatorSetNotFound(s) => Self::SeparatorSetNotFound(s),
            LookupError::InvalidReferenceFormat(s) => Self::InvalidReferenceFormat(s),
        }
    }
}

/// Rendered text plus the seed that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderResult {
    pub text: String,
    pub seed: u64,
}

/// Renders prompt sections and rulebooks from a package graph.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'g, 'p> {
    graph: &'g PackageGraph<'p>,
    max_depth: usize,
}

/// Builder for constructing a `Renderer`.
pub struct RendererBuilder<'g, 'p> {
    graph: &'g PackageGraph<'p>,
    max_depth: usize,
}

impl<'g, 'p> RendererBuilder<'g, 'p> {
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(self) -> Renderer<'g, 'p> {
        Renderer {
            graph: self.graph,
            max_depth: self.max_depth,
        }
    }
}

impl<'g, 'p> Renderer<'g, 'p> {
    pub fn new(graph: &'g PackageGraph<'p>) -> Self {
        Self::builder(graph).build()
    }

    pub fn builder(graph: &'g PackageGraph<'p>) -> RendererBuilder<'g, 'p> {
        RendererBuilder {
            graph,
            max_depth: MAX_RECURSION_DEPTH,
        }
    }

    /// Render `target`, a prompt section or rulebook address.
    ///
    /// A bare name resolves against the root package's first namespace.
    /// When the namespace has no section by that name but has a rulebook,
    /// the rulebook is rendered instead.
    pub fn render(&self, target: &str, seed: u64) -> Result<RenderResult, RenderError> {
        let name = Address::member(target, self.graph.default_namespace())?;
        let owner = self.graph.namespace(name.namespace)?;
        let mut run = RenderRun::new(self, seed);

        let text = if let Some(section) = owner.namespace.prompt_sections.get(name.name) {
            run.render_section(owner, section, 0, Context::new())?
        } else if let Some(rulebook) = owner.namespace.rulebooks.get(name.name) {
            run.render_rulebook(owner, rulebook)?
        } else {
            return Err(RenderError::PromptSectionNotFound(name.to_string()));
        };

        Ok(RenderResult { text, seed })
    }

    /// Render one weighted entry point of `namespace:rulebook`.
    pub fn render_rulebook(
        &self,
        namespace: &str,
        rulebook: &str,
        seed: u64,
    ) -> Result<RenderResult, RenderError> {
        let (owner, rulebook) = self.graph.rulebook(rulebook, namespace)?;
        let text = RenderRun::new(self, seed).render_rulebook(owner, rulebook)?;
        Ok(RenderResult { text, seed })
    }

    /// Render the same target once per seed.
    pub fn render_variants(
        &self,
        target: &str,
        seeds: impl IntoIterator<Item = u64>,
    ) -> Result<Vec<RenderResult>, RenderError> {
        seeds
            .into_iter()
            .map(|seed| self.render(target, seed))
            .collect()
    }
}

type Selections = FxHashMap<String, Vec<SelectedValue>>;

/// State owned by a single render call.
struct RenderRun<'r, 'g, 'p> {
    renderer: &'r Renderer<'g, 'p>,
    rng: SeededRandom,
}

impl<'r, 'g, 'p> RenderRun<'r, 'g, 'p> {
    fn new(renderer: &'r Renderer<'g, 'p>, seed: u64) -> Self {
        Self {
            renderer,
            rng: SeededRandom::new(seed),
        }
    }

    fn graph(&self) -> &'g PackageGraph<'p> {
        self.renderer.graph
    }

    fn render_rulebook(
        &mut self,
        owner: Located<'p>,
        rulebook: &'p Rulebook,
    ) -> Result<String, RenderError> {
        let rulebook_name = format!("{}:{}", owner.namespace.id, rulebook.name);
        if rulebook.entry_points.is_empty() {
            return Err(RenderError::NoEntryPoints(rulebook_name));
        }

        let weights: Vec<f64> = rulebook.entry_points.iter().map(|ep| ep.weight()).collect();
        let index = self.rng.weighted_choice(&weights)?;
        let entry = &rulebook.entry_points[index];
        let target = entry
            .resolved_target()
            .ok_or_else(|| RenderError::InvalidEntryPointTarget {
                rulebook: rulebook_name.clone(),
                found: format!("{:?}", entry.target),
            })?;
        tracing::debug!(rulebook = %rulebook_name, index, target, "selected entry point");

        let (section_owner, section) = self
            .graph()
            .prompt_section(target, &owner.namespace.id)?;

        let mut context = Context::new();
        for (key, value) in &rulebook.context {
            context.set(key.clone(), value.to_string());
        }

        self.render_section(section_owner, section, 0, context)
    }

    fn render_section(
        &mut self,
        owner: Located<'p>,
        section: &'p PromptSection,
        depth: usize,
        mut context: Context,
    ) -> Result<String, RenderError> {
        let section_name = format!("{}:{}", owner.namespace.id, section.name);
        if depth > self.renderer.max_depth {
            return Err(RenderError::MaxRecursionDepthExceeded {
                max: self.renderer.max_depth,
                section: section_name,
            });
        }
        tracing::debug!(section = %section_name, depth, "rendering section");

        let template = Template::parse(&section.template)?;
        let (selections, selection_context) =
            self.select(owner, section, &template, depth, &context)?;
        enrich(owner, &selection_context, &mut context);
        let text = self.emit(owner, section, &template, &selections, &context)?;

        Ok(text.trim().to_string())
    }

    /// Phase 1: choose values for every reference in the template.
    fn select(
        &mut self,
        owner: Located<'p>,
        section: &'p PromptSection,
        template: &Template,
        depth: usize,
        context: &Context,
    ) -> Result<(Selections, SelectionContext), RenderError> {
        let mut selections = Selections::default();
        let mut selection_context = SelectionContext::new();

        for name in selection_order(section, template) {
            let Some(reference) = section.references.get(name) else {
                if name.starts_with(CONTEXT_TOKEN_PREFIX) {
                    continue;
                }
                return Err(RenderError::ReferenceNotDefined {
                    reference: name.to_string(),
                    section: format!("{}:{}", owner.namespace.id, section.name),
                });
            };
            if reference.context_key().is_some() {
                continue;
            }

            let values = match self.graph().target(&reference.target, &owner.namespace.id)? {
                Target::Section {
                    owner: nested_owner,
                    section: nested,
                } => {
                    let text =
                        self.render_section(nested_owner, nested, depth + 1, context.clone())?;
                    vec![SelectedValue::untagged(text)]
                }
                Target::Datatype { datatype, .. } => {
                    let token = first_token(template, name);
                    self.select_values(owner, reference, token, datatype, &selection_context)?
                }
            };

            if let Some(first) = values.first() {
                selection_context.record(name, first.clone());
            }
            selections.insert(name.to_string(), values);
        }

        Ok((selections, selection_context))
    }

    fn select_values(
        &mut self,
        owner: Located<'p>,
        reference: &Reference,
        token: Option<&TemplateRef>,
        datatype: &'p Datatype,
        selection: &SelectionContext,
    ) -> Result<Vec<SelectedValue>, RenderError> {
        let min = token.and_then(|t| t.min).unwrap_or(reference.min());
        let max = token.and_then(|t| t.max).unwrap_or(reference.max());
        let unique = token.and_then(|t| t.unique).unwrap_or(reference.is_unique());
        let filter = token
            .and_then(|t| t.filter.as_deref())
            .or(reference.filter.as_deref());

        let count = self.rng.range(u64::from(min), u64::from(max))?;

        let filter = match filter {
            Some(f) if !owner.package.metadata.bypass_filters => Some(Filter::parse(f)?),
            _ => None,
        };
        let candidates: Vec<_> = datatype
            .values
            .iter()
            .filter(|v| filter.as_ref().map_or(true, |f| f.matches(&v.tags, selection)))
            .collect();

        let mut chosen: Vec<SelectedValue> = Vec::new();
        for _ in 0..count {
            let pool: Vec<_> = candidates
                .iter()
                .filter(|v| !unique || !chosen.iter().any(|c| c.text == v.text))
                .collect();
            if pool.is_empty() {
                tracing::warn!(
                    datatype = %datatype.name,
                    requested = count,
                    selected = chosen.len(),
                    "candidate pool exhausted, stopping early"
                );
                break;
            }
            let weights: Vec<f64> = pool.iter().map(|v| v.weight()).collect();
            let value = pool[self.rng.weighted_choice(&weights)?];
            chosen.push(SelectedValue::new(value.text.clone(), value.tags.clone()));
        }

        Ok(chosen)
    }

    /// Phase 3: emit literal text and selected values.
    fn emit(
        &self,
        owner: Located<'p>,
        section: &'p PromptSection,
        template: &Template,
        selections: &Selections,
        context: &Context,
    ) -> Result<String, RenderError> {
        let mut output = String::new();

        for token in &template.tokens {
            let token = match token {
                Token::Text(text) => {
                    output.push_str(text);
                    continue;
                }
                Token::Reference(token) => token,
            };

            let Some(reference) = section.references.get(&token.name) else {
                match token.name.strip_prefix(CONTEXT_TOKEN_PREFIX) {
                    Some(key) => output.push_str(read_context(context, key)?),
                    None => {
                        return Err(RenderError::ReferenceNotDefined {
                            reference: token.name.clone(),
                            section: format!("{}:{}", owner.namespace.id, section.name),
                        })
                    }
                }
                continue;
            };

            if let Some(key) = reference.context_key() {
                output.push_str(read_context(context, key)?);
                continue;
            }

            let values = selections.get(&token.name).map(Vec::as_slice).unwrap_or(&[]);
            let texts: Vec<&str> = values.iter().map(|v| v.text.as_str()).collect();
            let separator = token.separator.as_deref().or(reference.separator.as_deref());
            output.push_str(&self.separator_for(owner, separator).join(&texts));
        }

        Ok(output)
    }

    fn separator_for(&self, owner: Located<'p>, name: Option<&str>) -> SeparatorSet {
        let Some(name) = name else {
            return SeparatorSet::default();
        };
        match self.graph().separator_set(name, &owner.namespace.id) {
            Ok(set) => set.clone(),
            Err(err) => {
                tracing::warn!(
                    separator = name,
                    error = %err,
                    "falling back to default separators"
                );
                SeparatorSet::default()
            }
        }
    }
}

/// Phase 2: apply the namespace's rules once, in declaration order, so a
/// rule can trigger on a key written by an earlier one.
///
/// A rule fires when its `when` key is in the context or names a reference
/// selected in phase 1.
fn enrich(owner: Located<'_>, selection: &SelectionContext, context: &mut Context) {
    for (name, rule) in &owner.namespace.rules {
        if !context.contains(&rule.when) && !selection.contains(&rule.when) {
            continue;
        }
        let value = evaluate_rule_value(&rule.value, selection);
        tracing::debug!(rule = %name, set = %rule.set, value = %value, "rule fired");
        context.set(rule.set.clone(), value);
    }
}

/// `ref:<name>.tags.<key>` reads a selected value's tag; anything else,
/// including an expression whose tag is missing, is a literal.
pub fn evaluate_rule_value(expression: &str, selection: &SelectionContext) -> String {
    expression
        .strip_prefix("ref:")
        .and_then(|rest| rest.split_once(".tags."))
        .and_then(|(reference, key)| selection.tag(reference, key))
        .map(ToString::to_string)
        .unwrap_or_else(|| expression.to_string())
}

fn read_context<'c>(context: &'c Context, key: &str) -> Result<&'c str, RenderError> {
    context
        .get(key)
        .ok_or_else(|| RenderError::ContextVariableNotFound(key.to_string()))
}

fn first_token<'t>(template: &'t Template, name: &str) -> Option<&'t TemplateRef> {
    template.references().find(|r| r.name == name)
}

/// Order in which references are selected.
///
/// Template order, except that a reference whose filter reads another
/// reference (`ref:<name>`) waits until that reference is selected.
/// Filter cycles fall back to template order.
fn selection_order<'t>(section: &PromptSection, template: &'t Template) -> Vec<&'t str> {
    let names = template.reference_names();
    let dependencies: Vec<Vec<String>> = names
        .iter()
        .map(|&name| {
            let filter = first_token(template, name)
                .and_then(|t| t.filter.as_deref())
                .or_else(|| section.references.get(name)?.filter.as_deref());
            filter
                .and_then(|f| Filter::parse(f).ok())
                .map(|f| {
                    f.dependencies()
                        .into_iter()
                        .filter(|&d| d != name && names.contains(&d))
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut placed: Vec<&'t str> = Vec::with_capacity(names.len());
    let mut remaining: Vec<usize> = (0..names.len()).collect();
    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|&i| dependencies[i].iter().all(|d| placed.contains(&d.as_str())))
            .unwrap_or(0);
        placed.push(names[remaining.remove(ready)]);
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DatatypeValue, EntryPoint, Namespace, Package, Rule, TagValue};

    fn creatures_package() -> Package {
        Package::new("test.creatures", "1.0.0").with_namespace(
            Namespace::new("test")
                .with_datatype(Datatype::new(
                    "creatures",
                    vec![
                        DatatypeValue::new("dragon").with_tag("article", "a"),
                        DatatypeValue::new("elf").with_tag("article", "an"),
                        DatatypeValue::new("unicorn").with_tag("article", "a"),
                    ],
                ))
                .with_rule(
                    "article_agreement",
                    Rule::new("creature", "article", "ref:creature.tags.article"),
                )
                .with_section(
                    PromptSection::new(
                        "scene",
                        "There is {context.article} {creature} in the forest.",
                    )
                    .with_reference("creature", Reference::to("test:creatures"))
                    .with_reference("context.article", Reference::to("context:article")),
                ),
        )
    }

    #[test]
    fn rule_value_expression() {
        let mut sel = SelectionContext::new();
        sel.record(
            "creature",
            SelectedValue::new("elf", [("article".to_string(), TagValue::from("an"))].into()),
        );
        assert_eq!(evaluate_rule_value("ref:creature.tags.article", &sel), "an");
        assert_eq!(
            evaluate_rule_value("ref:creature.tags.plural", &sel),
            "ref:creature.tags.plural"
        );
        assert_eq!(evaluate_rule_value("literal", &sel), "literal");
    }

    #[test]
    fn article_agreement_for_many_seeds() {
        let pkg = creatures_package();
        let graph = PackageGraph::standalone(&pkg);
        let renderer = Renderer::new(&graph);
        for seed in 0..200 {
            let result = renderer.render("test:scene", seed).unwrap();
            assert!(
                [
                    "There is a dragon in the forest.",
                    "There is an elf in the forest.",
                    "There is a unicorn in the forest.",
                ]
                .contains(&result.text.as_str()),
                "seed {seed}: {}",
                result.text
            );
            assert_eq!(result.seed, seed);
        }
    }

    #[test]
    fn missing_context_is_an_error() {
        let pkg = Package::new("t", "1.0.0").with_namespace(
            Namespace::new("t").with_section(
                PromptSection::new("s", "{mood}")
                    .with_reference("mood", Reference::to("context:mood")),
            ),
        );
        let graph = PackageGraph::standalone(&pkg);
        let err = Renderer::new(&graph).render("t:s", 1).unwrap_err();
        assert!(matches!(err, RenderError::ContextVariableNotFound(ref k) if k == "mood"));
    }

    #[test]
    fn rulebook_context_seeds_render() {
        let mut rulebook = Rulebook {
            name: "main".to_string(),
            entry_points: vec![EntryPoint::to("s")],
            ..Rulebook::default()
        };
        rulebook
            .context
            .insert("mood".to_string(), TagValue::from("gloomy"));
        let pkg = Package::new("t", "1.0.0").with_namespace(
            Namespace::new("t")
                .with_section(
                    PromptSection::new("s", "A {mood} day")
                        .with_reference("mood", Reference::to("context:mood")),
                )
                .with_rulebook(rulebook),
        );
        let graph = PackageGraph::standalone(&pkg);
        let renderer = Renderer::new(&graph);
        assert_eq!(renderer.render_rulebook("t", "main", 9).unwrap().text, "A gloomy day");
        assert_eq!(renderer.render("t:main", 9).unwrap().text, "A gloomy day");
    }

    #[test]
    fn rules_apply_in_declaration_order() {
        let pkg = Package::new("t", "1.0.0").with_namespace(
            Namespace::new("t")
                .with_datatype(Datatype::new(
                    "creatures",
                    vec![DatatypeValue::new("elf").with_tag("article", "an")],
                ))
                .with_rule(
                    "z_first",
                    Rule::new("creature", "article", "ref:creature.tags.article"),
                )
                .with_rule("a_second", Rule::new("article", "phrase", "Behold"))
                .with_section(
                    PromptSection::new("s", "{context.phrase} {context.article} {creature}")
                        .with_reference("creature", Reference::to("t:creatures")),
                ),
        );
        let order: Vec<&str> = pkg.namespaces["t"].rules.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["z_first", "a_second"]);

        let graph = PackageGraph::standalone(&pkg);
        let result = Renderer::new(&graph).render("t:s", 4).unwrap();
        assert_eq!(result.text, "Behold an elf");
    }

    #[test]
    fn selection_order_respects_filter_dependencies() {
        let section = PromptSection::new("s", "{animal} in the {place}")
            .with_reference(
                "animal",
                Reference::to("animals").with_filter("tags.habitat == ref:place.tags.habitat"),
            )
            .with_reference("place", Reference::to("places"));
        let template = Template::parse(&section.template).unwrap();
        assert_eq!(selection_order(&section, &template), vec!["place", "animal"]);
    }

    #[test]
    fn selection_order_cycle_falls_back_to_template_order() {
        let section = PromptSection::new("s", "{a} {b}")
            .with_reference("a", Reference::to("x").with_filter("tags.k == ref:b.tags.k"))
            .with_reference("b", Reference::to("x").with_filter("tags.k == ref:a.tags.k"));
        let template = Template::parse(&section.template).unwrap();
        assert_eq!(selection_order(&section, &template), vec!["a", "b"]);
    }

    #[test]
    fn max_depth_is_configurable() {
        let pkg = Package::new("t", "1.0.0").with_namespace(
            Namespace::new("t")
                .with_section(
                    PromptSection::new("outer", "<{inner}>")
                        .with_reference("inner", Reference::to("t:inner")),
                )
                .with_section(PromptSection::new("inner", "core")),
        );
        let graph = PackageGraph::standalone(&pkg);
        assert_eq!(Renderer::new(&graph).render("t:outer", 1).unwrap().text, "<core>");
        let shallow = Renderer::builder(&graph).max_depth(0).build();
        assert!(matches!(
            shallow.render("t:outer", 1),
            Err(RenderError::MaxRecursionDepthExceeded { max: 0, .. })
        ));
    }
}
