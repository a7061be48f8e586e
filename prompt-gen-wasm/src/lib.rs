//! WASM bindings for prompt-gen: the render and validate boundary used by
//! the browser package editor.
//!
//! Packages cross the boundary as JSON; results come back as JSON strings.

use std::collections::BTreeMap;
use wasm_bindgen::prelude::*;

use prompt_gen::core::loader::normalize_references;
use prompt_gen::{validate_with_dependencies, Package, PackageGraph, Renderer};

fn parse_package(json: &str) -> Result<Package, JsError> {
    let mut package: Package = serde_json::from_str(json)
        .map_err(|e| JsError::new(&format!("Invalid package JSON: {e}")))?;
    normalize_references(&mut package);
    Ok(package)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

/// A loaded package plus the dependency packages its references may use.
#[wasm_bindgen]
pub struct PromptGenSession {
    package: Package,
    dependencies: Vec<Package>,
}

#[wasm_bindgen]
impl PromptGenSession {
    /// Create a session from a package and a JSON array of dependency
    /// packages (pass `"[]"` when there are none).
    #[wasm_bindgen(constructor)]
    pub fn new(package_json: &str, deps_json: &str) -> Result<PromptGenSession, JsError> {
        let package = parse_package(package_json)?;
        let raw: Vec<serde_json::Value> = serde_json::from_str(deps_json)
            .map_err(|e| JsError::new(&format!("Invalid dependencies JSON: {e}")))?;
        let dependencies = raw
            .into_iter()
            .map(|value| {
                let mut dep: Package = serde_json::from_value(value)
                    .map_err(|e| JsError::new(&format!("Invalid dependency package: {e}")))?;
                normalize_references(&mut dep);
                Ok(dep)
            })
            .collect::<Result<Vec<_>, JsError>>()?;

        Ok(PromptGenSession {
            package,
            dependencies,
        })
    }

    /// Render a section or rulebook address. Returns `{"text": .., "seed": ..}`.
    pub fn render(&self, target: &str, seed: u64) -> Result<String, JsError> {
        let graph = self.graph();
        let result = Renderer::new(&graph)
            .render(target, seed)
            .map_err(|e| JsError::new(&format!("Render error: {e}")))?;
        to_json(&result)
    }

    /// Render one entry point of `namespace:rulebook`.
    pub fn render_rulebook(
        &self,
        namespace: &str,
        rulebook: &str,
        seed: u64,
    ) -> Result<String, JsError> {
        let graph = self.graph();
        let result = Renderer::new(&graph)
            .render_rulebook(namespace, rulebook, seed)
            .map_err(|e| JsError::new(&format!("Render error: {e}")))?;
        to_json(&result)
    }

    /// Render `count` consecutive seeds starting at `seed`. Returns a JSON
    /// array of results.
    pub fn render_variants(&self, target: &str, seed: u64, count: u32) -> Result<String, JsError> {
        let graph = self.graph();
        let seeds = (0..u64::from(count)).map(|i| seed.wrapping_add(i));
        let results = Renderer::new(&graph)
            .render_variants(target, seeds)
            .map_err(|e| JsError::new(&format!("Render error: {e}")))?;
        to_json(&results)
    }

    /// Validate the package. Returns `{"errors": [..], "warnings": [..]}`.
    pub fn validate(&self) -> Result<String, JsError> {
        let dependencies: BTreeMap<String, Package> = self
            .dependencies
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        to_json(&validate_with_dependencies(&self.package, &dependencies))
    }

    /// JSON array of renderable `namespace:name` addresses.
    pub fn targets(&self) -> Result<String, JsError> {
        let targets: Vec<String> = self
            .package
            .namespaces
            .iter()
            .flat_map(|(ns, namespace)| {
                namespace
                    .prompt_sections
                    .keys()
                    .chain(namespace.rulebooks.keys())
                    .map(move |name| format!("{ns}:{name}"))
            })
            .collect();
        to_json(&targets)
    }
}

impl PromptGenSession {
    fn graph(&self) -> PackageGraph<'_> {
        PackageGraph::new(&self.package, &self.dependencies)
    }
}
