//! Prompt Gen: seeded, reproducible text generation from declarative
//! content packages.
//!
//! A package bundles weighted datatypes, templated prompt sections, rules
//! and rulebooks. Rendering resolves a template in three passes (selection,
//! enrichment, rendering) across namespaces and dependency packages; the
//! same seed always yields the same text. The validator proves a package is
//! self-consistent before anything is rendered.

pub mod core;
pub mod schema;

pub use crate::core::graph::PackageGraph;
pub use crate::core::loader::{
    load_package_from_ron, load_packages_from_dir, parse_package_ron, resolve_dependencies,
    LoadError,
};
pub use crate::core::random::SeededRandom;
pub use crate::core::render::{RenderError, RenderResult, Renderer, MAX_RECURSION_DEPTH};
pub use crate::core::report::{
    ErrorKind, ValidationError, ValidationReport, ValidationWarning, WarningKind,
};
pub use crate::core::template::{Template, Token};
pub use crate::core::validator::{validate, validate_with_dependencies};
pub use crate::schema::Package;
