//! Package data model: everything a loader hands to the engine.

pub mod datatype;
pub mod package;
pub mod rule;
pub mod section;

pub use datatype::{Datatype, DatatypeValue, TagValue, Tags};
pub use package::{Dependency, Namespace, Package, PackageMetadata};
pub use rule::{ConditionalRule, Decision, EntryPoint, Processor, Rule, Rulebook};
pub use section::{PromptSection, Reference, SeparatorSet};
