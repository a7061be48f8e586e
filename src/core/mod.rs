//! Template resolution: tokenizer, seeded generator, package graph,
//! rendering engine, and validator.

pub mod context;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod random;
pub mod render;
pub mod report;
pub mod template;
pub mod validator;
