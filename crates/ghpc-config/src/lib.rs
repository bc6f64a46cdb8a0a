//! # ghpc-config
//!
//! Resolution engine for HPC blueprints.
//!
//! Handles:
//! - **Values**: literals and expressions with `use` provenance.
//! - **Expressions**: lexing, parsing and evaluation of the embedded expression language.
//! - **Validation**: structure, naming, references and group ordering.
//! - **Variables**: dependency-ordered evaluation of global variables.
//! - **Use**: wiring module outputs into the inputs of the modules using them.
//! - **Intergroup references**: outputs carried between deployment groups.
//! - **Staging**: `ghpc_stage(path)` partial evaluation.
//! - **Expansion**: the pipeline tying these passes together.

pub mod backends;
pub mod blueprint;
pub mod dict;
pub mod expand;
pub mod expression;
pub mod graph;
pub mod igc;
pub mod labels;
pub mod literal;
pub mod module_info;
pub mod reference;
pub mod staging;
pub mod use_modules;
pub mod validate;
pub mod value;
pub mod vars;
pub mod yaml;

pub use blueprint::{Blueprint, Group, Module};
pub use expand::{Plan, expand};
pub use module_info::{ModuleCatalog, ModuleInfoSource};
