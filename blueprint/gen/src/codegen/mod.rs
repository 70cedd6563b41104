//! Code generation modules for blueprint.
//!
//! This module contains generators that produce Rust source code from the
//! planned API model. Each submodule handles a specific component of the
//! generated crate.
//!
//! ## Submodules
//!
//! - [`client`] - Generates the per-bucket client struct and its operation methods
//! - [`models`] - Generates structs and enums for object, enum and header models
//! - [`module_docs`] - Generates module-level documentation
//! - [`server`] - Generates the per-bucket handler trait and route table
//! - [`shared`] - Generates the runtime support module (`ApiError`, transport, encodings)
//! - [`types`] - Maps resolved target types onto Rust type and conversion tokens
//! - [`xml`] - Generates `XmlModel` impls from XML serialization plans
//!
//! ## Code Generation Flow
//!
//! 1. Every object, enum and header model becomes a file via [`generate_models`]
//! 2. XML-carried objects get an impl via [`generate_xml_impl`]
//! 3. Each bucket gets a client via [`generate_client`] and a handler via [`generate_handler`]
//! 4. The runtime support module is generated via [`generate_shared_module`]
//!
//! ## Output Format
//!
//! All generators return `proc_macro2::TokenStream`, which is then:
//! - Validated with `syn::parse2` to ensure correctness
//! - Formatted with `prettyplease` for consistent style
//!
//! See [`crate::output`] for the assembly and file writing logic.

pub mod client;
pub mod models;
pub mod module_docs;
pub mod server;
pub mod shared;
pub mod types;
pub mod xml;

pub use client::{OperationPlan, generate_client};
pub use models::{ModelFile, generate_models, generate_models_mod};
pub use module_docs::{ModuleDocBuilder, library_docs};
pub use server::generate_handler;
pub use shared::generate_shared_module;
pub use xml::generate_xml_impl;
