//! Blueprint code generator library.
//!
//! This crate turns a semantic HTTP API model created with
//! `blueprint-define` into a Rust client crate. Generation is a pipeline of
//! planners whose output is plain data, followed by code emission:
//!
//! - [`resolver`] maps schemas onto target types
//! - [`serialization`] plans JSON and XML encodings, with interpreters that
//!   execute plans over dynamic values
//! - [`request`] plans request assembly (path, query, headers, body)
//! - [`response`] plans status-code dispatch
//! - [`grouping`] partitions operations into output buckets
//! - [`output`] drives a whole run and writes the artifacts
//!
//! ## Modules
//!
//! - [`codegen`] - Code generation for models, clients, handlers and runtime support
//! - [`config`] - Run configuration and grouping policies
//! - [`context`] - Per-run memo tables shared by the planners
//! - [`errors`] - Error types for the generator and plan execution
//! - [`input`] - Loading models and configuration from disk
//! - [`naming`] - Identifier casing for generated code
//! - [`transport`] - Concrete requests and responses used by plan execution
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use blueprint_gen::config::{ApiGroupBy, Configuration};
//! use blueprint_gen::input::load_model;
//! use blueprint_gen::output::{generate, write_artifacts};
//!
//! let model = load_model(Path::new("CodeModel.yaml")).unwrap();
//! let config = Configuration::new("generated/src", "vault", ApiGroupBy::FirstPathSegment);
//!
//! let artifacts = generate(&model, &config).unwrap();
//! write_artifacts(&artifacts, Path::new(&config.output_folder), false).unwrap();
//! ```
//!
//! ## Generated Code Structure
//!
//! For a model with operations under `/secrets`, grouped by first path segment:
//!
//! ```text
//! // models/secret.rs
//! pub struct Secret { pub id: String, ... }
//!
//! // secrets_api.rs
//! pub struct SecretsApi {
//!     client: reqwest::Client,
//!     endpoint: String,
//! }
//!
//! impl SecretsApi {
//!     pub fn create_get_secret_request(&self, id: String) -> Result<RequestParts, ApiError>;
//!     pub async fn get_secret(&self, id: String) -> Result<Secret, ApiError>;
//! }
//!
//! pub trait SecretsHandler {
//!     async fn get_secret(&self, id: String) -> Result<Secret, ApiError>;
//! }
//! ```

pub mod codegen;
pub mod config;
pub mod context;
pub mod errors;
pub mod grouping;
pub mod input;
pub mod naming;
pub mod output;
pub mod request;
pub mod resolver;
pub mod response;
pub mod serialization;
pub mod transport;

#[cfg(test)]
mod test_utils;
