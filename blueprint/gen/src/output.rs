//! Output assembly and file writing for generated code.
//!
//! This module runs a whole generation: it validates the configuration,
//! plans every schema and operation, groups operations into buckets, renders
//! each artifact through [`crate::codegen`], validates the result with `syn`
//! and normalizes it with a [`Formatter`].
//!
//! ## Output Structure
//!
//! ```text
//! {output-folder}/
//! ├── lib.rs                      # Crate docs, module declarations
//! ├── shared.rs                   # ApiError, transport, encodings, XML tree
//! ├── models/
//! │   ├── mod.rs                  # Model declarations and re-exports
//! │   └── secret.rs               # One file per object, enum and header model
//! ├── secrets_api.rs              # One file per output bucket
//! └── .blueprint_generated.json   # Run metadata (optional)
//! ```
//!
//! ## Safety Guarantees
//!
//! - **Validation**: All generated code is validated with `syn` before it is returned
//! - **All or nothing**: Any planning error, invalid artifact or name collision fails the run
//! - **Atomic writes**: Uses temp file + rename pattern to prevent partial writes

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use blueprint_define::{ApiModel, SchemaId, SchemaType, WireFormat};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::codegen::{
    ModelFile, ModuleDocBuilder, OperationPlan, generate_client, generate_handler,
    generate_models, generate_models_mod, generate_shared_module, library_docs,
};
use crate::config::Configuration;
use crate::context::GenerationContext;
use crate::errors::{GeneratorError, ModelError};
use crate::grouping::{OutputBucket, group};
use crate::request::BodyStep;
use crate::resolver::{TargetType, resolve};
use crate::response::{DispatchAction, ResponseValue};
use crate::serialization::{plan, xml_closure};
use crate::{request, response};

/// Name of the run metadata artifact.
pub const METADATA_FILE: &str = ".blueprint_generated.json";

/// Notice prepended to every formatted Rust artifact.
pub const GENERATED_NOTICE: &str =
    "// This code was automatically generated by blueprint-gen. Do not edit manually.";

/// A named text artifact, relative to the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub text: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Whether the artifact holds Rust source.
    pub fn is_rust(&self) -> bool {
        self.name.ends_with(".rs")
    }
}

/// Normalizes emitted source text.
///
/// Receives syntactically valid source and returns equivalent source.
pub trait Formatter: Send + Sync {
    /// ## Errors
    ///
    /// Returns `GeneratorError::CodeGenError` if the source cannot be formatted.
    fn format(&self, name: &str, source: &str) -> Result<String, GeneratorError>;
}

/// Formats with `prettyplease` and prepends [`GENERATED_NOTICE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RustFormatter;

impl Formatter for RustFormatter {
    fn format(&self, name: &str, source: &str) -> Result<String, GeneratorError> {
        let file = syn::parse_file(source)
            .map_err(|e| GeneratorError::CodeGenError(format!("{} is invalid: {}", name, e)))?;
        Ok(format_code(&file))
    }
}

/// Returns the emitted text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFormatter;

impl Formatter for IdentityFormatter {
    fn format(&self, _name: &str, source: &str) -> Result<String, GeneratorError> {
        Ok(source.to_string())
    }
}

/// Validates generated code using syn.
///
/// Parses the token stream as a complete Rust file to ensure it's syntactically
/// valid before it leaves the generator.
///
/// ## Errors
///
/// Returns `GeneratorError::CodeGenError` if the code fails to parse.
pub fn validate_code(tokens: &TokenStream) -> Result<syn::File, GeneratorError> {
    syn::parse2(tokens.clone())
        .map_err(|e| GeneratorError::CodeGenError(format!("Generated code is invalid: {}", e)))
}

/// Validates tokens and returns their source text.
fn emit(tokens: &TokenStream) -> Result<String, GeneratorError> {
    validate_code(tokens)?;
    Ok(tokens.to_string())
}

/// Formats a parsed file with prettyplease, prepending [`GENERATED_NOTICE`].
pub fn format_code(file: &syn::File) -> String {
    let formatted = prettyplease::unparse(file);
    format!("{}\n\n{}", GENERATED_NOTICE, formatted)
}

/// Writes content to a file atomically using temp file + rename.
///
/// Readers see either the old or the new content, never a partial write.
///
/// ## Errors
///
/// Returns `GeneratorError::WriteError` if:
/// - Parent directories cannot be created
/// - The temp file cannot be written
/// - The rename operation fails
pub fn write_atomic(path: &Path, content: &str) -> Result<(), GeneratorError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| GeneratorError::WriteError {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);
    fs::write(temp_path, content).map_err(|e| GeneratorError::WriteError {
        path: temp_path.display().to_string(),
        source: e,
    })?;

    fs::rename(temp_path, path).map_err(|e| GeneratorError::WriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Generates every artifact of a model with the default [`RustFormatter`].
///
/// ## Errors
///
/// See [`generate_with`].
pub fn generate(model: &ApiModel, config: &Configuration) -> Result<Vec<Artifact>, GeneratorError> {
    generate_with(model, config, &RustFormatter)
}

/// Generates every artifact of a model, normalizing Rust text with `formatter`.
///
/// Artifacts are returned sorted by name. Nothing is returned when any step
/// fails.
///
/// ## Errors
///
/// Returns an error if:
/// - The configuration is invalid (checked before any planning)
/// - A schema or operation cannot be planned
/// - Two artifacts or modules map to the same name
/// - Generated code is invalid or cannot be formatted
#[instrument(skip_all, fields(model = %model.name))]
pub fn generate_with(
    model: &ApiModel,
    config: &Configuration,
    formatter: &dyn Formatter,
) -> Result<Vec<Artifact>, GeneratorError> {
    let policy = config.validate()?;
    let ctx = GenerationContext::new(model);

    plan_schemas(&ctx)?;
    let plans = plan_operations(&ctx)?;
    let buckets = group(&model.operations, policy, &config.namespace)?;
    info!(
        %policy,
        schemas = model.schemas.len(),
        operations = plans.len(),
        buckets = buckets.len(),
        "Planned model"
    );

    let xml_models = xml_models(&ctx, &plans)?;
    let header_models: Vec<_> = plans
        .iter()
        .filter_map(|plan| plan.response.header_model.clone())
        .collect();
    let model_files = generate_models(&ctx, &xml_models, &header_models)?;

    let by_name: HashMap<&str, &OperationPlan<'_>> = plans
        .iter()
        .map(|plan| (plan.operation.name.as_str(), plan))
        .collect();
    // Token streams are not `Send`; buckets are rendered to text in place.
    let bucket_sources = buckets
        .par_iter()
        .map(|bucket| {
            let bucket_plans = bucket
                .operations
                .iter()
                .filter_map(|operation| by_name.get(operation.name.as_str()).map(|plan| (*plan).clone()))
                .collect::<Vec<_>>();
            let tokens = render_bucket(&ctx, bucket, &bucket_plans, config.public_clients)?;
            Ok((bucket.path.clone(), emit(&tokens)?))
        })
        .collect::<Vec<Result<(String, String), GeneratorError>>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let mut sources: Vec<(String, String)> = vec![
        ("lib.rs".to_string(), emit(&render_lib(model, &buckets, config.public_clients)?)?),
        ("shared.rs".to_string(), emit(&generate_shared_module())?),
        ("models/mod.rs".to_string(), emit(&generate_models_mod(&model_files))?),
    ];
    for ModelFile { module, tokens, .. } in &model_files {
        sources.push((format!("models/{}.rs", module), emit(tokens)?));
    }
    sources.extend(bucket_sources);

    let mut names = sources.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>();
    if config.generate_metadata {
        names.push(METADATA_FILE.to_string());
    }
    check_collisions(&names)?;

    let mut artifacts = sources
        .par_iter()
        .map(|(name, source)| Ok(Artifact::new(name.clone(), formatter.format(name, source)?)))
        .collect::<Vec<Result<Artifact, GeneratorError>>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    if config.generate_metadata {
        artifacts.push(metadata(model, config, &names)?);
    }
    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    info!(artifacts = artifacts.len(), "Generated artifacts");
    Ok(artifacts)
}

/// Writes artifacts below `dir`, or prints them when `dry_run` is set.
///
/// ## Errors
///
/// Returns `GeneratorError::WriteError` if any artifact cannot be written.
pub fn write_artifacts(artifacts: &[Artifact], dir: &Path, dry_run: bool) -> Result<(), GeneratorError> {
    for artifact in artifacts {
        if dry_run {
            println!("=== {} ===\n{}\n", artifact.name, artifact.text);
        } else {
            write_atomic(&dir.join(&artifact.name), &artifact.text)?;
            debug!(artifact = %artifact.name, "Wrote artifact");
        }
    }
    Ok(())
}

/// Resolves every schema and plans every object as JSON.
fn plan_schemas(ctx: &GenerationContext<'_>) -> Result<(), GeneratorError> {
    let schemas: Vec<(&SchemaId, &SchemaType)> = ctx.model().schemas.iter().collect();
    schemas
        .par_iter()
        .map(|(id, schema)| {
            resolve(ctx, id)?;
            if matches!(schema, SchemaType::Object(_)) {
                plan(ctx, id, WireFormat::Json)?;
            }
            Ok(())
        })
        .collect::<Vec<Result<(), ModelError>>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    debug!(types = ctx.type_count(), plans = ctx.plan_count(), "Planned schemas");
    Ok(())
}

fn plan_operations<'m>(ctx: &GenerationContext<'m>) -> Result<Vec<OperationPlan<'m>>, GeneratorError> {
    let plans = ctx
        .model()
        .operations
        .par_iter()
        .map(|operation| {
            Ok(OperationPlan {
                operation,
                request: request::build(ctx, operation)?,
                response: response::plan(ctx, operation)?,
            })
        })
        .collect::<Vec<Result<OperationPlan<'m>, ModelError>>>()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(plans)
}

/// Returns the object schemas that need an `XmlModel` impl.
fn xml_models(
    ctx: &GenerationContext<'_>,
    plans: &[OperationPlan<'_>],
) -> Result<BTreeSet<SchemaId>, GeneratorError> {
    let mut roots = BTreeSet::new();
    for plan in plans {
        match plan.request.body() {
            Some(BodyStep::Schema {
                parameter,
                format: WireFormat::Xml,
                ..
            }) => {
                if let Some(schema) = plan.request.parameter(parameter).and_then(|p| element_schema(&p.target)) {
                    roots.insert(schema);
                }
            }
            Some(BodyStep::Flattened {
                schema,
                format: WireFormat::Xml,
                ..
            }) => {
                roots.insert(schema.clone());
            }
            _ => {}
        }
        let reads_xml = plan.response.branches.iter().any(|branch| {
            matches!(
                branch.action,
                DispatchAction::Deserialize {
                    format: WireFormat::Xml,
                    ..
                }
            )
        });
        if reads_xml
            && let Some(ResponseValue::Typed(target)) = &plan.response.value_type
            && let Some(schema) = element_schema(target)
        {
            roots.insert(schema);
        }
    }

    let mut models = BTreeSet::new();
    for root in roots {
        if matches!(ctx.model().schema(&root), Some(SchemaType::Object(_))) {
            models.extend(xml_closure(ctx, &root)?);
        }
    }
    models.retain(|id| matches!(ctx.model().schema(id), Some(SchemaType::Object(_))));
    debug!(models = models.len(), "Collected XML models");
    Ok(models)
}

/// Schema of a model, or of a collection's items.
fn element_schema(target: &TargetType) -> Option<SchemaId> {
    target.is_collection_of().unwrap_or(target).schema().cloned()
}

fn render_bucket(
    ctx: &GenerationContext<'_>,
    bucket: &OutputBucket<'_>,
    plans: &[OperationPlan<'_>],
    public: bool,
) -> Result<TokenStream, GeneratorError> {
    let docs = ModuleDocBuilder::new(ctx.model(), bucket, plans).build();
    let client = generate_client(ctx, bucket, plans, public)?;
    let handler = generate_handler(bucket, plans)?;
    Ok(quote! {
        #docs

        #client

        #handler
    })
}

/// Renders `lib.rs`; nested bucket files are declared with `#[path]`.
fn render_lib(
    model: &ApiModel,
    buckets: &[OutputBucket<'_>],
    public: bool,
) -> Result<TokenStream, GeneratorError> {
    let docs = library_docs(model, buckets);
    let mut modules: BTreeMap<String, String> = BTreeMap::new();
    let declarations = buckets
        .iter()
        .map(|bucket| {
            let module = bucket
                .path
                .rsplit('/')
                .next()
                .unwrap_or(&bucket.path)
                .trim_end_matches(".rs")
                .to_string();
            if let Some(first) = modules.insert(module.clone(), bucket.path.clone()) {
                return Err(ModelError::ArtifactCollision {
                    path: module,
                    first,
                    second: bucket.path.clone(),
                }
                .into());
            }
            let ident = format_ident!("{}", module);
            let client = format_ident!("{}", bucket.name);
            let path_attr = (!bucket.folder().is_empty()).then(|| {
                let path = &bucket.path;
                quote! { #[path = #path] }
            });
            let export = public.then(|| quote! { pub use #ident::#client; });
            Ok(quote! {
                #path_attr
                pub mod #ident;
                #export
            })
        })
        .collect::<Result<Vec<_>, GeneratorError>>()?;

    Ok(quote! {
        #docs

        pub mod models;
        pub mod shared;

        #(#declarations)*
    })
}

fn check_collisions(names: &[String]) -> Result<(), GeneratorError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ModelError::ArtifactCollision {
                path: name.clone(),
                first: name.clone(),
                second: name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn metadata(model: &ApiModel, config: &Configuration, names: &[String]) -> Result<Artifact, GeneratorError> {
    let mut artifacts: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| *name != METADATA_FILE)
        .collect();
    artifacts.sort_unstable();
    let document = serde_json::json!({
        "generator": "blueprint-gen",
        "version": env!("CARGO_PKG_VERSION"),
        "model": model.name,
        "library": config.library_name(),
        "namespace": config.namespace,
        "api-group-by": config.api_group_by,
        "public-clients": config.public_clients,
        "artifacts": artifacts,
    });
    let text = serde_json::to_string_pretty(&document)
        .map_err(|e| GeneratorError::CodeGenError(format!("metadata: {}", e)))?;
    Ok(Artifact::new(METADATA_FILE, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiGroupBy;
    use crate::errors::ConfigurationError;
    use crate::test_utils::vault_model;
    use tempfile::TempDir;

    fn config(policy: ApiGroupBy) -> Configuration {
        Configuration::new("generated/src", "vault", policy)
    }

    fn artifact<'a>(artifacts: &'a [Artifact], name: &str) -> &'a Artifact {
        artifacts
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("missing artifact {}", name))
    }

    // === generate tests ===

    #[test]
    fn generates_sorted_artifact_set() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for expected in [
            METADATA_FILE,
            "admin_api.rs",
            "backup_api.rs",
            "lib.rs",
            "models/mod.rs",
            "models/secret.rs",
            "models/secret_headers.rs",
            "secrets_api.rs",
            "shared.rs",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn rust_artifacts_are_valid_and_marked() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        for artifact in artifacts.iter().filter(|a| a.is_rust()) {
            assert!(artifact.text.starts_with(GENERATED_NOTICE), "{}", artifact.name);
            assert!(syn::parse_file(&artifact.text).is_ok(), "{}", artifact.name);
        }
    }

    #[test]
    fn bucket_file_holds_client_and_handler() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        let secrets = artifact(&artifacts, "secrets_api.rs");
        assert!(secrets.text.contains("pub(crate) struct SecretsApi"));
        assert!(secrets.text.contains("pub trait SecretsHandler"));
        assert!(secrets.text.contains("pub const ROUTES"));
    }

    #[test]
    fn lib_declares_modules() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        let lib = artifact(&artifacts, "lib.rs");
        assert!(lib.text.contains("pub mod models;"));
        assert!(lib.text.contains("pub mod shared;"));
        assert!(lib.text.contains("pub mod secrets_api;"));
        assert!(!lib.text.contains("pub use secrets_api::SecretsApi;"));
    }

    #[test]
    fn public_clients_are_reexported() {
        let config = config(ApiGroupBy::FirstPathSegment).with_public_clients(true);
        let artifacts = generate(&vault_model(), &config).unwrap();
        let lib = artifact(&artifacts, "lib.rs");
        assert!(lib.text.contains("pub use secrets_api::SecretsApi;"));
        assert!(artifact(&artifacts, "secrets_api.rs").text.contains("pub struct SecretsApi"));
    }

    #[test]
    fn nested_buckets_use_path_attributes() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::Operation)).unwrap();
        let lib = artifact(&artifacts, "lib.rs");
        assert!(lib.text.contains("#[path = \"admin/secrets/admin_create_secret_api.rs\"]"));
        assert!(artifacts.iter().any(|a| a.name == "admin/secrets/admin_create_secret_api.rs"));
    }

    #[test]
    fn metadata_can_be_disabled() {
        let config = config(ApiGroupBy::FirstPathSegment).with_metadata(false);
        let artifacts = generate(&vault_model(), &config).unwrap();
        assert!(artifacts.iter().all(|a| a.name != METADATA_FILE));
    }

    #[test]
    fn metadata_lists_other_artifacts() {
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        let metadata: serde_json::Value =
            serde_json::from_str(&artifact(&artifacts, METADATA_FILE).text).unwrap();
        assert_eq!(metadata["api-group-by"], "first-path-segment");
        let listed = metadata["artifacts"].as_array().unwrap();
        assert_eq!(listed.len(), artifacts.len() - 1);
    }

    #[test]
    fn unknown_policy_fails_before_planning() {
        let mut config = config(ApiGroupBy::FirstPathSegment);
        config.api_group_by = "by-color".to_string();
        let err = generate(&vault_model(), &config).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Config(ConfigurationError::UnknownGroupBy { .. })
        ));
    }

    #[test]
    fn identity_formatter_keeps_emitted_text() {
        let artifacts =
            generate_with(&vault_model(), &config(ApiGroupBy::FirstPathSegment), &IdentityFormatter).unwrap();
        let lib = artifact(&artifacts, "lib.rs");
        assert!(!lib.text.starts_with(GENERATED_NOTICE));
        assert!(syn::parse_file(&lib.text).is_ok());
    }

    #[test]
    fn duplicate_names_collide() {
        let names = vec!["a.rs".to_string(), "b.rs".to_string(), "a.rs".to_string()];
        let err = check_collisions(&names).unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Model(ModelError::ArtifactCollision { .. })
        ));
    }

    // === write tests ===

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models/secret.rs");
        write_atomic(&path, "pub struct Secret;").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "pub struct Secret;");
        assert!(!dir.path().join("models/secret.rs.tmp").exists());
    }

    #[test]
    fn write_artifacts_lands_every_file() {
        let dir = TempDir::new().unwrap();
        let artifacts = generate(&vault_model(), &config(ApiGroupBy::FirstPathSegment)).unwrap();
        write_artifacts(&artifacts, dir.path(), false).unwrap();
        for artifact in &artifacts {
            let written = fs::read_to_string(dir.path().join(&artifact.name)).unwrap();
            assert_eq!(written, artifact.text);
        }
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let artifacts = vec![Artifact::new("lib.rs", "pub mod models;")];
        write_artifacts(&artifacts, dir.path(), true).unwrap();
        assert!(!dir.path().join("lib.rs").exists());
    }
}
