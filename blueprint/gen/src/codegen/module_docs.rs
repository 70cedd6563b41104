//! Module documentation generation for generated crates.
//!
//! This module provides the [`ModuleDocBuilder`] struct for generating
//! module-level documentation for bucket modules, and [`library_docs`] for
//! the crate root. The documentation includes an introduction, the
//! operations grouped by HTTP method and a usage example.

use std::collections::BTreeMap;

use blueprint_define::{ApiModel, HttpMethod};
use proc_macro2::TokenStream;
use quote::quote;

use crate::codegen::client::{OperationPlan, argument_ident};
use crate::codegen::server::handler_name;
use crate::grouping::OutputBucket;

/// Builds module-level documentation for a generated bucket module.
///
/// The builder generates documentation sections including:
/// - Introduction paragraph with the bucket key and model description
/// - Operations section listing operations grouped by HTTP method
/// - Example section calling the first `GET` operation
///
/// ## Examples
///
/// ```ignore
/// use blueprint_gen::codegen::ModuleDocBuilder;
///
/// let docs = ModuleDocBuilder::new(&model, &bucket, &plans).build();
/// ```
pub struct ModuleDocBuilder<'a> {
    model: &'a ApiModel,
    bucket: &'a OutputBucket<'a>,
    plans: &'a [OperationPlan<'a>],
}

impl<'a> ModuleDocBuilder<'a> {
    /// Creates a new module documentation builder for the given bucket.
    pub fn new(model: &'a ApiModel, bucket: &'a OutputBucket<'a>, plans: &'a [OperationPlan<'a>]) -> Self {
        Self { model, bucket, plans }
    }

    /// Builds the complete module documentation as `#![doc = "..."]` attributes.
    pub fn build(&self) -> TokenStream {
        let intro = self.intro_paragraph();
        let operations = self.operations_section();
        let example = self.example_section();

        quote! {
            #![doc = #intro]
            //!
            #![doc = #operations]
            //!
            #![doc = #example]
        }
    }

    fn intro_paragraph(&self) -> String {
        let subject = if self.bucket.key.is_empty() {
            format!(" Operations of {} without a group.", self.model.name)
        } else {
            format!(" The `{}` operations of {}.", self.bucket.key, self.model.name)
        };
        let handler = handler_name(self.bucket);
        let mut intro = format!(
            "{}\n\n Call them through [`{}`] or serve them by implementing [`{}`].",
            subject, self.bucket.name, handler
        );
        if let Some(description) = &self.model.description {
            intro.push_str(&format!("\n\n {}", description.trim()));
        }
        intro
    }

    /// Groups operations by HTTP method as `(method name, route)` pairs.
    fn categorize_operations(&self) -> BTreeMap<String, Vec<(String, String)>> {
        let mut categories: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for plan in self.plans {
            categories
                .entry(plan.request.method.to_string())
                .or_default()
                .push((plan.method_name().to_string(), plan.request.route_template()));
        }
        categories
    }

    fn operations_section(&self) -> String {
        let categories = self.categorize_operations();
        if categories.is_empty() {
            return " ## Operations\n\n No operations defined.".to_string();
        }

        let mut lines = vec![" ## Operations".to_string(), String::new()];
        for (method, operations) in &categories {
            lines.push(format!(" **{}**:", method));
            for (name, route) in operations {
                lines.push(format!(" - `{}` - `/{}`", name, route));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Uses the first `GET` operation, falling back to the first operation.
    fn example_section(&self) -> String {
        let plan = self
            .plans
            .iter()
            .find(|plan| plan.request.method == HttpMethod::Get)
            .or_else(|| self.plans.first());

        let Some(plan) = plan else {
            return " ## Example\n\n No operations available for example.".to_string();
        };

        let arguments = plan
            .request
            .signature
            .iter()
            .map(|parameter| argument_ident(&parameter.name).to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#" ## Example

 ```ignore
 use {}::{};

 #[tokio::main]
 async fn main() -> Result<(), crate::shared::ApiError> {{
     let client = {}::new("https://example.com");
     let response = client.{}({}).await?;
     println!("{{:?}}", response);
     Ok(())
 }}
 ```"#,
            self.bucket.namespace_hint,
            self.bucket.name,
            self.bucket.name,
            plan.method_name(),
            arguments
        )
    }
}

/// Builds the crate-level documentation of the generated `lib.rs`.
pub fn library_docs(model: &ApiModel, buckets: &[OutputBucket<'_>]) -> TokenStream {
    let mut intro = format!(" Generated client for {}.", model.name);
    if let Some(description) = &model.description {
        intro.push_str(&format!("\n\n {}", description.trim()));
    }

    let mut lines = vec![
        " ## Modules".to_string(),
        String::new(),
        " - `models` - Data types exchanged with the service".to_string(),
        " - `shared` - Error type, transport and encoding helpers".to_string(),
    ];
    for bucket in buckets {
        let module = bucket.path.trim_end_matches(".rs").replace('/', "::");
        lines.push(format!(
            " - `{}` - `{}` ({} operations)",
            module,
            bucket.name,
            bucket.operations.len()
        ));
    }
    let modules = lines.join("\n");

    quote! {
        #![doc = #intro]
        //!
        #![doc = #modules]
    }
}
