//! Server-side handler traits for output buckets.
//!
//! Each bucket gets a `{Key}Handler` trait mirroring its client: one async
//! method per operation with the same arguments and return type. A `ROUTES`
//! table maps `(method, route template)` pairs onto the handler methods so a
//! host framework can wire them up.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::codegen::client::{OperationPlan, return_type, signature_tokens};
use crate::errors::GeneratorError;
use crate::grouping::OutputBucket;

/// Returns the handler trait name of a bucket, e.g. `SecretsHandler`.
pub fn handler_name(bucket: &OutputBucket<'_>) -> String {
    let stem = bucket.name.strip_suffix("Api").unwrap_or(&bucket.name);
    format!("{}Handler", stem)
}

/// Generates the handler trait and route table for a bucket.
///
/// ## Errors
///
/// Returns a [`GeneratorError`] if a parameter or return type cannot be
/// rendered.
pub fn generate_handler(
    bucket: &OutputBucket<'_>,
    plans: &[OperationPlan<'_>],
) -> Result<TokenStream, GeneratorError> {
    let name = format_ident!("{}", handler_name(bucket));
    let doc = format!(" Server-side implementation of the [`{}`] operations.", bucket.name);

    let methods = plans
        .iter()
        .map(|plan| {
            let method_name = plan.method_name();
            let signature = signature_tokens(&plan.request)?;
            let returns = return_type(&plan.response)?;
            let doc = format!(
                " Handles `{} /{}`.",
                plan.request.method,
                plan.request.route_template()
            );
            Ok(quote! {
                #[doc = #doc]
                async fn #method_name(&self, #(#signature),*) -> Result<#returns, crate::shared::ApiError>;
            })
        })
        .collect::<Result<Vec<_>, GeneratorError>>()?;

    let routes = plans.iter().map(|plan| {
        let method = plan.request.method.to_string();
        let route = plan.request.route_template();
        let handler = plan.method_name().to_string();
        quote! { (#method, #route, #handler) }
    });

    Ok(quote! {
        #[doc = #doc]
        #[allow(async_fn_in_trait)]
        pub trait #name {
            #(#methods)*
        }

        /// Routes served by the handler as `(method, route template, handler method)`.
        pub const ROUTES: &[(&str, &str, &str)] = &[
            #(#routes),*
        ];
    })
}
