//! Client generation for output buckets.
//!
//! Each bucket becomes a client struct holding a `reqwest::Client` and an
//! endpoint. Every operation gets two methods:
//!
//! - `create_{op}_request` replays the request plan steps and returns the
//!   assembled `RequestParts`;
//! - `{op}` sends the request and matches the status against the dispatch
//!   table, failing with `ApiError::UnhandledStatus` for anything undeclared.

use blueprint_define::{Operation, StatusCode, WireFormat};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use crate::codegen::models::{FieldMode, model_fields};
use crate::codegen::types::{parameter_type, texts_expr, type_tokens};
use crate::context::GenerationContext;
use crate::errors::GeneratorError;
use crate::grouping::OutputBucket;
use crate::naming::field_name;
use crate::request::{
    ArgumentSource, BodyStep, BoundParameter, PathPart, RequestPlan, RequestStep, StepValue,
    literal_texts,
};
use crate::response::{DispatchAction, ResponseDispatchTable, ResponseValue, ReturnKind};
use crate::serialization::SerializationNode;

/// Local names used inside generated methods.
const RESERVED: &[&str] = &[
    "uri", "headers", "body", "value", "texts", "request", "response", "status", "item",
];

/// The planned request and response of one operation.
#[derive(Debug, Clone)]
pub struct OperationPlan<'m> {
    pub operation: &'m Operation,
    pub request: RequestPlan,
    pub response: ResponseDispatchTable,
}

impl OperationPlan<'_> {
    /// Name of the generated operation method.
    pub fn method_name(&self) -> Ident {
        format_ident!("{}", field_name(&self.operation.name))
    }
}

/// Returns the identifier of a method argument.
///
/// Names clashing with locals of the generated methods get an `_arg` suffix.
pub fn argument_ident(name: &str) -> Ident {
    let base = field_name(name);
    if RESERVED.contains(&base.as_str()) {
        format_ident!("{}_arg", base)
    } else {
        format_ident!("{}", base)
    }
}

/// Returns the `name: Type` list of an operation's signature.
pub fn signature_tokens(plan: &RequestPlan) -> Result<Vec<TokenStream>, GeneratorError> {
    plan.signature
        .iter()
        .map(|parameter| {
            let ident = argument_ident(&parameter.name);
            let ty = parameter_type(parameter)?;
            Ok(quote! { #ident: #ty })
        })
        .collect()
}

/// Returns the type returned by an operation's method.
pub fn return_type(table: &ResponseDispatchTable) -> Result<TokenStream, GeneratorError> {
    let value = match &table.value_type {
        Some(ResponseValue::Typed(target)) => type_tokens(target)?,
        Some(ResponseValue::Stream) => quote! { Vec<u8> },
        None => quote! { () },
    };
    let value = if table.value_optional {
        quote! { Option<#value> }
    } else {
        value
    };
    let headers = table
        .header_model
        .as_ref()
        .map(|model| {
            let ident = format_ident!("{}", model.type_name);
            quote! { crate::models::#ident }
        })
        .unwrap_or_default();
    Ok(match table.return_kind {
        ReturnKind::Response => quote! { crate::shared::RawResponse },
        ReturnKind::Headers => headers,
        ReturnKind::Value => value,
        ReturnKind::HeadersAndValue => quote! { (#headers, #value) },
    })
}

/// Generates the client struct and its methods for a bucket.
///
/// ## Errors
///
/// Returns a [`GeneratorError`] if a parameter type cannot be rendered or a
/// constant does not fit its parameter.
pub fn generate_client(
    ctx: &GenerationContext<'_>,
    bucket: &OutputBucket<'_>,
    plans: &[OperationPlan<'_>],
    public: bool,
) -> Result<TokenStream, GeneratorError> {
    let name = format_ident!("{}", bucket.name);
    let visibility = if public {
        quote! { pub }
    } else {
        quote! { pub(crate) }
    };
    let doc = if bucket.key.is_empty() {
        " Client for operations without a group.".to_string()
    } else {
        format!(" Client for the `{}` operations.", bucket.key)
    };

    let methods = plans
        .iter()
        .map(|plan| generate_operation(ctx, plan))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quote! {
        #[doc = #doc]
        #[derive(Debug, Clone)]
        #visibility struct #name {
            client: reqwest::Client,
            endpoint: String,
        }

        impl #name {
            /// Creates a client for the given endpoint, e.g. `https://example.com`.
            pub fn new(endpoint: impl Into<String>) -> Self {
                Self::with_client(reqwest::Client::new(), endpoint)
            }

            /// Creates a client sharing an existing `reqwest::Client`.
            pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
                Self {
                    client,
                    endpoint: endpoint.into(),
                }
            }

            pub fn endpoint(&self) -> &str {
                &self.endpoint
            }

            #(#methods)*
        }
    })
}

fn generate_operation(ctx: &GenerationContext<'_>, plan: &OperationPlan<'_>) -> Result<TokenStream, GeneratorError> {
    let operation = plan.operation;
    let method_name = plan.method_name();
    let create_name = format_ident!("create_{}_request", method_name);
    let signature = signature_tokens(&plan.request)?;
    let arguments: Vec<Ident> = plan
        .request
        .signature
        .iter()
        .map(|p| argument_ident(&p.name))
        .collect();
    let steps = plan
        .request
        .steps
        .iter()
        .map(|step| generate_step(ctx, &plan.request, step))
        .collect::<Result<Vec<_>, _>>()?;
    let http_method = plan.request.method.to_string();
    let returns = return_type(&plan.response)?;
    let arms = generate_dispatch(&plan.response);
    let operation_name = &operation.name;

    let route = format!(" `{} /{}`", http_method, plan.request.route_template());
    let description = operation
        .description
        .as_ref()
        .map(|text| format!(" {}", text.trim()))
        .unwrap_or_else(|| format!(" Calls `{}`.", operation_name));
    let create_doc = format!(" Builds the `{}` request without sending it.", operation_name);

    let steps_of = |matches: fn(&RequestStep) -> bool| plan.request.steps.iter().any(matches);
    let uri_mut = steps_of(|step| !matches!(step, RequestStep::SetBody(_))).then(|| quote! { mut });
    let headers_mut = steps_of(|step| matches!(step, RequestStep::AddHeader { .. } | RequestStep::SetBody(_)))
        .then(|| quote! { mut });
    let body_mut = steps_of(|step| matches!(step, RequestStep::SetBody(_))).then(|| quote! { mut });

    Ok(quote! {
        #[doc = #create_doc]
        pub fn #create_name(&self, #(#signature),*) -> Result<crate::shared::RequestParts, crate::shared::ApiError> {
            let #uri_mut uri = crate::shared::UriBuilder::new(&self.endpoint);
            let #headers_mut headers: Vec<(String, String)> = Vec::new();
            let #body_mut body: Option<Vec<u8>> = None;
            #(#steps)*
            Ok(crate::shared::RequestParts {
                method: #http_method,
                uri: uri.finish(),
                headers,
                body,
            })
        }

        #[doc = #description]
        ///
        #[doc = #route]
        ///
        /// ## Errors
        ///
        /// Returns `ApiError::UnhandledStatus` for undeclared status codes and
        /// any transport or decoding error.
        pub async fn #method_name(&self, #(#signature),*) -> Result<#returns, crate::shared::ApiError> {
            let request = self.#create_name(#(#arguments),*)?;
            let response = crate::shared::send(&self.client, request).await?;
            match response.status {
                #(#arms)*
                status => Err(crate::shared::ApiError::UnhandledStatus {
                    operation: #operation_name,
                    status,
                    body: response.body,
                }),
            }
        }
    })
}

/// Returns an expression of type `Option<Vec<String>>` for a step value.
fn texts_tokens(plan: &RequestPlan, value: &StepValue) -> Result<TokenStream, GeneratorError> {
    let name = match &value.source {
        ArgumentSource::Constant(constant) => {
            let texts = literal_texts(constant, &value.kind)
                .map_err(|e| GeneratorError::CodeGenError(format!("{}: {}", plan.operation, e)))?;
            return Ok(quote! { Some(vec![#(#texts.to_string()),*]) });
        }
        ArgumentSource::Parameter(name) => name,
    };
    let parameter = bound(plan, name)?;
    let ident = argument_ident(name);
    let render = texts_expr(&value.kind, quote! { value });
    let tokens = match &parameter.default {
        Some(default) => {
            let defaults = literal_texts(default, &value.kind)
                .map_err(|e| GeneratorError::CodeGenError(format!("{}: {}", plan.operation, e)))?;
            quote! {
                Some(match #ident.as_ref() {
                    Some(value) => #render,
                    None => vec![#(#defaults.to_string()),*],
                })
            }
        }
        None if parameter.nullable => quote! { #ident.as_ref().map(|value| #render) },
        None => quote! {
            {
                let value = &#ident;
                Some(#render)
            }
        },
    };
    Ok(tokens)
}

fn bound<'p>(plan: &'p RequestPlan, name: &str) -> Result<&'p BoundParameter, GeneratorError> {
    plan.parameter(name).ok_or_else(|| {
        GeneratorError::CodeGenError(format!(
            "{} references parameter '{}' outside its signature",
            plan.operation, name
        ))
    })
}

fn delimiter_tokens(delimiter: Option<&str>) -> TokenStream {
    match delimiter {
        Some(delimiter) => quote! { Some(#delimiter) },
        None => quote! { None },
    }
}

fn generate_step(
    ctx: &GenerationContext<'_>,
    plan: &RequestPlan,
    step: &RequestStep,
) -> Result<TokenStream, GeneratorError> {
    let tokens = match step {
        RequestStep::ResetEndpoint { value } => {
            let texts = texts_tokens(plan, value)?;
            quote! {
                if let Some(texts) = #texts {
                    uri.reset(&texts.join(","))?;
                }
            }
        }
        RequestStep::AppendPath {
            part: PathPart::Constant(text),
            ..
        } => quote! { uri.append(#text); },
        RequestStep::AppendPath {
            part: PathPart::Value(value),
            escape,
        } => {
            let texts = texts_tokens(plan, value)?;
            quote! {
                if let Some(texts) = #texts {
                    uri.append_value(&texts.join(","), #escape);
                }
            }
        }
        RequestStep::AppendRaw { value } => {
            let texts = texts_tokens(plan, value)?;
            quote! {
                if let Some(texts) = #texts {
                    uri.append(&texts.join(","));
                }
            }
        }
        RequestStep::AppendNextLink { value } => {
            let texts = texts_tokens(plan, value)?;
            quote! {
                if let Some(texts) = #texts {
                    uri.next_link(&texts.join(","))?;
                }
            }
        }
        RequestStep::AppendQuery {
            name,
            value,
            style,
            escape,
        } => {
            let texts = texts_tokens(plan, value)?;
            let delimiter = delimiter_tokens(style.delimiter());
            quote! {
                if let Some(texts) = #texts {
                    uri.push_query(#name, texts, #delimiter, #escape);
                }
            }
        }
        RequestStep::AddHeader { name, value, style } => {
            let texts = texts_tokens(plan, value)?;
            let delimiter = style.delimiter().unwrap_or(",");
            quote! {
                if let Some(texts) = #texts {
                    headers.push((#name.to_string(), texts.join(#delimiter)));
                }
            }
        }
        RequestStep::SetBody(step) => generate_body(ctx, plan, step)?,
    };
    Ok(tokens)
}

fn encode_tokens(format: WireFormat, node: &SerializationNode) -> TokenStream {
    match (format, node) {
        (WireFormat::Xml, SerializationNode::XmlElement(element)) => {
            let root = &element.name;
            quote! { crate::shared::to_xml(&value, #root)? }
        }
        _ => quote! { crate::shared::to_json(&value)? },
    }
}

/// Binds `value` to a body argument, skipping the body when it is unset.
fn with_body_argument(plan: &RequestPlan, parameter: &str, body: TokenStream) -> Result<TokenStream, GeneratorError> {
    let bound = bound(plan, parameter)?;
    let ident = argument_ident(parameter);
    Ok(if bound.nullable || bound.default.is_some() {
        quote! {
            if let Some(value) = #ident {
                #body
            }
        }
    } else {
        quote! {
            {
                let value = #ident;
                #body
            }
        }
    })
}

fn generate_body(
    ctx: &GenerationContext<'_>,
    plan: &RequestPlan,
    step: &BodyStep,
) -> Result<TokenStream, GeneratorError> {
    let content_type = step.content_type();
    let set = |encoded: TokenStream| {
        quote! {
            headers.push(("Content-Type".to_string(), #content_type.to_string()));
            body = Some(#encoded);
        }
    };
    match step {
        BodyStep::Schema {
            parameter,
            format,
            plan: node,
            ..
        } => with_body_argument(plan, parameter, set(encode_tokens(*format, node))),
        BodyStep::Binary { parameter, .. } => {
            with_body_argument(plan, parameter, set(quote! { Vec::<u8>::from(value) }))
        }
        BodyStep::Text { parameter, .. } => {
            with_body_argument(plan, parameter, set(quote! { value.into_bytes() }))
        }
        BodyStep::Flattened {
            schema,
            initializers,
            format,
            plan: node,
            ..
        } => {
            let object = ctx.schema(schema, &plan.operation)?.as_object().ok_or_else(|| {
                GeneratorError::CodeGenError(format!("'{}' is not an object schema", schema))
            })?;
            let model = format_ident!("{}", crate::naming::type_name(&object.name));
            let mut inits = Vec::new();
            for field in model_fields(ctx, schema, None)? {
                let ident = &field.ident;
                let initializer = initializers.iter().find(|i| i.property == field.property.name);
                let value = match initializer {
                    Some(initializer) => {
                        let parameter = bound(plan, &initializer.parameter)?;
                        flattened_argument(&model, parameter, &field)?
                    }
                    None => match field.mode {
                        FieldMode::Optional => quote! { None },
                        FieldMode::Defaulted => {
                            let default_fn = field.default_fn();
                            quote! { crate::models::#model::#default_fn() }
                        }
                        FieldMode::Required => {
                            return Err(GeneratorError::CodeGenError(format!(
                                "{}: required property '{}' of '{}' is not initialized",
                                plan.operation, field.property.name, object.name
                            )));
                        }
                    },
                };
                inits.push(quote! { #ident: #value, });
            }
            let encoded = set(encode_tokens(*format, node));
            Ok(quote! {
                {
                    let value = crate::models::#model {
                        #(#inits)*
                    };
                    #encoded
                }
            })
        }
    }
}

/// Converts an argument to the type of the property it initializes.
fn flattened_argument(
    model: &Ident,
    parameter: &BoundParameter,
    field: &crate::codegen::models::ModelField<'_>,
) -> Result<TokenStream, GeneratorError> {
    let ident = argument_ident(&parameter.name);
    let argument_optional = parameter.nullable || parameter.default.is_some();
    let boxed = |value: TokenStream| {
        if field.boxed {
            quote! { Box::new(#value) }
        } else {
            value
        }
    };
    let tokens = match (argument_optional, field.target.nullable) {
        (false, false) => boxed(quote! { #ident }),
        (false, true) => {
            let value = boxed(quote! { #ident });
            quote! { Some(#value) }
        }
        (true, true) if field.boxed => quote! { #ident.map(Box::new) },
        (true, true) => quote! { #ident },
        (true, false) => match (&field.mode, &parameter.default) {
            (FieldMode::Defaulted, _) => {
                let default_fn = field.default_fn();
                quote! { #ident.unwrap_or_else(crate::models::#model::#default_fn) }
            }
            _ => {
                let name = &parameter.name;
                quote! {
                    #ident.ok_or_else(|| crate::shared::ApiError::Missing {
                        what: "parameter",
                        name: #name.to_string(),
                    })?
                }
            }
        },
    };
    Ok(tokens)
}

fn status_pattern(status: &StatusCode) -> TokenStream {
    match *status {
        StatusCode::Code(code) => quote! { #code },
        StatusCode::Range { from, to } => quote! { #from..=#to },
    }
}

/// Generates one match arm per dispatch branch, in declaration order.
fn generate_dispatch(table: &ResponseDispatchTable) -> Vec<TokenStream> {
    let headers = table.header_model.as_ref().map(|model| {
        let ident = format_ident!("{}", model.type_name);
        quote! { crate::models::#ident::from_response(&response)? }
    });
    table
        .branches
        .iter()
        .map(|branch| {
            let pattern = status_pattern(&branch.status);
            let value = match &branch.action {
                DispatchAction::NoContent => None,
                DispatchAction::Stream => Some(quote! { response.body }),
                DispatchAction::Deserialize {
                    format: WireFormat::Json,
                    ..
                } => Some(quote! { crate::shared::from_json(&response.body)? }),
                DispatchAction::Deserialize {
                    format: WireFormat::Xml,
                    ..
                } => Some(quote! { crate::shared::from_xml(&response.body)? }),
            };
            let value = match (value, table.value_optional) {
                (Some(value), true) => quote! { Some(#value) },
                (Some(value), false) => value,
                (None, true) => quote! { None },
                (None, false) => quote! { () },
            };
            let body = match (table.return_kind, &headers) {
                (ReturnKind::Response, _) => quote! { Ok(response) },
                (ReturnKind::Value, _) => quote! { Ok(#value) },
                (ReturnKind::Headers, Some(headers)) => quote! { Ok(#headers) },
                (ReturnKind::HeadersAndValue, Some(headers)) => quote! {
                    {
                        let headers = #headers;
                        Ok((headers, #value))
                    }
                },
                (_, None) => quote! { Ok(response) },
            };
            quote! { #pattern => #body, }
        })
        .collect()
}
