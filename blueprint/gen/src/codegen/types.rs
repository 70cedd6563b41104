//! Type and text-conversion fragments shared by the emitters.
//!
//! Generated code never converts values generically: every conversion to
//! or from wire text is chosen here, at generation time, from the
//! [`ValueKind`] of the value. The fragments call into the generated
//! `shared` module for anything beyond `Display`/`FromStr`.

use blueprint_define::{PrimitiveFormat, PrimitiveKind, SchemaType};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::context::GenerationContext;
use crate::errors::GeneratorError;
use crate::naming::type_ident;
use crate::request::{BoundParameter, TextKind};
use crate::resolver::{TargetKind, TargetType};
use crate::serialization::ValueKind;

/// Returns the tokens of a target type, `Option`-wrapped when nullable.
///
/// Models and enums are referenced through `crate::models`.
///
/// ## Errors
///
/// Returns `GeneratorError::CodeGenError` if a framework type path does not
/// parse as a Rust type.
pub fn type_tokens(target: &TargetType) -> Result<TokenStream, GeneratorError> {
    let inner = base_type_tokens(target)?;
    if target.nullable {
        Ok(quote! { Option<#inner> })
    } else {
        Ok(inner)
    }
}

/// Returns the tokens of a target type without the nullable wrapper.
pub fn base_type_tokens(target: &TargetType) -> Result<TokenStream, GeneratorError> {
    let tokens = match &target.kind {
        TargetKind::Enum { .. } | TargetKind::Model { .. } => {
            let ident = format_ident!("{}", target.name);
            quote! { crate::models::#ident }
        }
        TargetKind::Collection(element) => {
            let element = base_type_tokens(element)?;
            quote! { Vec<#element> }
        }
        TargetKind::Dictionary(value) => {
            let value = base_type_tokens(value)?;
            quote! { std::collections::HashMap<String, #value> }
        }
        TargetKind::Primitive(_) | TargetKind::Framework => parse_type(&target.name)?,
    };
    Ok(tokens)
}

fn parse_type(path: &str) -> Result<TokenStream, GeneratorError> {
    let ty: syn::Type = syn::parse_str(path)
        .map_err(|e| GeneratorError::CodeGenError(format!("invalid type '{}': {}", path, e)))?;
    Ok(quote! { #ty })
}

/// Returns the signature type of a parameter.
///
/// Parameters that may be left unset (nullable or defaulted) are taken as
/// `Option`.
pub fn parameter_type(parameter: &BoundParameter) -> Result<TokenStream, GeneratorError> {
    let inner = base_type_tokens(&parameter.target)?;
    if parameter.nullable || parameter.default.is_some() {
        Ok(quote! { Option<#inner> })
    } else {
        Ok(inner)
    }
}

/// Renders `value` (an expression of type `&T`) as a `String`.
pub fn text_expr(kind: &ValueKind, value: TokenStream) -> TokenStream {
    match kind {
        ValueKind::Enum(_) | ValueKind::Any => quote! { #value.to_string() },
        ValueKind::Primitive { kind, format } => match (kind, format) {
            (PrimitiveKind::Bytes, Some(PrimitiveFormat::Base64Url)) => {
                quote! { crate::shared::encode_base64_url(#value) }
            }
            (PrimitiveKind::Bytes, _) => quote! { crate::shared::encode_base64(#value) },
            (PrimitiveKind::DateTime, Some(PrimitiveFormat::UnixTime)) => {
                quote! { #value.timestamp().to_string() }
            }
            (PrimitiveKind::DateTime, Some(PrimitiveFormat::Rfc1123)) => {
                quote! { crate::shared::format_rfc1123(#value) }
            }
            (PrimitiveKind::DateTime, _) => quote! { #value.to_rfc3339() },
            _ => quote! { #value.to_string() },
        },
    }
}

/// Parses `text` (an expression of type `&str`) into a
/// `Result<T, ApiError>`, naming `what` in errors.
pub fn parse_expr(kind: &ValueKind, text: TokenStream, what: &str) -> TokenStream {
    match kind {
        ValueKind::Primitive { kind, format } => match (kind, format) {
            (PrimitiveKind::Bytes, Some(PrimitiveFormat::Base64Url)) => {
                quote! { crate::shared::decode_base64_url(#text, #what) }
            }
            (PrimitiveKind::Bytes, _) => quote! { crate::shared::decode_base64(#text, #what) },
            (PrimitiveKind::DateTime, Some(PrimitiveFormat::UnixTime)) => {
                quote! { crate::shared::parse_unix_time(#text, #what) }
            }
            (PrimitiveKind::DateTime, Some(PrimitiveFormat::Rfc1123)) => {
                quote! { crate::shared::parse_rfc1123(#text, #what) }
            }
            _ => quote! { crate::shared::parse_text(#text, #what) },
        },
        _ => quote! { crate::shared::parse_text(#text, #what) },
    }
}

/// Renders every item of `value` (an expression of type `&T` or `&Vec<T>`)
/// as a `Vec<String>`.
pub fn texts_expr(kind: &TextKind, value: TokenStream) -> TokenStream {
    match kind {
        TextKind::Scalar(kind) => {
            let text = text_expr(kind, value);
            quote! { vec![#text] }
        }
        TextKind::List(kind) => {
            let text = text_expr(kind, quote! { item });
            quote! { #value.iter().map(|item| #text).collect::<Vec<String>>() }
        }
    }
}

/// Returns the `serde(with = ...)` module for primitives whose JSON form
/// differs from their `serde` default.
pub fn serde_with_module(target: &TargetType, format: Option<PrimitiveFormat>) -> Option<String> {
    let base = match (target.primitive()?, format) {
        (PrimitiveKind::Bytes, Some(PrimitiveFormat::Base64Url)) => "base64_url",
        (PrimitiveKind::Bytes, _) => "base64_bytes",
        (PrimitiveKind::DateTime, Some(PrimitiveFormat::UnixTime)) => "unix_time",
        (PrimitiveKind::DateTime, Some(PrimitiveFormat::Rfc1123)) => "rfc1123",
        _ => return None,
    };
    let module = if target.nullable {
        format!("crate::shared::serde_formats::{}::option", base)
    } else {
        format!("crate::shared::serde_formats::{}", base)
    };
    Some(module)
}

/// Returns a Rust expression for a declared default value.
///
/// Scalars become literals, enum defaults name their member and
/// collections are decoded from their JSON text.
///
/// ## Errors
///
/// Returns `GeneratorError::CodeGenError` when the value does not fit the
/// type, or the type has no literal form (models, URIs, framework types).
pub fn default_expr(
    ctx: &GenerationContext<'_>,
    target: &TargetType,
    value: &serde_json::Value,
) -> Result<TokenStream, GeneratorError> {
    let unsupported = || {
        GeneratorError::CodeGenError(format!(
            "default {} does not fit type {}",
            value,
            target.rust_type()
        ))
    };
    let tokens = match (&target.kind, value) {
        (TargetKind::Primitive(PrimitiveKind::Boolean), serde_json::Value::Bool(flag)) => {
            quote! { #flag }
        }
        (TargetKind::Primitive(PrimitiveKind::Int32), serde_json::Value::Number(number)) => {
            let n = number
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(unsupported)?;
            quote! { #n }
        }
        (TargetKind::Primitive(PrimitiveKind::Int64), serde_json::Value::Number(number)) => {
            let n = number.as_i64().ok_or_else(unsupported)?;
            quote! { #n }
        }
        (TargetKind::Primitive(PrimitiveKind::Float32), serde_json::Value::Number(number)) => {
            let n = number.as_f64().ok_or_else(unsupported)? as f32;
            quote! { #n }
        }
        (TargetKind::Primitive(PrimitiveKind::Float64), serde_json::Value::Number(number)) => {
            let n = number.as_f64().ok_or_else(unsupported)?;
            quote! { #n }
        }
        (
            TargetKind::Primitive(PrimitiveKind::String | PrimitiveKind::Duration),
            serde_json::Value::String(text),
        ) => quote! { String::from(#text) },
        (
            TargetKind::Primitive(
                PrimitiveKind::Date | PrimitiveKind::DateTime | PrimitiveKind::Uuid | PrimitiveKind::Any,
            )
            | TargetKind::Collection(_)
            | TargetKind::Dictionary(_),
            _,
        ) => {
            let text = value.to_string();
            quote! { serde_json::from_str(#text).unwrap_or_default() }
        }
        (TargetKind::Enum { schema, extensible }, _) => {
            let SchemaType::Enum(enum_schema) = ctx.schema(schema, &target.name)? else {
                return Err(unsupported());
            };
            let ty = format_ident!("{}", target.name);
            let raw = match value {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            if *extensible {
                if enum_schema.underlying.is_integer() {
                    let n: i64 = raw.parse().map_err(|_| unsupported())?;
                    quote! { crate::models::#ty(#n) }
                } else {
                    quote! { crate::models::#ty::from(#raw) }
                }
            } else {
                let member = enum_schema
                    .values
                    .iter()
                    .find(|member| member.raw_text() == raw)
                    .ok_or_else(unsupported)?;
                let variant = type_ident(&member.name);
                quote! { crate::models::#ty::#variant }
            }
        }
        _ => return Err(unsupported()),
    };
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_nullable;
    use crate::test_utils::vault_model;

    fn rendered(tokens: TokenStream) -> String {
        tokens.to_string().replace(' ', "")
    }

    #[test]
    fn models_are_referenced_through_models_module() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let list = resolve_nullable(&ctx, &"secret-array".into(), true).unwrap();
        assert_eq!(
            rendered(type_tokens(&list).unwrap()),
            "Option<Vec<crate::models::Secret>>"
        );
    }

    #[test]
    fn framework_paths_are_parsed() {
        let target = TargetType {
            name: "my::Blob<u8>".to_string(),
            nullable: false,
            kind: TargetKind::Framework,
            is_framework_type: true,
        };
        assert_eq!(rendered(type_tokens(&target).unwrap()), "my::Blob<u8>");

        let broken = TargetType {
            name: "not a type".to_string(),
            ..target
        };
        assert!(matches!(
            type_tokens(&broken),
            Err(GeneratorError::CodeGenError(_))
        ));
    }

    #[test]
    fn formats_select_text_conversions() {
        let unix = ValueKind::Primitive {
            kind: PrimitiveKind::DateTime,
            format: Some(PrimitiveFormat::UnixTime),
        };
        assert_eq!(
            rendered(text_expr(&unix, quote! { value })),
            "value.timestamp().to_string()"
        );
        let bytes = ValueKind::Primitive {
            kind: PrimitiveKind::Bytes,
            format: None,
        };
        assert!(rendered(parse_expr(&bytes, quote! { text }, "body")).contains("decode_base64"));
    }

    #[test]
    fn list_texts_map_each_item() {
        let kind = TextKind::List(ValueKind::Primitive {
            kind: PrimitiveKind::String,
            format: None,
        });
        assert_eq!(
            rendered(texts_expr(&kind, quote! { tags })),
            "tags.iter().map(|item|item.to_string()).collect::<Vec<String>>()"
        );
    }

    #[test]
    fn scalar_defaults_become_literals() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let flag = resolve_nullable(&ctx, &"boolean".into(), false).unwrap();
        assert_eq!(
            rendered(default_expr(&ctx, &flag, &serde_json::json!(true)).unwrap()),
            "true"
        );
        let text = resolve_nullable(&ctx, &"string".into(), false).unwrap();
        assert_eq!(
            rendered(default_expr(&ctx, &text, &serde_json::json!("a")).unwrap()),
            "String::from(\"a\")"
        );
    }

    #[test]
    fn enum_defaults_name_their_member() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let closed = resolve_nullable(&ctx, &"KeyType".into(), false).unwrap();
        assert_eq!(
            rendered(default_expr(&ctx, &closed, &serde_json::json!("EC")).unwrap()),
            "crate::models::KeyType::Ec"
        );
        assert!(default_expr(&ctx, &closed, &serde_json::json!("DSA")).is_err());

        let open = resolve_nullable(&ctx, &"RecoveryLevel".into(), false).unwrap();
        assert_eq!(
            rendered(default_expr(&ctx, &open, &serde_json::json!("Custom")).unwrap()),
            "crate::models::RecoveryLevel::from(\"Custom\")"
        );
    }

    #[test]
    fn model_defaults_are_rejected() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let secret = resolve_nullable(&ctx, &"Secret".into(), false).unwrap();
        assert!(matches!(
            default_expr(&ctx, &secret, &serde_json::json!({})),
            Err(GeneratorError::CodeGenError(_))
        ));
    }
}
