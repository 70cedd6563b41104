//! Identifier naming for generated code.
//!
//! Model names become `PascalCase` types, properties and parameters become
//! `snake_case` fields. Names that would collide with Rust keywords get a
//! trailing underscore and names starting with a digit get a letter prefix.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::Ident;
use quote::format_ident;

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

fn sanitize(name: String, prefix: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        return prefix.to_string();
    }
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("{prefix}{cleaned}");
    }
    if KEYWORDS.contains(&cleaned.as_str()) || cleaned == "Self" {
        return format!("{cleaned}_");
    }
    cleaned
}

/// Returns the `PascalCase` type name for a model, enum or bucket key.
///
/// ## Examples
///
/// ```
/// use blueprint_gen::naming::type_name;
///
/// assert_eq!(type_name("secret-bundle"), "SecretBundle");
/// assert_eq!(type_name("2fa"), "V2fa");
/// ```
pub fn type_name(name: &str) -> String {
    sanitize(name.to_upper_camel_case(), "V")
}

/// Returns the `snake_case` name for a field, parameter, function or module.
///
/// ## Examples
///
/// ```
/// use blueprint_gen::naming::field_name;
///
/// assert_eq!(field_name("If-Match"), "if_match");
/// assert_eq!(field_name("type"), "type_");
/// ```
pub fn field_name(name: &str) -> String {
    sanitize(name.to_snake_case(), "_")
}

/// Returns the client name of an output bucket.
///
/// An empty key yields the bare `Api` name.
pub fn bucket_name(key: &str) -> String {
    if key.is_empty() {
        "Api".to_string()
    } else {
        format!("{}Api", type_name(key))
    }
}

/// Returns the file name of an output bucket.
pub fn bucket_file_name(key: &str) -> String {
    if key.is_empty() {
        "api.rs".to_string()
    } else {
        format!("{}_api.rs", field_name(key))
    }
}

/// Returns a type identifier.
pub fn type_ident(name: &str) -> Ident {
    format_ident!("{}", type_name(name))
}

/// Returns a field or function identifier.
pub fn field_ident(name: &str) -> Ident {
    format_ident!("{}", field_name(name))
}
