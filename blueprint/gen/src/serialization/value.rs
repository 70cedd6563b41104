//! Dynamic values executed against serialization and request plans.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use blueprint_define::{PrimitiveFormat, PrimitiveKind};

use crate::errors::ValueError;
use crate::serialization::plan::{EnumKind, ValueKind};

/// A runtime value shaped like a schema.
///
/// Objects are [`Value::Record`]s keyed by property name (not wire name).
/// A value read through a polymorphic plan is a [`Value::Variant`] carrying
/// the discriminator value it was read with.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(BTreeMap<String, Value>),
    Variant {
        discriminator: String,
        value: Box<Value>,
    },
    Json(serde_json::Value),
}

impl Value {
    /// Builds a record from `(property, value)` pairs.
    ///
    /// ## Examples
    ///
    /// ```
    /// use blueprint_gen::serialization::Value;
    ///
    /// let secret = Value::record([("value", Value::from("s3cr3t"))]);
    /// assert_eq!(secret.field("value"), Some(&Value::from("s3cr3t")));
    /// ```
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a string-keyed map.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a list.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Wraps a record as a polymorphic variant.
    pub fn variant(discriminator: impl Into<String>, value: Value) -> Self {
        Self::Variant {
            discriminator: discriminator.into(),
            value: Box::new(value),
        }
    }

    /// Returns a field of a record (or of the record inside a variant).
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.get(name),
            Self::Variant { value, .. } => value.field(name),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short label used in mismatch diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a float",
            Self::String(_) => "a string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "a list",
            Self::Map(_) => "a map",
            Self::Record(_) => "a record",
            Self::Variant { .. } => "a variant",
            Self::Json(_) => "raw JSON",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

pub(crate) fn mismatch(expected: impl Into<String>, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected: expected.into(),
        found: found.label().to_string(),
    }
}

pub(crate) fn encode_bytes(bytes: &[u8], format: Option<PrimitiveFormat>) -> String {
    match format {
        Some(PrimitiveFormat::Base64Url) => URL_SAFE_NO_PAD.encode(bytes),
        _ => STANDARD.encode(bytes),
    }
}

pub(crate) fn decode_bytes(text: &str, format: Option<PrimitiveFormat>) -> Result<Vec<u8>, ValueError> {
    let decoded = match format {
        Some(PrimitiveFormat::Base64Url) => URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')),
        _ => STANDARD.decode(text),
    };
    decoded.map_err(|e| ValueError::InvalidBytes(e.to_string()))
}

/// Returns true when the primitive is carried as an integer on the wire.
pub(crate) fn is_integer_carried(kind: PrimitiveKind, format: Option<PrimitiveFormat>) -> bool {
    kind.is_integer() || (kind == PrimitiveKind::DateTime && format == Some(PrimitiveFormat::UnixTime))
}

pub(crate) fn check_enum(kind: &EnumKind, raw: &str) -> Result<(), ValueError> {
    if kind.extensible || kind.values.iter().any(|v| v == raw) {
        Ok(())
    } else {
        Err(ValueError::UnknownEnumValue {
            enum_name: kind.name.clone(),
            value: raw.to_string(),
        })
    }
}

fn check_int32(kind: PrimitiveKind, value: i64) -> Result<i64, ValueError> {
    if kind == PrimitiveKind::Int32 && i32::try_from(value).is_err() {
        return Err(ValueError::TypeMismatch {
            expected: "a 32-bit integer".to_string(),
            found: value.to_string(),
        });
    }
    Ok(value)
}

/// Renders a scalar as text (query, path, header, XML attribute or element).
///
/// ## Errors
///
/// Returns a [`ValueError`] when the value does not match the kind, or when
/// a closed enum receives an undeclared value.
pub fn scalar_to_text(value: &Value, kind: &ValueKind) -> Result<String, ValueError> {
    match kind {
        ValueKind::Enum(enum_kind) => {
            let raw = match value {
                Value::String(text) => text.clone(),
                Value::Int(number) => number.to_string(),
                other => return Err(mismatch(format!("a member of {}", enum_kind.name), other)),
            };
            check_enum(enum_kind, &raw)?;
            Ok(raw)
        }
        ValueKind::Any => match value {
            Value::Json(json) => Ok(json.to_string()),
            Value::String(text) => Ok(text.clone()),
            other => Err(mismatch("raw JSON", other)),
        },
        ValueKind::Primitive { kind, format } => match (kind, value) {
            (PrimitiveKind::Boolean, Value::Bool(flag)) => Ok(flag.to_string()),
            (PrimitiveKind::Bytes, Value::Bytes(bytes)) => Ok(encode_bytes(bytes, *format)),
            (_, Value::Int(number)) if is_integer_carried(*kind, *format) => Ok(number.to_string()),
            (PrimitiveKind::Float32 | PrimitiveKind::Float64, Value::Float(number)) => {
                Ok(number.to_string())
            }
            (PrimitiveKind::Float32 | PrimitiveKind::Float64, Value::Int(number)) => {
                Ok(number.to_string())
            }
            (
                PrimitiveKind::String
                | PrimitiveKind::Date
                | PrimitiveKind::DateTime
                | PrimitiveKind::Duration
                | PrimitiveKind::Uuid
                | PrimitiveKind::Uri,
                Value::String(text),
            ) => Ok(text.clone()),
            (PrimitiveKind::Any, Value::Json(json)) => Ok(json.to_string()),
            (kind, other) => Err(mismatch(kind.to_string(), other)),
        },
    }
}

/// Parses text (header, XML attribute or element) into a scalar.
///
/// ## Errors
///
/// Returns a [`ValueError`] when the text cannot be parsed as the kind.
pub fn scalar_from_text(text: &str, kind: &ValueKind) -> Result<Value, ValueError> {
    let invalid = |expected: &str| ValueError::TypeMismatch {
        expected: expected.to_string(),
        found: format!("'{}'", text),
    };
    match kind {
        ValueKind::Enum(enum_kind) => {
            check_enum(enum_kind, text)?;
            if enum_kind.underlying.is_integer() {
                text.trim().parse::<i64>().map(Value::Int).map_err(|_| invalid("an integer"))
            } else {
                Ok(Value::String(text.to_string()))
            }
        }
        ValueKind::Any => serde_json::from_str(text)
            .map(Value::Json)
            .map_err(|e| ValueError::Json(e.to_string())),
        ValueKind::Primitive { kind, format } => match kind {
            PrimitiveKind::Boolean => match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid("a boolean")),
            },
            _ if is_integer_carried(*kind, *format) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid("an integer"))
                .and_then(|n| check_int32(*kind, n))
                .map(Value::Int),
            PrimitiveKind::Float32 | PrimitiveKind::Float64 => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid("a float")),
            PrimitiveKind::Bytes => decode_bytes(text.trim(), *format).map(Value::Bytes),
            PrimitiveKind::Any => serde_json::from_str(text)
                .map(Value::Json)
                .map_err(|e| ValueError::Json(e.to_string())),
            _ => Ok(Value::String(text.to_string())),
        },
    }
}

/// Writes a scalar as a JSON value.
///
/// ## Errors
///
/// See [`scalar_to_text`].
pub fn scalar_to_json(value: &Value, kind: &ValueKind) -> Result<serde_json::Value, ValueError> {
    match kind {
        ValueKind::Any => match value {
            Value::Json(json) => Ok(json.clone()),
            other => Err(mismatch("raw JSON", other)),
        },
        ValueKind::Enum(enum_kind) => {
            let raw = scalar_to_text(value, kind)?;
            if enum_kind.underlying.is_integer() {
                raw.parse::<i64>()
                    .map(serde_json::Value::from)
                    .map_err(|_| mismatch("an integer enum value", value))
            } else {
                Ok(serde_json::Value::String(raw))
            }
        }
        ValueKind::Primitive { kind: prim, format } => match (prim, value) {
            (PrimitiveKind::Boolean, Value::Bool(flag)) => Ok(serde_json::Value::Bool(*flag)),
            (_, Value::Int(number)) if is_integer_carried(*prim, *format) => {
                Ok(serde_json::Value::from(check_int32(*prim, *number)?))
            }
            (PrimitiveKind::Float32 | PrimitiveKind::Float64, Value::Float(number)) => {
                serde_json::Number::from_f64(*number)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| mismatch("a finite float", value))
            }
            (PrimitiveKind::Float32 | PrimitiveKind::Float64, Value::Int(number)) => {
                Ok(serde_json::Value::from(*number))
            }
            (PrimitiveKind::Any, Value::Json(json)) => Ok(json.clone()),
            _ => scalar_to_text(value, kind).map(serde_json::Value::String),
        },
    }
}

/// Reads a scalar from a JSON value.
///
/// ## Errors
///
/// Returns a [`ValueError`] when the JSON does not match the kind.
pub fn scalar_from_json(json: &serde_json::Value, kind: &ValueKind) -> Result<Value, ValueError> {
    let found = || Value::Json(json.clone());
    match kind {
        ValueKind::Any => Ok(Value::Json(json.clone())),
        ValueKind::Enum(enum_kind) => {
            let raw = match json {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Number(number) => number.to_string(),
                _ => return Err(mismatch(format!("a member of {}", enum_kind.name), &found())),
            };
            scalar_from_text(&raw, kind)
        }
        ValueKind::Primitive { kind: prim, format } => match prim {
            PrimitiveKind::Boolean => json.as_bool().map(Value::Bool).ok_or_else(|| mismatch("a boolean", &found())),
            _ if is_integer_carried(*prim, *format) => json
                .as_i64()
                .ok_or_else(|| mismatch("an integer", &found()))
                .and_then(|n| check_int32(*prim, n))
                .map(Value::Int),
            PrimitiveKind::Float32 | PrimitiveKind::Float64 => json
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| mismatch("a float", &found())),
            PrimitiveKind::Any => Ok(Value::Json(json.clone())),
            _ => match json {
                serde_json::Value::String(text) => scalar_from_text(text, kind),
                _ => Err(mismatch(prim.to_string(), &found())),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(kind: PrimitiveKind) -> ValueKind {
        ValueKind::Primitive { kind, format: None }
    }

    fn color(extensible: bool) -> ValueKind {
        ValueKind::Enum(EnumKind {
            name: "Color".to_string(),
            values: vec!["red".to_string(), "green".to_string()],
            extensible,
            underlying: PrimitiveKind::String,
        })
    }

    #[test]
    fn closed_enum_rejects_undeclared_value() {
        let err = scalar_to_text(&Value::from("blue"), &color(false)).unwrap_err();
        assert_eq!(
            err,
            ValueError::UnknownEnumValue {
                enum_name: "Color".to_string(),
                value: "blue".to_string()
            }
        );
        assert!(scalar_from_json(&serde_json::json!("blue"), &color(false)).is_err());
    }

    #[test]
    fn open_enum_accepts_any_value() {
        assert_eq!(scalar_to_text(&Value::from("blue"), &color(true)).unwrap(), "blue");
        assert_eq!(
            scalar_from_json(&serde_json::json!("blue"), &color(true)).unwrap(),
            Value::from("blue")
        );
    }

    #[test]
    fn bytes_use_base64_variants() {
        let bytes = Value::Bytes(vec![0xfb, 0xff]);
        let standard = primitive(PrimitiveKind::Bytes);
        let url_safe = ValueKind::Primitive {
            kind: PrimitiveKind::Bytes,
            format: Some(PrimitiveFormat::Base64Url),
        };
        assert_eq!(scalar_to_text(&bytes, &standard).unwrap(), "+/8=");
        assert_eq!(scalar_to_text(&bytes, &url_safe).unwrap(), "-_8");
        assert_eq!(scalar_from_text("-_8", &url_safe).unwrap(), bytes);
    }

    #[test]
    fn int32_range_is_enforced() {
        let int32 = primitive(PrimitiveKind::Int32);
        assert!(scalar_from_json(&serde_json::json!(5_000_000_000i64), &int32).is_err());
        assert_eq!(
            scalar_from_json(&serde_json::json!(7), &int32).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn unix_time_is_carried_as_integer() {
        let unix = ValueKind::Primitive {
            kind: PrimitiveKind::DateTime,
            format: Some(PrimitiveFormat::UnixTime),
        };
        assert_eq!(
            scalar_to_json(&Value::Int(1_700_000_000), &unix).unwrap(),
            serde_json::json!(1_700_000_000)
        );
    }

    #[test]
    fn mismatched_value_reports_both_sides() {
        let err = scalar_to_text(&Value::Bool(true), &primitive(PrimitiveKind::Int32)).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: "int32".to_string(),
                found: "a boolean".to_string()
            }
        );
    }

    #[test]
    fn text_parsing_matches_kind() {
        assert_eq!(
            scalar_from_text("true", &primitive(PrimitiveKind::Boolean)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            scalar_from_text("1.5", &primitive(PrimitiveKind::Float64)).unwrap(),
            Value::Float(1.5)
        );
        assert!(scalar_from_text("yes", &primitive(PrimitiveKind::Boolean)).is_err());
    }
}
