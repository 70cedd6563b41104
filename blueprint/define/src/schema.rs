//! Schema definitions for modeled values.
//!
//! Every value that crosses the wire (a parameter, a request body, a response
//! body, a response header) is described by a [`SchemaType`] stored once in the
//! model's schema table and referenced everywhere else by its [`SchemaId`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identity of a schema in [`ApiModel::schemas`](crate::ApiModel::schemas).
///
/// Two references with equal ids denote the same schema, so every cache in
/// the generator is keyed by this value.
///
/// ## Examples
///
/// ```
/// use blueprint_define::SchemaId;
///
/// let id = SchemaId::from("Pet");
/// assert_eq!(id.as_str(), "Pet");
/// assert_eq!(id.to_string(), "Pet");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    /// Creates a schema id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SchemaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SchemaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Primitive kinds understood by the generator.
///
/// ## Examples
///
/// ```
/// use std::str::FromStr;
/// use blueprint_define::PrimitiveKind;
///
/// assert_eq!(PrimitiveKind::from_str("date-time").unwrap(), PrimitiveKind::DateTime);
/// assert_eq!(PrimitiveKind::Int64.to_string(), "int64");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PrimitiveKind {
    String,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Date,
    DateTime,
    /// ISO 8601 duration text.
    Duration,
    Uuid,
    Uri,
    /// Raw bytes; carried as base64 text inside JSON and XML.
    Bytes,
    /// Arbitrary JSON.
    Any,
}

impl PrimitiveKind {
    /// Returns true for kinds carried as whole numbers.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    /// Returns true for kinds carried as floating-point numbers.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Wire representation refinements for a primitive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PrimitiveFormat {
    Rfc3339,
    Rfc1123,
    /// Seconds since the epoch, written as an integer.
    UnixTime,
    Base64,
    Base64Url,
}

/// Wire format of a serialized body.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Xml,
}

/// A structural description of a data shape.
///
/// ## Examples
///
/// ```
/// use blueprint_define::{PrimitiveKind, SchemaType};
///
/// let json = r#"{"type": "array", "element": "Pet"}"#;
/// let schema: SchemaType = serde_json::from_str(json).unwrap();
/// assert!(matches!(schema, SchemaType::Array { .. }));
///
/// let string = SchemaType::primitive(PrimitiveKind::String);
/// assert!(string.as_object().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchemaType {
    Primitive {
        kind: PrimitiveKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<PrimitiveFormat>,
    },
    Enum(EnumSchema),
    Object(ObjectSchema),
    Array {
        element: SchemaId,
    },
    Dictionary {
        value: SchemaId,
    },
    /// An existing target-language type referenced by path.
    #[serde(rename_all = "kebab-case")]
    Framework {
        type_path: String,
    },
}

impl SchemaType {
    /// Creates a primitive schema without a format.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive { kind, format: None }
    }

    /// Creates a primitive schema with a wire format.
    pub fn formatted(kind: PrimitiveKind, format: PrimitiveFormat) -> Self {
        Self::Primitive {
            kind,
            format: Some(format),
        }
    }

    /// Creates an array schema.
    pub fn array(element: impl Into<SchemaId>) -> Self {
        Self::Array {
            element: element.into(),
        }
    }

    /// Creates a string-keyed dictionary schema.
    pub fn dictionary(value: impl Into<SchemaId>) -> Self {
        Self::Dictionary {
            value: value.into(),
        }
    }

    /// Returns the object schema, if this is one.
    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the primitive kind, if this is a primitive.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// A single declared enum member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    /// Member name used for the generated variant.
    pub name: String,
    /// Raw wire value.
    pub value: serde_json::Value,
}

impl EnumValue {
    /// Creates a string-valued member.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: serde_json::Value::String(value.into()),
        }
    }

    /// Returns the raw value as text (strings unquoted, numbers as written).
    pub fn raw_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// An enumeration of raw values.
///
/// Extensible (open) enums accept raw values outside the declared set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnumSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
    #[serde(default)]
    pub extensible: bool,
    #[serde(default = "default_underlying")]
    pub underlying: PrimitiveKind,
}

fn default_underlying() -> PrimitiveKind {
    PrimitiveKind::String
}

impl EnumSchema {
    /// Creates a closed string enum.
    pub fn closed(name: impl Into<String>, values: Vec<EnumValue>) -> Self {
        Self {
            name: name.into(),
            description: None,
            values,
            extensible: false,
            underlying: PrimitiveKind::String,
        }
    }

    /// Creates an open string enum.
    pub fn open(name: impl Into<String>, values: Vec<EnumValue>) -> Self {
        Self {
            extensible: true,
            ..Self::closed(name, values)
        }
    }
}

/// XML naming for an object schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlObjectInfo {
    /// Element name used when the object is a document root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// XML placement for a property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct XmlPropertyInfo {
    /// Element or attribute name; defaults to the serialized name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Written as an attribute of the parent element.
    #[serde(default)]
    pub attribute: bool,
    /// Arrays only: items nested inside a wrapper element.
    #[serde(default)]
    pub wrapped: bool,
    /// Written as the text content of the parent element.
    #[serde(default)]
    pub text: bool,
    /// Arrays only: element name of each item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// A property of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Property {
    pub name: String,
    pub serialized_name: String,
    pub schema: SchemaId,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<XmlPropertyInfo>,
}

impl Property {
    /// Creates a required property whose wire name equals its name.
    pub fn required(name: impl Into<String>, schema: impl Into<SchemaId>) -> Self {
        let name = name.into();
        Self {
            serialized_name: name.clone(),
            name,
            schema: schema.into(),
            required: true,
            nullable: false,
            default_value: None,
            read_only: false,
            description: None,
            xml: None,
        }
    }

    /// Creates an optional property whose wire name equals its name.
    pub fn optional(name: impl Into<String>, schema: impl Into<SchemaId>) -> Self {
        Self {
            required: false,
            ..Self::required(name, schema)
        }
    }

    /// Sets the wire name.
    pub fn with_serialized_name(mut self, serialized_name: impl Into<String>) -> Self {
        self.serialized_name = serialized_name.into();
        self
    }

    /// Sets the XML placement.
    pub fn with_xml(mut self, xml: XmlPropertyInfo) -> Self {
        self.xml = Some(xml);
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// An object schema, possibly part of a polymorphic hierarchy.
///
/// A hierarchy root declares `discriminator` (the wire name of the property
/// that selects the variant) and lists its direct `derived` schemas. Each
/// derived schema names its `base` and, usually, its `discriminator-value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<XmlObjectInfo>,
}

impl ObjectSchema {
    /// Creates an object schema with the given properties.
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
            ..Self::default()
        }
    }

    /// Returns true when this object roots or belongs to a polymorphic hierarchy.
    pub fn is_polymorphic(&self) -> bool {
        self.discriminator.is_some() || self.base.is_some() || !self.derived.is_empty()
    }

    /// Finds a declared property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}
