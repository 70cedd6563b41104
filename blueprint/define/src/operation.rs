//! Operation definitions: routes, parameters and request bodies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::response::ResponseDecl;
use crate::schema::{SchemaId, WireFormat};

/// HTTP methods an operation may use.
///
/// ## Examples
///
/// ```
/// use std::str::FromStr;
/// use blueprint_define::HttpMethod;
///
/// assert_eq!(HttpMethod::from_str("PATCH").unwrap(), HttpMethod::Patch);
/// assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Head,
    Options,
}

/// One piece of an operation's route.
///
/// Constant segments carry literal route text (which may itself contain
/// slashes, e.g. `/admin/secrets/`). Parameter segments reference a declared
/// parameter by name; `raw` parameters are appended without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PathSegment {
    Constant {
        value: String,
    },
    Parameter {
        name: String,
        #[serde(default)]
        raw: bool,
    },
}

impl PathSegment {
    /// Creates a constant segment.
    pub fn constant(value: impl Into<String>) -> Self {
        Self::Constant {
            value: value.into(),
        }
    }

    /// Creates an escaped parameter segment.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            raw: false,
        }
    }

    /// Returns the literal text of a constant segment.
    pub fn as_constant(&self) -> Option<&str> {
        match self {
            Self::Constant { value } => Some(value),
            Self::Parameter { .. } => None,
        }
    }
}

/// Where a parameter is carried in the request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

/// How a multi-valued parameter is folded into a single string.
///
/// `None` leaves lists as repeated query entries.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SerializationStyle {
    #[default]
    #[serde(alias = "simple")]
    #[strum(to_string = "none", serialize = "simple")]
    None,
    Pipe,
    Tab,
    Space,
    Comma,
}

impl SerializationStyle {
    /// Returns the delimiter used to join list values, if any.
    ///
    /// ## Examples
    ///
    /// ```
    /// use blueprint_define::SerializationStyle;
    ///
    /// assert_eq!(SerializationStyle::Pipe.delimiter(), Some("|"));
    /// assert_eq!(SerializationStyle::None.delimiter(), None);
    /// ```
    pub fn delimiter(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Pipe => Some("|"),
            Self::Tab => Some("\t"),
            Self::Space => Some(" "),
            Self::Comma => Some(","),
        }
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: SchemaId,
    pub location: ParameterLocation,
    /// Wire name (query key, header name); defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_name: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Fixed value; constant parameters never appear in a call signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<serde_json::Value>,
    #[serde(default)]
    pub style: SerializationStyle,
    #[serde(default = "default_escape")]
    pub escape: bool,
    /// Pagination continuation link.
    #[serde(default)]
    pub next_link: bool,
}

fn default_escape() -> bool {
    true
}

impl Parameter {
    /// Creates a required parameter.
    pub fn required(
        name: impl Into<String>,
        schema: impl Into<SchemaId>,
        location: ParameterLocation,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema: schema.into(),
            location,
            serialized_name: None,
            required: true,
            default_value: None,
            constant: None,
            style: SerializationStyle::None,
            escape: true,
            next_link: false,
        }
    }

    /// Creates an optional parameter.
    pub fn optional(
        name: impl Into<String>,
        schema: impl Into<SchemaId>,
        location: ParameterLocation,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, schema, location)
        }
    }

    /// Sets the serialization style.
    pub fn with_style(mut self, style: SerializationStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the wire name.
    pub fn with_serialized_name(mut self, serialized_name: impl Into<String>) -> Self {
        self.serialized_name = Some(serialized_name.into());
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Makes this a constant parameter.
    pub fn with_constant(mut self, value: serde_json::Value) -> Self {
        self.constant = Some(value);
        self
    }

    /// Disables escaping.
    pub fn unescaped(mut self) -> Self {
        self.escape = false;
        self
    }

    /// Marks this parameter as the pagination continuation link.
    pub fn as_next_link(mut self) -> Self {
        self.next_link = true;
        self
    }

    /// Returns the wire name.
    pub fn wire_name(&self) -> &str {
        self.serialized_name.as_deref().unwrap_or(&self.name)
    }
}

/// Binds one property of a flattened body to the parameter supplying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedInitializer {
    pub property: String,
    pub parameter: String,
}

/// The body attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequestBody {
    /// A single parameter serialized through its schema.
    #[serde(rename_all = "kebab-case")]
    Schema {
        parameter: String,
        #[serde(default)]
        format: WireFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// Caller-supplied bytes.
    #[serde(rename_all = "kebab-case")]
    Binary {
        parameter: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// Caller-supplied text.
    #[serde(rename_all = "kebab-case")]
    Text {
        parameter: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
    /// A schema instance assembled from several parameters.
    #[serde(rename_all = "kebab-case")]
    Flattened {
        schema: SchemaId,
        initializers: Vec<FlattenedInitializer>,
        #[serde(default)]
        format: WireFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
}

impl RequestBody {
    /// Creates a JSON schema body.
    pub fn json(parameter: impl Into<String>) -> Self {
        Self::Schema {
            parameter: parameter.into(),
            format: WireFormat::Json,
            content_type: None,
        }
    }

    /// Creates an XML schema body.
    pub fn xml(parameter: impl Into<String>) -> Self {
        Self::Schema {
            parameter: parameter.into(),
            format: WireFormat::Xml,
            content_type: None,
        }
    }

    /// Returns the explicitly declared content type.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Schema { content_type, .. }
            | Self::Binary { content_type, .. }
            | Self::Text { content_type, .. }
            | Self::Flattened { content_type, .. } => content_type.as_deref(),
        }
    }
}

/// A single HTTP operation.
///
/// ## Examples
///
/// ```
/// use blueprint_define::{HttpMethod, Operation, Parameter, ParameterLocation, PathSegment};
///
/// let op = Operation::new("admin_createSecret", HttpMethod::Put)
///     .with_path(vec![PathSegment::constant("/admin/secrets/"), PathSegment::parameter("id")])
///     .with_parameter(Parameter::required("id", "string", ParameterLocation::Path));
///
/// assert_eq!(op.parameter("id").map(|p| p.location), Some(ParameterLocation::Path));
/// assert_eq!(op.constant_route(), Some("/admin/secrets/"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Operation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub method: HttpMethod,
    #[serde(default)]
    pub path: Vec<PathSegment>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(default)]
    pub responses: Vec<ResponseDecl>,
}

impl Operation {
    /// Creates an operation with no route, parameters or responses.
    pub fn new(name: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            name: name.into(),
            description: None,
            method,
            path: Vec::new(),
            parameters: Vec::new(),
            body: None,
            responses: Vec::new(),
        }
    }

    /// Sets the route segments.
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Adds a parameter.
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a response.
    pub fn with_response(mut self, response: ResponseDecl) -> Self {
        self.responses.push(response);
        self
    }

    /// Finds a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Returns the first constant route segment that is not blank.
    pub fn constant_route(&self) -> Option<&str> {
        self.path
            .iter()
            .filter_map(PathSegment::as_constant)
            .find(|value| !value.trim_matches('/').is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_style_is_an_alias_for_none() {
        let style: SerializationStyle = serde_json::from_str("\"simple\"").unwrap();
        assert_eq!(style, SerializationStyle::None);
        assert_eq!("simple".parse::<SerializationStyle>().unwrap(), SerializationStyle::None);
    }

    #[test]
    fn every_delimited_style_has_a_delimiter() {
        use strum::IntoEnumIterator;

        for style in SerializationStyle::iter().filter(|s| *s != SerializationStyle::None) {
            assert!(style.delimiter().is_some(), "{style} has no delimiter");
        }
    }

    #[test]
    fn parameter_defaults_to_escaped() {
        let param: Parameter = serde_json::from_str(
            r#"{"name": "tags", "schema": "tag-list", "location": "query", "style": "comma"}"#,
        )
        .unwrap();
        assert!(param.escape);
        assert!(!param.required);
        assert_eq!(param.style, SerializationStyle::Comma);
        assert_eq!(param.wire_name(), "tags");
    }

    #[test]
    fn wire_name_prefers_serialized_name() {
        let param = Parameter::required("ifMatch", "string", ParameterLocation::Header)
            .with_serialized_name("If-Match");
        assert_eq!(param.wire_name(), "If-Match");
    }

    #[test]
    fn request_body_is_tagged_by_kind() {
        let body: RequestBody = serde_json::from_str(
            r#"{"kind": "flattened", "schema": "Secret", "initializers": [{"property": "value", "parameter": "value"}], "content-type": "application/merge-patch+json"}"#,
        )
        .unwrap();
        assert_eq!(body.content_type(), Some("application/merge-patch+json"));
        let RequestBody::Flattened {
            format,
            initializers,
            ..
        } = body
        else {
            panic!("expected flattened body");
        };
        assert_eq!(format, WireFormat::Json);
        assert_eq!(initializers.len(), 1);
    }

    #[test]
    fn constant_route_skips_slash_only_segments() {
        let op = Operation::new("list", HttpMethod::Get).with_path(vec![
            PathSegment::Parameter {
                name: "endpoint".to_string(),
                raw: true,
            },
            PathSegment::constant("/"),
            PathSegment::constant("/items"),
        ]);
        assert_eq!(op.constant_route(), Some("/items"));
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
    }
}
