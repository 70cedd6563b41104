//! Declared responses of an operation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{SchemaId, WireFormat};

/// Error parsing a status code declaration such as `"204"` or `"4XX"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status code '{0}': expected a number (e.g. 200) or a class (e.g. 4XX)")]
pub struct StatusCodeError(pub String);

/// A declared status code or inclusive range of codes.
///
/// ## Examples
///
/// ```
/// use blueprint_define::StatusCode;
///
/// let class: StatusCode = "2XX".parse().unwrap();
/// assert_eq!(class, StatusCode::Range { from: 200, to: 299 });
/// assert!(class.contains(204));
/// assert!(!StatusCode::Code(200).contains(201));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCode {
    Code(u16),
    Range { from: u16, to: u16 },
}

impl StatusCode {
    /// Returns true when `status` falls within this declaration.
    pub fn contains(self, status: u16) -> bool {
        match self {
            Self::Code(code) => code == status,
            Self::Range { from, to } => (from..=to).contains(&status),
        }
    }
}

impl FromStr for StatusCode {
    type Err = StatusCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if let Ok(code) = text.parse::<u16>() {
            return Ok(Self::Code(code));
        }
        let mut chars = text.chars();
        match (chars.next(), chars.as_str()) {
            (Some(class @ '1'..='5'), rest) if rest.eq_ignore_ascii_case("xx") => {
                let base = class.to_digit(10).unwrap_or_default() as u16 * 100;
                Ok(Self::Range {
                    from: base,
                    to: base + 99,
                })
            }
            _ => Err(StatusCodeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Range { from, to } => write!(f, "{from}-{to}"),
        }
    }
}

/// The content a response carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResponseBodyDecl {
    #[default]
    None,
    /// A body deserialized through the schema.
    Typed {
        schema: SchemaId,
        #[serde(default)]
        format: WireFormat,
    },
    /// A body handed back as raw content.
    Stream,
}

/// One header field of a header model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    /// Field name in the generated model.
    pub name: String,
    /// Wire header name.
    pub header: String,
    pub schema: SchemaId,
}

/// Response headers extracted into a named model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderModel {
    pub name: String,
    pub headers: Vec<HeaderField>,
}

/// A declared response: the codes it covers, its body and its headers.
///
/// ## Examples
///
/// ```
/// use blueprint_define::{ResponseBodyDecl, ResponseDecl, StatusCode};
///
/// let ok = ResponseDecl::typed(200, "Secret");
/// assert_eq!(ok.status_codes, vec![StatusCode::Code(200)]);
/// assert!(matches!(ok.body, ResponseBodyDecl::Typed { .. }));
///
/// let deleted = ResponseDecl::empty(204);
/// assert_eq!(deleted.body, ResponseBodyDecl::None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResponseDecl {
    pub status_codes: Vec<StatusCode>,
    #[serde(default)]
    pub body: ResponseBodyDecl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderModel>,
}

impl ResponseDecl {
    /// A response with no content.
    pub fn empty(status: u16) -> Self {
        Self {
            status_codes: vec![StatusCode::Code(status)],
            body: ResponseBodyDecl::None,
            headers: None,
        }
    }

    /// A response with a JSON body.
    pub fn typed(status: u16, schema: impl Into<SchemaId>) -> Self {
        Self {
            status_codes: vec![StatusCode::Code(status)],
            body: ResponseBodyDecl::Typed {
                schema: schema.into(),
                format: WireFormat::Json,
            },
            headers: None,
        }
    }

    /// A response whose content is returned as a raw stream.
    pub fn stream(status: u16) -> Self {
        Self {
            status_codes: vec![StatusCode::Code(status)],
            body: ResponseBodyDecl::Stream,
            headers: None,
        }
    }

    /// Attaches a header model.
    pub fn with_headers(mut self, headers: HeaderModel) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Adds another status code to this response.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status_codes.push(status);
        self
    }
}
