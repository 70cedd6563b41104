//! Error types for the blueprint generator.
//!
//! Generation-time failures are fatal for the run and surface as a single
//! [`GeneratorError`]. The remaining types ([`ValueError`], [`RequestError`],
//! [`UnhandledStatusCode`], [`ResponseError`]) are raised when a plan is
//! executed against concrete values.

use thiserror::Error;

/// Errors that can occur during code generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Invalid or incomplete configuration
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    /// The API model cannot be generated
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Failed to parse an API model or configuration document
    #[error("Failed to parse API model: {0}")]
    ParseError(String),

    /// Failed to generate code
    #[error("Code generation failed: {0}")]
    CodeGenError(String),

    /// Failed to read an input file
    #[error("Failed to read input file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("Failed to write output file '{path}': {source}")]
    WriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration problems, detected before any planning begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The grouping policy is not one of the supported values.
    #[error(
        "Unknown api-group-by value '{value}'. Expected one of: operation, operation-flat, operation-group, first-path-segment, last-path-segment"
    )]
    UnknownGroupBy { value: String },

    /// A required option was not supplied.
    #[error("Missing required option '{name}'")]
    MissingOption { name: &'static str },

    /// An option was supplied with an unusable value.
    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

/// Problems in the API model that make generation impossible.
///
/// Each variant names the schema or operation at fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Two variants of one polymorphic hierarchy share a discriminator value.
    #[error(
        "Duplicate discriminator value '{value}' in hierarchy '{base}': used by both '{first}' and '{second}'"
    )]
    DuplicateDiscriminator {
        base: String,
        value: String,
        first: String,
        second: String,
    },

    /// A route segment, body or initializer names an undeclared parameter.
    #[error("Operation '{operation}' references undeclared parameter '{parameter}'")]
    MissingParameter { operation: String, parameter: String },

    /// A schema id is referenced but not defined.
    #[error("Schema '{schema}' referenced by '{referenced_by}' is not defined")]
    UnknownSchema {
        schema: String,
        referenced_by: String,
    },

    /// The request body cannot be built from the declared parameters.
    #[error("Unsupported request body for operation '{operation}': {reason}")]
    UnsupportedBody { operation: String, reason: String },

    /// The schema cannot be carried in the requested wire format.
    #[error("Unsupported serialization of schema '{schema}': {reason}")]
    UnsupportedSerialization { schema: String, reason: String },

    /// A parameter or header schema cannot be carried as text.
    #[error("Unsupported parameter '{parameter}' on operation '{operation}': {reason}")]
    UnsupportedParameter {
        operation: String,
        parameter: String,
        reason: String,
    },

    /// Responses of one operation disagree on the value or header model type.
    #[error("Conflicting responses for operation '{operation}': {reason}")]
    ConflictingResponses { operation: String, reason: String },

    /// Two generated artifacts resolve to the same output path.
    #[error("Output path collision at '{path}' between '{first}' and '{second}'")]
    ArtifactCollision {
        path: String,
        first: String,
        second: String,
    },
}

/// A value does not fit the plan it is written or read with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Missing required property '{property}' of '{type_name}'")]
    MissingProperty { type_name: String, property: String },

    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("'{value}' is not a member of enum '{enum_name}'")]
    UnknownEnumValue { enum_name: String, value: String },

    #[error("Invalid base64 content: {0}")]
    InvalidBytes(String),

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid XML: {0}")]
    Xml(String),

    /// The plan references a model that could not be planned.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failures evaluating a request plan against call arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Operation '{operation}' requires argument '{parameter}'")]
    MissingArgument { operation: String, parameter: String },

    #[error("Invalid URI '{value}': {reason}")]
    InvalidUri { value: String, reason: String },

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// A response status that no dispatch branch covers.
///
/// This is the designed runtime fallback of every dispatch table: the
/// caller receives this error instead of an undefined value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Operation '{operation}' returned unexpected status {status}")]
pub struct UnhandledStatusCode {
    pub operation: String,
    pub status: u16,
}

/// Failures handling a response through a dispatch table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Unhandled(#[from] UnhandledStatusCode),

    #[error("Failed to read response body of '{operation}': {source}")]
    Body {
        operation: String,
        #[source]
        source: ValueError,
    },

    #[error("Failed to read response header '{header}' of '{operation}': {source}")]
    Header {
        operation: String,
        header: String,
        #[source]
        source: ValueError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_passes_through_generator_error() {
        let err: GeneratorError = ConfigurationError::UnknownGroupBy {
            value: "by-tag".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Unknown api-group-by value 'by-tag'"));
    }

    #[test]
    fn model_error_names_offending_entry() {
        let err = ModelError::DuplicateDiscriminator {
            base: "Pet".to_string(),
            value: "cat".to_string(),
            first: "Cat".to_string(),
            second: "Kitten".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Pet"));
        assert!(message.contains("Kitten"));
    }

    #[test]
    fn unhandled_status_names_operation_and_status() {
        let err = UnhandledStatusCode {
            operation: "getSecret".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'getSecret' returned unexpected status 404"
        );
    }
}
