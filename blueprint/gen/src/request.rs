//! Request planning.
//!
//! [`build`] turns an operation into a [`RequestPlan`]: the call signature
//! plus an ordered list of [`RequestStep`]s (path, query, headers, body).
//! The plan is pure data. [`RequestPlan::evaluate`] replays it against call
//! arguments to produce an [`HttpRequest`], and the client emitter replays
//! the same steps as generated code.
//!
//! ## Encoding
//!
//! - Delimited styles join list values with `|`, tab, space or `,` before
//!   escaping; the query escape set leaves RFC 3986 unreserved characters and
//!   `,` intact, so `tags=["a","b","c"]` with the comma style becomes
//!   `tags=a,b,c`.
//! - Lists without a style become repeated query entries.
//! - Header values are joined but never URL-escaped.
//!
//! ## Null policy
//!
//! An unset nullable parameter contributes nothing. An unset parameter with
//! a default uses the default. An unset non-nullable parameter is
//! `RequestError::MissingArgument`.

use std::collections::BTreeMap;
use std::sync::Arc;

use blueprint_define::{
    FlattenedInitializer, HttpMethod, Operation, Parameter, ParameterLocation, PathSegment,
    PrimitiveKind, RequestBody, SchemaId, SchemaType, SerializationStyle, WireFormat,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, instrument};

use crate::context::GenerationContext;
use crate::errors::{ModelError, RequestError, ValueError};
use crate::resolver::{
    TargetType, hierarchy_root, inherited_properties, is_nullable_parameter, resolve_parameter,
};
use crate::serialization::value::scalar_from_json;
use crate::serialization::{SerializationNode, Value, ValueKind, json, plan, scalar_to_text, value_kind, xml};
use crate::transport::HttpRequest;

/// Characters escaped in query names and values.
pub const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b',');

/// Characters escaped in path segment values.
pub const PATH_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// A parameter as it appears in the generated call signature.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub wire_name: String,
    pub location: ParameterLocation,
    pub target: Arc<TargetType>,
    pub required: bool,
    /// True when an unset argument is skipped rather than rejected.
    pub nullable: bool,
    pub default: Option<serde_json::Value>,
    pub constant: Option<serde_json::Value>,
}

/// How a parameter value is rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub enum TextKind {
    Scalar(ValueKind),
    List(ValueKind),
}

/// Where a step takes its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSource {
    Parameter(String),
    Constant(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepValue {
    pub source: ArgumentSource,
    pub kind: TextKind,
}

/// One route piece of an `AppendPath` step.
#[derive(Debug, Clone, PartialEq)]
pub enum PathPart {
    Constant(String),
    Value(StepValue),
}

/// One step of request assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestStep {
    /// Replaces the endpoint with a `uri` argument.
    ResetEndpoint { value: StepValue },
    AppendPath { part: PathPart, escape: bool },
    AppendRaw { value: StepValue },
    /// Absolute links replace the URI; relative links are merged.
    AppendNextLink { value: StepValue },
    AppendQuery {
        name: String,
        value: StepValue,
        style: SerializationStyle,
        escape: bool,
    },
    AddHeader {
        name: String,
        value: StepValue,
        style: SerializationStyle,
    },
    SetBody(BodyStep),
}

/// The body attached by a `SetBody` step.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyStep {
    Schema {
        parameter: String,
        format: WireFormat,
        plan: Arc<SerializationNode>,
        content_type: String,
    },
    Binary {
        parameter: String,
        content_type: String,
    },
    Text {
        parameter: String,
        content_type: String,
    },
    Flattened {
        schema: SchemaId,
        initializers: Vec<FlattenedInitializer>,
        format: WireFormat,
        plan: Arc<SerializationNode>,
        content_type: String,
    },
}

impl BodyStep {
    pub fn content_type(&self) -> &str {
        match self {
            Self::Schema { content_type, .. }
            | Self::Binary { content_type, .. }
            | Self::Text { content_type, .. }
            | Self::Flattened { content_type, .. } => content_type,
        }
    }
}

/// The plan of one operation's request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub operation: String,
    pub method: HttpMethod,
    /// Non-constant parameters; those without defaults come first.
    pub signature: Vec<BoundParameter>,
    pub steps: Vec<RequestStep>,
}

/// Call arguments keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestArgs {
    values: BTreeMap<String, Value>,
}

impl RequestArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an argument.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Returns a set, non-null argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|value| !value.is_null())
    }
}

/// Builds the request plan of an operation.
///
/// ## Errors
///
/// Returns a [`ModelError`] if a route segment or body references an
/// undeclared parameter, a text-carried parameter has a structured schema,
/// or the body cannot be built.
#[instrument(skip(ctx, operation), fields(operation = %operation.name))]
pub fn build(ctx: &GenerationContext<'_>, operation: &Operation) -> Result<RequestPlan, ModelError> {
    let mut signature = Vec::new();
    for parameter in &operation.parameters {
        if parameter.constant.is_none() {
            signature.push(bind(ctx, operation, parameter)?);
        }
    }
    // Stable: declaration order is kept within each group.
    signature.sort_by_key(|p| p.default.is_some());

    let mut steps = Vec::new();
    for (index, segment) in operation.path.iter().enumerate() {
        match segment {
            PathSegment::Constant { value } => steps.push(RequestStep::AppendPath {
                part: PathPart::Constant(value.clone()),
                escape: false,
            }),
            PathSegment::Parameter { name, raw } => {
                let parameter = declared(operation, name)?;
                let value = step_value(ctx, operation, parameter)?;
                let is_uri = ctx.schema(&parameter.schema, &operation.name)?.primitive_kind()
                    == Some(PrimitiveKind::Uri);
                steps.push(if index == 0 && is_uri {
                    RequestStep::ResetEndpoint { value }
                } else if parameter.next_link {
                    RequestStep::AppendNextLink { value }
                } else if *raw {
                    RequestStep::AppendRaw { value }
                } else {
                    RequestStep::AppendPath {
                        part: PathPart::Value(value),
                        escape: parameter.escape,
                    }
                });
            }
        }
    }

    let query: Vec<&Parameter> = operation
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Query)
        .collect();
    for parameter in query.iter().filter(|p| p.next_link) {
        steps.push(RequestStep::AppendNextLink {
            value: step_value(ctx, operation, parameter)?,
        });
    }
    for parameter in query.iter().filter(|p| !p.next_link) {
        steps.push(RequestStep::AppendQuery {
            name: parameter.wire_name().to_string(),
            value: step_value(ctx, operation, parameter)?,
            style: parameter.style,
            escape: parameter.escape,
        });
    }
    for parameter in operation
        .parameters
        .iter()
        .filter(|p| p.location == ParameterLocation::Header)
    {
        steps.push(RequestStep::AddHeader {
            name: parameter.wire_name().to_string(),
            value: step_value(ctx, operation, parameter)?,
            style: parameter.style,
        });
    }
    if let Some(body) = &operation.body {
        steps.push(RequestStep::SetBody(body_step(ctx, operation, body)?));
    }

    debug!(steps = steps.len(), parameters = signature.len(), "Built request plan");
    Ok(RequestPlan {
        operation: operation.name.clone(),
        method: operation.method,
        signature,
        steps,
    })
}

fn declared<'o>(operation: &'o Operation, name: &str) -> Result<&'o Parameter, ModelError> {
    operation
        .parameter(name)
        .ok_or_else(|| ModelError::MissingParameter {
            operation: operation.name.clone(),
            parameter: name.to_string(),
        })
}

fn bind(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
    parameter: &Parameter,
) -> Result<BoundParameter, ModelError> {
    Ok(BoundParameter {
        name: parameter.name.clone(),
        wire_name: parameter.wire_name().to_string(),
        location: parameter.location,
        target: resolve_parameter(ctx, &operation.name, parameter)?,
        required: parameter.required,
        nullable: is_nullable_parameter(parameter),
        default: parameter.default_value.clone(),
        constant: parameter.constant.clone(),
    })
}

fn text_kind(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
    parameter: &Parameter,
) -> Result<TextKind, ModelError> {
    let referenced_by = format!("{}({})", operation.name, parameter.name);
    if let Some(kind) = value_kind(ctx, &parameter.schema, &referenced_by)? {
        return Ok(TextKind::Scalar(kind));
    }
    if let SchemaType::Array { element } = ctx.schema(&parameter.schema, &referenced_by)? {
        if let Some(kind) = value_kind(ctx, element, &referenced_by)? {
            return Ok(TextKind::List(kind));
        }
    }
    Err(ModelError::UnsupportedParameter {
        operation: operation.name.clone(),
        parameter: parameter.name.clone(),
        reason: format!(
            "a {} parameter must be a scalar or a list of scalars",
            parameter.location
        ),
    })
}

fn step_value(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
    parameter: &Parameter,
) -> Result<StepValue, ModelError> {
    let source = match &parameter.constant {
        Some(constant) => ArgumentSource::Constant(constant.clone()),
        None => ArgumentSource::Parameter(parameter.name.clone()),
    };
    Ok(StepValue {
        source,
        kind: text_kind(ctx, operation, parameter)?,
    })
}

fn unsupported_body(operation: &Operation, reason: impl Into<String>) -> ModelError {
    ModelError::UnsupportedBody {
        operation: operation.name.clone(),
        reason: reason.into(),
    }
}

fn body_step(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
    body: &RequestBody,
) -> Result<BodyStep, ModelError> {
    let declared_type = body.content_type().map(str::to_string);
    let step = match body {
        RequestBody::Schema {
            parameter, format, ..
        } => {
            let parameter = declared(operation, parameter)?;
            BodyStep::Schema {
                parameter: parameter.name.clone(),
                format: *format,
                plan: plan(ctx, &parameter.schema, *format)?,
                content_type: declared_type.unwrap_or_else(|| default_content_type(*format).to_string()),
            }
        }
        RequestBody::Binary { parameter, .. } => {
            let parameter = declared(operation, parameter)?;
            match ctx.schema(&parameter.schema, &operation.name)? {
                SchemaType::Primitive {
                    kind: PrimitiveKind::Bytes,
                    ..
                }
                | SchemaType::Framework { .. } => {}
                _ => {
                    return Err(unsupported_body(
                        operation,
                        format!("binary body '{}' must have a bytes schema", parameter.name),
                    ));
                }
            }
            BodyStep::Binary {
                parameter: parameter.name.clone(),
                content_type: declared_type.unwrap_or_else(|| BINARY_CONTENT_TYPE.to_string()),
            }
        }
        RequestBody::Text { parameter, .. } => {
            let parameter = declared(operation, parameter)?;
            if ctx.schema(&parameter.schema, &operation.name)?.primitive_kind()
                != Some(PrimitiveKind::String)
            {
                return Err(unsupported_body(
                    operation,
                    format!("text body '{}' must have a string schema", parameter.name),
                ));
            }
            BodyStep::Text {
                parameter: parameter.name.clone(),
                content_type: declared_type.unwrap_or_else(|| TEXT_CONTENT_TYPE.to_string()),
            }
        }
        RequestBody::Flattened {
            schema,
            initializers,
            format,
            ..
        } => {
            let object = ctx
                .schema(schema, &operation.name)?
                .as_object()
                .ok_or_else(|| unsupported_body(operation, format!("'{}' is not an object schema", schema)))?;
            if hierarchy_root(ctx, schema)?.is_some() {
                return Err(unsupported_body(
                    operation,
                    format!("flattened body '{}' cannot be polymorphic", object.name),
                ));
            }
            let properties = inherited_properties(ctx, schema)?;
            for initializer in initializers {
                if !properties.iter().any(|p| p.name == initializer.property) {
                    return Err(unsupported_body(
                        operation,
                        format!("'{}' has no property '{}'", object.name, initializer.property),
                    ));
                }
                declared(operation, &initializer.parameter)?;
            }
            if let Some(missing) = properties
                .iter()
                .filter(|p| p.required)
                .find(|p| !initializers.iter().any(|i| i.property == p.name))
            {
                return Err(unsupported_body(
                    operation,
                    format!("required property '{}' of '{}' is not initialized", missing.name, object.name),
                ));
            }
            BodyStep::Flattened {
                schema: schema.clone(),
                initializers: initializers.clone(),
                format: *format,
                plan: plan(ctx, schema, *format)?,
                content_type: declared_type.unwrap_or_else(|| default_content_type(*format).to_string()),
            }
        }
    };
    Ok(step)
}

fn default_content_type(format: WireFormat) -> &'static str {
    match format {
        WireFormat::Json => JSON_CONTENT_TYPE,
        WireFormat::Xml => XML_CONTENT_TYPE,
    }
}

/// URI under assembly; query entries are kept encoded.
///
/// Entries carried by a followed next link are kept apart and replace
/// same-named operation entries when the URI is finished.
#[derive(Debug, Default)]
struct UriBuilder {
    base: String,
    query: Vec<(String, String)>,
    link_query: Vec<(String, String)>,
}

impl UriBuilder {
    fn append(&mut self, text: &str) {
        if self.base.ends_with('/') && text.starts_with('/') {
            self.base.push_str(&text[1..]);
        } else {
            self.base.push_str(text);
        }
    }

    fn reset(&mut self, uri: &str) -> Result<(), RequestError> {
        url::Url::parse(uri).map_err(|e| RequestError::InvalidUri {
            value: uri.to_string(),
            reason: e.to_string(),
        })?;
        self.base = uri.trim_end_matches('/').to_string();
        Ok(())
    }

    fn merge_link_query(&mut self, query: &str) {
        for entry in query.split('&').filter(|entry| !entry.is_empty()) {
            let (name, value) = entry.split_once('=').unwrap_or((entry, ""));
            self.link_query.retain(|(existing, _)| existing != name);
            self.link_query.push((name.to_string(), value.to_string()));
        }
    }

    fn next_link(&mut self, link: &str) -> Result<(), RequestError> {
        if let Ok(absolute) = url::Url::parse(link) {
            let (base, query) = link.split_once('?').unwrap_or((link, ""));
            self.base = base.to_string();
            self.query.clear();
            self.link_query.clear();
            self.merge_link_query(query);
            debug!(host = absolute.host_str().unwrap_or_default(), "Followed absolute next link");
            return Ok(());
        }
        let (path, query) = link.split_once('?').unwrap_or((link, ""));
        if path.starts_with('/') {
            self.base = match url::Url::parse(&self.base) {
                Ok(current) => format!("{}{}", current.origin().ascii_serialization(), path),
                Err(_) => path.to_string(),
            };
        } else if !path.is_empty() {
            if !self.base.ends_with('/') {
                self.base.push('/');
            }
            self.base.push_str(path);
        }
        self.merge_link_query(query);
        Ok(())
    }

    fn finish(self) -> String {
        let Self {
            base,
            query,
            link_query,
        } = self;
        let carried = |name: &str| link_query.iter().any(|(existing, _)| existing == name);
        let query: Vec<String> = query
            .iter()
            .filter(|(name, _)| !carried(name))
            .chain(link_query.iter())
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        if query.is_empty() {
            return base;
        }
        format!("{}?{}", base, query.join("&"))
    }
}

fn encode_query(text: &str, escape: bool) -> String {
    if escape {
        utf8_percent_encode(text, QUERY_ESCAPE).to_string()
    } else {
        text.to_string()
    }
}

impl RequestPlan {
    /// Returns a signature parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&BoundParameter> {
        self.signature.iter().find(|p| p.name == name)
    }

    /// Returns the body step, if the operation has a body.
    pub fn body(&self) -> Option<&BodyStep> {
        self.steps.iter().find_map(|step| match step {
            RequestStep::SetBody(body) => Some(body),
            _ => None,
        })
    }

    /// Reconstructs the route template, e.g. `admin/secrets/{id}`.
    ///
    /// The endpoint and next links are excluded and the leading `/` trimmed.
    pub fn route_template(&self) -> String {
        let mut route = String::new();
        for step in &self.steps {
            let piece = match step {
                RequestStep::AppendPath {
                    part: PathPart::Constant(text),
                    ..
                } => text.clone(),
                RequestStep::AppendPath {
                    part: PathPart::Value(value),
                    ..
                }
                | RequestStep::AppendRaw { value } => match &value.source {
                    ArgumentSource::Parameter(name) => format!("{{{}}}", name),
                    ArgumentSource::Constant(constant) => constant
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| constant.to_string()),
                },
                _ => continue,
            };
            if route.ends_with('/') && piece.starts_with('/') {
                route.push_str(&piece[1..]);
            } else {
                route.push_str(&piece);
            }
        }
        route.trim_start_matches('/').to_string()
    }

    fn argument(
        &self,
        source: &ArgumentSource,
        kind: &TextKind,
        args: &RequestArgs,
    ) -> Result<Option<Value>, RequestError> {
        let name = match source {
            ArgumentSource::Constant(constant) => return Ok(Some(json_to_value(constant, kind)?)),
            ArgumentSource::Parameter(name) => name,
        };
        if let Some(value) = args.get(name) {
            return Ok(Some(value.clone()));
        }
        match self.parameter(name) {
            Some(BoundParameter {
                default: Some(default),
                ..
            }) => Ok(Some(json_to_value(default, kind)?)),
            Some(BoundParameter { nullable: true, .. }) => Ok(None),
            _ => Err(RequestError::MissingArgument {
                operation: self.operation.clone(),
                parameter: name.clone(),
            }),
        }
    }

    fn texts(&self, value: &StepValue, args: &RequestArgs) -> Result<Option<Vec<String>>, RequestError> {
        let Some(argument) = self.argument(&value.source, &value.kind, args)? else {
            return Ok(None);
        };
        let texts = match (&value.kind, &argument) {
            (TextKind::Scalar(kind), _) => vec![scalar_to_text(&argument, kind)?],
            (TextKind::List(kind), Value::List(items)) => items
                .iter()
                .map(|item| scalar_to_text(item, kind))
                .collect::<Result<Vec<_>, _>>()?,
            (TextKind::List(_), other) => {
                return Err(ValueError::TypeMismatch {
                    expected: "a list".to_string(),
                    found: other.label().to_string(),
                }
                .into());
            }
        };
        Ok(Some(texts))
    }

    fn single_text(&self, value: &StepValue, args: &RequestArgs) -> Result<Option<String>, RequestError> {
        Ok(self.texts(value, args)?.map(|texts| texts.join(",")))
    }

    /// Evaluates the plan against call arguments.
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] if a non-nullable argument is missing, a
    /// value does not fit its parameter, or a URI argument is invalid.
    pub fn evaluate(
        &self,
        ctx: &GenerationContext<'_>,
        endpoint: &str,
        args: &RequestArgs,
    ) -> Result<HttpRequest, RequestError> {
        let mut uri = UriBuilder {
            base: endpoint.trim_end_matches('/').to_string(),
            ..UriBuilder::default()
        };
        let mut headers = Vec::new();
        let mut body = None;

        for step in &self.steps {
            match step {
                RequestStep::ResetEndpoint { value } => {
                    if let Some(text) = self.single_text(value, args)? {
                        uri.reset(&text)?;
                    }
                }
                RequestStep::AppendPath {
                    part: PathPart::Constant(text),
                    ..
                } => uri.append(text),
                RequestStep::AppendPath {
                    part: PathPart::Value(value),
                    escape,
                } => {
                    if let Some(text) = self.single_text(value, args)? {
                        if *escape {
                            uri.append(&utf8_percent_encode(&text, PATH_ESCAPE).to_string());
                        } else {
                            uri.append(&text);
                        }
                    }
                }
                RequestStep::AppendRaw { value } => {
                    if let Some(text) = self.single_text(value, args)? {
                        uri.append(&text);
                    }
                }
                RequestStep::AppendNextLink { value } => {
                    if let Some(text) = self.single_text(value, args)? {
                        uri.next_link(&text)?;
                    }
                }
                RequestStep::AppendQuery {
                    name,
                    value,
                    style,
                    escape,
                } => {
                    let Some(texts) = self.texts(value, args)? else {
                        continue;
                    };
                    let name = encode_query(name, *escape);
                    match style.delimiter() {
                        Some(delimiter) => uri
                            .query
                            .push((name, encode_query(&texts.join(delimiter), *escape))),
                        None => uri.query.extend(
                            texts
                                .iter()
                                .map(|text| (name.clone(), encode_query(text, *escape))),
                        ),
                    }
                }
                RequestStep::AddHeader { name, value, style } => {
                    if let Some(texts) = self.texts(value, args)? {
                        let delimiter = style.delimiter().unwrap_or(",");
                        headers.push((name.clone(), texts.join(delimiter)));
                    }
                }
                RequestStep::SetBody(step) => {
                    if let Some(content) = self.body_content(ctx, step, args)? {
                        headers.push(("Content-Type".to_string(), step.content_type().to_string()));
                        body = Some(content);
                    }
                }
            }
        }

        Ok(HttpRequest {
            method: self.method,
            uri: uri.finish(),
            headers,
            body,
        })
    }

    fn body_argument(&self, parameter: &str, args: &RequestArgs) -> Result<Option<Value>, RequestError> {
        if let Some(value) = args.get(parameter) {
            return Ok(Some(value.clone()));
        }
        match self.parameter(parameter) {
            Some(BoundParameter { nullable: true, .. }) => Ok(None),
            _ => Err(RequestError::MissingArgument {
                operation: self.operation.clone(),
                parameter: parameter.to_string(),
            }),
        }
    }

    fn body_content(
        &self,
        ctx: &GenerationContext<'_>,
        step: &BodyStep,
        args: &RequestArgs,
    ) -> Result<Option<Vec<u8>>, RequestError> {
        let content = match step {
            BodyStep::Schema {
                parameter,
                format,
                plan,
                ..
            } => match self.body_argument(parameter, args)? {
                Some(value) => Some(write_body(ctx, *format, plan, &value)?),
                None => None,
            },
            BodyStep::Binary { parameter, .. } => match self.body_argument(parameter, args)? {
                Some(Value::Bytes(bytes)) => Some(bytes),
                Some(Value::String(text)) => Some(text.into_bytes()),
                Some(other) => {
                    return Err(ValueError::TypeMismatch {
                        expected: "bytes".to_string(),
                        found: other.label().to_string(),
                    }
                    .into());
                }
                None => None,
            },
            BodyStep::Text { parameter, .. } => match self.body_argument(parameter, args)? {
                Some(Value::String(text)) => Some(text.into_bytes()),
                Some(other) => {
                    return Err(ValueError::TypeMismatch {
                        expected: "text".to_string(),
                        found: other.label().to_string(),
                    }
                    .into());
                }
                None => None,
            },
            BodyStep::Flattened {
                initializers,
                format,
                plan,
                ..
            } => {
                let mut fields = BTreeMap::new();
                for initializer in initializers {
                    if let Some(value) = self.body_argument(&initializer.parameter, args)? {
                        fields.insert(initializer.property.clone(), value);
                    }
                }
                Some(write_body(ctx, *format, plan, &Value::Record(fields))?)
            }
        };
        Ok(content)
    }
}

fn write_body(
    ctx: &GenerationContext<'_>,
    format: WireFormat,
    plan: &SerializationNode,
    value: &Value,
) -> Result<Vec<u8>, RequestError> {
    let bytes = match format {
        WireFormat::Json => json::to_vec(ctx, plan, value)?,
        WireFormat::Xml => xml::write(ctx, plan, value)?.into_bytes(),
    };
    Ok(bytes)
}

fn json_to_value(json: &serde_json::Value, kind: &TextKind) -> Result<Value, ValueError> {
    match (kind, json) {
        (TextKind::Scalar(kind), _) => scalar_from_json(json, kind),
        (TextKind::List(kind), serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| scalar_from_json(item, kind))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (TextKind::List(kind), single) => Ok(Value::List(vec![scalar_from_json(single, kind)?])),
    }
}

/// Renders a constant or default value as its wire texts.
///
/// ## Errors
///
/// Returns a [`ValueError`] if the value does not fit the text kind.
pub fn literal_texts(json: &serde_json::Value, kind: &TextKind) -> Result<Vec<String>, ValueError> {
    let value = json_to_value(json, kind)?;
    match (kind, &value) {
        (TextKind::Scalar(kind), _) => Ok(vec![scalar_to_text(&value, kind)?]),
        (TextKind::List(kind), Value::List(items)) => {
            items.iter().map(|item| scalar_to_text(item, kind)).collect()
        }
        (TextKind::List(_), other) => Err(ValueError::TypeMismatch {
            expected: "a list".to_string(),
            found: other.label().to_string(),
        }),
    }
}
