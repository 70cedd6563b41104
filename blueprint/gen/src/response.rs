//! Response dispatch planning.
//!
//! [`plan`] turns an operation's declared responses into a
//! [`ResponseDispatchTable`]: one branch per declared status code or range,
//! matched in declaration order (first match wins), with an implicit failing
//! default. [`ResponseDispatchTable::handle`] executes the table against a
//! received [`HttpResponse`].

use std::sync::Arc;

use blueprint_define::{Operation, ResponseBodyDecl, StatusCode, WireFormat};
use strum::Display;
use tracing::{debug, instrument};

use crate::context::GenerationContext;
use crate::errors::{ModelError, ResponseError, UnhandledStatusCode, ValueError};
use crate::naming::type_name;
use crate::resolver::{TargetType, resolve};
use crate::serialization::{SerializationNode, Value, ValueKind, json, plan as plan_schema, scalar_from_text, value_kind, xml};
use crate::transport::HttpResponse;

/// What a generated operation method returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReturnKind {
    /// The raw transport response.
    Response,
    /// A header model.
    Headers,
    /// A body value.
    Value,
    HeadersAndValue,
}

/// The value carried by successful responses.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseValue {
    Typed(Arc<TargetType>),
    /// Raw content handed back without deserialization.
    Stream,
}

/// What a matched branch does with the response body.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    /// Success with no value.
    NoContent,
    Deserialize {
        format: WireFormat,
        plan: Arc<SerializationNode>,
    },
    Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchBranch {
    pub status: StatusCode,
    pub action: DispatchAction,
}

/// One header extracted into the header model.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBinding {
    pub field: String,
    pub header: String,
    pub kind: ValueKind,
    pub target: Arc<TargetType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderModelPlan {
    pub name: String,
    pub type_name: String,
    pub fields: Vec<HeaderBinding>,
}

/// The status-keyed decision table of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDispatchTable {
    pub operation: String,
    pub return_kind: ReturnKind,
    pub value_type: Option<ResponseValue>,
    /// True when some branch succeeds without content.
    pub value_optional: bool,
    pub header_model: Option<HeaderModelPlan>,
    pub branches: Vec<DispatchBranch>,
}

/// The outcome of handling a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Response(HttpResponse),
    Headers(Value),
    Value(Option<Value>),
    HeadersAndValue { headers: Value, value: Option<Value> },
}

fn conflict(operation: &Operation, reason: String) -> ModelError {
    ModelError::ConflictingResponses {
        operation: operation.name.clone(),
        reason,
    }
}

/// Builds the dispatch table of an operation.
///
/// ## Errors
///
/// Returns `ModelError::ConflictingResponses` when typed bodies disagree on
/// their type or header models on their name, and any error raised while
/// planning a body or header schema.
#[instrument(skip(ctx, operation), fields(operation = %operation.name))]
pub fn plan(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
) -> Result<ResponseDispatchTable, ModelError> {
    let mut value_type: Option<ResponseValue> = None;
    let mut header_model: Option<HeaderModelPlan> = None;
    let mut branches = Vec::new();

    for response in &operation.responses {
        let (action, value) = match &response.body {
            ResponseBodyDecl::None => (DispatchAction::NoContent, None),
            ResponseBodyDecl::Stream => (DispatchAction::Stream, Some(ResponseValue::Stream)),
            ResponseBodyDecl::Typed { schema, format } => (
                DispatchAction::Deserialize {
                    format: *format,
                    plan: plan_schema(ctx, schema, *format)?,
                },
                Some(ResponseValue::Typed(resolve(ctx, schema)?)),
            ),
        };
        if let Some(value) = value {
            match &value_type {
                Some(existing) if *existing != value => {
                    return Err(conflict(
                        operation,
                        format!("bodies of type {} and {}", describe(existing), describe(&value)),
                    ));
                }
                Some(_) => {}
                None => value_type = Some(value),
            }
        }
        if let Some(headers) = &response.headers {
            match &header_model {
                Some(existing) if existing.name != headers.name => {
                    return Err(conflict(
                        operation,
                        format!("header models '{}' and '{}'", existing.name, headers.name),
                    ));
                }
                Some(_) => {}
                None => header_model = Some(header_plan(ctx, operation, headers)?),
            }
        }
        branches.extend(response.status_codes.iter().map(|status| DispatchBranch {
            status: *status,
            action: action.clone(),
        }));
    }

    let return_kind = match (header_model.is_some(), value_type.is_some()) {
        (true, true) => ReturnKind::HeadersAndValue,
        (true, false) => ReturnKind::Headers,
        (false, true) => ReturnKind::Value,
        (false, false) => ReturnKind::Response,
    };
    let value_optional = value_type.is_some()
        && operation
            .responses
            .iter()
            .any(|r| r.body == ResponseBodyDecl::None);

    debug!(%return_kind, branches = branches.len(), "Planned response dispatch");
    Ok(ResponseDispatchTable {
        operation: operation.name.clone(),
        return_kind,
        value_type,
        value_optional,
        header_model,
        branches,
    })
}

fn describe(value: &ResponseValue) -> String {
    match value {
        ResponseValue::Typed(target) => target.rust_type(),
        ResponseValue::Stream => "stream".to_string(),
    }
}

fn header_plan(
    ctx: &GenerationContext<'_>,
    operation: &Operation,
    model: &blueprint_define::HeaderModel,
) -> Result<HeaderModelPlan, ModelError> {
    let mut fields = Vec::new();
    for field in &model.headers {
        let referenced_by = format!("{}.{}", model.name, field.name);
        let Some(kind) = value_kind(ctx, &field.schema, &referenced_by)? else {
            return Err(ModelError::UnsupportedParameter {
                operation: operation.name.clone(),
                parameter: field.header.clone(),
                reason: "response headers must be scalars".to_string(),
            });
        };
        fields.push(HeaderBinding {
            field: field.name.clone(),
            header: field.header.clone(),
            kind,
            target: resolve(ctx, &field.schema)?,
        });
    }
    Ok(HeaderModelPlan {
        name: model.name.clone(),
        type_name: type_name(&model.name),
        fields,
    })
}

impl ResponseDispatchTable {
    /// Finds the first branch covering `status`.
    ///
    /// ## Errors
    ///
    /// Returns [`UnhandledStatusCode`] when no branch covers it.
    pub fn dispatch(&self, status: u16) -> Result<&DispatchBranch, UnhandledStatusCode> {
        self.branches
            .iter()
            .find(|branch| branch.status.contains(status))
            .ok_or_else(|| UnhandledStatusCode {
                operation: self.operation.clone(),
                status,
            })
    }

    /// Dispatches a response, then extracts headers and reads the body.
    ///
    /// An unmatched status never reaches deserialization.
    ///
    /// ## Errors
    ///
    /// Returns `ResponseError::Unhandled` for unmatched statuses and
    /// `ResponseError::Body`/`ResponseError::Header` when content does not
    /// fit its plan.
    pub fn handle(
        &self,
        ctx: &GenerationContext<'_>,
        response: &HttpResponse,
    ) -> Result<Handled, ResponseError> {
        let branch = self.dispatch(response.status)?;
        let value = match &branch.action {
            DispatchAction::NoContent => None,
            DispatchAction::Stream => Some(Value::Bytes(response.body.clone())),
            DispatchAction::Deserialize { format, plan } => Some(
                read_body(ctx, *format, plan, &response.body).map_err(|source| ResponseError::Body {
                    operation: self.operation.clone(),
                    source,
                })?,
            ),
        };
        let handled = match self.return_kind {
            ReturnKind::Response => Handled::Response(response.clone()),
            ReturnKind::Value => Handled::Value(value),
            ReturnKind::Headers => Handled::Headers(self.headers(response)?),
            ReturnKind::HeadersAndValue => Handled::HeadersAndValue {
                headers: self.headers(response)?,
                value,
            },
        };
        Ok(handled)
    }

    fn headers(&self, response: &HttpResponse) -> Result<Value, ResponseError> {
        let mut fields = std::collections::BTreeMap::new();
        for binding in self.header_model.iter().flat_map(|model| &model.fields) {
            if let Some(text) = response.header(&binding.header) {
                let value = scalar_from_text(text, &binding.kind).map_err(|source| {
                    ResponseError::Header {
                        operation: self.operation.clone(),
                        header: binding.header.clone(),
                        source,
                    }
                })?;
                fields.insert(binding.field.clone(), value);
            }
        }
        Ok(Value::Record(fields))
    }
}

fn read_body(
    ctx: &GenerationContext<'_>,
    format: WireFormat,
    plan: &SerializationNode,
    body: &[u8],
) -> Result<Value, ValueError> {
    match format {
        WireFormat::Json => json::from_slice(ctx, plan, body),
        WireFormat::Xml => {
            let text = std::str::from_utf8(body).map_err(|e| ValueError::Xml(e.to_string()))?;
            xml::read(ctx, plan, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::vault_model;
    use blueprint_define::{ApiModel, HttpMethod, ResponseDecl};

    fn table(model: &ApiModel, name: &str) -> ResponseDispatchTable {
        let ctx = GenerationContext::new(model);
        plan(&ctx, model.operation(name).unwrap()).unwrap()
    }

    #[test]
    fn return_kinds_follow_declared_content() {
        let model = vault_model();
        assert_eq!(table(&model, "getSecret").return_kind, ReturnKind::HeadersAndValue);
        assert_eq!(table(&model, "headSecret").return_kind, ReturnKind::Headers);
        assert_eq!(table(&model, "listSecrets").return_kind, ReturnKind::Value);
        assert_eq!(table(&model, "deleteSecret").return_kind, ReturnKind::Response);
        assert_eq!(
            table(&model, "downloadBackup").value_type,
            Some(ResponseValue::Stream)
        );
    }

    #[test]
    fn empty_branch_makes_value_optional() {
        let model = vault_model();
        let purge = table(&model, "recoverSecret");
        assert!(purge.value_optional);
        assert_eq!(purge.dispatch(204).unwrap().action, DispatchAction::NoContent);
    }

    #[test]
    fn first_matching_branch_wins() {
        let model = ApiModel::new("Test").with_primitives().with_operation(
            Operation::new("ping", HttpMethod::Get)
                .with_response(ResponseDecl::empty(200))
                .with_response(ResponseDecl::stream(200).with_status(StatusCode::Range {
                    from: 200,
                    to: 299,
                })),
        );
        let ping = table(&model, "ping");
        assert_eq!(ping.dispatch(200).unwrap().action, DispatchAction::NoContent);
        assert_eq!(ping.dispatch(201).unwrap().action, DispatchAction::Stream);
    }

    #[test]
    fn unmatched_status_is_not_deserialized() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let table = plan(&ctx, model.operation("listSecrets").unwrap()).unwrap();
        let response = HttpResponse::new(404).with_body("<html>not json</html>");
        assert_eq!(
            table.handle(&ctx, &response),
            Err(ResponseError::Unhandled(UnhandledStatusCode {
                operation: "listSecrets".to_string(),
                status: 404
            }))
        );
    }

    #[test]
    fn headers_and_value_are_extracted() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let table = plan(&ctx, model.operation("getSecret").unwrap()).unwrap();
        let response = HttpResponse::new(200)
            .with_header("etag", "\"v1\"")
            .with_body(r#"{"id": "a", "value": "v"}"#);
        let Handled::HeadersAndValue { headers, value } = table.handle(&ctx, &response).unwrap() else {
            panic!("expected headers and value");
        };
        assert_eq!(headers.field("etag"), Some(&Value::from("\"v1\"")));
        assert_eq!(value.unwrap().field("id"), Some(&Value::from("a")));
    }

    #[test]
    fn malformed_body_is_body_error() {
        let model = vault_model();
        let ctx = GenerationContext::new(&model);
        let table = plan(&ctx, model.operation("listSecrets").unwrap()).unwrap();
        let result = table.handle(&ctx, &HttpResponse::new(200).with_body("{"));
        assert!(matches!(result, Err(ResponseError::Body { .. })));
    }

    #[test]
    fn differing_body_types_conflict() {
        let model = vault_model().with_operation(
            Operation::new("confused", HttpMethod::Get)
                .with_response(ResponseDecl::typed(200, "Secret"))
                .with_response(ResponseDecl::typed(201, "SecretList")),
        );
        let ctx = GenerationContext::new(&model);
        assert!(matches!(
            plan(&ctx, model.operation("confused").unwrap()),
            Err(ModelError::ConflictingResponses { .. })
        ));
    }
}
