//! Integration tests for response dispatch tables.
//!
//! Dispatch tables are data: an ordered list of status predicates and
//! actions with an implicit failing default. These tests plan tables for a
//! small catalog model and handle concrete responses through them.

use blueprint_define::prelude::*;
use blueprint_gen::context::GenerationContext;
use blueprint_gen::errors::{ResponseError, UnhandledStatusCode};
use blueprint_gen::response::{self, DispatchAction, Handled, ResponseDispatchTable, ReturnKind};
use blueprint_gen::serialization::Value;
use blueprint_gen::transport::HttpResponse;

fn catalog_model() -> ApiModel {
    ApiModel::new("Catalog")
        .with_primitives()
        .with_schema(
            "Item",
            SchemaType::Object(ObjectSchema::new(
                "Item",
                vec![
                    Property::required("name", "string"),
                    Property::optional("count", "int32"),
                ],
            )),
        )
        .with_operation(
            Operation::new("getItem", HttpMethod::Get).with_response(ResponseDecl::typed(200, "Item")),
        )
        .with_operation(
            Operation::new("touchItem", HttpMethod::Post)
                .with_response(ResponseDecl::empty(204))
                .with_response(ResponseDecl {
                    status_codes: vec![StatusCode::Range { from: 200, to: 299 }],
                    ..ResponseDecl::typed(200, "Item")
                }),
        )
        .with_operation(
            Operation::new("itemInfo", HttpMethod::Head).with_response(
                ResponseDecl::empty(200).with_headers(HeaderModel {
                    name: "ItemHeaders".to_string(),
                    headers: vec![
                        HeaderField {
                            name: "count".to_string(),
                            header: "X-Item-Count".to_string(),
                            schema: "int32".into(),
                        },
                        HeaderField {
                            name: "etag".to_string(),
                            header: "ETag".to_string(),
                            schema: "string".into(),
                        },
                    ],
                }),
            ),
        )
        .with_operation(
            Operation::new("getItemXml", HttpMethod::Get).with_response(ResponseDecl {
                body: ResponseBodyDecl::Typed {
                    schema: "Item".into(),
                    format: WireFormat::Xml,
                },
                ..ResponseDecl::typed(200, "Item")
            }),
        )
        .with_operation(
            Operation::new("download", HttpMethod::Get).with_response(ResponseDecl::stream(200)),
        )
        .with_operation(Operation::new("ping", HttpMethod::Get))
}

fn with_table(name: &str, check: impl FnOnce(&GenerationContext<'_>, &ResponseDispatchTable)) {
    let model = catalog_model();
    let ctx = GenerationContext::new(&model);
    let operation = model.operation(name).expect("operation should exist");
    let table = response::plan(&ctx, operation).expect("table should plan");
    check(&ctx, &table);
}

// === default branch ===

#[test]
fn undeclared_status_fails_without_reading_the_body() {
    with_table("getItem", |ctx, table| {
        // A body that would fail deserialization proves the body is never read.
        let response = HttpResponse::new(404).with_body("<html>not found</html>");
        let err = table.handle(ctx, &response).unwrap_err();
        assert_eq!(
            err,
            ResponseError::Unhandled(UnhandledStatusCode {
                operation: "getItem".to_string(),
                status: 404,
            })
        );
    });
}

#[test]
fn dispatch_reports_unhandled_status() {
    with_table("getItem", |_, table| {
        assert!(table.dispatch(200).is_ok());
        assert_eq!(table.dispatch(500).unwrap_err().status, 500);
    });
}

// === branch order ===

#[test]
fn first_matching_branch_wins() {
    with_table("touchItem", |ctx, table| {
        assert_eq!(table.dispatch(204).unwrap().action, DispatchAction::NoContent);
        assert!(table.value_optional);

        let empty = table.handle(ctx, &HttpResponse::new(204)).unwrap();
        assert_eq!(empty, Handled::Value(None));

        let filled = table
            .handle(ctx, &HttpResponse::new(201).with_body(r#"{"name": "lamp"}"#))
            .unwrap();
        let Handled::Value(Some(item)) = filled else {
            panic!("expected a value");
        };
        assert_eq!(item.field("name"), Some(&Value::from("lamp")));
    });
}

// === return kinds ===

#[test]
fn headers_are_extracted_when_present() {
    with_table("itemInfo", |ctx, table| {
        assert_eq!(table.return_kind, ReturnKind::Headers);
        let response = HttpResponse::new(200).with_header("x-item-count", "3");
        let Handled::Headers(headers) = table.handle(ctx, &response).unwrap() else {
            panic!("expected headers");
        };
        assert_eq!(headers.field("count"), Some(&Value::Int(3)));
        assert_eq!(headers.field("etag"), None);
    });
}

#[test]
fn malformed_header_is_reported() {
    with_table("itemInfo", |ctx, table| {
        let response = HttpResponse::new(200).with_header("X-Item-Count", "three");
        assert!(matches!(
            table.handle(ctx, &response),
            Err(ResponseError::Header { header, .. }) if header == "X-Item-Count"
        ));
    });
}

#[test]
fn xml_bodies_are_read_through_the_xml_plan() {
    with_table("getItemXml", |ctx, table| {
        let response = HttpResponse::new(200).with_body("<Item><name>lamp</name><count>2</count></Item>");
        let Handled::Value(Some(item)) = table.handle(ctx, &response).unwrap() else {
            panic!("expected a value");
        };
        assert_eq!(item.field("count"), Some(&Value::Int(2)));
    });
}

#[test]
fn stream_bodies_are_passed_through() {
    with_table("download", |ctx, table| {
        let response = HttpResponse::new(200).with_body(vec![0u8, 159, 146, 150]);
        assert_eq!(
            table.handle(ctx, &response).unwrap(),
            Handled::Value(Some(Value::Bytes(vec![0, 159, 146, 150])))
        );
    });
}

#[test]
fn operations_without_bodies_return_the_response() {
    with_table("ping", |ctx, table| {
        assert_eq!(table.return_kind, ReturnKind::Response);
        assert!(matches!(
            table.handle(ctx, &HttpResponse::new(200)),
            Err(ResponseError::Unhandled(_))
        ));
    });
}
