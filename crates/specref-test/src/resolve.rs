//! End-to-end resolution over real HTTP.

use std::collections::HashMap;

use serde_json::json;

use specref_resolver::{
    FetchError, HttpTransport, HttpTransportConfig, Resolver, UnresolvedReason,
};

use crate::server::{fixtures, resolve_url, DocumentServer};

#[tokio::test]
async fn relative_references_are_fetched_once_and_imported() {
    let server = DocumentServer::start().await;
    server.serve_fixture("/v2/petstore.yaml", "petstore.yaml").await.unwrap();
    server.serve_fixture("/v2/models.yaml", "models.yaml").await.unwrap();
    server.serve_fixture("/v2/paths.yaml", "paths.yaml").await.unwrap();

    let (spec, resolution) = resolve_url(&server.url("/v2/petstore.yaml"), HttpTransportConfig::default())
        .await
        .unwrap();

    assert!(resolution.unresolved.is_empty(), "{:?}", resolution.unresolved);
    assert_eq!(spec["definitions"]["Pet"]["required"], json!(["name"]));
    assert_eq!(
        spec["definitions"]["Pet"]["properties"]["category"],
        json!({ "$ref": "#/definitions/Category" })
    );
    assert_eq!(spec["definitions"]["Category"]["properties"]["id"]["format"], "int64");
    assert_eq!(
        spec["paths"]["/pets"]["get"]["responses"]["200"]["schema"]["items"],
        json!({ "$ref": "#/definitions/Pet" })
    );
    assert_eq!(
        spec["paths"]["/pets/{id}"]["get"]["responses"]["200"]["schema"],
        json!({ "$ref": "#/definitions/Pet" })
    );
    assert_eq!(spec["paths"]["/pets"]["get"]["parameters"][0]["name"], "limit");

    assert_eq!(server.requests_for("/v2/petstore.yaml").await, 1);
    assert_eq!(server.requests_for("/v2/models.yaml").await, 1);
    assert_eq!(server.requests_for("/v2/paths.yaml").await, 1);
    assert_eq!(resolution.stats.requests, 2);
}

#[tokio::test]
async fn references_into_one_document_share_a_request() {
    let server = DocumentServer::start().await;
    server
        .serve_json(
            "/models.json",
            &json!({
                "definitions": {
                    "Pet": { "type": "object" },
                    "Tag": { "type": "object" },
                    "Order": { "type": "object" }
                }
            }),
        )
        .await;
    let models = server.url("/models.json");

    let mut spec = json!({
        "swagger": "2.0",
        "definitions": {
            "Store": {
                "properties": {
                    "pets": { "type": "array", "items": { "$ref": format!("{}#/definitions/Pet", models) } },
                    "tags": { "type": "array", "items": { "$ref": format!("{}#/definitions/Tag", models) } },
                    "orders": { "type": "array", "items": { "$ref": format!("{}#/definitions/Order", models) } }
                }
            }
        }
    });

    let resolver = Resolver::new(HttpTransport::new(HttpTransportConfig::default()).unwrap());
    let resolution = resolver.resolve(&mut spec, None).await.unwrap();

    assert!(resolution.unresolved.is_empty());
    assert_eq!(resolution.stats.imports, 3);
    assert_eq!(server.requests_for("/models.json").await, 1);
}

#[tokio::test]
async fn server_errors_are_reported_as_unresolved() {
    let server = DocumentServer::start().await;
    server.serve_status("/gone.json", 500).await;
    let reference = format!("{}#/definitions/Gone", server.url("/gone.json"));

    let mut spec = json!({
        "swagger": "2.0",
        "definitions": { "Holder": { "properties": { "gone": { "$ref": reference } } } }
    });
    let original = spec.clone();

    let resolver = Resolver::new(HttpTransport::new(HttpTransportConfig::default()).unwrap());
    let resolution = resolver.resolve(&mut spec, None).await.unwrap();

    assert!(matches!(
        resolution.unresolved.reason(&reference),
        Some(UnresolvedReason::Fetch(FetchError::Status { status: 500, .. }))
    ));
    assert_eq!(
        resolution.unresolved.get(&reference).map(|d| d.location.as_str()),
        Some("/definitions/Gone")
    );
    assert_eq!(spec, original);
}

#[tokio::test]
async fn plaintext_can_be_refused() {
    let server = DocumentServer::start().await;
    server.serve_json("/models.json", &json!({ "definitions": { "Pet": {} } })).await;
    let reference = format!("{}#/definitions/Pet", server.url("/models.json"));

    let mut spec = json!({
        "definitions": { "Holder": { "properties": { "pet": { "$ref": reference } } } }
    });
    let transport = HttpTransport::new(HttpTransportConfig {
        allow_plaintext: false,
        ..Default::default()
    })
    .unwrap();

    let resolution = Resolver::new(transport).resolve(&mut spec, None).await.unwrap();

    assert!(matches!(
        resolution.unresolved.reason(&reference),
        Some(UnresolvedReason::Fetch(FetchError::PlaintextNotAllowed(_)))
    ));
    assert_eq!(server.requests_for("/models.json").await, 0);
}

#[tokio::test]
async fn mirrors_are_served_without_network() {
    let server = DocumentServer::start().await;
    let errors = server.url("/common/errors.json");

    let mut mirrors = HashMap::new();
    mirrors.insert(errors.clone(), fixtures().join("common/errors.json"));
    let transport = HttpTransport::new(HttpTransportConfig {
        mirrors,
        ..Default::default()
    })
    .unwrap();

    let mut spec = json!({
        "openapi": "3.0.3",
        "paths": { "/status": { "get": { "responses": { "500": {
            "description": "Failure",
            "content": { "application/json": {
                "schema": { "$ref": format!("{}#/definitions/Error", errors) }
            } }
        } } } } }
    });

    let resolution = Resolver::new(transport).resolve(&mut spec, None).await.unwrap();

    assert!(resolution.unresolved.is_empty());
    assert_eq!(
        spec["components"]["schemas"]["Error"]["properties"]["code"]["type"],
        "integer"
    );
    assert_eq!(server.requests_for("/common/errors.json").await, 0);
}
