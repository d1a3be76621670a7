use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use chrono::TimeZone;
use chrono::Utc;
use http::Request;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde_json::Value;
use serde_json::json;
use thynq_gateway::Clock;
use thynq_gateway::Configuration;
use thynq_gateway::FixedClock;
use thynq_gateway::Gateway;
use thynq_gateway::graphql;
use thynq_gateway::make_router;
use tower::ServiceExt;

fn fixed_gateway() -> Gateway {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
    ));
    Gateway::builder().clock(clock).build().unwrap()
}

fn run(gateway: &Gateway, query: &str) -> Value {
    let request = graphql::Request::builder().query(query).build();
    serde_json::to_value(gateway.execute(&request)).unwrap()
}

#[test]
fn echo_and_ping_in_one_document() {
    let response = run(
        &fixed_gateway(),
        r#"{
            echo(message: "hello") { original reversed length timestamp }
            ping { status timestamp }
        }"#,
    );
    assert_eq!(
        response,
        json!({
            "data": {
                "echo": {
                    "original": "hello",
                    "reversed": "olleh",
                    "length": 5,
                    "timestamp": "2025-01-02T03:04:05Z",
                },
                "ping": { "status": "pong", "timestamp": "2025-01-02T03:04:05Z" },
            }
        })
    );
}

#[test]
fn aliases_and_fragments() {
    let response = run(
        &fixed_gateway(),
        r#"
        query Twice {
            first: echo(message: "ab") { ...Parts }
            second: echo(message: "xyz") { ...Parts }
        }
        fragment Parts on EchoResponse { reversed size: length }
        "#,
    );
    assert_eq!(
        response,
        json!({
            "data": {
                "first": { "reversed": "ba", "size": 2 },
                "second": { "reversed": "zyx", "size": 3 },
            }
        })
    );
}

#[test]
fn unknown_field_is_a_validation_error() {
    let response = run(&fixed_gateway(), "{ invalidQuery }");
    assert!(response.get("data").is_none());
    assert_eq!(
        response["errors"][0]["extensions"]["code"],
        "GRAPHQL_VALIDATION_FAILED"
    );
}

#[test]
fn introspection_lists_the_result_shapes() {
    let response = run(
        &fixed_gateway(),
        "{ __schema { queryType { name } types { name kind } } }",
    );
    assert_eq!(response["data"]["__schema"]["queryType"]["name"], "Query");
    let types = response["data"]["__schema"]["types"].as_array().unwrap();
    for name in ["EchoResponse", "PingResponse", "Query"] {
        assert!(
            types
                .iter()
                .any(|ty| ty["name"] == name && ty["kind"] == "OBJECT"),
            "{name} is missing"
        );
    }

    let echo = run(
        &fixed_gateway(),
        r#"{ __type(name: "EchoResponse") { fields { name type { kind ofType { name } } } } }"#,
    );
    let fields: Vec<&str> = echo["data"]["__type"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|field| field["name"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["original", "reversed", "length", "timestamp"]);
    assert_eq!(
        echo["data"]["__type"]["fields"][2]["type"],
        json!({ "kind": "NON_NULL", "ofType": { "name": "Int" } })
    );
}

#[test]
fn gateway_from_configuration() {
    let configuration = Configuration::from_str(
        "server:\n  introspection: false\nsecurity:\n  user:\n    password: pw\n",
    )
    .unwrap();
    let gateway = Gateway::from_configuration(&configuration).unwrap();
    let response = run(&gateway, "{ __type(name: \"Query\") { name } }");
    assert!(response.get("data").is_none());
    let response = run(&gateway, "{ ping { status } }");
    assert_eq!(response["data"]["ping"]["status"], "pong");
}

#[tokio::test]
async fn http_round_trip() {
    let configuration =
        Configuration::from_str("security:\n  user:\n    password: pw\n").unwrap();
    let router = make_router(&configuration, fixed_gateway()).unwrap();

    let body = json!({
        "query": "query Both($m: String!) { echo(message: $m) { length } ping { status } }",
        "operationName": "Both",
        "variables": { "m": "日本語" },
    });
    let response = router
        .clone()
        .oneshot(
            Request::post("/graphql")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let response: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        response,
        json!({ "data": { "echo": { "length": 3 }, "ping": { "status": "pong" } } })
    );

    let protected = router
        .oneshot(Request::get("/actuator").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(protected.status(), StatusCode::UNAUTHORIZED);
}
