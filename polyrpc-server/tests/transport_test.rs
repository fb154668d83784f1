//! Transport contract integration tests

use polyrpc_core::TypeTag;
use polyrpc_server::{from_fn, JsonRpcSite, Procedure, TransportRequest};
use serde_json::{json, Value};

fn site() -> JsonRpcSite {
    JsonRpcSite::builder()
        .procedure(
            Procedure::new("search", from_fn(|ctx, args| async move {
                Ok(json!({
                    "keyword": args.keyword,
                    "verb": ctx.verb,
                    "id": ctx.id,
                    "peer": ctx.get_metadata("peer").cloned(),
                }))
            }))
            .safe(true),
        )
        .procedure(
            Procedure::new("add", from_fn(|_, args| async move {
                let a = args.get(0).and_then(Value::as_i64).unwrap_or_default();
                let b = args.get(1).and_then(Value::as_i64).unwrap_or_default();
                Ok(json!(a + b))
            }))
            .param("a", TypeTag::Number)
            .param("b", TypeTag::Number)
            .validate(true),
        )
        .build()
        .unwrap()
}

fn body(response: &polyrpc_server::TransportResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

#[tokio::test]
async fn test_post_request() {
    let response = site()
        .handle(TransportRequest::post(
            r#"{"jsonrpc": "2.0", "method": "add", "params": [2, 3], "id": 1}"#,
        ))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/json-rpc");
    assert_eq!(body(&response), json!({"jsonrpc": "2.0", "result": 5, "id": 1}));
}

#[tokio::test]
async fn test_post_batch() {
    let response = site()
        .handle(TransportRequest::post(
            r#"[{"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": 1},
                {"jsonrpc": "2.0", "method": "add", "params": [2, 2], "id": 2}]"#,
        ))
        .await;

    assert_eq!(response.status, 200);
    let replies = body(&response);
    assert_eq!(replies[0]["result"], json!(2));
    assert_eq!(replies[1]["result"], json!(4));
}

#[tokio::test]
async fn test_post_undecodable_body() {
    let response = site().handle(TransportRequest::post("{not json")).await;

    assert_eq!(response.status, 400);
    let envelope = body(&response);
    assert_eq!(envelope["error"]["code"], json!(-32700));
    assert_eq!(envelope["id"], Value::Null);
    assert_eq!(envelope["result"], Value::Null);
}

#[tokio::test]
async fn test_post_notification_has_empty_body() {
    let response = site()
        .handle(TransportRequest::post(
            r#"{"jsonrpc": "2.0", "method": "add", "params": [1, 2]}"#,
        ))
        .await;

    assert_eq!(response.status, 204);
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_get_shortcut() {
    let request = TransportRequest::get("search", "q=rust&tag=a&tag=b")
        .with_metadata("peer", json!("10.0.0.1"));
    let response = site().handle(request).await;

    assert_eq!(response.status, 200);
    let envelope = body(&response);
    assert_eq!(envelope["version"], json!("1.1"));
    assert_eq!(envelope["id"], json!("jsonrpc"));
    assert_eq!(
        envelope["result"],
        json!({
            "keyword": {"q": "rust", "tag": ["a", "b"]},
            "verb": "GET",
            "id": "jsonrpc",
            "peer": "10.0.0.1",
        })
    );
}

#[tokio::test]
async fn test_get_unsafe_method_rejected() {
    let response = site().handle(TransportRequest::get("add", "0=1&1=2")).await;

    assert_eq!(response.status, 400);
    let envelope = body(&response);
    assert_eq!(envelope["error"]["code"], json!(-32600));
    assert_eq!(
        envelope["error"]["message"],
        json!("The method you are trying to access is not available by GET requests")
    );
}

#[tokio::test]
async fn test_get_describe() {
    let response = site().handle(TransportRequest::get("system.describe", "")).await;

    assert_eq!(response.status, 200);
    let procs = body(&response)["result"]["procs"].clone();
    let names: Vec<_> = procs.as_array().unwrap().iter().map(|p| p["name"].clone()).collect();
    assert_eq!(names, vec![json!("add"), json!("search")]);
}

#[tokio::test]
async fn test_other_verbs_rejected() {
    let response = site().handle(TransportRequest::new("PUT")).await;

    assert_eq!(response.status, 405);
    let envelope = body(&response);
    assert_eq!(envelope["error"]["code"], json!(-32600));
    assert!(envelope["error"]["message"]
        .as_str()
        .unwrap()
        .contains("must be POST"));
}

#[tokio::test]
async fn test_verbs_are_case_insensitive() {
    let mut request = TransportRequest::post(r#"{"method": "add", "params": [1, 2], "id": 1}"#);
    request.verb = "post".to_string();
    let response = site().handle(request).await;

    assert_eq!(response.status, 200);
    assert_eq!(body(&response), json!({"result": 3, "error": null, "id": 1}));
}
