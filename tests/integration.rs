//! Integration tests using embedded schema manifests
//!
//! These drive the public RequestHandler API end to end: resource-identifier
//! resolution, lock discipline, group results, rpc invocation, and the
//! negotiated error containers.

use std::io::Write;
use std::sync::Arc;
use std::thread;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use rust_restconf::{
    Datastore, Format, RequestHandler, RestRequest, RpcHandler, SchemaTree, resolve,
};

const SAMPLE_MANIFEST: &str = r#"{
    "module": "ietf-yang-library",
    "nodes": [
        {
            "name": "modules-state",
            "kind": "container",
            "children": [
                {
                    "name": "module",
                    "kind": "list",
                    "keys": ["name", "revision"],
                    "children": [
                        {"name": "name", "kind": "leaf"},
                        {"name": "revision", "kind": "leaf"},
                        {"name": "namespace", "kind": "leaf"}
                    ]
                }
            ]
        },
        {
            "name": "reset",
            "kind": "rpc",
            "input": [{"name": "delay", "kind": "leaf"}],
            "output": [{"name": "finished-at", "kind": "leaf"}]
        }
    ]
}"#;

const SAMPLE_DATA: &str = r#"{
    "modules-state": {
        "module": [
            {"name": "yangtree", "revision": "2020-08-18", "namespace": "urn:x"},
            {"name": "example-mod", "revision": "2021-01-01", "namespace": "urn:y"}
        ]
    }
}"#;

fn create_handler() -> RequestHandler {
    let schema = SchemaTree::from_json_str(SAMPLE_MANIFEST).expect("manifest parses");
    let datastore =
        Datastore::from_json(Arc::clone(&schema.data), SAMPLE_DATA).expect("data parses");
    RequestHandler::new(&schema, datastore).expect("route table compiles")
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("body is JSON")
}

#[test]
fn test_get_scenario() {
    let handler = create_handler();
    let request = RestRequest::get("modules-state/module=yangtree,2020-08-18/namespace")
        .with_accept("application/json");
    let response = handler.handle_data(&request);

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(json_body(&response.body), json!({"namespace": "urn:x"}));
}

#[test]
fn test_resolver_matches_find_semantics() {
    let schema = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
    let resolved = resolve(&schema.data, "modules-state/module=yangtree,2020-08-18").unwrap();
    assert_eq!(
        resolved.query(),
        "modules-state/module[name=yangtree][revision=2020-08-18]"
    );

    let datastore = Datastore::from_json(Arc::clone(&schema.data), SAMPLE_DATA).unwrap();
    let nodes = datastore.find(&resolved.query()).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].id, "module[name=yangtree][revision=2020-08-18]");
}

#[test]
fn test_missing_module_scenario() {
    let handler = create_handler();
    let request =
        RestRequest::get("modules-state/module=gone,2020-01-01").with_accept("application/json");
    let response = handler.handle_data(&request);

    assert_eq!(response.status, StatusCode::CONFLICT);
    let body = json_body(&response.body);
    assert_eq!(body["errors"]["error"][0]["error-tag"], "data-missing");
    assert_eq!(body["errors"]["error"][0]["error-type"], "application");
}

#[test]
fn test_group_result_is_single_node() {
    let handler = create_handler();
    let request = RestRequest::get("modules-state/module").with_accept("application/json");
    let response = handler.handle_data(&request);

    assert_eq!(response.status, StatusCode::OK);
    let body = json_body(&response.body);
    let top = body.as_object().unwrap();
    assert_eq!(top.len(), 1, "exactly one rendered group node");
    assert_eq!(top["module"].as_array().unwrap().len(), 2);
}

#[test]
fn test_rpc_invocation_with_output() {
    struct Reset;
    impl RpcHandler for Reset {
        fn handle(&self, input: Option<&Value>) -> rust_restconf::Result<Option<Value>> {
            let delay = input
                .and_then(|v| v.get("delay"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Ok(Some(json!({"finished-at": format!("+{}s", delay)})))
        }
    }

    let mut handler = create_handler();
    handler.register_rpc("reset", Box::new(Reset));

    let request = RestRequest::post("reset")
        .with_body(
            serde_json::to_vec(&json!({"input": {"delay": 5}})).unwrap(),
            "application/yang-data+json",
        )
        .with_accept("application/json");
    let response = handler.handle_operation(&request);

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        json_body(&response.body),
        json!({"output": {"finished-at": "+5s"}})
    );
}

#[test]
fn test_rpc_bad_content_type_scenario() {
    let handler = create_handler();
    let request = RestRequest::post("reset")
        .with_body(b"delay=5".to_vec(), "text/plain")
        .with_accept("application/json");
    let response = handler.handle_operation(&request);

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = json_body(&response.body);
    assert_eq!(body["errors"]["error"][0]["error-tag"], "invalid-value");
    assert_eq!(body["errors"]["error"][0]["error-type"], "transport");
}

#[test]
fn test_rpc_xml_body() {
    let handler = create_handler();
    let request = RestRequest::post("reset")
        .with_body(b"<input><delay>5</delay></input>".to_vec(), "application/xml")
        .with_accept("application/json");
    let response = handler.handle_operation(&request);

    // No registered implementation: parsed and acknowledged with no content.
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
}

#[test]
fn test_xml_rendering() {
    let handler = create_handler();
    let request = RestRequest::get("modules-state/module=yangtree,2020-08-18")
        .with_accept("application/yang-data+xml");
    let response = handler.handle_data(&request);

    assert_eq!(response.status, StatusCode::OK);
    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("<module>"));
    assert!(text.contains("<namespace>urn:x</namespace>"));
}

#[test]
fn test_concurrent_readers_and_writers() {
    let handler = Arc::new(create_handler());

    let mut workers = Vec::new();
    for _ in 0..4 {
        let handler = Arc::clone(&handler);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                let request = RestRequest::get("modules-state/module=yangtree,2020-08-18")
                    .with_accept("application/json");
                let response = handler.handle_data(&request);
                assert_eq!(response.status, StatusCode::OK);
            }
        }));
    }
    for _ in 0..2 {
        let handler = Arc::clone(&handler);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                // Mutating methods serialize on the exclusive lock and are
                // then recovered into operation-not-supported.
                let request = RestRequest::new(Method::PUT, "modules-state")
                    .with_accept("application/json");
                let response = handler.handle_data(&request);
                assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
            }
        }));
    }
    for worker in workers {
        worker.join().expect("request worker panicked");
    }

    // The tree is unchanged after the storm.
    let request = RestRequest::get("modules-state/module").with_accept("application/json");
    let response = handler.handle_data(&request);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        json_body(&response.body)["module"].as_array().unwrap().len(),
        2
    );
}

#[test]
fn test_manifest_loading_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_MANIFEST.as_bytes()).unwrap();

    let schema = SchemaTree::load(&[file.path()]).unwrap();
    assert!(schema.data.child("modules-state").is_some());
    assert!(schema.operations.child("reset").is_some());
}

#[test]
fn test_startup_data_loading() {
    let schema = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
    let handler =
        RequestHandler::new(&schema, Datastore::new(Arc::clone(&schema.data))).unwrap();

    // Before startup data arrives the tree is empty.
    let request = RestRequest::get("modules-state").with_accept("application/json");
    assert_eq!(
        handler.handle_data(&request).status,
        StatusCode::CONFLICT
    );

    handler
        .load_startup(SAMPLE_DATA.as_bytes(), Format::Json)
        .unwrap();
    let response = handler.handle_data(&request);
    assert_eq!(response.status, StatusCode::OK);
}

#[test]
fn test_yaml_round_trip_through_handler() {
    let schema = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
    let handler =
        RequestHandler::new(&schema, Datastore::new(Arc::clone(&schema.data))).unwrap();
    let yaml = b"modules-state:\n  module:\n    - name: a\n      revision: '1'\n      namespace: urn:a\n";
    handler.load_startup(yaml, Format::Yaml).unwrap();

    let request =
        RestRequest::get("modules-state/module=a,1/namespace").with_accept("text/yaml");
    let response = handler.handle_data(&request);
    assert_eq!(response.status, StatusCode::OK);
    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("namespace: urn:a"));
}
