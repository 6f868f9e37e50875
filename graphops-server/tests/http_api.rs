//! HTTP-level integration tests against the memory-backed server.

use std::sync::Arc;

use axum::body::Body;
use graphops_server::{routes::build_router, AppState, GraphMode, ServerConfig};
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value as JsonValue;
use tempfile::TempDir;
use tower::ServiceExt;

const SCHEMA_YAML: &str = r#"
workspace: datacenter
version: "1"
entity_types:
  Location:
    primary_key: loc_id
    properties:
      loc_id: { type: string, required: true }
      region: { type: string }
"#;

const SPEC_YAML: &str = r#"
spec_name: locations_v1
spec_version: "1"
workspace_id: datacenter
raw_hash_serialization:
  cell_order: column_order
  delimiter: "|"
  null_representation: "<NULL>"
  number_format: as_displayed
  date_format: as_displayed
  include_formatting: false
change_detection:
  mode: normalized
  normalization_rules:
    trim_whitespace: true
    lowercase_strings: true
    normalize_nulls: [""]
source_authority:
  source_name: facilities_sheet
  authority_rank: 1
  authority_domains: [Location]
sheets:
  - sheet_name: locations
    entities:
      location:
        entity_type: Location
        key_columns: [loc_id]
        key_template: "{loc_id}"
        properties:
          - { source_column: region, target_property: region }
"#;

fn test_state() -> (TempDir, Arc<AppState>) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let schemas_dir = tmp.path().join("schemas");
    let specs_dir = tmp.path().join("specs");
    std::fs::create_dir_all(&schemas_dir).unwrap();
    std::fs::create_dir_all(&specs_dir).unwrap();
    std::fs::write(schemas_dir.join("datacenter.yaml"), SCHEMA_YAML).unwrap();
    std::fs::write(specs_dir.join("locations_v1.yaml"), SPEC_YAML).unwrap();

    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        graph: GraphMode::Memory,
        nebula_gateway_url: "http://127.0.0.1:8080".into(),
        nebula_graphd_host: "127.0.0.1".into(),
        nebula_graphd_port: 9669,
        nebula_user: "root".into(),
        nebula_password: "nebula".into(),
        nebula_space: "graphops".into(),
        vector_addr: None,
        queue_addr: None,
        schemas_dir,
        specs_dir,
        upload_dir: tmp.path().join("uploads"),
        cors_enabled: false,
    };
    let state = Arc::new(AppState::new(config).expect("AppState::new"));
    (tmp, state)
}

async fn json_body(resp: http::Response<Body>) -> (StatusCode, JsonValue) {
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    let json: JsonValue = serde_json::from_slice(&bytes).expect("valid JSON response");
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_import(uri: &str, spec_name: &str, filename: &str, csv: &str) -> Request<Body> {
    let boundary = "graphops-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"spec_name\"\r\n\r\n\
         {spec_name}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_services() {
    let (_tmp, state) = test_state();
    let app = build_router(state);

    let (status, json) = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["services"]["graph"], "ok");
    assert_eq!(json["services"]["vector"], "unconfigured");
    assert_eq!(json["services"]["queue"], "unconfigured");
}

#[tokio::test]
async fn workspace_listing_and_creation() {
    let (_tmp, state) = test_state();
    let app = build_router(state);

    let (status, json) = json_body(app.clone().oneshot(get("/workspaces")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["workspaces"][0]["workspace_id"], "datacenter");

    let create = Request::builder()
        .method("POST")
        .uri("/workspaces")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "id": "lab",
                "schema_yaml": "workspace: lab\nversion: \"1\"\nentity_types:\n  Device:\n    primary_key: id\n    properties:\n      id: { type: string }\n",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, json) = json_body(app.clone().oneshot(create).await.unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["workspace_id"], "lab");

    // duplicate creation conflicts, with the machine-readable code
    let duplicate = Request::builder()
        .method("POST")
        .uri("/workspaces")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "id": "lab",
                "schema_yaml": "workspace: lab\nversion: \"1\"\nentity_types:\n  Device:\n    primary_key: id\n    properties:\n      id: { type: string }\n",
            })
            .to_string(),
        ))
        .unwrap();
    let (status, json) = json_body(app.oneshot(duplicate).await.unwrap()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "conflict");
}

#[tokio::test]
async fn schema_endpoint_and_not_found_shape() {
    let (_tmp, state) = test_state();
    let app = build_router(state);

    let (status, json) =
        json_body(app.clone().oneshot(get("/w/datacenter/schema")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["workspace"], "datacenter");
    assert!(json["entity_types"]["Location"].is_object());

    let (status, json) = json_body(app.oneshot(get("/w/ghost/schema")).await.unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn import_search_and_detail_flow() {
    let (_tmp, state) = test_state();
    let app = build_router(state);

    // upload + synchronous import
    let import = multipart_import(
        "/w/datacenter/imports",
        "locations_v1",
        "locations.csv",
        "loc_id,region\n1001,east\n1002,west\n1003,east",
    );
    let (status, json) = json_body(app.clone().oneshot(import).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK, "import failed: {json}");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["stats"]["created"], 3);
    let run_id = json["import_run_id"].as_str().unwrap().to_string();

    // run status + counters
    let (status, json) = json_body(
        app.clone()
            .oneshot(get(&format!("/w/datacenter/imports/{run_id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["stats"]["created"], 3);

    // diff lists the created assertions
    let (status, json) = json_body(
        app.clone()
            .oneshot(get(&format!("/w/datacenter/imports/{run_id}/diff")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["created_assertions"].as_array().unwrap().len(), 3);

    // search by display-name substring
    let (status, json) = json_body(
        app.clone()
            .oneshot(get("/w/datacenter/entities/search?q=east"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);

    // resolved detail for one entity
    let (_, json) = json_body(
        app.clone()
            .oneshot(get("/w/datacenter/entities/search?primary_key=1002"))
            .await
            .unwrap(),
    )
    .await;
    let entity_id = json["entities"][0]["entity_id"].as_str().unwrap().to_string();
    let (status, json) = json_body(
        app.clone()
            .oneshot(get(&format!(
                "/w/datacenter/entities/{entity_id}?view_mode=resolved"
            )))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["primary_key"], "1002");
    assert_eq!(json["properties"][0]["property_key"], "region");
    assert_eq!(json["properties"][0]["value"], "west");
    assert_eq!(json["properties"][0]["is_winner"], true);

    // unknown entity id is a 404 with the error envelope
    let (status, json) = json_body(
        app.oneshot(get(
            "/w/datacenter/entities/entity_00000000000000000000000000000000",
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn import_with_unknown_spec_is_a_validation_error() {
    let (_tmp, state) = test_state();
    let app = build_router(state);

    let import = multipart_import(
        "/w/datacenter/imports",
        "missing_spec",
        "locations.csv",
        "loc_id,region\n1001,east",
    );
    let (status, json) = json_body(app.oneshot(import).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "validation");
}
