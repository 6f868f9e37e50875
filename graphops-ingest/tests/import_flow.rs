//! End-to-end import scenarios against the memory gateway.

mod support;

use chrono::Utc;
use graphops_core::id::mint;
use graphops_core::model::BASE_SCENARIO;
use graphops_core::{
    AssertionRecord, IdKind, ImportRun, ImportStatus, PropertyValue, SourceType, ValueType,
    HAS_PROPERTY,
};
use graphops_graph::{EventLink, GraphGateway};
use support::{connections_spec, harness, locations_spec, schema, write_csv};

const ACTOR: &str = "system:import";

#[tokio::test]
async fn first_import_creates_entities_values_and_assertions() {
    let h = harness();
    let file = write_csv(
        h.dir.path(),
        "locations.csv",
        &["loc_id,region", "1001,east", "1002,west", "1003,east"],
    );

    let outcome = h
        .importer
        .run_import(&schema(), &locations_spec("normalized"), &file, ACTOR)
        .await
        .unwrap();

    assert_eq!(outcome.stats.entities_created, 3);
    assert_eq!(outcome.stats.created, 3);
    assert_eq!(outcome.stats.closed, 0);
    assert_eq!(outcome.stats.unchanged, 0);
    assert_eq!(outcome.run.status, ImportStatus::Ok);
    assert!(outcome.run.finished_at.is_some());

    // one open property assertion per location, wired to a value vertex
    for (pk, region) in [("1001", "east"), ("1002", "west"), ("1003", "east")] {
        let key = format!("datacenter:Location:{pk}:prop:region");
        let open = h
            .gateway
            .open_assertions_for_key("datacenter", &key, BASE_SCENARIO)
            .await
            .unwrap();
        assert_eq!(open.len(), 1, "expected one open assertion for {key}");
        let record = &open[0];
        assert_eq!(record.relationship_type, HAS_PROPERTY);
        assert_eq!(record.source_type, SourceType::Spreadsheet);
        assert!(record.source_id.is_some());
        let pv = h
            .gateway
            .property_value_for_assertion("datacenter", &record.assertion_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pv.value.as_deref(), Some(region));
    }

    // exactly one change event, linked to the run, with 3 created edges
    let event = h
        .gateway
        .change_event_for_import_run("datacenter", &outcome.run.import_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.change_event_id, outcome.change_event_id);
    assert_eq!(event.stats.created, 3);
    let created = h
        .gateway
        .event_assertions("datacenter", &event.change_event_id, EventLink::Created)
        .await
        .unwrap();
    assert_eq!(created.len(), 3);
}

#[tokio::test]
async fn reimport_of_unchanged_file_is_idempotent() {
    let h = harness();
    let file = write_csv(
        h.dir.path(),
        "locations.csv",
        &["loc_id,region", "1001,east", "1002,west", "1003,east"],
    );
    let spec = locations_spec("normalized");

    let first = h
        .importer
        .run_import(&schema(), &spec, &file, ACTOR)
        .await
        .unwrap();
    assert_eq!(first.stats.created, 3);

    let second = h
        .importer
        .run_import(&schema(), &spec, &file, ACTOR)
        .await
        .unwrap();
    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.closed, 0);
    assert_eq!(second.stats.unchanged, 3);
    assert_eq!(second.stats.entities_created, 0);
    assert_eq!(second.stats.entities_existing, 3);

    // zero-effect runs still record a change event for the audit trail
    let event = h
        .gateway
        .change_event_for_import_run("datacenter", &second.run.import_run_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.stats.unchanged, 3);
    assert!(h
        .gateway
        .event_assertions("datacenter", &event.change_event_id, EventLink::Created)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn case_change_closes_under_strict_and_keeps_under_normalized() {
    // strict mode: WEST vs west is a change
    let h = harness();
    let v1 = write_csv(
        h.dir.path(),
        "v1.csv",
        &["loc_id,region", "1001,east", "1002,west", "1003,east"],
    );
    let v2 = write_csv(
        h.dir.path(),
        "v2.csv",
        &["loc_id,region", "1001,east", "1002,WEST", "1003,east"],
    );
    let strict = locations_spec("strict");

    h.importer
        .run_import(&schema(), &strict, &v1, ACTOR)
        .await
        .unwrap();
    let outcome = h
        .importer
        .run_import(&schema(), &strict, &v2, ACTOR)
        .await
        .unwrap();
    assert_eq!(outcome.stats.closed, 1);
    assert_eq!(outcome.stats.created, 1);
    assert_eq!(outcome.stats.unchanged, 2);

    // the replacement records what it supersedes
    let open = h
        .gateway
        .open_assertions_for_key("datacenter", "datacenter:Location:1002:prop:region", BASE_SCENARIO)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert!(open[0].supersedes.is_some());

    // normalized mode: the same edit is no change at all
    let h = harness();
    let normalized = locations_spec("normalized");
    h.importer
        .run_import(&schema(), &normalized, &v1, ACTOR)
        .await
        .unwrap();
    let outcome = h
        .importer
        .run_import(&schema(), &normalized, &v2, ACTOR)
        .await
        .unwrap();
    assert_eq!(outcome.stats.created, 0);
    assert_eq!(outcome.stats.closed, 0);
    assert_eq!(outcome.stats.unchanged, 3);
}

#[tokio::test]
async fn disappeared_rows_close_assertions_but_keep_entities() {
    let h = harness();
    let v1 = write_csv(
        h.dir.path(),
        "v1.csv",
        &["loc_id,region", "1001,east", "1002,west", "1003,east"],
    );
    let v2 = write_csv(h.dir.path(), "v2.csv", &["loc_id,region", "1001,east", "1002,west"]);
    let spec = locations_spec("normalized");

    h.importer
        .run_import(&schema(), &spec, &v1, ACTOR)
        .await
        .unwrap();
    let outcome = h
        .importer
        .run_import(&schema(), &spec, &v2, ACTOR)
        .await
        .unwrap();

    assert_eq!(outcome.stats.created, 0);
    assert_eq!(outcome.stats.closed, 1);
    assert_eq!(outcome.stats.unchanged, 2);

    let open = h
        .gateway
        .open_assertions_for_key("datacenter", "datacenter:Location:1003:prop:region", BASE_SCENARIO)
        .await
        .unwrap();
    assert!(open.is_empty(), "1003's region claim must be closed");

    // entities are never deleted
    let entity = h
        .gateway
        .find_entity("datacenter", "Location", "1003")
        .await
        .unwrap();
    assert!(entity.is_some());

    let closed = h
        .gateway
        .event_assertions("datacenter", &outcome.change_event_id, EventLink::Closed)
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert!(closed[0].valid_to.is_some());
}

#[tokio::test]
async fn claims_from_different_sources_coexist() {
    let h = harness();
    let file_a = write_csv(h.dir.path(), "a.csv", &["conn_id,speed", "c1,10G"]);
    let file_b = write_csv(h.dir.path(), "b.csv", &["conn_id,speed", "c1,25G"]);

    h.importer
        .run_import(
            &schema(),
            &connections_spec("conn_a", "vendor_a", 1),
            &file_a,
            ACTOR,
        )
        .await
        .unwrap();
    let outcome_b = h
        .importer
        .run_import(
            &schema(),
            &connections_spec("conn_b", "vendor_b", 2),
            &file_b,
            ACTOR,
        )
        .await
        .unwrap();

    // the second import must not close the first source's claim
    assert_eq!(outcome_b.stats.closed, 0);
    assert_eq!(outcome_b.stats.created, 1);
    let open = h
        .gateway
        .open_assertions_for_key("datacenter", "datacenter:Connection:c1:prop:speed", BASE_SCENARIO)
        .await
        .unwrap();
    assert_eq!(open.len(), 2, "competing claims stay open side by side");
    let sources: Vec<_> = open.iter().filter_map(|a| a.source_id.clone()).collect();
    assert_eq!(sources.len(), 2);
    assert_ne!(sources[0], sources[1]);
}

#[tokio::test]
async fn failed_run_is_recorded_and_orphans_are_reaped() {
    let h = harness();
    let spec = locations_spec("normalized");

    // a missing file fails the import after the run record is opened
    let missing = h.dir.path().join("nope.csv");
    let err = h
        .importer
        .run_import(&schema(), &spec, &missing, ACTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");
    let runs = h.gateway.list_import_runs("datacenter", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ImportStatus::Failed);
    assert!(runs[0].error_message.is_some());

    // simulate a crash mid-import: an assertion exists under a failed
    // run with no change-event edge reaching it
    let failed_run_id = runs[0].import_run_id.clone();
    let now = Utc::now();
    let entity = graphops_core::Entity {
        entity_id: mint(IdKind::Entity),
        workspace_id: "datacenter".into(),
        entity_type: "Location".into(),
        primary_key: "1001".into(),
        display_name: Some("east".into()),
        created_at: now,
        updated_at: now,
    };
    h.gateway.insert_entity(&entity).await.unwrap();
    let pv = PropertyValue {
        property_value_id: mint(IdKind::PropertyValue),
        workspace_id: "datacenter".into(),
        property_key: "region".into(),
        value: Some("stale".into()),
        value_type: ValueType::String,
    };
    h.gateway.insert_property_value(&pv).await.unwrap();
    let orphan = AssertionRecord {
        assertion_id: mint(IdKind::Assertion),
        workspace_id: "datacenter".into(),
        assertion_key: "datacenter:Location:1001:prop:region".into(),
        relationship_type: HAS_PROPERTY.into(),
        property_key: Some("region".into()),
        raw_hash: "x".into(),
        normalized_hash: "x".into(),
        source_type: SourceType::Spreadsheet,
        source_ref: None,
        source_id: None,
        import_run_id: Some(failed_run_id),
        recorded_at: now,
        valid_from: now,
        valid_to: None,
        scenario_id: BASE_SCENARIO.into(),
        confidence: 1.0,
        supersedes: None,
    };
    h.gateway
        .insert_assertion(&orphan, &entity.entity_id, &pv.property_value_id)
        .await
        .unwrap();

    // the next import for the same spec reaps it before doing anything
    let file = write_csv(h.dir.path(), "locations.csv", &["loc_id,region", "1001,east"]);
    let outcome = h
        .importer
        .run_import(&schema(), &spec, &file, ACTOR)
        .await
        .unwrap();
    assert_eq!(outcome.stats.created, 1);

    let open = h
        .gateway
        .open_assertions_for_key("datacenter", "datacenter:Location:1001:prop:region", BASE_SCENARIO)
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_ne!(open[0].assertion_id, orphan.assertion_id, "orphan must be gone");
}

#[tokio::test]
async fn null_tokens_produce_no_assertion() {
    let h = harness();
    let file = write_csv(
        h.dir.path(),
        "locations.csv",
        &["loc_id,region", "1001,N/A", "1002,west"],
    );
    let outcome = h
        .importer
        .run_import(&schema(), &locations_spec("normalized"), &file, ACTOR)
        .await
        .unwrap();

    // both entities exist, but only 1002 carries a region claim
    assert_eq!(outcome.stats.entities_created, 2);
    assert_eq!(outcome.stats.created, 1);
    let open = h
        .gateway
        .open_assertions_for_key("datacenter", "datacenter:Location:1001:prop:region", BASE_SCENARIO)
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn workspace_mismatch_is_rejected_before_any_write() {
    let h = harness();
    let file = write_csv(h.dir.path(), "locations.csv", &["loc_id,region", "1001,east"]);
    let other_schema = graphops_spec::DomainSchema::from_yaml(
        r#"
workspace: other
version: "1"
entity_types:
  Location:
    primary_key: loc_id
    properties:
      loc_id: { type: string }
"#,
    )
    .unwrap();

    let err = h
        .importer
        .run_import(&other_schema, &locations_spec("normalized"), &file, ACTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");
    let runs: Vec<ImportRun> = h.gateway.list_import_runs("datacenter", 10).await.unwrap();
    assert!(runs.is_empty(), "validation failures must not open a run");
}
