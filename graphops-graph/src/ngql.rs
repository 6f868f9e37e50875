//! nGQL statement assembly.
//!
//! Everything the platform ever says to NebulaGraph is built here, as
//! single-line statements with every user-supplied string escaped and
//! single-quoted. Vertex ids go to the store in their bare 32-hex form.
//!
//! Reserved-word policy: property names are fixed by this module, and
//! names colliding with store reserved words are renamed at this
//! boundary - the event timestamp is stored as `ts` (not `timestamp`)
//! and the event description as `descr` (not `desc`). A test pins the
//! full property vocabulary against the reserved list.
//!
//! `valid_to IS NULL` cannot be expressed in a LOOKUP filter, so
//! open-assertion queries fetch candidate rows and the gateway filters
//! open records in memory.

use chrono::{DateTime, Utc};

use graphops_core::id::storage_form;
use graphops_core::{AssertionRecord, ChangeEvent, Entity, ImportRun, PropertyValue, Source};

/// Store reserved words our property vocabulary must avoid.
pub const RESERVED_WORDS: &[&str] = &["timestamp", "desc", "date", "time", "datetime", "tag"];

/// Escape and single-quote a string value.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn fmt_dt(dt: DateTime<Utc>) -> String {
    format!("datetime(\"{}\")", dt.format("%Y-%m-%dT%H:%M:%S%.6f"))
}

fn fmt_opt_dt(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => fmt_dt(dt),
        None => "NULL".to_string(),
    }
}

fn fmt_opt_str(value: Option<&str>) -> String {
    match value {
        Some(s) => escape(s),
        None => "NULL".to_string(),
    }
}

/// Optional id-valued property: stored bare (prefix stripped).
fn fmt_opt_id(value: Option<&str>) -> String {
    match value {
        Some(s) => escape(storage_form(s)),
        None => "NULL".to_string(),
    }
}

// --- Entity ---

pub fn insert_entity(e: &Entity) -> String {
    format!(
        "INSERT VERTEX Entity(workspace_id, entity_type, primary_key, display_name, \
         created_at, updated_at) VALUES {}:({}, {}, {}, {}, {}, {});",
        escape(storage_form(&e.entity_id)),
        escape(&e.workspace_id),
        escape(&e.entity_type),
        escape(&e.primary_key),
        fmt_opt_str(e.display_name.as_deref()),
        fmt_dt(e.created_at),
        fmt_dt(e.updated_at),
    )
}

const ENTITY_YIELD: &str = "YIELD id(vertex) AS vid, Entity.workspace_id AS workspace_id, \
     Entity.entity_type AS entity_type, Entity.primary_key AS primary_key, \
     Entity.display_name AS display_name, Entity.created_at AS created_at, \
     Entity.updated_at AS updated_at";

pub fn lookup_entity(workspace_id: &str, entity_type: &str, primary_key: &str) -> String {
    format!(
        "LOOKUP ON Entity WHERE Entity.workspace_id == {} AND Entity.entity_type == {} \
         AND Entity.primary_key == {} {ENTITY_YIELD};",
        escape(workspace_id),
        escape(entity_type),
        escape(primary_key),
    )
}

pub fn fetch_entity(entity_id: &str) -> String {
    format!(
        "FETCH PROP ON Entity {} {ENTITY_YIELD};",
        escape(storage_form(entity_id))
    )
}

pub fn search_entities(
    workspace_id: &str,
    entity_type: Option<&str>,
    primary_key: Option<&str>,
    limit: usize,
) -> String {
    let mut conditions = vec![format!("Entity.workspace_id == {}", escape(workspace_id))];
    if let Some(t) = entity_type {
        conditions.push(format!("Entity.entity_type == {}", escape(t)));
    }
    if let Some(pk) = primary_key {
        conditions.push(format!("Entity.primary_key == {}", escape(pk)));
    }
    format!(
        "LOOKUP ON Entity WHERE {} {ENTITY_YIELD} | LIMIT {limit};",
        conditions.join(" AND "),
    )
}

// --- AssertionRecord ---

pub fn insert_assertion(a: &AssertionRecord) -> String {
    format!(
        "INSERT VERTEX AssertionRecord(workspace_id, assertion_key, relationship_type, \
         property_key, raw_hash, normalized_hash, source_type, source_ref, source_id, \
         import_run_id, recorded_at, valid_from, valid_to, scenario_id, confidence, supersedes) \
         VALUES {}:({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        escape(storage_form(&a.assertion_id)),
        escape(&a.workspace_id),
        escape(&a.assertion_key),
        escape(&a.relationship_type),
        fmt_opt_str(a.property_key.as_deref()),
        escape(&a.raw_hash),
        escape(&a.normalized_hash),
        escape(a.source_type.as_str()),
        fmt_opt_str(a.source_ref.as_deref()),
        fmt_opt_id(a.source_id.as_deref()),
        fmt_opt_id(a.import_run_id.as_deref()),
        fmt_dt(a.recorded_at),
        fmt_dt(a.valid_from),
        fmt_opt_dt(a.valid_to),
        escape(&a.scenario_id),
        a.confidence,
        fmt_opt_id(a.supersedes.as_deref()),
    )
}

pub fn close_assertion(assertion_id: &str, valid_to: DateTime<Utc>) -> String {
    format!(
        "UPDATE VERTEX ON AssertionRecord {} SET valid_to = {};",
        escape(storage_form(assertion_id)),
        fmt_dt(valid_to),
    )
}

pub fn delete_vertex(vertex_id: &str) -> String {
    format!("DELETE VERTEX {} WITH EDGE;", escape(storage_form(vertex_id)))
}

pub fn lookup_assertion_vids_by_key(
    workspace_id: &str,
    assertion_key: &str,
    scenario_id: &str,
) -> String {
    format!(
        "LOOKUP ON AssertionRecord WHERE AssertionRecord.workspace_id == {} \
         AND AssertionRecord.assertion_key == {} AND AssertionRecord.scenario_id == {} \
         YIELD id(vertex) AS vid;",
        escape(workspace_id),
        escape(assertion_key),
        escape(scenario_id),
    )
}

pub fn lookup_assertion_vids_by_run(import_run_id: &str) -> String {
    format!(
        "LOOKUP ON AssertionRecord WHERE AssertionRecord.import_run_id == {} \
         YIELD id(vertex) AS vid;",
        escape(storage_form(import_run_id)),
    )
}

pub fn fetch_assertions(assertion_ids: &[String]) -> String {
    let vids: Vec<String> = assertion_ids
        .iter()
        .map(|id| escape(storage_form(id)))
        .collect();
    format!(
        "FETCH PROP ON AssertionRecord {} YIELD id(vertex) AS vid, \
         AssertionRecord.workspace_id AS workspace_id, \
         AssertionRecord.assertion_key AS assertion_key, \
         AssertionRecord.relationship_type AS relationship_type, \
         AssertionRecord.property_key AS property_key, \
         AssertionRecord.raw_hash AS raw_hash, \
         AssertionRecord.normalized_hash AS normalized_hash, \
         AssertionRecord.source_type AS source_type, \
         AssertionRecord.source_ref AS source_ref, \
         AssertionRecord.source_id AS source_id, \
         AssertionRecord.import_run_id AS import_run_id, \
         AssertionRecord.recorded_at AS recorded_at, \
         AssertionRecord.valid_from AS valid_from, \
         AssertionRecord.valid_to AS valid_to, \
         AssertionRecord.scenario_id AS scenario_id, \
         AssertionRecord.confidence AS confidence, \
         AssertionRecord.supersedes AS supersedes;",
        vids.join(", "),
    )
}

// --- edges ---

pub fn insert_asserted_rel(from_id: &str, to_id: &str, assertion_id: &str) -> String {
    format!(
        "INSERT EDGE ASSERTED_REL(assertion_id) VALUES {}->{}:({});",
        escape(storage_form(from_id)),
        escape(storage_form(to_id)),
        escape(storage_form(assertion_id)),
    )
}

pub fn insert_event_link(edge_name: &str, change_event_id: &str, target_id: &str) -> String {
    format!(
        "INSERT EDGE {edge_name}() VALUES {}->{}:();",
        escape(storage_form(change_event_id)),
        escape(storage_form(target_id)),
    )
}

/// Outbound ASSERTED_REL traversal: from an entity this yields its
/// subject assertions; from an assertion it yields the object vertex.
pub fn go_out_asserted(vertex_id: &str) -> String {
    format!(
        "GO FROM {} OVER ASSERTED_REL YIELD dst(edge) AS dst;",
        escape(storage_form(vertex_id)),
    )
}

pub fn go_event_links(change_event_id: &str, edge_name: &str) -> String {
    format!(
        "GO FROM {} OVER {edge_name} YIELD dst(edge) AS dst;",
        escape(storage_form(change_event_id)),
    )
}

/// Incoming CREATED_ASSERTION edges of an assertion (visibility check).
pub fn go_created_by(assertion_id: &str) -> String {
    format!(
        "GO FROM {} OVER CREATED_ASSERTION REVERSELY YIELD src(edge) AS src;",
        escape(storage_form(assertion_id)),
    )
}

// --- PropertyValue ---

pub fn insert_property_value(pv: &PropertyValue) -> String {
    format!(
        "INSERT VERTEX PropertyValue(workspace_id, property_key, value, value_type) \
         VALUES {}:({}, {}, {}, {});",
        escape(storage_form(&pv.property_value_id)),
        escape(&pv.workspace_id),
        escape(&pv.property_key),
        fmt_opt_str(pv.value.as_deref()),
        escape(pv.value_type.as_str()),
    )
}

pub fn fetch_property_value(property_value_id: &str) -> String {
    format!(
        "FETCH PROP ON PropertyValue {} YIELD id(vertex) AS vid, \
         PropertyValue.workspace_id AS workspace_id, \
         PropertyValue.property_key AS property_key, \
         PropertyValue.value AS value, PropertyValue.value_type AS value_type;",
        escape(storage_form(property_value_id)),
    )
}

// --- ChangeEvent ---

pub fn insert_change_event(e: &ChangeEvent, stats_json: &str) -> String {
    format!(
        "INSERT VERTEX ChangeEvent(workspace_id, event_type, ts, actor, stats, descr, \
         import_run_id) VALUES {}:({}, {}, {}, {}, {}, {}, {});",
        escape(storage_form(&e.change_event_id)),
        escape(&e.workspace_id),
        escape(e.event_type.as_str()),
        fmt_dt(e.ts),
        escape(&e.actor),
        escape(stats_json),
        escape(&e.descr),
        fmt_opt_id(e.import_run_id.as_deref()),
    )
}

pub fn lookup_change_event_by_run(workspace_id: &str, import_run_id: &str) -> String {
    format!(
        "LOOKUP ON ChangeEvent WHERE ChangeEvent.workspace_id == {} \
         AND ChangeEvent.import_run_id == {} YIELD id(vertex) AS vid;",
        escape(workspace_id),
        escape(storage_form(import_run_id)),
    )
}

pub fn fetch_change_event(change_event_id: &str) -> String {
    format!(
        "FETCH PROP ON ChangeEvent {} YIELD id(vertex) AS vid, \
         ChangeEvent.workspace_id AS workspace_id, ChangeEvent.event_type AS event_type, \
         ChangeEvent.ts AS ts, ChangeEvent.actor AS actor, ChangeEvent.stats AS stats, \
         ChangeEvent.descr AS descr, ChangeEvent.import_run_id AS import_run_id;",
        escape(storage_form(change_event_id)),
    )
}

// --- ImportRun ---

pub fn insert_import_run(r: &ImportRun, stats_json: Option<&str>) -> String {
    format!(
        "INSERT VERTEX ImportRun(workspace_id, spec_name, source_filename, started_at, \
         finished_at, status, stats, error_message) VALUES {}:({}, {}, {}, {}, {}, {}, {}, {});",
        escape(storage_form(&r.import_run_id)),
        escape(&r.workspace_id),
        escape(&r.spec_name),
        escape(&r.source_filename),
        fmt_dt(r.started_at),
        fmt_opt_dt(r.finished_at),
        escape(r.status.as_str()),
        fmt_opt_str(stats_json),
        fmt_opt_str(r.error_message.as_deref()),
    )
}

pub fn update_import_run(r: &ImportRun, stats_json: Option<&str>) -> String {
    format!(
        "UPDATE VERTEX ON ImportRun {} SET status = {}, finished_at = {}, stats = {}, \
         error_message = {};",
        escape(storage_form(&r.import_run_id)),
        escape(r.status.as_str()),
        fmt_opt_dt(r.finished_at),
        fmt_opt_str(stats_json),
        fmt_opt_str(r.error_message.as_deref()),
    )
}

const IMPORT_RUN_YIELD: &str = "YIELD id(vertex) AS vid, ImportRun.workspace_id AS workspace_id, \
     ImportRun.spec_name AS spec_name, ImportRun.source_filename AS source_filename, \
     ImportRun.started_at AS started_at, ImportRun.finished_at AS finished_at, \
     ImportRun.status AS status, ImportRun.stats AS stats, \
     ImportRun.error_message AS error_message";

pub fn fetch_import_run(import_run_id: &str) -> String {
    format!(
        "FETCH PROP ON ImportRun {} {IMPORT_RUN_YIELD};",
        escape(storage_form(import_run_id)),
    )
}

pub fn lookup_import_runs(workspace_id: &str) -> String {
    format!(
        "LOOKUP ON ImportRun WHERE ImportRun.workspace_id == {} {IMPORT_RUN_YIELD};",
        escape(workspace_id),
    )
}

pub fn lookup_import_runs_by_spec(workspace_id: &str, spec_name: &str) -> String {
    format!(
        "LOOKUP ON ImportRun WHERE ImportRun.workspace_id == {} \
         AND ImportRun.spec_name == {} {IMPORT_RUN_YIELD};",
        escape(workspace_id),
        escape(spec_name),
    )
}

// --- Source ---

pub fn insert_source(s: &Source, domains_json: &str) -> String {
    format!(
        "INSERT VERTEX Source(workspace_id, source_name, source_type, authority_rank, \
         authority_domains) VALUES {}:({}, {}, {}, {}, {});",
        escape(storage_form(&s.source_id)),
        escape(&s.workspace_id),
        escape(&s.source_name),
        escape(s.source_type.as_str()),
        s.authority_rank,
        escape(domains_json),
    )
}

const SOURCE_YIELD: &str = "YIELD id(vertex) AS vid, Source.workspace_id AS workspace_id, \
     Source.source_name AS source_name, Source.source_type AS source_type, \
     Source.authority_rank AS authority_rank, Source.authority_domains AS authority_domains";

pub fn lookup_source_by_name(workspace_id: &str, source_name: &str) -> String {
    format!(
        "LOOKUP ON Source WHERE Source.workspace_id == {} AND Source.source_name == {} \
         {SOURCE_YIELD};",
        escape(workspace_id),
        escape(source_name),
    )
}

pub fn lookup_sources(workspace_id: &str) -> String {
    format!(
        "LOOKUP ON Source WHERE Source.workspace_id == {} {SOURCE_YIELD};",
        escape(workspace_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use graphops_core::{id, IdKind, SourceType};

    #[test]
    fn escaping_quotes_backslashes_and_newlines() {
        assert_eq!(escape("plain"), "'plain'");
        assert_eq!(escape("it's"), r"'it\'s'");
        assert_eq!(escape(r"a\b"), r"'a\\b'");
        assert_eq!(escape("a\nb"), r"'a\nb'");
    }

    #[test]
    fn statements_are_single_line() {
        let stmt = lookup_entity("w1", "Location", "1001");
        assert!(!stmt.contains('\n'));
        assert!(stmt.ends_with(';'));
    }

    #[test]
    fn vertex_ids_are_stored_bare() {
        let id = id::mint(IdKind::Entity);
        let stmt = fetch_entity(&id);
        assert!(!stmt.contains("entity_"), "prefix must be stripped: {stmt}");
        assert!(stmt.contains(id::storage_form(&id)));
    }

    #[test]
    fn injection_attempts_stay_quoted() {
        let stmt = lookup_entity("w1", "Location", "x'; DROP SPACE graphops; #");
        assert!(stmt.contains(r"'x\'; DROP SPACE graphops; #'"));
    }

    #[test]
    fn property_vocabulary_avoids_reserved_words() {
        // every property name appearing in INSERT statements
        let vocab = [
            "workspace_id", "entity_type", "primary_key", "display_name", "created_at",
            "updated_at", "assertion_key", "relationship_type", "property_key", "raw_hash",
            "normalized_hash", "source_type", "source_ref", "source_id", "import_run_id",
            "recorded_at", "valid_from", "valid_to", "scenario_id", "confidence", "supersedes",
            "value", "value_type", "event_type", "ts", "actor", "stats", "descr", "spec_name",
            "source_filename", "started_at", "finished_at", "status", "error_message",
            "source_name", "authority_rank", "authority_domains", "assertion_id",
        ];
        for name in vocab {
            assert!(
                !RESERVED_WORDS.contains(&name),
                "property '{name}' collides with a store reserved word"
            );
        }
    }

    #[test]
    fn null_and_datetime_formatting() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap();
        assert_eq!(fmt_dt(dt), "datetime(\"2024-06-01T10:30:00.000000\")");
        assert_eq!(fmt_opt_dt(None), "NULL");
        assert_eq!(fmt_opt_str(None), "NULL");
    }

    #[test]
    fn source_insert_carries_rank_unquoted() {
        let s = Source {
            source_id: id::mint(IdKind::Source),
            workspace_id: "w1".into(),
            source_name: "facilities".into(),
            source_type: SourceType::Spreadsheet,
            authority_rank: 2,
            authority_domains: vec!["Location".into()],
        };
        let stmt = insert_source(&s, "[\"Location\"]");
        assert!(stmt.contains(", 2, "));
        assert!(stmt.contains("'spreadsheet'"));
    }
}
