//! End-to-end flows through the engine facade.
//!
//! These run the whole pipeline against the in-memory store: records
//! enter through CRUD or CSV import and come back out through
//! listing, export, and order tracking.

use std::sync::Arc;

use serde_json::{json, Map, Value as Json};

use trellis_common::{TrellisError, Value, MAX_SUGGESTIONS};
use trellis_engine::{Engine, RecordQuery, TrackOptions};
use trellis_schema::production_catalog;
use trellis_store::MemoryStore;

fn engine() -> Engine {
    let registry = Arc::new(production_catalog());
    let store = Arc::new(MemoryStore::new(Arc::clone(&registry)));
    Engine::new(registry, store)
}

fn stage_body(order: &str, machine: &str) -> Map<String, Json> {
    json!({
        "order_number": order,
        "batch_number": "B-7",
        "machine": machine,
        "customer_name": "Acme Films",
        "operator_name": "Priya",
        "date": "2024-06-15",
        "quantity": "250",
    })
    .as_object()
    .unwrap()
    .clone()
}

#[tokio::test]
async fn test_paging_covers_every_record_exactly_once() {
    let engine = engine();
    let records = engine.records();
    for i in 1..=23 {
        records
            .create("cutting", &stage_body(&format!("ORD-{i:03}"), "M1"))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut page = 1;
    loop {
        let result = records
            .list(
                "cutting",
                &RecordQuery::default().with_page(page).with_limit(5),
            )
            .await
            .unwrap();
        assert_eq!(result.pagination.total, 23);
        assert_eq!(result.pagination.total_pages, 5);
        if result.records.is_empty() {
            break;
        }
        for rec in &result.records {
            seen.push(rec.get("id").cloned().unwrap());
        }
        page += 1;
    }

    assert_eq!(seen.len(), 23);
    let mut deduped = seen.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), 23);
}

#[tokio::test]
async fn test_filter_and_search_combine() {
    let engine = engine();
    let records = engine.records();
    records
        .create("cutting", &stage_body("ORD-A1", "M1"))
        .await
        .unwrap();
    records
        .create("cutting", &stage_body("ORD-A2", "M2"))
        .await
        .unwrap();
    records
        .create("cutting", &stage_body("XYZ-9", "M1"))
        .await
        .unwrap();

    let page = records
        .list(
            "cutting",
            &RecordQuery::default()
                .with_filter("machine", json!("M1"))
                .with_search("ORD"),
        )
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 1);
    assert_eq!(
        page.records[0].get("order_number"),
        Some(&Value::String("ORD-A1".into()))
    );
}

#[tokio::test]
async fn test_adding_filters_never_increases_total() {
    let engine = engine();
    let records = engine.records();
    for i in 1..=6 {
        let machine = if i % 2 == 0 { "M1" } else { "M2" };
        records
            .create("cutting", &stage_body(&format!("ORD-{i}"), machine))
            .await
            .unwrap();
    }
    records
        .create("cutting", &stage_body("XYZ-1", "M1"))
        .await
        .unwrap();

    let base = records
        .list("cutting", &RecordQuery::default().with_search("ORD"))
        .await
        .unwrap();
    let narrowed = records
        .list(
            "cutting",
            &RecordQuery::default()
                .with_search("ORD")
                .with_filter("machine", json!("M1")),
        )
        .await
        .unwrap();
    let narrowest = records
        .list(
            "cutting",
            &RecordQuery::default()
                .with_search("ORD")
                .with_filter("machine", json!("M1"))
                .with_filter("batch_number", json!("B-none")),
        )
        .await
        .unwrap();

    assert_eq!(base.pagination.total, 6);
    assert!(narrowed.pagination.total <= base.pagination.total);
    assert!(narrowest.pagination.total <= narrowed.pagination.total);
    assert_eq!(narrowest.pagination.total, 0);
}

#[tokio::test]
async fn test_suggest_caps_distinct_identifiers() {
    let engine = engine();
    let records = engine.records();
    let stages = ["cutting", "printing", "lamination"];
    for i in 0..30 {
        records
            .create(
                stages[i % 3],
                &stage_body(&format!("ORD-cap-{i:02}"), "M1"),
            )
            .await
            .unwrap();
    }

    let suggestions = engine.tracking().suggest("ORD-cap").await.unwrap();
    assert_eq!(suggestions.len(), MAX_SUGGESTIONS);
    let mut identifiers: Vec<&str> = suggestions.iter().map(|s| s.identifier.as_str()).collect();
    identifiers.sort_unstable();
    identifiers.dedup();
    assert_eq!(identifiers.len(), MAX_SUGGESTIONS);
}

#[tokio::test]
async fn test_import_duplicate_row_is_isolated() {
    let engine = engine();
    let csv = "code_number,supplier,color,code,pal_number,batch_palet_number,date,is_finished\n\
               INK-7,ChemCo,Cyan,C7,,,2024-02-01,false\n\
               INK-7,ChemCo,Cyan,C7,,,2024-02-01,false\n\
               INK-8,ChemCo,Black,C8,,,2024-02-02,false\n";

    let outcome = engine.csv().import("ink", csv.as_bytes()).await.unwrap();
    assert_eq!(outcome.total_rows, 3);
    assert_eq!(outcome.imported_rows, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row, 3);
    assert_eq!(outcome.errors[0].field.as_deref(), Some("code_number"));

    // The survivors really are in the table.
    let page = engine
        .records()
        .list("ink", &RecordQuery::default())
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 2);
}

#[tokio::test]
async fn test_export_header_does_not_depend_on_data() {
    let engine = engine();
    let empty = engine.csv().export("cutting", &Map::new()).await.unwrap();

    engine
        .records()
        .create("cutting", &stage_body("ORD-1", "M1"))
        .await
        .unwrap();
    let filled = engine.csv().export("cutting", &Map::new()).await.unwrap();

    assert_eq!(empty.lines().next(), filled.lines().next());
    assert_eq!(empty.lines().count(), 1);
    assert_eq!(filled.lines().count(), 2);
}

#[tokio::test]
async fn test_tracking_reflects_only_populated_stages() {
    let engine = engine();
    let records = engine.records();
    records
        .create("cutting", &stage_body("ORD-55", "M1"))
        .await
        .unwrap();
    records
        .create("lamination", &stage_body("ORD-55", "L1"))
        .await
        .unwrap();
    records
        .create("printing", &stage_body("OTHER-1", "P1"))
        .await
        .unwrap();

    let view = engine
        .tracking()
        .track("ORD-55", &TrackOptions::default())
        .await
        .unwrap();
    let stages: Vec<&str> = view.stages.keys().map(String::as_str).collect();
    assert_eq!(stages, vec!["cutting", "lamination"]);
    assert!(view.warnings.is_empty());
}

#[tokio::test]
async fn test_duplicate_create_maps_to_field_diagnostic() {
    let engine = engine();
    let records = engine.records();
    let body = json!({
        "code_number": "SOL-1",
        "supplier": "ChemCo",
        "product": "Ethyl Acetate",
        "code": "EA",
        "is_finished": false,
    })
    .as_object()
    .unwrap()
    .clone();

    records.create("solvent", &body).await.unwrap();
    let err = records.create("solvent", &body).await.unwrap_err();
    assert_eq!(err.code(), "DUPLICATE_KEY");
    match err {
        TrellisError::DuplicateKey { field, value } => {
            assert_eq!(field, "code_number");
            assert_eq!(value, "SOL-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
