//! Serde shape checks for the indexer models and HTTP types.

use pretty_assertions::assert_eq;
use prism_core::entities::{CommunityReport, Entity};
use prism_core::responses::{ChatTurn, QueryRequest, QueryResponse};
use prism_core::{Frame, QueryMode};
use serde_json::json;

#[test]
fn entity_type_field_is_renamed() {
    let entity = Entity {
        id: "e1".into(),
        title: "ACME".into(),
        entity_type: Some("ORGANIZATION".into()),
        community_ids: vec!["3".into()],
        rank: 4,
        ..Entity::default()
    };
    let value = serde_json::to_value(&entity).unwrap();
    assert_eq!(value["type"], json!("ORGANIZATION"));
    assert!(value.get("entity_type").is_none());
}

#[test]
fn community_report_roundtrip() {
    let report = CommunityReport {
        id: "7".into(),
        short_id: "7".into(),
        title: "Harbour trade".into(),
        community_id: "7".into(),
        summary: "short".into(),
        full_content: "long".into(),
        rank: 8.5,
        ..CommunityReport::default()
    };
    let text = serde_json::to_string(&report).unwrap();
    let back: CommunityReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back, report);
}

#[test]
fn query_request_accepts_full_form() {
    let body = json!({
        "query": "What links ACME to the harbour?",
        "history": [{"user": "hi", "assistant": "hello"}],
        "mode": "local",
        "community_level": 3,
        "response_type": "Single Sentence",
        "folder": "20240101-120000"
    });
    let req: QueryRequest = serde_json::from_value(body).unwrap();
    assert_eq!(req.mode, QueryMode::Local);
    assert_eq!(req.community_level, 3);
    assert_eq!(req.folder.as_deref(), Some("20240101-120000"));
    assert_eq!(
        req.history,
        vec![ChatTurn {
            user: "hi".into(),
            assistant: "hello".into()
        }]
    );
}

#[test]
fn query_response_without_plot_serializes_null() {
    let resp = QueryResponse {
        history: vec![],
        entities_html: "<p>No Entities</p>".into(),
        relationships_html: "<p>No Relationship</p>".into(),
        sources_html: "<p>No Source</p>".into(),
        reports_html: "<p>No Report</p>".into(),
        plot: None,
    };
    let value = serde_json::to_value(&resp).unwrap();
    assert_eq!(value["plot"], serde_json::Value::Null);
}

#[test]
fn frame_serializes_columns_and_rows() {
    let frame = Frame::new(vec!["id".into()], vec![vec![json!(1)]]).unwrap();
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value, json!({"columns": ["id"], "rows": [[1]]}));
}
