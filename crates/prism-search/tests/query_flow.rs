//! Query dispatch over real parquet artifacts: folder switching, global
//! map-reduce with citations, local search through LanceDB, missing tables,
//! failure panels.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use prism_config::{EmbeddingsConfig, LlmConfig, PrismConfig};
use prism_core::responses::{ChatTurn, QueryRequest};
use prism_core::{QueryMode, TableKind};
use prism_lake::FrameReader;
use prism_llm::{ChatMessage, ChatModel, ChatParams, LlmError};
use prism_search::context::LocalContextParams;
use prism_search::{ContextBuilder, IndexSession, get_context_builder, send_message, send_message_with};
use serde_json::json;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OLD_RUN: &str = "20240101-000000";
const NEW_RUN: &str = "20240202-000000";

// ── Fixtures ────────────────────────────────────────────────────────────

fn write_run(root: &Path, run: &str, with_claims: bool) {
    let artifacts = root.join("output").join(run).join("artifacts");
    std::fs::create_dir_all(&artifacts).unwrap();
    let reader = FrameReader::open_in_memory().unwrap();
    let write = |query: &str, file: &str| reader.write_parquet(query, &artifacts.join(file)).unwrap();

    write(
        "SELECT * FROM (VALUES
            ('ACME', 0, 1, 3),
            ('HARBOUR', 0, 1, 2),
            ('ACME', 1, 4, 3)
         ) AS v(title, level, community, degree)",
        "create_final_nodes.parquet",
    );
    write(
        "SELECT * FROM (VALUES
            ('e1', 'ACME', 'ORGANIZATION', 'A shipping company', 0, ['t1'], [0.1, 0.9]::FLOAT[]),
            ('e2', 'HARBOUR', 'GEO', 'A deep water port', 1, ['t1', 't2'], [0.8, 0.2]::FLOAT[])
         ) AS v(id, name, type, description, human_readable_id, text_unit_ids, description_embedding)",
        "create_final_entities.parquet",
    );
    write(
        "SELECT * FROM (VALUES
            ('r1', 'ACME', 'HARBOUR', 'ACME ships through HARBOUR', 2.0, 5, 0, ['t1'])
         ) AS v(id, source, target, description, weight, rank, human_readable_id, text_unit_ids)",
        "create_final_relationships.parquet",
    );
    write(
        "SELECT * FROM (VALUES
            ('t1', 'ACME moved cargo via HARBOUR.', 9, ['e1', 'e2'], ['r1']),
            ('t2', 'HARBOUR was dredged.', 5, ['e2'], []::VARCHAR[])
         ) AS v(id, text, n_tokens, entity_ids, relationship_ids)",
        "create_final_text_units.parquet",
    );
    write(
        "SELECT * FROM (VALUES
            ('1', 0, 'Port economy', 'summary 1', '# Port economy\nACME and HARBOUR.', 7.5),
            ('4', 1, 'ACME operations', 'summary 4', '# ACME operations', 6.0)
         ) AS v(community, level, title, summary, full_content, rank)",
        "create_final_community_reports.parquet",
    );
    if with_claims {
        write(
            "SELECT * FROM (VALUES
                ('c1', 0, 'ACME', 'HARBOUR', 'claim', 'TRUE', 'ACME leases a dock')
             ) AS v(id, human_readable_id, subject_id, object_id, covariate_type, status, description)",
            "create_final_covariates.parquet",
        );
    }
    std::thread::sleep(Duration::from_millis(20));
}

/// Two runs: the older one has claims, the newer one does not.
fn two_runs() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    write_run(root.path(), OLD_RUN, true);
    write_run(root.path(), NEW_RUN, false);
    root
}

/// Add `PILOT`, an entity that only exists at community level 1 and sits
/// exactly on the query embedding used by the local tests.
fn add_level_one_entity(root: &Path, run: &str) {
    let artifacts = root.join("output").join(run).join("artifacts");
    let reader = FrameReader::open_in_memory().unwrap();
    let write = |query: &str, file: &str| reader.write_parquet(query, &artifacts.join(file)).unwrap();
    write(
        "SELECT * FROM (VALUES
            ('ACME', 0, 1, 3),
            ('HARBOUR', 0, 1, 2),
            ('ACME', 1, 4, 3),
            ('PILOT', 1, 4, 1)
         ) AS v(title, level, community, degree)",
        "create_final_nodes.parquet",
    );
    write(
        "SELECT * FROM (VALUES
            ('e1', 'ACME', 'ORGANIZATION', 'A shipping company', 0, ['t1'], [0.8, 0.2]::FLOAT[]),
            ('e2', 'HARBOUR', 'GEO', 'A deep water port', 1, ['t1', 't2'], [0.7, 0.3]::FLOAT[]),
            ('e3', 'PILOT', 'PERSON', 'Guides ships into HARBOUR', 2, ['t2'], [0.1, 0.9]::FLOAT[])
         ) AS v(id, name, type, description, human_readable_id, text_unit_ids, description_embedding)",
        "create_final_entities.parquet",
    );
}

fn drop_table(root: &Path, run: &str, file: &str) {
    std::fs::remove_file(root.join("output").join(run).join("artifacts").join(file)).unwrap();
}

/// Chat model that answers map, reduce and local prompts from a script and
/// records every system prompt it sees.
#[derive(Clone, Default)]
struct ScriptedChat {
    map_answer: String,
    final_answer: String,
    fail: bool,
    prompts: Arc<StdMutex<Vec<String>>>,
}

impl ScriptedChat {
    fn answering(map_answer: &str, final_answer: &str) -> Self {
        Self {
            map_answer: map_answer.into(),
            final_answer: final_answer.into(),
            ..Self::default()
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: &[ChatMessage], _params: &ChatParams) -> Result<String, LlmError> {
        let system = messages[0].content.clone();
        self.prompts.lock().unwrap().push(system.clone());
        if self.fail {
            return Err(LlmError::Api {
                status: 500,
                message: "model offline".into(),
            });
        }
        if system.contains("\"points\"") {
            Ok(self.map_answer.clone())
        } else {
            Ok(self.final_answer.clone())
        }
    }
}

fn request(query: &str, mode: QueryMode) -> QueryRequest {
    QueryRequest {
        query: query.into(),
        history: Vec::new(),
        mode,
        community_level: 2,
        response_type: "Single Paragraph".into(),
        folder: None,
    }
}

async fn session_over(root: &Path, config: PrismConfig) -> Mutex<IndexSession> {
    Mutex::new(IndexSession::initialize(root, config).await.unwrap())
}

// ── Folder selection ────────────────────────────────────────────────────

#[tokio::test]
async fn session_starts_on_newest_run() {
    let root = two_runs();
    let session = IndexSession::initialize(root.path(), PrismConfig::default())
        .await
        .unwrap();
    assert_eq!(session.timestamp(), Some(NEW_RUN));
    assert_eq!(session.tables().get(TableKind::Entities).len(), 2);
    assert!(session.tables().get(TableKind::Covariates).is_empty());
    assert!(session.vector_store().is_some());

    let state = session.state_response();
    assert_eq!(state.folders, vec![NEW_RUN.to_string(), OLD_RUN.to_string()]);
    assert_eq!(state.timestamp.as_deref(), Some(NEW_RUN));
}

#[tokio::test]
async fn selecting_a_folder_reloads_every_table() {
    let root = two_runs();
    let mut session = IndexSession::initialize(root.path(), PrismConfig::default())
        .await
        .unwrap();

    let builder = get_context_builder(&mut session, QueryMode::Global, 2, Some(OLD_RUN))
        .await
        .unwrap();
    assert!(matches!(builder, ContextBuilder::Global(_)));
    assert_eq!(session.timestamp(), Some(OLD_RUN));
    assert_eq!(session.tables().get(TableKind::Covariates).len(), 1);
    for (kind, rows) in session.tables().summary() {
        assert!(rows > 0, "{kind} not loaded from {OLD_RUN}");
    }

    // Claims of the old run must not leak into the new one.
    get_context_builder(&mut session, QueryMode::Global, 2, Some(NEW_RUN))
        .await
        .unwrap();
    assert_eq!(session.timestamp(), Some(NEW_RUN));
    assert!(session.tables().get(TableKind::Covariates).is_empty());
}

#[tokio::test]
async fn same_folder_is_not_reloaded() {
    let root = two_runs();
    let mut session = IndexSession::initialize(root.path(), PrismConfig::default())
        .await
        .unwrap();
    let before = Arc::clone(session.tables());
    get_context_builder(&mut session, QueryMode::Global, 2, Some(NEW_RUN))
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&before, session.tables()));
}

// ── Global search ───────────────────────────────────────────────────────

#[tokio::test]
async fn global_query_shows_cited_reports() {
    let root = two_runs();
    let session = session_over(root.path(), PrismConfig::default()).await;
    let chat = ScriptedChat::answering(
        r#"{"points": [{"description": "ACME runs the port [Data: Reports (4)]", "score": 90}]}"#,
        "ACME runs the port [Data: Reports (4)].",
    );

    let mut req = request("Who runs the port?", QueryMode::Global);
    req.history.push(ChatTurn {
        user: "hello".into(),
        assistant: "hi".into(),
    });
    let scripted = chat.clone();
    let response = send_message_with(&session, req, move |_| Ok(scripted)).await;

    assert_eq!(response.history.len(), 2);
    assert_eq!(
        response.history[1],
        ChatTurn {
            user: "Who runs the port?".into(),
            assistant: "ACME runs the port [Data: Reports (4)].".into(),
        }
    );
    assert!(response.reports_html.contains("ACME operations"));
    assert!(!response.reports_html.contains("Port economy"));
    assert_eq!(response.entities_html, "<p>No Entities due to Global Search</p>");
    assert!(response.plot.is_none());

    let prompts = chat.prompts();
    let reduce = prompts.last().unwrap();
    assert!(reduce.contains("----Analyst 1----\nImportance Score: 90"));
    assert!(reduce.contains("Single Paragraph"));
}

#[tokio::test]
async fn global_query_without_relevant_points_has_no_data() {
    let root = two_runs();
    let session = session_over(root.path(), PrismConfig::default()).await;
    let chat = ScriptedChat::answering(r#"{"points": [{"description": "nothing", "score": 0}]}"#, "unused");
    let response = send_message_with(&session, request("Anything?", QueryMode::Global), move |_| {
        Ok(chat)
    })
    .await;
    assert!(response.history[0].assistant.starts_with("I am sorry"));
    assert_eq!(response.reports_html, "<p>No Data Available</p>");
}

// ── Local search ────────────────────────────────────────────────────────

/// Embedding endpoint that maps every query to `[0.1, 0.9]`.
async fn embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.9] }]
        })))
        .expect(1..)
        .mount(&server)
        .await;
    server
}

fn embedding_config(server: &MockServer) -> PrismConfig {
    PrismConfig {
        embeddings: EmbeddingsConfig {
            llm: LlmConfig {
                api_key: "sk-test".into(),
                api_base: format!("{}/v1", server.uri()),
                ..LlmConfig::embedding_default()
            },
        },
        ..PrismConfig::default()
    }
}

#[tokio::test]
async fn local_query_renders_entities_sources_and_graph() {
    let server = embedding_server().await;
    let root = two_runs();
    let session = session_over(root.path(), embedding_config(&server)).await;
    let chat = ScriptedChat::answering("unused", "ACME ships through HARBOUR.");
    let scripted = chat.clone();
    let response = send_message_with(
        &session,
        request("What does ACME do?", QueryMode::Local),
        move |_| Ok(scripted),
    )
    .await;

    assert_eq!(response.history[0].assistant, "ACME ships through HARBOUR.");
    assert!(response.entities_html.contains("<td>ACME</td>"));
    assert!(response.relationships_html.contains("<td>ACME ships through HARBOUR</td>"));
    assert!(response.sources_html.contains("ACME moved cargo via HARBOUR."));
    assert!(response.reports_html.contains("<h5>Report <b>"));

    let plot = response.plot.expect("local answers carry a graph");
    let nodes = plot["data"][1]["text"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);

    let prompts = chat.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("-----Entities-----"));
    assert!(prompts[0].contains("-----Relationships-----"));
}

#[tokio::test]
async fn local_builders_keep_their_level_entities() {
    let server = embedding_server().await;
    let root = tempfile::tempdir().unwrap();
    write_run(root.path(), NEW_RUN, false);
    add_level_one_entity(root.path(), NEW_RUN);
    let mut session = IndexSession::initialize(root.path(), embedding_config(&server))
        .await
        .unwrap();

    let ContextBuilder::Local(level_one) =
        get_context_builder(&mut session, QueryMode::Local, 1, None).await.unwrap()
    else {
        panic!("local mode builds a local context");
    };
    // A second query at another level indexes while the first is in flight.
    let ContextBuilder::Local(level_zero) =
        get_context_builder(&mut session, QueryMode::Local, 0, None).await.unwrap()
    else {
        panic!("local mode builds a local context");
    };
    assert_eq!(level_zero.entities.len(), 2);

    let context = level_one
        .build_context("Who guides ships?", &[], &LocalContextParams::default())
        .await
        .unwrap();
    let entities = &context.data["entities"];
    let title = entities.column_index("entity").unwrap();
    let names: Vec<&str> = entities
        .rows()
        .iter()
        .filter_map(|row| row[title].as_str())
        .collect();
    assert_eq!(names.first(), Some(&"PILOT"));
}

#[tokio::test]
async fn local_query_without_relationships_has_no_plot() {
    let server = embedding_server().await;
    let root = tempfile::tempdir().unwrap();
    write_run(root.path(), NEW_RUN, false);
    drop_table(root.path(), NEW_RUN, "create_final_relationships.parquet");
    let session = session_over(root.path(), embedding_config(&server)).await;
    assert!(session.lock().await.tables().get(TableKind::Relationships).is_empty());

    let chat = ScriptedChat::answering("unused", "ACME is a shipping company.");
    let response = send_message_with(
        &session,
        request("What does ACME do?", QueryMode::Local),
        move |_| Ok(chat),
    )
    .await;

    assert_eq!(response.history[0].assistant, "ACME is a shipping company.");
    assert!(response.plot.is_none());
    assert!(response.entities_html.contains("<td>ACME</td>"));
    assert_eq!(response.relationships_html, "\n\n<h5>No Relationships found</h5>");
    assert!(response.sources_html.contains("ACME moved cargo via HARBOUR."));
    assert!(response.reports_html.contains("<h5>Report <b>"));
}

// ── Failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_folder_is_reported_in_the_conversation() {
    let root = two_runs();
    let session = session_over(root.path(), PrismConfig::default()).await;
    let mut req = request("Who?", QueryMode::Global);
    req.folder = Some("../escape".into());
    let response = send_message_with(&session, req, |_| Ok(ScriptedChat::default())).await;

    assert_eq!(
        response.history[0].assistant,
        "An error occurred: invalid output folder: '../escape'"
    );
    assert_eq!(response.entities_html, "<p>No Entities</p>");
    assert_eq!(response.relationships_html, "<p>No Relationship</p>");
    assert_eq!(response.sources_html, "<p>No Source</p>");
    assert_eq!(response.reports_html, "<p>No Report</p>");
    assert!(response.plot.is_none());
    assert_eq!(session.lock().await.timestamp(), Some(NEW_RUN));
}

#[tokio::test]
async fn failing_model_surfaces_the_error() {
    let root = two_runs();
    let session = session_over(root.path(), PrismConfig::default()).await;
    let chat = ScriptedChat {
        fail: true,
        ..ScriptedChat::default()
    };
    let response = send_message_with(&session, request("Who?", QueryMode::Global), move |_| {
        Ok(chat)
    })
    .await;
    let answer = &response.history[0].assistant;
    assert!(answer.starts_with("An error occurred: llm error:"), "{answer}");
    assert!(answer.contains("model offline"));
    assert_eq!(response.reports_html, "<p>No Report</p>");
}

#[tokio::test]
async fn unconfigured_chat_endpoint_is_reported() {
    let root = two_runs();
    let session = session_over(root.path(), PrismConfig::default()).await;
    let response = send_message(&session, request("Who?", QueryMode::Global)).await;
    assert!(response.history[0].assistant.starts_with("An error occurred:"));
    assert_eq!(response.entities_html, "<p>No Entities</p>");
}
