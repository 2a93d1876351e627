//! Query dispatch: one chat request in, updated conversation and context
//! panels out.
//!
//! Failures never escape as errors. They are logged and shown to the user
//! as an assistant message, with placeholder panels.

use prism_config::PrismConfig;
use prism_core::responses::{ChatTurn, QueryRequest, QueryResponse};
use prism_llm::{ChatClient, ChatModel, LlmError, RetryConfig};
use tokio::sync::Mutex;

use crate::citations::cited_report_ids;
use crate::context::{ContextBuilder, cell_text, get_context_builder};
use crate::error::SearchError;
use crate::global_search::GlobalSearch;
use crate::graph::KnowledgeGraph;
use crate::local_search::LocalSearch;
use crate::plot::visualize_graph;
use crate::render::{frame_to_html, reports_to_html, sources_to_html};
use crate::result::SearchResult;
use crate::session::IndexSession;

/// Context panels shown next to an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Panels {
    pub entities_html: String,
    pub relationships_html: String,
    pub sources_html: String,
    pub reports_html: String,
    pub plot: Option<serde_json::Value>,
}

impl Panels {
    fn failed() -> Self {
        Self {
            entities_html: "<p>No Entities</p>".to_string(),
            relationships_html: "<p>No Relationship</p>".to_string(),
            sources_html: "<p>No Source</p>".to_string(),
            reports_html: "<p>No Report</p>".to_string(),
            plot: None,
        }
    }
}

/// Answer `request` with the configured chat endpoint.
pub async fn send_message(session: &Mutex<IndexSession>, request: QueryRequest) -> QueryResponse {
    send_message_with(session, request, |config| {
        ChatClient::new(config.llm.clone(), RetryConfig::chat())
    })
    .await
}

/// Answer `request` with the chat model built by `chat_model`.
///
/// The session lock is held while the context builder is assembled
/// (including any folder switch) and released before the LLM calls.
pub async fn send_message_with<M, F>(
    session: &Mutex<IndexSession>,
    request: QueryRequest,
    chat_model: F,
) -> QueryResponse
where
    M: ChatModel,
    F: FnOnce(&PrismConfig) -> Result<M, LlmError>,
{
    tracing::info!(
        mode = %request.mode,
        community_level = request.community_level,
        response_type = %request.response_type,
        folder = request.folder.as_deref().unwrap_or("<current>"),
        "received query"
    );

    let (assistant, panels) = match answer(session, &request, chat_model).await {
        Ok((result, panels)) => (result.response, panels),
        Err(error) => {
            tracing::error!(error = %error.chain(), "query failed");
            (format!("An error occurred: {error}"), Panels::failed())
        }
    };

    let mut history = request.history;
    history.push(ChatTurn {
        user: request.query,
        assistant,
    });
    QueryResponse {
        history,
        entities_html: panels.entities_html,
        relationships_html: panels.relationships_html,
        sources_html: panels.sources_html,
        reports_html: panels.reports_html,
        plot: panels.plot,
    }
}

async fn answer<M, F>(
    session: &Mutex<IndexSession>,
    request: &QueryRequest,
    chat_model: F,
) -> Result<(SearchResult, Panels), SearchError>
where
    M: ChatModel,
    F: FnOnce(&PrismConfig) -> Result<M, LlmError>,
{
    let (llm, builder) = {
        let mut session = session.lock().await;
        let llm = chat_model(session.config())?;
        let builder = get_context_builder(
            &mut session,
            request.mode,
            request.community_level,
            request.folder.as_deref(),
        )
        .await?;
        (llm, builder)
    };

    match builder {
        ContextBuilder::Global(context) => {
            let result = GlobalSearch::new(&llm, context, request.response_type.as_str())
                .search(&request.query)
                .await?;
            let panels = render_global(&result);
            Ok((result, panels))
        }
        ContextBuilder::Local(context) => {
            let result = LocalSearch::new(&llm, context, request.response_type.as_str())
                .search(&request.query, &request.history)
                .await?;
            let panels = render_local(&result);
            Ok((result, panels))
        }
    }
}

/// Panels for a global answer: only the cited reports are shown.
#[must_use]
pub fn render_global(result: &SearchResult) -> Panels {
    let ids = cited_report_ids(&result.response);
    let reports = result.frame("reports");
    let cited = match reports.column_index("id") {
        Some(id_col) if !ids.is_empty() => {
            reports.filter_rows(|i| ids.contains(&cell_text(&reports.rows()[i][id_col])))
        }
        _ => prism_core::Frame::empty(),
    };
    tracing::debug!(cited = ids.len(), shown = cited.len(), "global answer citations");

    Panels {
        entities_html: "<p>No Entities due to Global Search</p>".to_string(),
        relationships_html: "<p>No Relationship due to Global Search</p>".to_string(),
        sources_html: "<p>No Source due to Global Search</p>".to_string(),
        reports_html: if cited.is_empty() {
            "<p>No Data Available</p>".to_string()
        } else {
            frame_to_html(&cited)
        },
        plot: None,
    }
}

/// Panels for a local answer, plus a graph of the relationships in its
/// context.
#[must_use]
pub fn render_local(result: &SearchResult) -> Panels {
    let entities = result.frame("entities");
    let relationships = result.frame("relationships");
    let sources = result.frame("sources");
    let reports = result.frame("reports");

    let plot = if relationships.is_empty() {
        None
    } else {
        match KnowledgeGraph::from_relationships(relationships) {
            Ok(graph) => Some(visualize_graph(&graph)),
            Err(error) => {
                tracing::warn!(%error, "skipping graph plot");
                None
            }
        }
    };

    Panels {
        entities_html: or_placeholder(
            !entities.is_empty(),
            || frame_to_html(&entities.select(&["entity", "description"])),
            "\n\n<h5>No Entities found</h5>",
        ),
        relationships_html: or_placeholder(
            !relationships.is_empty(),
            || frame_to_html(&relationships.select(&["source", "target", "description"])),
            "\n\n<h5>No Relationships found</h5>",
        ),
        sources_html: or_placeholder(
            !sources.is_empty(),
            || sources_to_html(sources),
            "\n\n<h5>No Sources found</h5>",
        ),
        reports_html: or_placeholder(
            !reports.is_empty(),
            || reports_to_html(reports),
            "\n\n<h5>No Report found</h5>",
        ),
        plot,
    }
}

fn or_placeholder(present: bool, render: impl FnOnce() -> String, placeholder: &str) -> String {
    if present {
        render()
    } else {
        placeholder.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prism_core::Frame;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn reports() -> Frame {
        Frame::new(
            vec!["id".into(), "title".into(), "content".into()],
            vec![
                vec![json!("1"), json!("Port economy"), json!("ships")],
                vec![json!("2"), json!("Rail links"), json!("trains")],
            ],
        )
        .unwrap()
    }

    fn global_result(response: &str) -> SearchResult {
        SearchResult {
            response: response.into(),
            context_data: BTreeMap::from([("reports".to_string(), reports())]),
            ..SearchResult::default()
        }
    }

    #[test]
    fn global_shows_only_cited_reports() {
        let panels = render_global(&global_result("Shipping dominates [Data: Reports (2, +more)]."));
        assert!(panels.reports_html.contains("Rail links"));
        assert!(!panels.reports_html.contains("Port economy"));
        assert_eq!(panels.entities_html, "<p>No Entities due to Global Search</p>");
        assert_eq!(panels.sources_html, "<p>No Source due to Global Search</p>");
        assert!(panels.plot.is_none());
    }

    #[test]
    fn global_without_citations_has_no_data() {
        let panels = render_global(&global_result("I could not find anything."));
        assert_eq!(panels.reports_html, "<p>No Data Available</p>");
    }

    #[test]
    fn local_with_empty_context_shows_placeholders() {
        let panels = render_local(&SearchResult::default());
        assert_eq!(panels.entities_html, "\n\n<h5>No Entities found</h5>");
        assert_eq!(panels.relationships_html, "\n\n<h5>No Relationships found</h5>");
        assert_eq!(panels.sources_html, "\n\n<h5>No Sources found</h5>");
        assert_eq!(panels.reports_html, "\n\n<h5>No Report found</h5>");
        assert!(panels.plot.is_none());
    }

    #[test]
    fn local_renders_tables_and_plot() {
        let entities = Frame::new(
            vec!["id".into(), "entity".into(), "description".into()],
            vec![vec![json!("0"), json!("ACME"), json!("shipper")]],
        )
        .unwrap();
        let relationships = Frame::new(
            vec!["id".into(), "source".into(), "target".into(), "description".into()],
            vec![vec![json!("0"), json!("ACME"), json!("HARBOUR"), json!("ships via")]],
        )
        .unwrap();
        let result = SearchResult {
            context_data: BTreeMap::from([
                ("entities".to_string(), entities),
                ("relationships".to_string(), relationships),
                ("reports".to_string(), reports()),
            ]),
            ..SearchResult::default()
        };
        let panels = render_local(&result);
        assert!(panels.entities_html.contains("<th>entity</th>"));
        assert!(!panels.entities_html.contains("<th>id</th>"));
        assert!(panels.relationships_html.contains("<td>ships via</td>"));
        assert_eq!(panels.sources_html, "\n\n<h5>No Sources found</h5>");
        assert!(panels.reports_html.contains("<h5>Report <b>Port economy</b></h5>"));
        let plot = panels.plot.unwrap();
        assert_eq!(plot["data"][1]["text"], json!(["ACME", "HARBOUR"]));
    }

    #[test]
    fn failure_panels() {
        let panels = Panels::failed();
        assert_eq!(panels.entities_html, "<p>No Entities</p>");
        assert_eq!(panels.reports_html, "<p>No Report</p>");
    }
}
