//! Map-reduce search over community reports.
//!
//! Every report batch is sent to the LLM concurrently (map); the key points
//! that come back are ranked by importance and merged into one answer
//! (reduce).

use std::collections::BTreeMap;

use futures::future::join_all;
use prism_core::frame::{value_to_f64, value_to_string};
use prism_llm::{ChatMessage, ChatModel, ChatParams, LlmError};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::context::{GlobalContext, GlobalContextParams};
use crate::error::SearchError;
use crate::prompts::{MAP_SYSTEM_PROMPT, NO_DATA_ANSWER, REDUCE_SYSTEM_PROMPT, fill};
use crate::result::SearchResult;

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSearchParams {
    pub map_llm: ChatParams,
    pub reduce_llm: ChatParams,
    /// Token budget of the analyst reports handed to the reduce step.
    pub max_data_tokens: usize,
    pub concurrent_coroutines: usize,
    pub context: GlobalContextParams,
}

impl Default for GlobalSearchParams {
    fn default() -> Self {
        Self {
            map_llm: ChatParams::default(),
            reduce_llm: ChatParams::default(),
            max_data_tokens: 2000,
            concurrent_coroutines: 32,
            context: GlobalContextParams::default(),
        }
    }
}

/// One scored point from a map response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPoint {
    pub answer: String,
    pub score: i64,
}

impl KeyPoint {
    fn empty() -> Self {
        Self {
            answer: String::new(),
            score: 0,
        }
    }
}

struct MapOutcome {
    points: Vec<KeyPoint>,
    error: Option<LlmError>,
    prompt_tokens: usize,
}

pub struct GlobalSearch<'a, M> {
    llm: &'a M,
    context: GlobalContext,
    params: GlobalSearchParams,
    response_type: String,
}

impl<'a, M: ChatModel> GlobalSearch<'a, M> {
    #[must_use]
    pub fn new(llm: &'a M, context: GlobalContext, response_type: impl Into<String>) -> Self {
        Self {
            llm,
            context,
            params: GlobalSearchParams::default(),
            response_type: response_type.into(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: GlobalSearchParams) -> Self {
        self.params = params;
        self
    }

    /// Run map and reduce for `query`.
    ///
    /// A map call that fails or returns malformed JSON contributes a single
    /// zero-score point; only when every map call fails is the first error
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Llm`] if every map call failed or the reduce
    /// call failed.
    pub async fn search(&self, query: &str) -> Result<SearchResult, SearchError> {
        let context = self.context.build_context(&self.params.context);
        let semaphore = Semaphore::new(self.params.concurrent_coroutines.max(1));

        let outcomes = join_all(
            context
                .batches
                .iter()
                .map(|batch| self.map_batch(query, batch, &semaphore)),
        )
        .await;

        let mut result = SearchResult {
            context_data: BTreeMap::from([("reports".to_string(), context.reports)]),
            context_text: context.batches,
            llm_calls: outcomes.len(),
            prompt_tokens: outcomes.iter().map(|o| o.prompt_tokens).sum(),
            ..SearchResult::default()
        };

        let mut first_error = None;
        let mut failures = 0;
        let mut points: Vec<(usize, KeyPoint)> = Vec::new();
        for (analyst, outcome) in outcomes.into_iter().enumerate() {
            if let Some(error) = outcome.error {
                failures += 1;
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
            points.extend(outcome.points.into_iter().map(|p| (analyst, p)));
        }
        if failures > 0 && failures == result.llm_calls {
            if let Some(error) = first_error {
                return Err(error.into());
            }
        }

        points.retain(|(_, p)| p.score > 0);
        if points.is_empty() {
            tracing::info!("no relevant points from map step");
            result.response = NO_DATA_ANSWER.to_string();
            return Ok(result);
        }
        points.sort_by(|a, b| b.1.score.cmp(&a.1.score));

        let encoder = &self.context.encoder;
        let mut report_data: Vec<String> = Vec::new();
        let mut total_tokens = 0;
        for (analyst, point) in &points {
            let formatted = format!(
                "----Analyst {}----\nImportance Score: {}\n{}",
                analyst + 1,
                point.score,
                point.answer
            );
            let tokens = encoder.count(&formatted);
            if total_tokens + tokens > self.params.max_data_tokens {
                break;
            }
            total_tokens += tokens;
            report_data.push(formatted);
        }

        let report_data = report_data.join("\n\n");
        let system = fill(
            REDUCE_SYSTEM_PROMPT,
            &[
                ("report_data", report_data.as_str()),
                ("response_type", self.response_type.as_str()),
            ],
        );
        result.prompt_tokens += encoder.count(&system) + encoder.count(query);
        result.llm_calls += 1;
        result.response = self
            .llm
            .chat(
                &[ChatMessage::system(system), ChatMessage::user(query)],
                &self.params.reduce_llm,
            )
            .await?;
        tracing::info!(
            llm_calls = result.llm_calls,
            prompt_tokens = result.prompt_tokens,
            "global search complete"
        );
        Ok(result)
    }

    async fn map_batch(&self, query: &str, batch: &str, semaphore: &Semaphore) -> MapOutcome {
        let system = fill(MAP_SYSTEM_PROMPT, &[("context_data", batch)]);
        let prompt_tokens = self.context.encoder.count(&system) + self.context.encoder.count(query);
        let messages = [ChatMessage::system(system), ChatMessage::user(query)];

        let response = match semaphore.acquire().await {
            Ok(_permit) => self.llm.chat(&messages, &self.params.map_llm).await,
            // The semaphore is never closed.
            Err(_) => Ok(String::new()),
        };
        match response {
            Ok(text) => MapOutcome {
                points: parse_map_response(&text),
                error: None,
                prompt_tokens,
            },
            Err(error) => {
                tracing::warn!(%error, "map call failed");
                MapOutcome {
                    points: vec![KeyPoint::empty()],
                    error: Some(error),
                    prompt_tokens,
                }
            }
        }
    }
}

/// Key points of a map response: `{"points": [{"description", "score"}]}`,
/// possibly wrapped in prose or a code fence. Anything unparseable yields a
/// single empty zero-score point.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_map_response(text: &str) -> Vec<KeyPoint> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return vec![KeyPoint::empty()],
    };
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        tracing::debug!("map response is not valid JSON");
        return vec![KeyPoint::empty()];
    };
    let Some(elements) = value.get("points").and_then(Value::as_array) else {
        return vec![KeyPoint::empty()];
    };
    if elements.is_empty() {
        return vec![KeyPoint::empty()];
    }

    elements
        .iter()
        .filter_map(|element| {
            let answer = element.get("description").and_then(value_to_string)?;
            let score = element.get("score").and_then(value_to_f64)?;
            Some(KeyPoint {
                answer,
                score: score.round() as i64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_points() {
        let points = parse_map_response(
            r#"{"points": [{"description": "ACME ships [Data: Reports (1)]", "score": 80}, {"description": "minor", "score": "10"}]}"#,
        );
        assert_eq!(
            points,
            vec![
                KeyPoint {
                    answer: "ACME ships [Data: Reports (1)]".into(),
                    score: 80
                },
                KeyPoint {
                    answer: "minor".into(),
                    score: 10
                },
            ]
        );
    }

    #[test]
    fn strips_code_fence() {
        let points = parse_map_response("```json\n{\"points\": [{\"description\": \"x\", \"score\": 5}]}\n```");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].score, 5);
    }

    #[test]
    fn skips_incomplete_elements() {
        let points = parse_map_response(r#"{"points": [{"description": "no score"}, {"score": 3}]}"#);
        assert!(points.is_empty());
    }

    #[test]
    fn garbage_yields_zero_point() {
        assert_eq!(parse_map_response("I don't know."), vec![KeyPoint::empty()]);
        assert_eq!(parse_map_response("{not json}"), vec![KeyPoint::empty()]);
        assert_eq!(parse_map_response(r#"{"answer": "x"}"#), vec![KeyPoint::empty()]);
    }
}
