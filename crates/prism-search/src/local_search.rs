//! Single-call search over an entity-anchored context.

use prism_core::responses::ChatTurn;
use prism_llm::{ChatMessage, ChatModel, ChatParams, TextEmbedder};

use crate::context::{LocalContext, LocalContextParams};
use crate::error::SearchError;
use crate::prompts::{LOCAL_SEARCH_SYSTEM_PROMPT, fill};
use crate::result::SearchResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSearchParams {
    pub llm: ChatParams,
    pub context: LocalContextParams,
}

pub struct LocalSearch<'a, M, E> {
    llm: &'a M,
    context: LocalContext<E>,
    params: LocalSearchParams,
    response_type: String,
}

impl<'a, M: ChatModel, E: TextEmbedder> LocalSearch<'a, M, E> {
    #[must_use]
    pub fn new(llm: &'a M, context: LocalContext<E>, response_type: impl Into<String>) -> Self {
        Self {
            llm,
            context,
            params: LocalSearchParams::default(),
            response_type: response_type.into(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: LocalSearchParams) -> Self {
        self.params = params;
        self
    }

    /// Build the context for `query` and ask the LLM once.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if context building or the chat call fails.
    pub async fn search(
        &self,
        query: &str,
        history: &[ChatTurn],
    ) -> Result<SearchResult, SearchError> {
        let context = self
            .context
            .build_context(query, history, &self.params.context)
            .await?;

        let system = fill(
            LOCAL_SEARCH_SYSTEM_PROMPT,
            &[
                ("context_data", context.text.as_str()),
                ("response_type", self.response_type.as_str()),
            ],
        );
        let encoder = &self.context.encoder;
        let prompt_tokens = encoder.count(&system) + encoder.count(query);
        let response = self
            .llm
            .chat(
                &[ChatMessage::system(system), ChatMessage::user(query)],
                &self.params.llm,
            )
            .await?;

        tracing::info!(
            prompt_tokens,
            entities = context.data.get("entities").map_or(0, prism_core::Frame::len),
            "local search complete"
        );
        Ok(SearchResult {
            response,
            context_data: context.data,
            context_text: vec![context.text],
            llm_calls: 1,
            prompt_tokens,
        })
    }
}
