use std::collections::BTreeMap;

use prism_core::Frame;

/// Answer of one search plus the context it was given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub response: String,
    /// Context tables by section name (`reports`, `entities`, ...).
    pub context_data: BTreeMap<String, Frame>,
    /// Context text of each LLM call that saw data.
    pub context_text: Vec<String>,
    pub llm_calls: usize,
    pub prompt_tokens: usize,
}

impl SearchResult {
    /// Context table `name`, or an empty frame.
    #[must_use]
    pub fn frame(&self, name: &str) -> &Frame {
        static EMPTY: Frame = Frame::empty();
        self.context_data.get(name).unwrap_or(&EMPTY)
    }
}
