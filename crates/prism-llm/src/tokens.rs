//! BPE token counting for context budgets.

use tiktoken_rs::CoreBPE;

use crate::error::LlmError;

/// Tokenizer shared by context builders and the embedder.
pub struct TokenEncoder {
    name: String,
    bpe: CoreBPE,
}

impl std::fmt::Debug for TokenEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEncoder").field("name", &self.name).finish_non_exhaustive()
    }
}

impl TokenEncoder {
    /// Encoder by tiktoken name. Unknown names fall back to `cl100k_base`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Tokenizer`] if the BPE ranks fail to load.
    pub fn for_name(name: &str) -> Result<Self, LlmError> {
        let (name, bpe) = match name {
            "o200k_base" => ("o200k_base", tiktoken_rs::o200k_base()),
            "p50k_base" => ("p50k_base", tiktoken_rs::p50k_base()),
            "r50k_base" => ("r50k_base", tiktoken_rs::r50k_base()),
            other => {
                if other != "cl100k_base" {
                    tracing::warn!(encoding = other, "unknown encoding, using cl100k_base");
                }
                ("cl100k_base", tiktoken_rs::cl100k_base())
            }
        };
        Ok(Self {
            name: name.to_string(),
            bpe: bpe.map_err(|e| LlmError::Tokenizer(e.to_string()))?,
        })
    }

    /// `cl100k_base`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Tokenizer`] if the BPE ranks fail to load.
    pub fn cl100k() -> Result<Self, LlmError> {
        Self::for_name("cl100k_base")
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split `text` into pieces of at most `max_tokens` tokens.
    #[must_use]
    pub fn chunk(&self, text: &str, max_tokens: usize) -> Vec<String> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens || max_tokens == 0 {
            return vec![text.to_string()];
        }
        tokens
            .chunks(max_tokens)
            .filter_map(|piece| self.bpe.decode(piece.to_vec()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_tokens() {
        let enc = TokenEncoder::cl100k().unwrap();
        assert_eq!(enc.count(""), 0);
        assert_eq!(enc.count("hello world"), 2);
    }

    #[test]
    fn chunk_respects_budget() {
        let enc = TokenEncoder::cl100k().unwrap();
        let text = "alpha beta gamma delta ".repeat(20);
        let pieces = enc.chunk(&text, 10);
        assert!(pieces.len() > 1);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn unknown_name_falls_back() {
        let enc = TokenEncoder::for_name("mystery").unwrap();
        assert_eq!(enc.name(), "cl100k_base");
    }
}
