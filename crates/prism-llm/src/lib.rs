//! # prism-llm
//!
//! Clients for OpenAI-compatible chat and embedding endpoints.
//!
//! Both clients support the OpenAI URL/bearer style and the Azure OpenAI
//! deployment URL/`api-key` style, selected by `llm.type`. Rate limits,
//! server errors and transport failures are retried with exponential
//! backoff ([`RetryConfig`]).
//!
//! Search engines depend on the [`ChatModel`] and [`TextEmbedder`] traits,
//! not on the concrete clients.

pub mod chat;
pub mod embedding;
pub mod error;
pub mod http;
pub mod retry;
pub mod tokens;

pub use chat::{ChatClient, ChatMessage, ChatModel, ChatParams};
pub use embedding::{EmbeddingClient, TextEmbedder};
pub use error::LlmError;
pub use retry::RetryConfig;
pub use tokens::TokenEncoder;
