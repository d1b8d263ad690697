//! paperlens-llm — LLM backends and paper summarisation.
//!
//! `backend` abstracts the chat-completion providers, `summarize` turns
//! paper text into a structured `PaperSummary`, and `cost` estimates what a
//! batch will cost before it runs.

pub mod backend;
pub mod cost;
pub mod summarize;

pub use backend::{build_backend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, Provider};
pub use cost::{estimate_cost, CostEstimate, Pricing};
pub use summarize::{PaperSummariser, RetryPolicy, SummariserConfig};
