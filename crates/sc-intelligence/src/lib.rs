//! Text-generation client for stagecraft.
//!
//! - [`llm`]: the [`llm::LlmProvider`] trait, the Gemini implementation,
//!   typed errors, and a mock provider for tests.
//! - [`retry`]: exponential backoff for transient failures.

pub mod llm;
pub mod retry;

pub use llm::{ApiKey, GeminiProvider, LlmError, LlmProvider, LlmResponse, MockProvider};
pub use retry::RetryConfig;
