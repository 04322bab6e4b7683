//! GeminiProvider -- concrete [`huddle_core::llm::LlmProvider`] for the
//! Google Generative Language API.

mod client;
mod types;

pub use client::GeminiProvider;
