//! Bot response pipeline: context gathering, generation, persistence.
//!
//! The pipeline never fails its caller; every stage has a fallback that
//! degrades the result instead of erroring.

pub mod actions;
pub mod pipeline;
pub mod prompt;

pub use pipeline::{BotConfig, BotPipeline, BotReply};
