//! Shared domain types for Huddle.
//!
//! This crate contains the core domain types used across the Huddle platform:
//! chat messages, profiles, the dual-schema mapping layer, group context,
//! LLM request/response shapes, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod error;
pub mod group;
pub mod llm;
pub mod message;
pub mod profile;
pub mod schema;
