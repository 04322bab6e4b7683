//! Business logic and repository trait definitions for Huddle.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, plus everything that agrees on the single ordered
//! message timeline per group: the message store service, the identity
//! resolver, the bot response pipeline, the change-feed and broadcast-echo
//! hubs, and the client-side reconciliation engine.
//!
//! It depends only on `huddle-types` -- never on `huddle-infra` or any
//! database/HTTP crate.

pub mod bot;
pub mod chat;
pub mod identity;
pub mod llm;
pub mod sync;
