//! HTTP/REST API layer for Huddle.
//!
//! Axum-based REST API at `/api/v1/` with bearer authentication, group
//! membership authorization, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
