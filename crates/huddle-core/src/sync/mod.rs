//! Client-side message synchronization.
//!
//! Four arrival channels -- REST page fetch, change-feed push, broadcast
//! echo, and optimistic local insert -- converge on one gap-free,
//! duplicate-free, time-ordered list per group:
//!
//! - [`timeline`]: the reconciliation engine, sole writer of that list.
//! - [`feed`]: the change-feed hub and the per-(group, variant) listener.
//! - [`echo`]: the per-group broadcast echo channel with self-delivery.
//! - [`view`]: the chat view that owns the timeline and both
//!   subscriptions for the duration of a group visit.

pub mod echo;
pub mod feed;
pub mod timeline;
pub mod view;
