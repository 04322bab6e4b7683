//! Observability for Huddle: tracing subscriber initialization with an
//! optional OpenTelemetry bridge.

pub mod tracing_setup;
