//! Observability setup for the bot manager: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
