//! `kobold-runtime` – Command Dispatch
//!
//! Ties the pure state handling of `kobold-kernel` to the vendor plumbing of
//! `kobold-middleware`.
//!
//! # Modules
//!
//! - [`dispatcher`] – [`CommandDispatcher`][dispatcher::CommandDispatcher]:
//!   the per-robot façade.  Gates concurrent commands, plans intents against
//!   the capability set, resolves the floor-plan, issues the adapter call and
//!   commits the result.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod dispatcher;
pub mod telemetry;

pub use dispatcher::{CommandDispatcher, DispatchOutcome, MOMENTARY_REVERT_DELAY};
pub use telemetry::{TracerProviderGuard, init_tracing};
