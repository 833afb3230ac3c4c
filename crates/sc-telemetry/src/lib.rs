//! Logging and span helpers shared by the stagecraft crates.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`,
//!   filtered by `RUST_LOG` with a configurable fallback level.
//! - **Tracing**: trace/span ID generation so every pipeline or review run
//!   can be correlated across its log lines.

pub mod logging;
pub mod tracing_setup;
