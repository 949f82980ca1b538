//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `runtime.rs` — install/sync/remove/status/list/search/route/watch.
//! - `author.rs` — publish and token management.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate protocol logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod author;
pub mod runtime;

pub use author::handle_author_commands;
pub use runtime::handle_runtime_commands;
