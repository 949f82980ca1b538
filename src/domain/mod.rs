//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep DTO/report structs in one place.
//! - Avoid cyclic imports and duplicated type definitions.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network side effects.
//! Changes in these structs can affect `--json` outputs and the on-disk
//! cache schema. Keep schema-impacting changes explicit.

pub mod models;
