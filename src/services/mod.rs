//! Service layer containing protocol logic and side-effect helpers.
//!
//! ## Service map
//! - `scanner.rs` — injection/PII pattern tables and scoring.
//! - `integrity.rs` — content hashing and integrity records.
//! - `cache.rs` — sled-backed installed-package and sync-event store.
//! - `credentials.rs` — token resolution and the secret store.
//! - `router.rs` — file inventory, query scoring, routing manifest.
//! - `install.rs` — install pipeline (vet, write, record).
//! - `sync.rs` — per-package sync with subscription handling.
//! - `publish.rs` — validation + security gates, diff, upload.
//! - `watcher.rs` — debounced tree watcher.
//! - `storage.rs` — config, local paths, audit log.
//! - `output.rs` — `{ok, data}` stdout and `{ok, error}` stderr rendering.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod cache;
pub mod credentials;
pub mod install;
pub mod integrity;
pub mod output;
pub mod publish;
pub mod router;
pub mod scanner;
pub mod storage;
pub mod sync;
pub mod watcher;
