//! Output discipline behind the global `--json` flag.
//!
//! Every invocation writes at most one JSON document to stdout, shaped
//! `{ok, data}`. Failures render on stderr (`{ok: false, error}` in JSON
//! mode), so a run that already reported partial results, like a sync
//! with per-package failures, still leaves stdout a single parseable
//! document.

use crate::domain::models::JsonOut;
use serde::Serialize;

/// List result: one rendered line per row, or the full array as `data`.
pub fn emit_rows<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

/// Single successful result.
pub fn emit_one<T: Serialize>(
    json: bool,
    data: T,
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    emit_outcome(json, true, data, line)
}

/// Result whose `ok` flag reflects the outcome. A sync run with failed
/// packages reports `ok: false` alongside its per-package data.
pub fn emit_outcome<T: Serialize>(
    json: bool,
    ok: bool,
    data: T,
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOut { ok, data })?);
    } else {
        println!("{}", line(&data));
    }
    Ok(())
}

/// Render a command failure on stderr, leaving stdout untouched.
pub fn emit_error(json: bool, err: &anyhow::Error) {
    if json {
        eprintln!(
            "{}",
            serde_json::json!({ "ok": false, "error": format!("{:#}", err) })
        );
    } else {
        eprintln!("error: {:#}", err);
    }
}
