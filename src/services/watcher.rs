//! File-change watcher.
//!
//! Polls the knowledge tree for mtime/size changes and coalesces bursts
//! through a debounce window before regenerating the routing manifest.
//! Regeneration is an idempotent pure function of the tree, so any number
//! of coalesced triggers collapse into one rebuild.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

pub struct TreeWatcher {
    root: PathBuf,
    /// Last observed (mtime, size) per file.
    seen: HashMap<PathBuf, (SystemTime, u64)>,
    interval: Duration,
    debounce: Duration,
}

impl TreeWatcher {
    pub fn new(root: PathBuf, interval: Duration, debounce: Duration) -> Self {
        let mut watcher = Self {
            root,
            seen: HashMap::new(),
            interval,
            debounce,
        };
        // Prime with the current state; startup is not a change.
        watcher.scan();
        watcher
    }

    /// One poll pass. Returns the paths that changed, appeared or
    /// disappeared since the last pass.
    pub fn scan(&mut self) -> Vec<PathBuf> {
        let mut current = HashMap::new();
        collect(&self.root, &mut current);

        let mut changed = Vec::new();
        for (path, stamp) in &current {
            if self.seen.get(path) != Some(stamp) {
                changed.push(path.clone());
            }
        }
        for path in self.seen.keys() {
            if !current.contains_key(path) {
                changed.push(path.clone());
            }
        }
        self.seen = current;
        changed
    }

    /// Run the poll loop until `running` reports false. Changes are
    /// queued and only flushed once the tree has been quiet for the
    /// debounce window.
    pub fn run(
        mut self,
        mut running: impl FnMut() -> bool,
        mut on_change: impl FnMut(&Path, &[PathBuf]),
    ) {
        info!(
            root = %self.root.display(),
            interval_ms = self.interval.as_millis() as u64,
            debounce_ms = self.debounce.as_millis() as u64,
            "watching knowledge tree"
        );
        let mut pending: Vec<PathBuf> = Vec::new();
        let mut quiet_since: Option<Instant> = None;
        while running() {
            std::thread::sleep(self.interval);
            let changed = self.scan();
            if !changed.is_empty() {
                debug!(count = changed.len(), "tree changed; debouncing");
                pending.extend(changed);
                quiet_since = Some(Instant::now());
            }
            if let Some(since) = quiet_since {
                if since.elapsed() >= self.debounce && !pending.is_empty() {
                    pending.sort();
                    pending.dedup();
                    on_change(&self.root, &pending);
                    pending.clear();
                    quiet_since = None;
                }
            }
        }
    }
}

fn collect(dir: &Path, out: &mut HashMap<PathBuf, (SystemTime, u64)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        // The generated manifest must not re-trigger its own regeneration.
        if name.starts_with('.') || name == super::router::ROUTING_FILE {
            continue;
        }
        if path.is_dir() {
            collect(&path, out);
        } else if let Ok(meta) = entry.metadata() {
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.insert(path, (mtime, meta.len()));
        }
    }
}
