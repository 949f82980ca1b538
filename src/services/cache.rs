//! Local package cache.
//!
//! A sled database opened once per process and passed around as an
//! explicit handle. Two trees: `installed` keyed by package id, and
//! `events`, an append-only log keyed by a monotonic id. Every mutation
//! is a single-key upsert/delete, so sled's per-operation atomicity is
//! the only transaction discipline needed.

use crate::domain::models::{InstalledPackage, SubscriptionStatus, SyncEvent};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::Path;

pub struct PackageCache {
    installed: sled::Tree,
    events: sled::Tree,
    db: sled::Db,
}

impl PackageCache {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("open package cache at {}", path.display()))?;
        let installed = db.open_tree("installed")?;
        let events = db.open_tree("events")?;
        Ok(Self {
            installed,
            events,
            db,
        })
    }

    pub fn upsert_installed(&self, row: &InstalledPackage) -> anyhow::Result<()> {
        self.installed
            .insert(row.id.as_bytes(), serde_json::to_vec(row)?)?;
        Ok(())
    }

    pub fn get_installed(&self, id: &str) -> anyhow::Result<Option<InstalledPackage>> {
        match self.installed.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// All installed packages, ordered by id (sled iterates keys sorted).
    pub fn list_installed(&self) -> anyhow::Result<Vec<InstalledPackage>> {
        let mut out = Vec::new();
        for item in self.installed.iter() {
            let (_, raw) = item?;
            out.push(serde_json::from_slice(&raw)?);
        }
        Ok(out)
    }

    pub fn remove_installed(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.installed.remove(id.as_bytes())?.is_some())
    }

    pub fn append_event(&self, event: &SyncEvent) -> anyhow::Result<()> {
        // Zero-padded monotonic key keeps events in append order.
        let key = format!("{:020}", self.db.generate_id()?);
        self.events
            .insert(key.as_bytes(), serde_json::to_vec(event)?)?;
        Ok(())
    }

    pub fn events_for(&self, package_id: Option<&str>) -> anyhow::Result<Vec<SyncEvent>> {
        let mut out = Vec::new();
        for item in self.events.iter() {
            let (_, raw) = item?;
            let event: SyncEvent = serde_json::from_slice(&raw)?;
            if package_id.map(|id| id == event.package_id).unwrap_or(true) {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Max of all last-sync timestamps; `None` when nothing has synced.
    pub fn last_sync_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for row in self.list_installed()? {
            let Some(raw) = row.last_sync else { continue };
            if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
                let ts = ts.with_timezone(&Utc);
                if latest.map(|l| ts > l).unwrap_or(true) {
                    latest = Some(ts);
                }
            }
        }
        Ok(latest)
    }

    /// Upsert subscription state independently of any file sync.
    pub fn cache_subscription_status(
        &self,
        id: &str,
        status: SubscriptionStatus,
    ) -> anyhow::Result<()> {
        if let Some(mut row) = self.get_installed(id)? {
            row.status = status;
            self.upsert_installed(&row)?;
        }
        Ok(())
    }
}
