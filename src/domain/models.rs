use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

/// Subscription state of an installed package, as last observed from the
/// catalog service.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// One package the consumer has pulled down. Owned exclusively by the
/// local package cache; the file system owns the bytes, this row only
/// owns metadata about them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstalledPackage {
    pub id: String,
    /// Creator slug; names the directory under the knowledge-tree root.
    #[serde(default)]
    pub slug: String,
    pub name: String,
    pub version: String,
    /// Token used to fetch the package; reused on sync.
    #[serde(default)]
    pub token: Option<String>,
    pub installed_at: String,
    #[serde(default)]
    pub last_sync: Option<String>,
    pub status: SubscriptionStatus,
    pub file_count: usize,
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    #[serde(rename = "install")]
    Install,
    #[serde(rename = "sync")]
    Sync,
    #[serde(rename = "subscription-check")]
    SubscriptionCheck,
}

/// Append-only audit row. Never mutated or deleted; diagnostics only.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncEvent {
    pub package_id: String,
    pub action: SyncAction,
    pub version_before: Option<String>,
    pub version_after: Option<String>,
    #[serde(default)]
    pub changed_paths: Vec<String>,
    pub at: String,
}

// --- catalog wire types ---

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PackageMeta {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub creator: String,
    pub version: String,
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub content: String,
    /// Expected content hash; verified before anything is written to disk.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub load_for: Vec<String>,
}

/// Response body of `GET /packages/{id}/files`, also the publish payload
/// a local catalog directory stores verbatim.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PackageFiles {
    pub manifest: String,
    pub package: PackageMeta,
    /// BTreeMap keeps file ordering deterministic across runs.
    pub files: BTreeMap<String, RemoteFile>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub success: bool,
    pub package_id: String,
    #[serde(default)]
    pub message: String,
    pub version: String,
    #[serde(default)]
    pub subscribers_notified: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenStatus {
    pub token: String,
    pub valid: bool,
    pub status: String,
}

// --- operation reports ---

#[derive(Debug, Serialize)]
pub struct InstallReport {
    pub package_id: String,
    pub name: String,
    pub version: String,
    /// `installed` or `already_installed`.
    pub status: String,
    pub files_written: usize,
    pub files_dropped: usize,
    pub domains: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub package_id: String,
    /// `updated`, `current`, `expired`, `cancelled` or `failed`.
    pub status: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    #[serde(default)]
    pub changed: Vec<String>,
    #[serde(default)]
    pub added: Vec<String>,
    pub files_dropped: usize,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct SyncTally {
    pub updated: usize,
    pub current: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Default)]
pub struct DiffReport {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishReport {
    pub package_id: String,
    pub version: String,
    pub file_count: usize,
    pub warnings: Vec<String>,
    pub diff: DiffReport,
    pub uploaded: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PackageStatusReport {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: SubscriptionStatus,
    pub file_count: usize,
    pub last_sync: Option<String>,
    pub integrity_failures: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub packages: Vec<PackageStatusReport>,
    pub last_sync: Option<String>,
    pub subscription_checks: Vec<TokenStatus>,
}
