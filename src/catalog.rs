//! Catalog-service client.
//!
//! A catalog source is either a remote HTTPS endpoint or a local directory
//! laid out as `<dir>/<package-id>/{version.json, files.json}`. Local
//! directories are the development/rehearsal path: `publish` writes them,
//! `install`/`sync` read them, and an optional `<dir>/<id>/http_status`
//! file stages an HTTP error code (401/402/403/404) so subscription flows
//! can be exercised offline.

use crate::domain::models::{PackageFiles, PublishResponse, TokenStatus, VersionInfo};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("package not found: {0}")]
    NotFound(String),
    #[error("token invalid or expired for package: {0}")]
    AuthRequired(String),
    #[error("subscription required for package: {0}")]
    SubscriptionRequired(String),
    #[error("access revoked for package: {0}")]
    Forbidden(String),
    #[error("catalog unreachable: {0}")]
    Transient(String),
    #[error("catalog protocol error: {0}")]
    Protocol(String),
}

pub struct Catalog {
    source: String,
    /// Present only for remote sources.
    client: Option<reqwest::blocking::Client>,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

impl Catalog {
    pub fn new(source: &str) -> anyhow::Result<Self> {
        let client = if is_remote(source) {
            Some(
                reqwest::blocking::Client::builder()
                    .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            source: source.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get_version(&self, package_id: &str) -> Result<VersionInfo, CatalogError> {
        match &self.client {
            Some(client) => {
                let url = format!("{}/packages/{}/version", self.source, package_id);
                let resp = client
                    .get(url)
                    .send()
                    .map_err(|e| map_transport_error(&e))?;
                let resp = check_status(resp, package_id)?;
                resp.json().map_err(|e| CatalogError::Protocol(e.to_string()))
            }
            None => {
                self.local_status_gate(package_id)?;
                let raw = self.read_local(package_id, "version.json")?;
                serde_json::from_str(&raw).map_err(|e| CatalogError::Protocol(e.to_string()))
            }
        }
    }

    pub fn get_files(
        &self,
        package_id: &str,
        token: Option<&str>,
    ) -> Result<PackageFiles, CatalogError> {
        match &self.client {
            Some(client) => {
                let url = format!("{}/packages/{}/files", self.source, package_id);
                let mut req = client.get(url);
                if let Some(t) = token {
                    req = req.bearer_auth(t);
                }
                let resp = req.send().map_err(|e| map_transport_error(&e))?;
                let resp = check_status(resp, package_id)?;
                resp.json().map_err(|e| CatalogError::Protocol(e.to_string()))
            }
            None => {
                self.local_status_gate(package_id)?;
                let raw = self.read_local(package_id, "files.json")?;
                serde_json::from_str(&raw).map_err(|e| CatalogError::Protocol(e.to_string()))
            }
        }
    }

    pub fn publish(
        &self,
        token: Option<&str>,
        payload: &PackageFiles,
    ) -> Result<PublishResponse, CatalogError> {
        let id = payload.package.id.clone();
        match &self.client {
            Some(client) => {
                let url = format!("{}/packages/publish", self.source);
                let body = serde_json::json!({
                    "manifest": payload.manifest,
                    "files": payload.files,
                });
                let mut req = client.post(url).json(&body);
                if let Some(t) = token {
                    req = req.bearer_auth(t);
                }
                let resp = req.send().map_err(|e| map_transport_error(&e))?;
                let resp = check_status(resp, &id)?;
                resp.json().map_err(|e| CatalogError::Protocol(e.to_string()))
            }
            None => {
                let dir = self.local_package_dir(&id);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| CatalogError::Transient(e.to_string()))?;
                let version = serde_json::json!({
                    "version": payload.package.version,
                    "updatedAt": chrono::Utc::now().to_rfc3339(),
                });
                write_local(&dir.join("version.json"), &version.to_string())?;
                let files = serde_json::to_string_pretty(payload)
                    .map_err(|e| CatalogError::Protocol(e.to_string()))?;
                write_local(&dir.join("files.json"), &files)?;
                Ok(PublishResponse {
                    success: true,
                    package_id: id,
                    message: "published to local catalog".to_string(),
                    version: payload.package.version.clone(),
                    subscribers_notified: 0,
                })
            }
        }
    }

    pub fn validate_subscriptions(
        &self,
        tokens: &[String],
    ) -> Result<Vec<TokenStatus>, CatalogError> {
        match &self.client {
            Some(client) => {
                let url = format!("{}/packages/subscriptions/validate", self.source);
                let resp = client
                    .post(url)
                    .json(&serde_json::json!({ "tokens": tokens }))
                    .send()
                    .map_err(|e| map_transport_error(&e))?;
                let resp = check_status(resp, "subscriptions")?;
                #[derive(Deserialize)]
                struct Wrap {
                    results: Vec<TokenStatus>,
                }
                let wrap: Wrap = resp
                    .json()
                    .map_err(|e| CatalogError::Protocol(e.to_string()))?;
                Ok(wrap.results)
            }
            // Local catalogs have no subscription ledger; every token is valid.
            None => Ok(tokens
                .iter()
                .map(|t| TokenStatus {
                    token: t.clone(),
                    valid: true,
                    status: "active".to_string(),
                })
                .collect()),
        }
    }

    fn local_package_dir(&self, package_id: &str) -> PathBuf {
        Path::new(&self.source).join(package_id)
    }

    fn read_local(&self, package_id: &str, file: &str) -> Result<String, CatalogError> {
        let path = self.local_package_dir(package_id).join(file);
        if !path.exists() {
            return Err(CatalogError::NotFound(package_id.to_string()));
        }
        std::fs::read_to_string(path).map_err(|e| CatalogError::Transient(e.to_string()))
    }

    /// Honor a staged HTTP status code in a local catalog directory.
    fn local_status_gate(&self, package_id: &str) -> Result<(), CatalogError> {
        let path = self.local_package_dir(package_id).join("http_status");
        if !path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path).unwrap_or_default();
        match raw.trim() {
            "401" => Err(CatalogError::AuthRequired(package_id.to_string())),
            "402" => Err(CatalogError::SubscriptionRequired(package_id.to_string())),
            "403" => Err(CatalogError::Forbidden(package_id.to_string())),
            "404" => Err(CatalogError::NotFound(package_id.to_string())),
            _ => Ok(()),
        }
    }
}

fn check_status(
    resp: reqwest::blocking::Response,
    package_id: &str,
) -> Result<reqwest::blocking::Response, CatalogError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status.as_u16() {
        401 => Err(CatalogError::AuthRequired(package_id.to_string())),
        402 => Err(CatalogError::SubscriptionRequired(package_id.to_string())),
        403 => Err(CatalogError::Forbidden(package_id.to_string())),
        404 => Err(CatalogError::NotFound(package_id.to_string())),
        code if code >= 500 => Err(CatalogError::Transient(format!(
            "catalog returned {} for {}",
            code, package_id
        ))),
        code => Err(CatalogError::Protocol(format!(
            "unexpected status {} for {}",
            code, package_id
        ))),
    }
}

fn map_transport_error(e: &reqwest::Error) -> CatalogError {
    if e.is_timeout() || e.is_connect() {
        CatalogError::Transient(e.to_string())
    } else {
        CatalogError::Protocol(e.to_string())
    }
}

fn write_local(path: &Path, body: &str) -> Result<(), CatalogError> {
    std::fs::write(path, body).map_err(|e| CatalogError::Transient(e.to_string()))
}
