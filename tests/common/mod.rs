use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub catalog: PathBuf,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");
        let catalog = tmp.path().join("catalog");
        fs::create_dir_all(&catalog).expect("create catalog dir");
        let root = tmp.path().join("mindsets");

        Self {
            _tmp: tmp,
            home,
            catalog,
            root,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("mindpack");
        cmd.env("HOME", &self.home)
            .env_remove("MINDPACK_TOKEN")
            .arg("--catalog")
            .arg(self.catalog.to_str().expect("catalog path utf8"))
            .arg("--root")
            .arg(self.root.to_str().expect("root path utf8"));
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    /// Stage a package in the local fixture catalog.
    pub fn stage_package(&self, id: &str, version: &str, files: &[(&str, &str)]) {
        let dir = self.catalog.join(id);
        fs::create_dir_all(&dir).expect("create package dir");

        let mut file_map = serde_json::Map::new();
        for (path, content) in files {
            file_map.insert(
                path.to_string(),
                serde_json::json!({
                    "content": content,
                    "hash": sha256_hex(content),
                    "loadFor": [],
                }),
            );
        }
        let manifest = files
            .iter()
            .find(|(p, _)| *p == "MANIFEST.md")
            .map(|(_, c)| c.to_string())
            .unwrap_or_default();
        let payload = serde_json::json!({
            "manifest": manifest,
            "package": {
                "id": id,
                "slug": id,
                "name": format!("{} package", id),
                "creator": id,
                "version": version,
                "triggers": ["brand", "logo"],
            },
            "files": file_map,
        });
        fs::write(
            dir.join("files.json"),
            serde_json::to_string_pretty(&payload).expect("serialize files"),
        )
        .expect("write files.json");
        fs::write(
            dir.join("version.json"),
            serde_json::json!({"version": version, "updatedAt": "2026-08-01T00:00:00Z"})
                .to_string(),
        )
        .expect("write version.json");
    }

    /// Stage an HTTP error code for a package (subscription flows).
    pub fn stage_status(&self, id: &str, code: u16) {
        let dir = self.catalog.join(id);
        fs::create_dir_all(&dir).expect("create package dir");
        fs::write(dir.join("http_status"), code.to_string()).expect("write http_status");
    }

    pub fn clear_status(&self, id: &str) {
        let _ = fs::remove_file(self.catalog.join(id).join("http_status"));
    }

    pub fn package_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }
}

pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn acme_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "MANIFEST.md",
            "# Acme Brand\n\nCreator: acme\nVersion: 1.0.0\nDescription: Brand guidelines.\nLoad for: brand, logo\n",
        ),
        ("brand/logo.md", "Load for: logo, brand\n\nUse the primary mark on light backgrounds.\n"),
        ("brand/typography.md", "Load for: typography\n\nHeadlines use the display face.\n"),
        (
            "notes/decisions.jsonl",
            "{\"schema\": \"decisions\", \"description\": \"one decision per line\"}\n{\"date\": \"2026-01-01\", \"what\": \"chose palette\"}\n",
        ),
    ]
}

/// Write a creator-side package directory ready to publish.
pub fn write_publish_dir(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    fs::create_dir_all(dir.join("brand")).expect("create publish dir");
    fs::write(
        dir.join("MANIFEST.md"),
        "# Acme Brand\n\nCreator: acme\nVersion: 1.0.0\nDescription: Brand guidelines.\nLoad for: brand, logo\n",
    )
    .expect("write manifest");
    fs::write(
        dir.join("brand/logo.md"),
        "Load for: logo, brand\n\nUse the primary mark.\n",
    )
    .expect("write logo file");
    dir
}
