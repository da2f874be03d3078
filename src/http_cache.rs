//! On-disk download cache with ETag / Last-Modified revalidation.
//!
//! Bodies live in one file per URL (named by the URL's SHA-256) next to a
//! JSON index of validators. A `304 Not Modified` reuses the stored file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::env_cfg::app_cache_dir;

const CACHE_VERSION: u32 = 1;
const INDEX_FILE: &str = "http_index.json";
const BODY_DIR: &str = "downloads";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheIndex {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    file: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

#[derive(Debug)]
pub struct HttpCache {
    root: PathBuf,
    index: Mutex<CacheIndex>,
}

impl HttpCache {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let index = load_index(&root.join(INDEX_FILE));
        Self {
            root,
            index: Mutex::new(index),
        }
    }

    /// Opens the cache under the app cache dir, or the temp dir when there is no home.
    pub fn from_env() -> Self {
        let root = app_cache_dir().unwrap_or_else(|| std::env::temp_dir().join("statline"));
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloads `url` into the cache (or revalidates it) and returns the body's path.
    pub fn fetch_file(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<PathBuf> {
        let body_path = self.body_path(url);
        let cached = {
            let guard = self
                .index
                .lock()
                .map_err(|_| anyhow!("http cache lock poisoned"))?;
            guard.entries.get(url).cloned()
        }
        .filter(|_| body_path.exists());

        let mut req = client.get(url);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if let Some(entry) = cached.as_ref() {
            if let Some(etag) = entry.etag.as_ref() {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = entry.last_modified.as_ref() {
                req = req.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let resp = req.send().with_context(|| format!("request {url}"))?;
        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            let Some(mut entry) = cached else {
                return Err(anyhow!("received 304 without cached body for {url}"));
            };
            debug!(url, "download cache revalidated");
            entry.fetched_at = now_secs();
            self.store_entry(url, entry)?;
            return Ok(body_path);
        }

        let headers = resp.headers().clone();
        let bytes = resp.bytes().with_context(|| format!("read body {url}"))?;
        if !status.is_success() {
            let snippet = String::from_utf8_lossy(&bytes)
                .trim()
                .replace(['\n', '\r'], " ")
                .chars()
                .take(220)
                .collect::<String>();
            return Err(anyhow!("http {status} for {url}: {snippet}"));
        }

        if let Some(dir) = body_path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let tmp = body_path.with_extension("part");
        fs::write(&tmp, &bytes).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &body_path).with_context(|| format!("swap {}", body_path.display()))?;

        let header_text = |name: reqwest::header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        };
        let entry = CacheEntry {
            file: file_name_for(url),
            etag: header_text(ETAG),
            last_modified: header_text(LAST_MODIFIED),
            fetched_at: now_secs(),
        };
        debug!(url, bytes = bytes.len(), "downloaded");
        self.store_entry(url, entry)?;
        Ok(body_path)
    }

    pub fn fetch_text(
        &self,
        client: &Client,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<String> {
        let path = self.fetch_file(client, url, extra_headers)?;
        fs::read_to_string(&path).with_context(|| format!("read cached body {}", path.display()))
    }

    /// Drops every cached download.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        guard.entries.clear();
        let dir = self.root.join(BODY_DIR);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        }
        save_index(&self.root.join(INDEX_FILE), &guard)
    }

    fn body_path(&self, url: &str) -> PathBuf {
        self.root.join(BODY_DIR).join(file_name_for(url))
    }

    fn store_entry(&self, url: &str, entry: CacheEntry) -> Result<()> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| anyhow!("http cache lock poisoned"))?;
        guard.version = CACHE_VERSION;
        guard.entries.insert(url.to_string(), entry);
        if let Err(err) = save_index(&self.root.join(INDEX_FILE), &guard) {
            warn!(error = %err, "failed to persist download cache index");
        }
        Ok(())
    }
}

fn file_name_for(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let ext = url
        .rsplit('/')
        .next()
        .and_then(|tail| tail.split('?').next())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{digest:x}.{ext}"),
        None => format!("{digest:x}"),
    }
}

fn load_index(path: &Path) -> CacheIndex {
    let Ok(raw) = fs::read_to_string(path) else {
        return CacheIndex::default();
    };
    let index = serde_json::from_str::<CacheIndex>(&raw).unwrap_or_default();
    if index.version != CACHE_VERSION {
        return CacheIndex::default();
    }
    index
}

fn save_index(path: &Path, index: &CacheIndex) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(index).context("serialize download cache index")?;
    fs::write(&tmp, json).context("write download cache index")?;
    fs::rename(&tmp, path).context("swap download cache index")?;
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_keep_short_extensions() {
        let name = file_name_for("https://example.com/player_stats_2023.parquet");
        assert!(name.ends_with(".parquet"));
        assert_eq!(name.len(), 64 + ".parquet".len());

        let query = file_name_for("https://stats.example.com/stats/playergamelog?PlayerID=1");
        assert_eq!(query.len(), 64);
    }

    #[test]
    fn stale_index_versions_are_ignored() {
        let dir = std::env::temp_dir().join(format!("statline-index-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(INDEX_FILE);
        fs::write(&path, r#"{"version":0,"entries":{"u":{"file":"f","etag":null,"last_modified":null,"fetched_at":1}}}"#).unwrap();
        assert!(load_index(&path).entries.is_empty());
        fs::remove_dir_all(&dir).ok();
    }
}
