//! Content-addressed disk cache for provider responses.
//!
//! The cache key is derived purely from request parameters (kind, ticker,
//! date range) -- it must never encode a strategy decision, so that cache
//! hits are reproducible across config changes that don't touch the data
//! request itself.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct HttpCache {
    root: Option<PathBuf>,
}

impl HttpCache {
    /// Reads the cache root from `YBI_HTTP_CACHE_DIR`. `None` disables
    /// caching entirely (every request goes to the network).
    pub fn from_env() -> Self {
        let root = std::env::var("YBI_HTTP_CACHE_DIR").ok().map(PathBuf::from);
        Self { root }
    }

    pub fn with_root(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn key_path(&self, key_parts: &[&str]) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        let mut hasher = Sha256::new();
        for part in key_parts {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        let digest = hex::encode(hasher.finalize());
        Some(root.join(format!("{}.json", digest)))
    }

    pub fn get(&self, key_parts: &[&str]) -> Option<String> {
        let path = self.key_path(key_parts)?;
        std::fs::read_to_string(path).ok()
    }

    pub fn put(&self, key_parts: &[&str], body: &str) {
        let Some(path) = self.key_path(key_parts) else {
            return;
        };
        if let Some(parent) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(path, body);
    }
}
