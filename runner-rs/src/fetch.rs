//! Fetching of remote or local text datasets.
//!
//! Remote responses can be cached on disk. The cache file name is the hex
//! SHA-256 digest of the URL, so the same URL always maps to the same file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Largest response body accepted from a remote source.
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    Path(PathBuf),
}

impl Source {
    pub fn describe(&self) -> String {
        match self {
            Source::Url(url) => url.clone(),
            Source::Path(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network failure fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    /// Directory holding cached copies of remote responses.
    pub cache_dir: Option<PathBuf>,
    /// Skip cached copies and always hit the network.
    pub refresh: bool,
}

impl Fetcher {
    pub fn new(cache_dir: Option<PathBuf>, refresh: bool) -> Self {
        Self { cache_dir, refresh }
    }

    pub fn fetch(&self, source: &Source) -> Result<String, FetchError> {
        match source {
            Source::Path(path) => read_local(path),
            Source::Url(url) => self.fetch_url(url),
        }
    }

    fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        let Some(dir) = &self.cache_dir else {
            return get(url);
        };

        let cached = cache_path(dir, url);
        if !self.refresh && cached.is_file() {
            log::debug!("cache hit for {url} at {}", cached.display());
            return read_local(&cached);
        }

        log::debug!("cache miss for {url}");
        let body = get(url)?;
        fs::create_dir_all(dir).map_err(|source| FetchError::Io {
            path: dir.clone(),
            source,
        })?;
        fs::write(&cached, &body).map_err(|source| FetchError::Io {
            path: cached.clone(),
            source,
        })?;
        Ok(body)
    }
}

pub fn cache_path(dir: &Path, url: &str) -> PathBuf {
    let digest = Sha256::digest(url.as_bytes());
    dir.join(format!("{}.csv", hex::encode(digest)))
}

fn read_local(path: &Path) -> Result<String, FetchError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            FetchError::NotFound(path.display().to_string())
        } else {
            FetchError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn get(url: &str) -> Result<String, FetchError> {
    let network = |message: String| FetchError::Network {
        url: url.to_string(),
        message,
    };

    let mut response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound(url.to_string()),
        other => network(other.to_string()),
    })?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_string()
        .map_err(|err| network(err.to_string()))
}
