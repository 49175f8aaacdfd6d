//! Downloader collaborator: URL + cache filename in, local file + HTTP status out.
//!
//! Providers never touch the network directly; they go through [`Downloader`].
//! Non-success statuses are *returned*, not raised, so each provider can
//! classify failures with its own policy.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use futures_util::StreamExt;

use crate::retry::{Backoff, retry_with_backoff};
use crate::stream::{SHARED_RUNTIME, StreamError, http_client, http_config, is_retryable_status};

/// One remote document to fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    /// Cache filename, relative to the downloader's cache directory
    pub filename: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
}

/// Outcome of a fetch that reached the server (or the cache)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Local copy of the body. Only present on disk for statuses < 400.
    pub path: PathBuf,
    pub status: u16,
    pub reason: String,
}

impl Fetched {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Fetch a remote document into a local file.
///
/// `Err` means no HTTP response was obtained at all (after retries).
pub trait Downloader: Sync {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Fetched, StreamError>;
}

/// HTTP downloader with an on-disk cache keyed by filename
#[derive(Debug)]
pub struct HttpDownloader {
    cache_dir: PathBuf,
    reuse_cache: bool,
}

impl HttpDownloader {
    pub fn new(cache_dir: impl Into<PathBuf>, reuse_cache: bool) -> io::Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            reuse_cache,
        })
    }

    fn attempt(&self, request: &FetchRequest<'_>, path: &Path) -> Result<Fetched, StreamError> {
        let read_timeout = http_config().read_timeout;
        let tmp = tmp_path(path);

        let (status, reason) = SHARED_RUNTIME.handle().block_on(async {
            let mut builder = http_client().get(request.url);
            for (name, value) in request.headers {
                builder = builder.header(*name, *value);
            }
            let response = builder
                .send()
                .await
                .map_err(|e| StreamError::from_reqwest(&e))?;

            let status = response.status();
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            if status.as_u16() >= 400 {
                // Error bodies are not cached
                return Ok::<_, StreamError>((status.as_u16(), reason));
            }

            let mut file = fs::File::create(&tmp)?;
            let mut body = response.bytes_stream();
            loop {
                match tokio::time::timeout(read_timeout, body.next()).await {
                    Ok(Some(chunk)) => {
                        let chunk = chunk.map_err(|e| StreamError::from_reqwest(&e))?;
                        file.write_all(&chunk)?;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        return Err(StreamError::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("read timeout ({read_timeout:?} with no data)"),
                        )));
                    }
                }
            }
            file.flush()?;
            Ok((status.as_u16(), reason))
        })?;

        if status < 400 {
            fs::rename(&tmp, path)?;
        }
        Ok(Fetched {
            path: path.to_path_buf(),
            status,
            reason,
        })
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<Fetched, StreamError> {
        let path = self.cache_dir.join(request.filename);

        if self.reuse_cache && is_cached(&path) {
            log::debug!("{}: using cached copy", request.filename);
            return Ok(Fetched {
                path,
                status: 200,
                reason: "cached".to_string(),
            });
        }

        log::debug!("GET {}", request.url);
        let result = retry_with_backoff(
            request.filename,
            Backoff::from_config(),
            || self.attempt(request, &path),
            |outcome| match outcome {
                Ok(fetched) => is_retryable_status(fetched.status),
                Err(e) => e.is_retryable(),
            },
        );
        let _ = fs::remove_file(tmp_path(&path));
        result
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A cache entry counts only if it is a non-empty file
fn is_cached(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Remove downloaded files, logging (not failing) on errors
pub fn cleanup_downloads(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => log::debug!("removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot remove {}: {e}", path.display()),
        }
    }
}
