//! Bulk file downloads with atomic writes and streaming
//!
//! The body is streamed to `<dest>.tmp` and renamed into place once
//! complete, so an interrupted transfer never leaves a truncated file at
//! the destination. Transport errors propagate unmodified; retry policy
//! belongs to the caller.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use url::Url;

use crate::app::client::session::Session;
use crate::constants::files;
use crate::errors::{DownloadError, Result, ServerError};

/// Download behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Show a progress bar while streaming
    pub progress: bool,
    /// Explicitly allow downloading through a caching session
    pub caching: bool,
}

/// File download operations handler
pub struct DownloadHandler<'a> {
    session: &'a Session,
}

impl<'a> DownloadHandler<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Download `url` to `destination`, returning a summary line
    ///
    /// The summary reads `Downloading: <file name> Bytes: <n>`.
    ///
    /// # Errors
    ///
    /// - `DownloadError::CachingUnsupported` when the session caches
    ///   responses and `options.caching` was not requested
    /// - `DownloadError::RemoteEmpty` when the server declares a zero length
    ///   or sends an empty body; no file is left behind in either case
    /// - `ServerError` for error statuses
    /// - transport errors unmodified
    pub async fn download(
        &self,
        url: &Url,
        destination: &Path,
        options: DownloadOptions,
    ) -> Result<String> {
        if self.session.is_cached() && !options.caching {
            return Err(DownloadError::CachingUnsupported {
                url: url.to_string(),
            }
            .into());
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let response = self
            .session
            .send(self.session.client().get(url.clone()))
            .await?;

        if !response.status().is_success() {
            return Err(ServerError::from_status(response.status()).into());
        }

        let total = response.content_length();
        if total == Some(0) {
            return Err(DownloadError::RemoteEmpty {
                url: url.to_string(),
            }
            .into());
        }

        let file_name = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = progress_bar(total, options.progress, &file_name);

        let temp_path = temp_path(destination);
        let streamed = stream_to_file(response, &temp_path, &progress)
            .await
            .and_then(|written| match written {
                // Chunked bodies carry no length up front
                0 => Err(DownloadError::RemoteEmpty {
                    url: url.to_string(),
                }
                .into()),
                written => Ok(written),
            });
        let written = match streamed {
            Ok(written) => written,
            Err(e) => {
                progress.abandon();
                discard_temp(&temp_path).await;
                return Err(e);
            }
        };
        progress.finish_and_clear();

        tokio::fs::rename(&temp_path, destination)
            .await
            .map_err(|_e| DownloadError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: destination.to_path_buf(),
            })?;

        tracing::info!("Downloaded {} ({} bytes)", destination.display(), written);
        Ok(format!(
            "{} {} Bytes: {}",
            files::DOWNLOAD_SUMMARY_PREFIX,
            file_name,
            written
        ))
    }
}

async fn stream_to_file(
    response: reqwest::Response,
    temp_path: &Path,
    progress: &ProgressBar,
) -> Result<u64> {
    let io_error = |source: std::io::Error| DownloadError::Io {
        path: temp_path.to_path_buf(),
        source,
    };

    let mut file = File::create(temp_path).await.map_err(io_error)?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
        progress.set_position(written);
    }

    file.flush().await.map_err(io_error)?;
    Ok(written)
}

async fn discard_temp(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", temp_path.display(), e),
    }
}

fn progress_bar(total: Option<u64>, visible: bool, file_name: &str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = match total {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(format!("{} {}", files::DOWNLOAD_SUMMARY_PREFIX, file_name));
    bar
}

/// `<destination>.tmp`, keeping any existing extension
fn temp_path(destination: &Path) -> PathBuf {
    let mut path = OsString::from(destination.as_os_str());
    path.push(files::TEMP_FILE_SUFFIX);
    PathBuf::from(path)
}
