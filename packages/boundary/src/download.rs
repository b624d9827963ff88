//! Boundary archive download from the e-Stat GIS statmap service.
//!
//! One request per prefecture: the server answers with a zipped shapefile
//! whose name comes from `Content-Disposition`. The body is streamed into a
//! `.part` file next to the destination and renamed once complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt as _;
use regex::Regex;
use tokio::io::AsyncWriteExt as _;

use crate::BoundaryError;
use crate::progress::ProgressCallback;

/// Base URL of the statmap boundary download endpoint.
pub const DEFAULT_DOWNLOAD_URL: &str = "https://www.e-stat.go.jp/gis/statmap-search/data";

/// Survey id of the 2015 census small-area boundaries.
pub const SURVEY_ID: &str = "A002005212015";

/// World geodetic system (JGD2000 lat/lon).
const COORD_SYS: &str = "1";
const FORMAT: &str = "shape";
const DOWNLOAD_TYPE: &str = "5";

const USER_AGENT: &str = concat!("estat/", env!("CARGO_PKG_VERSION"));

/// Archive name the server uses for a prefecture.
#[must_use]
pub fn expected_file_name(pref_code: &str) -> String {
    format!("{SURVEY_ID}DDSWC{pref_code}.zip")
}

/// Downloads boundary archives for one prefecture at a time.
#[derive(Debug, Clone)]
pub struct BoundaryDownloader {
    client: reqwest::Client,
    base_url: String,
}

impl BoundaryDownloader {
    /// Creates a downloader against `base_url` (normally
    /// [`DEFAULT_DOWNLOAD_URL`]).
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BoundaryError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Full request URL for a two-digit prefecture code.
    #[must_use]
    pub fn request_url(&self, pref_code: &str) -> String {
        format!(
            "{}?dlserveyId={SURVEY_ID}&code={pref_code}&coordSys={COORD_SYS}&format={FORMAT}&downloadType={DOWNLOAD_TYPE}",
            self.base_url
        )
    }

    /// Downloads the archive for `pref_code` into `dest_dir` and returns its
    /// path.
    ///
    /// With `overwrite` unset, an archive already present under the expected
    /// name is returned without any request; one present under the name the
    /// server resolves is returned without reading the body.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::HttpStatus`] on a non-200 answer (nothing is
    /// written), [`BoundaryError::Http`] on transport failure, or
    /// [`BoundaryError::Io`] if the directory or file cannot be written.
    pub async fn download(
        &self,
        pref_code: &str,
        dest_dir: &Path,
        overwrite: bool,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<PathBuf, BoundaryError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| BoundaryError::Io {
                path: dest_dir.display().to_string(),
                source: e,
            })?;

        let expected = dest_dir.join(expected_file_name(pref_code));
        if !overwrite && expected.is_file() {
            log::info!(
                "{} already exists and overwrite is off, skipping download",
                expected.display()
            );
            return Ok(expected);
        }

        let url = self.request_url(pref_code);
        log::info!("Downloading {url}");

        let response = self.client.get(&url).send().await?;

        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok());
        let file_name = resolve_file_name(disposition, &url)?;
        let dest = dest_dir.join(&file_name);

        if !overwrite && dest.is_file() {
            log::info!(
                "{} already exists and overwrite is off, skipping download",
                dest.display()
            );
            return Ok(dest);
        }

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(BoundaryError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        if let Some(total) = response.content_length() {
            progress.set_total(total);
        }
        progress.set_message(file_name.clone());
        log::info!("  -> {}", dest.display());

        let part = dest.with_extension("zip.part");
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |e| BoundaryError::Io { path, source: e }
        };

        let mut file = tokio::fs::File::create(&part).await.map_err(io_err(&part))?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await.map_err(io_err(&part))?;
            downloaded += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }

        file.flush().await.map_err(io_err(&part))?;
        drop(file);

        tokio::fs::rename(&part, &dest)
            .await
            .map_err(io_err(&dest))?;

        #[allow(clippy::cast_precision_loss)]
        let mb = downloaded as f64 / 1_048_576.0;
        progress.finish(format!("{file_name} ({mb:.1} MB)"));
        log::info!("Downloaded {file_name}: {mb:.1} MB");

        Ok(dest)
    }
}

/// Takes the file name from a `filename*=UTF-8''<name>` token, falling back
/// to the last path segment of `url`.
///
/// # Errors
///
/// Returns [`BoundaryError::Pattern`] if the header pattern fails to
/// compile.
pub fn resolve_file_name(disposition: Option<&str>, url: &str) -> Result<String, BoundaryError> {
    let pattern = Regex::new(r"filename.+''(.+)")?;

    let from_header = disposition
        .and_then(|value| pattern.captures(value))
        .and_then(|captures| captures.get(1))
        .and_then(|name| base_name(name.as_str().trim()));

    if let Some(name) = from_header {
        return Ok(name);
    }

    log::warn!("Could not read a file name from Content-Disposition, using the URL");

    let tail = reqwest::Url::parse(url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .or_else(|| url.rsplit('/').next().map(str::to_string))
        .unwrap_or_default();

    Ok(base_name(&tail).unwrap_or(tail))
}

/// Strips any directory part from a server-supplied name.
fn base_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
