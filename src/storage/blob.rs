use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{header, Client, Response, StatusCode};

use crate::azure::Session;
use crate::error::{Error, Result};

const STORAGE_API_VERSION: &str = "2023-11-03";

/// Uploads files to one Azure Storage account's blob endpoint.
pub struct BlobUploader {
    client: Client,
    endpoint: String,
}

impl BlobUploader {
    pub fn new(account_name: &str, session: Session) -> Result<Self> {
        if account_name.trim().is_empty() {
            return Err(Error::Config("storage account name is empty".to_string()));
        }
        Self::with_endpoint(format!("https://{}.blob.core.windows.net", account_name), session)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, session: Session) -> Result<Self> {
        tracing::debug!("Blob uploader authenticated via {}", session.issued_by());
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-ms-version",
            header::HeaderValue::from_static(STORAGE_API_VERSION),
        );
        let mut auth = header::HeaderValue::from_str(&session.bearer())?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates the container when absent. An existing container is not an error.
    /// Returns whether the container was newly created.
    pub async fn ensure_container(&self, container: &str) -> Result<bool> {
        let url = format!("{}/{}?restype=container", self.endpoint, container);
        tracing::debug!("PUT {}", url);
        let response = self.client.put(&url).header(header::CONTENT_LENGTH, 0).send().await?;

        match response.status() {
            StatusCode::CREATED => {
                tracing::info!("Created container '{}'", container);
                Ok(true)
            }
            StatusCode::CONFLICT => {
                tracing::info!("Container '{}' already exists", container);
                Ok(false)
            }
            _ => Err(storage_error(response, &format!("create container {}", container)).await),
        }
    }

    /// Uploads as a block blob named after the file, overwriting any existing
    /// blob. Returns the blob URL.
    pub async fn upload(&self, local_path: &Path, container: &str) -> Result<String> {
        let blob_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Config(format!("invalid file name: {}", local_path.display())))?;
        let data = tokio::fs::read(local_path).await?;
        let url = format!("{}/{}/{}", self.endpoint, container, blob_name);

        tracing::info!("Uploading {} as {}", local_path.display(), blob_name);
        let response = self
            .client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(header::CONTENT_TYPE, content_type(blob_name))
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(storage_error(response, &format!("upload {}", blob_name)).await);
        }

        tracing::info!("Upload successful: {}", url);
        Ok(url)
    }

    /// Ensures the container, then uploads each file that exists locally.
    ///
    /// Authentication and connection failures abort; other per-file failures
    /// are recorded and the remaining files are still attempted.
    pub async fn upload_all(&self, files: &[PathBuf], container: &str) -> Result<UploadSummary> {
        self.ensure_container(container).await?;

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut summary = UploadSummary::default();
        for file in files {
            if !file.exists() {
                tracing::warn!("File not found: {}", file.display());
                summary.skipped.push(file.clone());
                pb.inc(1);
                continue;
            }

            match self.upload(file, container).await {
                Ok(url) => summary.uploaded.push(url),
                Err(e @ (Error::Auth(_) | Error::Network(_))) => {
                    pb.abandon();
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Upload failed for {}: {}", file.display(), e);
                    summary.failed.push((file.clone(), e.to_string()));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Upload complete");
        Ok(summary)
    }
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    pub uploaded: Vec<String>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

fn content_type(blob_name: &str) -> &'static str {
    if blob_name.ends_with(".json") {
        "application/json"
    } else if blob_name.ends_with(".csv") {
        "text/csv"
    } else {
        "application/octet-stream"
    }
}

async fn storage_error(response: Response, what: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Auth(format!("{}: {} {}", what, status, snippet))
        }
        StatusCode::NOT_FOUND => Error::NotFound(format!("{}: {}", what, snippet)),
        _ => Error::Storage(format!("{} failed: {} {}", what, status, snippet)),
    }
}
