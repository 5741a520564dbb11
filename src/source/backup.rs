//! Backup transport: the server-side snapshot of a previous extraction.
//!
//! Once a backup file has been uploaded, these endpoints serve its companies,
//! ledgers and vouchers without any live Tally involved, which is what makes
//! this source the canonical fallback target for every live fetch.

use crate::source::types::{SourceError, UploadReceipt, check_response};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Uploads beyond this size are rejected client-side before any bytes move.
pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Upload timeout scaled to file size: 5 minutes base plus 2 minutes per
/// 100MB, capped at one hour.
pub fn upload_timeout(size_bytes: u64) -> Duration {
    const BASE: Duration = Duration::from_secs(5 * 60);
    const PER_100MB: u64 = 2 * 60;
    const CAP: Duration = Duration::from_secs(60 * 60);

    let extra = (size_bytes / (100 * 1024 * 1024)) * PER_100MB;
    (BASE + Duration::from_secs(extra)).min(CAP)
}

/// Client for the `/backup/…` snapshot endpoints.
#[derive(Clone)]
pub struct BackupSource {
    http_client: Client,
    base_url: String,
}

impl BackupSource {
    /// Create a new backup client against the dashboard server.
    pub fn new(base_url: String) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(150))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            base_url,
        }
    }

    /// Companies present in the uploaded snapshot.
    ///
    /// Returns the raw payload for the normalizer.
    pub async fn companies(&self) -> Result<serde_json::Value, SourceError> {
        let response = self
            .http_client
            .get(format!("{}/backup/companies", self.base_url))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Full cached dataset for one company: ledgers, vouchers and stock
    /// items at the payload root.
    pub async fn data(&self, company: &str) -> Result<serde_json::Value, SourceError> {
        let mut url = reqwest::Url::parse(&format!("{}/backup/data/", self.base_url))
            .map_err(|e| SourceError::Unavailable(format!("invalid backup URL: {e}")))?;
        // Company names carry spaces and ampersands; let the URL type encode
        // the path segment instead of string-formatting it.
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable("backup URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(company);

        let response = self
            .http_client
            .get(url)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    /// Upload a backup file for server-side extraction.
    ///
    /// # Arguments
    /// * `path` - Local backup file, at most 2GB.
    ///
    /// # Returns
    /// An `UploadReceipt` with the company count the server extracted.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt, SourceError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("cannot read backup file: {e}")))?;
        let bytes = metadata.len();
        if bytes > MAX_UPLOAD_BYTES {
            return Err(SourceError::Unavailable(format!(
                "backup file is {bytes} bytes; the upload limit is {MAX_UPLOAD_BYTES}"
            )));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup".to_string());
        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("cannot read backup file: {e}")))?;
        let form = Form::new().part("file", Part::bytes(contents).file_name(file_name));

        let started = Instant::now();
        let response = self
            .http_client
            .post(format!("{}/backup/upload", self.base_url))
            .timeout(upload_timeout(bytes))
            .multipart(form)
            .send()
            .await?;
        let payload: serde_json::Value = check_response(response).await?.json().await?;

        let company_count = payload
            .get("companies")
            .and_then(|c| c.as_array())
            .map(|c| c.len())
            .or_else(|| {
                payload
                    .get("company_count")
                    .and_then(|c| c.as_u64())
                    .map(|c| c as usize)
            })
            .unwrap_or(0);

        let receipt = UploadReceipt {
            company_count,
            bytes,
            elapsed: started.elapsed(),
        };
        info!(
            "Uploaded {} byte backup in {:?}, server extracted {} companies",
            receipt.bytes, receipt.elapsed, receipt.company_count
        );
        Ok(receipt)
    }

    /// Delete the server-side snapshot.
    pub async fn clear(&self) -> Result<(), SourceError> {
        let response = self
            .http_client
            .post(format!("{}/backup/clear", self.base_url))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_timeout_scales_and_caps() {
        // Small file: base timeout only.
        assert_eq!(upload_timeout(10 * 1024 * 1024), Duration::from_secs(300));
        // 250MB: base + 2 full 100MB increments.
        assert_eq!(
            upload_timeout(250 * 1024 * 1024),
            Duration::from_secs(300 + 2 * 120)
        );
        // 2GB: would be 300 + 20 * 120 = 2700s, under the cap.
        assert_eq!(upload_timeout(MAX_UPLOAD_BYTES), Duration::from_secs(2700));
        // Absurd size still caps at one hour.
        assert_eq!(upload_timeout(u64::MAX), Duration::from_secs(3600));
    }
}
