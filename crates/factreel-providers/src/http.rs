//! Shared HTTP plumbing: failure classification, JSON decoding and streamed
//! downloads.
//!
//! Timeouts, connection errors, 429 and 5xx are transient. Other 4xx
//! responses and bodies that do not decode are permanent.

use std::path::{Path, PathBuf};

use factreel_core::domain::ProviderError;
use factreel_core::providers::ProviderResult;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Longest slice of a response body kept in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

pub const USER_AGENT: &str = concat!("factreel/", env!("CARGO_PKG_VERSION"));

/// Build the shared client used by every HTTP provider.
pub fn client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()
}

pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    let msg = format!("HTTP {status}: {excerpt}");
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ProviderError::Transient(msg)
    } else {
        ProviderError::Permanent(msg)
    }
}

pub fn classify_error(err: &reqwest::Error) -> ProviderError {
    if let Some(status) = err.status() {
        return classify_status(status, &err.to_string());
    }
    if err.is_decode() || err.is_builder() {
        return ProviderError::permanent(err.to_string());
    }
    // Timeouts, connect failures and interrupted bodies.
    ProviderError::transient(err.to_string())
}

/// Read a response body and decode it as JSON, classifying every failure.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| classify_error(&e))?;
    if !status.is_success() {
        return Err(classify_status(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::permanent(format!("malformed response body: {e}")))
}

/// Stream `url` into `dest`. The file only appears under its final name once
/// the transfer has completed.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> ProviderResult<PathBuf> {
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_error(&e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    let partial = dest.with_extension("part");
    let written = match write_body(&mut response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };
    if written == 0 {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(ProviderError::permanent(format!("empty download from {url}")));
    }
    if let Err(e) = tokio::fs::rename(&partial, dest).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(ProviderError::transient(format!("writing {}: {e}", dest.display())));
    }
    debug!(url = %url, bytes = written, path = %dest.display(), "download complete");
    Ok(dest.to_path_buf())
}

/// Copy the response body into `path`, returning the byte count.
async fn write_body(response: &mut Response, path: &Path) -> ProviderResult<u64> {
    let io_err = |e: std::io::Error| ProviderError::transient(format!("writing {}: {e}", path.display()));
    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(|e| classify_error(&e))? {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}
