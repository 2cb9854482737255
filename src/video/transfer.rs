//! Single-file HTTP transfers used by the video pool.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use super::error::VideoError;
use crate::download::staging_path;

/// Streams `url` into `target`, writing `<target>.part` first and renaming.
///
/// On failure the staging file is removed and `target` is left untouched.
pub(crate) async fn fetch_to_file(client: &Client, url: &str, target: &Path) -> Result<u64, VideoError> {
    let part = staging_path(target);
    let result = stream_to_part(client, url, &part).await;
    match result {
        Ok(bytes) => {
            tokio::fs::rename(&part, target)
                .await
                .map_err(|e| VideoError::io(target, e))?;
            debug!(url, path = %target.display(), bytes, "video file written");
            Ok(bytes)
        }
        Err(error) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(error)
        }
    }
}

async fn stream_to_part(client: &Client, url: &str, part: &Path) -> Result<u64, VideoError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| VideoError::network(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(VideoError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let file = File::create(part).await.map_err(|e| VideoError::io(part, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| VideoError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| VideoError::io(part, e))?;
        bytes_written += chunk.len() as u64;
    }
    writer.flush().await.map_err(|e| VideoError::io(part, e))?;
    trace!(url, bytes_written, "stream complete");
    Ok(bytes_written)
}

/// Fetches a small body (a playlist) into memory.
pub(crate) async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, VideoError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| VideoError::network(url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(VideoError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| VideoError::network(url, e))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_to_file_renames_staging_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        let bytes = fetch_to_file(&Client::new(), &format!("{}/clip.mp4", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(bytes, 1024);
        assert_eq!(std::fs::read(&target).unwrap().len(), 1024);
        assert!(!staging_path(&target).exists());
    }

    #[tokio::test]
    async fn test_fetch_to_file_http_error_leaves_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing.mp4");
        let err = fetch_to_file(&Client::new(), &format!("{}/missing.mp4", server.uri()), &target)
            .await
            .unwrap_err();

        assert!(matches!(err, VideoError::HttpStatus { status: 404, .. }));
        assert!(!target.exists());
        assert!(!staging_path(&target).exists());
    }
}
