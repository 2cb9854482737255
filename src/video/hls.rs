//! HLS playlist resolution and segment download.
//!
//! A master playlist resolves to its highest-bandwidth variant. The media
//! playlist's segments are fetched by the worker pool into a staging
//! directory beside the target and then concatenated in playlist order.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use m3u8_rs::{KeyMethod, MasterPlaylist, MediaPlaylist, Playlist};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::error::VideoError;
use super::pool::{FetchUnit, fetch_all};
use super::transfer::fetch_bytes;
use crate::download::staging_path;

/// Whether a URL points at an HLS playlist rather than a direct file.
#[must_use]
pub fn is_playlist_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(".m3u8")
}

/// Downloads the stream behind `playlist_url` into `target` (MPEG-TS).
///
/// # Errors
///
/// Returns [`VideoError`] when the playlist cannot be resolved, a segment
/// fails, the stream is encrypted, or the output cannot be written.
#[instrument(skip(client, cancel), fields(target = %target.display()))]
pub(crate) async fn download_hls(
    client: &Client,
    playlist_url: &str,
    target: &Path,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<u64, VideoError> {
    let (media, media_url) = resolve_media_playlist(client, playlist_url).await?;
    let segments = segment_urls(&media, &media_url)?;
    info!(segments = segments.len(), "downloading HLS segments");

    let segment_dir = segment_dir(target);
    tokio::fs::create_dir_all(&segment_dir)
        .await
        .map_err(|e| VideoError::io(&segment_dir, e))?;

    let units: Vec<FetchUnit> = segments
        .into_iter()
        .enumerate()
        .map(|(index, url)| FetchUnit {
            url,
            target: segment_dir.join(format!("{index:05}.ts")),
        })
        .collect();
    let parts: Vec<PathBuf> = units.iter().map(|u| u.target.clone()).collect();

    let result = match fetch_all(client, units, concurrency, cancel).await {
        Ok(_) => concatenate(&parts, target).await,
        Err(error) => Err(error),
    };
    let _ = tokio::fs::remove_dir_all(&segment_dir).await;
    result
}

async fn resolve_media_playlist(
    client: &Client,
    playlist_url: &str,
) -> Result<(MediaPlaylist, Url), VideoError> {
    let url = parse_url(playlist_url)?;
    match parse_playlist(&fetch_bytes(client, url.as_str()).await?, url.as_str())? {
        Playlist::MediaPlaylist(media) => Ok((media, url)),
        Playlist::MasterPlaylist(master) => {
            let variant = best_variant(&master).ok_or_else(|| VideoError::Playlist {
                url: url.to_string(),
                reason: "master playlist has no variants".to_string(),
            })?;
            let variant_url = url.join(variant).map_err(|e| VideoError::InvalidUrl {
                url: variant.to_string(),
                reason: e.to_string(),
            })?;
            debug!(variant = %variant_url, "selected HLS variant");

            match parse_playlist(&fetch_bytes(client, variant_url.as_str()).await?, variant_url.as_str())? {
                Playlist::MediaPlaylist(media) => Ok((media, variant_url)),
                Playlist::MasterPlaylist(_) => Err(VideoError::Playlist {
                    url: variant_url.to_string(),
                    reason: "nested master playlist".to_string(),
                }),
            }
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, VideoError> {
    Url::parse(raw.trim()).map_err(|e| VideoError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_playlist(bytes: &[u8], url: &str) -> Result<Playlist, VideoError> {
    m3u8_rs::parse_playlist_res(bytes).map_err(|e| VideoError::Playlist {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// URI of the highest-bandwidth non-I-frame variant.
fn best_variant(master: &MasterPlaylist) -> Option<&str> {
    master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .max_by_key(|v| v.bandwidth)
        .map(|v| v.uri.as_str())
}

/// Absolute segment URLs in playlist order.
///
/// An `EXT-X-KEY` applies to every following segment until the next key
/// tag, so any key other than `NONE` makes the stream unsupported.
fn segment_urls(media: &MediaPlaylist, base: &Url) -> Result<Vec<String>, VideoError> {
    let mut urls = Vec::with_capacity(media.segments.len());
    let mut encrypted = false;
    for segment in &media.segments {
        if let Some(key) = &segment.key {
            encrypted = !matches!(key.method, KeyMethod::None);
        }
        if encrypted {
            return Err(VideoError::Encrypted {
                url: base.to_string(),
            });
        }
        let url = base.join(&segment.uri).map_err(|e| VideoError::InvalidUrl {
            url: segment.uri.clone(),
            reason: e.to_string(),
        })?;
        urls.push(url.to_string());
    }
    Ok(urls)
}

fn segment_dir(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".segments");
    PathBuf::from(name)
}

/// Joins the segment files into `target` through a staging file.
async fn concatenate(parts: &[PathBuf], target: &Path) -> Result<u64, VideoError> {
    let staging = staging_path(target);
    let file = File::create(&staging)
        .await
        .map_err(|e| VideoError::io(&staging, e))?;
    let mut writer = BufWriter::new(file);
    let mut total = 0u64;
    for part in parts {
        let bytes = tokio::fs::read(part).await.map_err(|e| VideoError::io(part, e))?;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| VideoError::io(&staging, e))?;
        total += bytes.len() as u64;
    }
    writer.flush().await.map_err(|e| VideoError::io(&staging, e))?;
    drop(writer);
    tokio::fs::rename(&staging, target)
        .await
        .map_err(|e| VideoError::io(target, e))?;
    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2400000,RESOLUTION=1280x720
high/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
seg1.ts
#EXTINF:4.0,
seg2.ts
#EXT-X-ENDLIST
";

    const ENCRYPTED: &str = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXTINF:10.0,
plain.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:10.0,
secret.ts
#EXT-X-ENDLIST
";

    fn media(text: &str) -> MediaPlaylist {
        match m3u8_rs::parse_playlist_res(text.as_bytes()).unwrap() {
            Playlist::MediaPlaylist(media) => media,
            Playlist::MasterPlaylist(_) => panic!("expected media playlist"),
        }
    }

    #[test]
    fn test_is_playlist_url() {
        assert!(is_playlist_url("https://cdn.example.com/a/index.m3u8?auth=1"));
        assert!(!is_playlist_url("https://cdn.example.com/a.mp4"));
    }

    #[test]
    fn test_best_variant_picks_highest_bandwidth() {
        let Playlist::MasterPlaylist(master) = m3u8_rs::parse_playlist_res(MASTER.as_bytes()).unwrap()
        else {
            panic!("expected master playlist");
        };
        assert_eq!(best_variant(&master), Some("high/index.m3u8"));
    }

    #[test]
    fn test_segment_urls_resolve_relative_to_playlist() {
        let base = Url::parse("https://cdn.example.com/v/high/index.m3u8").unwrap();
        let urls = segment_urls(&media(MEDIA), &base).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/v/high/seg0.ts",
                "https://cdn.example.com/v/high/seg1.ts",
                "https://cdn.example.com/v/high/seg2.ts",
            ]
        );
    }

    #[test]
    fn test_encrypted_segments_rejected() {
        let base = Url::parse("https://cdn.example.com/v/index.m3u8").unwrap();
        let err = segment_urls(&media(ENCRYPTED), &base).unwrap_err();
        assert!(matches!(err, VideoError::Encrypted { .. }));
    }

    #[tokio::test]
    async fn test_download_hls_concatenates_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/master.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MASTER))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/high/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MEDIA))
            .mount(&server)
            .await;
        for (name, body) in [("seg0.ts", "AAA"), ("seg1.ts", "BBB"), ("seg2.ts", "CC")] {
            Mock::given(method("GET"))
                .and(path(format!("/v/high/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("Lesson.ts");
        let bytes = download_hls(
            &Client::new(),
            &format!("{}/v/master.m3u8", server.uri()),
            &target,
            3,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(bytes, 8);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "AAABBBCC");
        assert!(!segment_dir(&target).exists());
        assert!(!staging_path(&target).exists());
    }

    #[tokio::test]
    async fn test_download_hls_segment_failure_aborts_video() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MEDIA))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v/seg1.ts"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("Lesson.ts");
        let err = download_hls(
            &Client::new(),
            &format!("{}/v/index.m3u8", server.uri()),
            &target,
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VideoError::HttpStatus { status: 503, .. }));
        assert!(!target.exists());
        assert!(!segment_dir(&target).exists());
    }
}
