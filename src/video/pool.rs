//! Bounded worker pool for independent file transfers.
//!
//! Units are fetched concurrently, at most `concurrency` at a time. The
//! first failure stops new units from starting; units already in flight run
//! to completion and the failure is returned for the whole batch.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::error::VideoError;
use super::transfer::fetch_to_file;

/// One file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchUnit {
    pub url: String,
    pub target: PathBuf,
}

/// Fetches every unit, returning the total bytes written.
///
/// # Errors
///
/// Returns the first unit failure, or [`VideoError::Cancelled`] when
/// `cancel` fired before every unit was started.
#[instrument(skip(client, units, cancel), fields(units = units.len()))]
pub(crate) async fn fetch_all(
    client: &Client,
    units: Vec<FetchUnit>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<u64, VideoError> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    // Fired by the parent token or by the first failing unit.
    let abort = cancel.child_token();
    let mut set = JoinSet::new();
    let total = units.len();

    for unit in units {
        let permit = tokio::select! {
            biased;
            () = abort.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => {
                permit.map_err(|_| VideoError::Worker("worker pool closed".to_string()))?
            }
        };

        let client = client.clone();
        let abort = abort.clone();
        set.spawn(async move {
            let _permit = permit;
            if abort.is_cancelled() {
                return Ok(None);
            }
            match fetch_to_file(&client, &unit.url, &unit.target).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(error) => {
                    abort.cancel();
                    Err(error)
                }
            }
        });
    }

    let mut first_error = None;
    let mut completed = 0usize;
    let mut bytes_total = 0u64;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(Some(bytes))) => {
                completed += 1;
                bytes_total += bytes;
            }
            Ok(Ok(None)) => {}
            Ok(Err(error)) => {
                warn!(%error, "video unit failed");
                first_error.get_or_insert(error);
            }
            Err(join_error) => {
                abort.cancel();
                first_error.get_or_insert(VideoError::Worker(join_error.to_string()));
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    if completed < total {
        debug!(completed, total, "video pool stopped early");
        return Err(VideoError::Cancelled);
    }
    Ok(bytes_total)
}
