//! Remote capability: where snapshots come from.

mod memos;

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::models::{RemoteAttachment, RemoteNote, RemoteSnapshot};

pub use memos::{parse_memo_list, parse_resource_list, MemosClient};

/// Resource downloads in flight at once.
const DOWNLOAD_CONCURRENCY: usize = 4;

/// Resource metadata needed to download and place an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub id: String,
    pub filename: String,
    pub external_link: Option<String>,
    pub memo_id: Option<String>,
}

/// Every memo plus the metadata of every resource, nothing downloaded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    pub notes: Vec<RemoteNote>,
    pub resources: Vec<ResourceRef>,
}

/// Talks to the server holding the memos.
pub trait RemoteCapability: Send + Sync {
    /// List every memo and resource visible to `credentials`.
    fn list(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<RemoteListing>> + Send;

    /// Download the bytes of one resource.
    fn download(
        &self,
        credentials: &Credentials,
        resource: &ResourceRef,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetch a full snapshot from `remote`.
///
/// `list_timeout` bounds the list calls; exceeding it fails the fetch with
/// [`Error::Timeout`]. Each download is bounded by `download_timeout` on its
/// own. A download that fails or times out does not fail the fetch; that
/// attachment comes back with `content = None`.
pub async fn fetch_snapshot<R: RemoteCapability>(
    remote: &R,
    credentials: &Credentials,
    list_timeout: Duration,
    download_timeout: Duration,
) -> Result<RemoteSnapshot> {
    let listing = tokio::time::timeout(list_timeout, remote.list(credentials))
        .await
        .map_err(|_| Error::Timeout(list_timeout))??;
    tracing::debug!(
        "Fetched {} memos and {} resources from {}",
        listing.notes.len(),
        listing.resources.len(),
        credentials.base_url
    );

    let attachments = stream::iter(listing.resources)
        .map(|resource| async move {
            let download = remote.download(credentials, &resource);
            let content = match tokio::time::timeout(download_timeout, download).await {
                Ok(Ok(bytes)) => Some(bytes),
                Ok(Err(error)) => {
                    tracing::warn!("Failed to download resource {}: {}", resource.filename, error);
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        "Download of resource {} timed out after {:?}",
                        resource.filename,
                        download_timeout
                    );
                    None
                }
            };
            RemoteAttachment {
                filename: resource.filename,
                content,
                note_id: resource.memo_id,
            }
        })
        .buffered(DOWNLOAD_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;

    Ok(RemoteSnapshot {
        notes: listing.notes,
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use crate::sync::fakes::FakeRemote;
    use pretty_assertions::assert_eq;

    fn credentials() -> Credentials {
        Credentials {
            base_url: "https://memos.example.com".to_string(),
            credential: Credential::AccessToken("token".to_string()),
        }
    }

    fn snapshot() -> RemoteSnapshot {
        RemoteSnapshot {
            notes: vec![RemoteNote::new("abc", "hello")],
            attachments: vec![
                RemoteAttachment::new("a.png", b"a".to_vec()),
                RemoteAttachment::unavailable("broken.png"),
                RemoteAttachment::new("c.png", b"c".to_vec()),
            ],
        }
    }

    #[tokio::test]
    async fn failed_downloads_come_back_without_content() {
        let remote = FakeRemote::new(snapshot());

        let fetched = fetch_snapshot(
            &remote,
            &credentials(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(fetched, snapshot());
    }

    #[tokio::test]
    async fn slow_downloads_are_skipped_not_fatal() {
        let remote = FakeRemote::new(snapshot()).with_download_delay(Duration::from_millis(200));

        let fetched = fetch_snapshot(
            &remote,
            &credentials(),
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(fetched.notes, snapshot().notes);
        assert!(fetched
            .attachments
            .iter()
            .all(|attachment| attachment.content.is_none()));
        assert_eq!(fetched.attachments.len(), 3);
    }

    #[tokio::test]
    async fn list_timeout_does_not_cover_downloads() {
        let remote = FakeRemote::new(snapshot()).with_download_delay(Duration::from_millis(40));

        let fetched = fetch_snapshot(
            &remote,
            &credentials(),
            Duration::from_millis(20),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(fetched, snapshot());
    }

    #[tokio::test]
    async fn slow_listing_times_out() {
        let remote = FakeRemote::new(snapshot()).with_delay(Duration::from_millis(200));

        let error = fetch_snapshot(
            &remote,
            &credentials(),
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(error, Error::Timeout(_)));
    }
}
