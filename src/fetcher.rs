use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::api::PageFetcher;
use crate::error::FetchError;
use crate::types::Snapshot;

/// Fetch every page of the collection into one snapshot.
///
/// At most `concurrency` page requests are in flight at once; results are
/// assembled in page-index order, not completion order, so downstream
/// positional comparison stays valid. Any page failure (transport, status,
/// malformed record) aborts the whole snapshot: the detector cannot work
/// with partial data.
pub async fn fetch_snapshot<F: PageFetcher + ?Sized>(
    pages: &F,
    page_count: usize,
    page_size: usize,
    concurrency: usize,
) -> Result<Snapshot, FetchError> {
    let fetched: Vec<Vec<_>> = stream::iter(0..page_count)
        .map(|page| pages.get_page(page, page_size))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let snapshot: Snapshot = fetched.into_iter().flatten().collect();
    debug!("snapshot assembled: {} listings from {page_count} pages", snapshot.len());
    Ok(snapshot)
}
