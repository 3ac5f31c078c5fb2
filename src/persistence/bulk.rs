// Streaming bulk ingestion with per-document failure accounting

use super::store::DocumentStore;
use futures::{Stream, StreamExt};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Flush threshold used by default, in bytes of buffered documents
pub const DEFAULT_FLUSH_BYTES: usize = 5_000_000;

/// Number of rejected documents whose reason is logged per batch
const LOGGED_FAILURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    pub flush_bytes: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            flush_bytes: DEFAULT_FLUSH_BYTES,
        }
    }
}

/// Outcome of a bulk ingestion: documents submitted, accepted and rejected
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub time: Duration,
}

impl BulkStats {
    pub fn merge(&mut self, other: &BulkStats) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        self.time += other.time;
    }
}

/// Stream `documents` into `index` as `create` operations.
///
/// Blank lines are skipped. Documents rejected by the store, and whole
/// batches whose request fails, are counted in `failed` rather than
/// aborting. A read error on the source stops the ingestion once the
/// documents already read have been submitted.
pub async fn bulk_create<S, D>(
    store: &S,
    index: &str,
    documents: D,
    options: BulkOptions,
) -> io::Result<BulkStats>
where
    S: DocumentStore,
    D: Stream<Item = io::Result<String>>,
{
    let started = Instant::now();
    let mut stats = BulkStats::default();
    let mut batch: Vec<String> = Vec::new();
    let mut batch_bytes = 0usize;

    let mut documents = std::pin::pin!(documents);
    while let Some(line) = documents.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                if !batch.is_empty() {
                    flush(store, index, &mut batch, &mut stats).await;
                }
                return Err(e);
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        batch_bytes += line.len();
        batch.push(line);
        stats.total += 1;

        if batch_bytes >= options.flush_bytes {
            flush(store, index, &mut batch, &mut stats).await;
            batch_bytes = 0;
        }
    }

    if !batch.is_empty() {
        flush(store, index, &mut batch, &mut stats).await;
    }

    stats.time = started.elapsed();
    Ok(stats)
}

async fn flush<S: DocumentStore>(
    store: &S,
    index: &str,
    batch: &mut Vec<String>,
    stats: &mut BulkStats,
) {
    debug!("Submitting bulk request with {} documents", batch.len());

    match store.bulk_create(index, batch).await {
        Ok(response) => {
            let failed = response.failures.len().min(batch.len());
            stats.failed += failed;
            stats.successful += batch.len() - failed;

            for failure in response.failures.iter().take(LOGGED_FAILURES) {
                warn!(
                    "Document {} rejected with status {}: {}",
                    failure.position, failure.status, failure.reason
                );
            }
        }
        Err(e) => {
            warn!("Bulk request with {} documents failed: {}", batch.len(), e);
            stats.failed += batch.len();
        }
    }

    batch.clear();
}
