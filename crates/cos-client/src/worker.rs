//! Single-part upload with bounded retry.
//!
//! A worker owns exactly one part: it re-reads the part's byte range from
//! the source on every attempt, issues the upload-part request and yields a
//! [`PartResult`]. Exhausted retries surface as a `Failed` outcome, never as
//! an early return; the coordinator decides what a failed part means for the
//! session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::aggregate::{PartOutcome, PartResult};
use crate::error::{ClientError, Result};
use crate::plan::PartDescriptor;
use crate::source::ObjectSource;
use crate::transport::{Transport, WireRequest};
use crate::types::UploadPartResult;

/// Shared cancellation flag for in-flight part workers.
///
/// Cancelling does not interrupt an attempt already on the wire; it stops
/// further attempts so workers return promptly.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a worker needs to upload its part.
pub(crate) struct PartUploadJob {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub descriptor: PartDescriptor,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
}

/// Upload one part, retrying transient failures up to the attempt budget.
pub(crate) async fn upload_part(
    job: &PartUploadJob,
    source: &dyn ObjectSource,
    transport: &dyn Transport,
    cancel: &CancelHandle,
) -> PartResult {
    let part_number = job.descriptor.part_number;
    let mut last_reason = String::from("no attempts made");

    for attempt in 1..=job.max_attempts.max(1) {
        if cancel.is_cancelled() {
            last_reason = "cancelled".to_string();
            break;
        }

        match attempt_upload(job, source, transport).await {
            Ok(result) => {
                debug!(part = part_number, attempt, etag = %result.etag(), "part uploaded");
                return PartResult {
                    part_number,
                    etag: result.etag().to_string(),
                    size: job.descriptor.length,
                    outcome: PartOutcome::Success,
                };
            }
            Err(err) if err.is_retryable() => {
                warn!(part = part_number, attempt, error = %err, "part upload attempt failed");
                last_reason = err.to_string();
            }
            Err(err) => {
                warn!(part = part_number, attempt, error = %err, "part upload failed fatally");
                last_reason = err.to_string();
                break;
            }
        }
    }

    PartResult {
        part_number,
        etag: String::new(),
        size: job.descriptor.length,
        outcome: PartOutcome::Failed(last_reason),
    }
}

/// One attempt: positioned range read, then the upload-part request, bounded
/// by the per-attempt receive timeout.
async fn attempt_upload(
    job: &PartUploadJob,
    source: &dyn ObjectSource,
    transport: &dyn Transport,
) -> Result<UploadPartResult> {
    let data = source
        .read_range(job.descriptor.offset, job.descriptor.length)
        .await?;

    let request = WireRequest::new("PUT", format!("/{}/{}", job.bucket, job.key))
        .with_query("partNumber", job.descriptor.part_number.to_string())
        .with_query("uploadId", job.upload_id.clone())
        .with_body(data);

    let response = tokio::time::timeout(job.attempt_timeout, transport.send(request))
        .await
        .map_err(|_| ClientError::Timeout(job.attempt_timeout))??;

    if !response.is_success() {
        return Err(ClientError::from_error_xml(&response.body, response.status));
    }
    Ok(UploadPartResult::decode(&response))
}
