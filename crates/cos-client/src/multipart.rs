//! Multipart upload orchestration.
//!
//! Drives the three-phase protocol: Initiate, upload parts under a bounded
//! worker pool, then Complete or Abort. The session state is owned by the
//! coordinator and advanced only through its transition function; workers
//! never touch it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::aggregate::{PartOutcome, PartResult, ResultAggregator};
use crate::client::CosClient;
use crate::error::{ClientError, Stage};
use crate::plan;
use crate::source::ObjectSource;
use crate::types::MultiUploadResult;
use crate::worker::{self, CancelHandle, PartUploadJob};

/// Session status. Transitions are one-directional; terminal states are not
/// re-enterable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    Initiated,
    InProgress,
    Completed,
    Aborted,
    Failed,
}

impl SessionStatus {
    fn may_advance(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Created, Initiated)
                | (Created, Failed)
                | (Initiated, InProgress)
                | (Initiated, Aborted)
                | (Initiated, Failed)
                | (InProgress, Completed)
                | (InProgress, Aborted)
                | (InProgress, Failed)
        )
    }
}

/// Multipart session state, owned by the coordinator for its lifetime.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub bucket: String,
    pub key: String,
    /// Assigned by Initiate, immutable thereafter.
    pub upload_id: Option<String>,
    pub object_size: u64,
    pub part_size: u64,
    pub status: SessionStatus,
}

impl UploadSession {
    fn new(bucket: String, key: String, object_size: u64, part_size: u64) -> Self {
        Self {
            bucket,
            key,
            upload_id: None,
            object_size,
            part_size,
            status: SessionStatus::Created,
        }
    }

    fn advance(&mut self, next: SessionStatus) {
        debug_assert!(
            self.status.may_advance(next),
            "illegal session transition {:?} -> {:?}",
            self.status,
            next
        );
        debug!(from = ?self.status, to = ?next, "session transition");
        self.status = next;
    }
}

/// Terminal failure of the orchestrated flow, tagged with the failing stage
/// so the caller knows which remote side-effect (an allocated upload id,
/// partial parts, a completed object) it is left with.
#[derive(Debug, Error)]
#[error("multipart upload failed during {stage} stage: {source}")]
pub struct MultiUploadError {
    pub stage: Stage,
    #[source]
    pub source: ClientError,
    /// Outcome of the Abort issued after an upload-stage failure. `None`
    /// when no abort was attempted: there is no upload id after an Init
    /// failure, and a Complete failure deliberately leaves the session
    /// allocated so the caller can retry Complete.
    pub abort: Option<Result<(), ClientError>>,
    /// Parts that exhausted their retries.
    pub failed_parts: Vec<PartResult>,
    /// Composite response state as of the failure; carries the upload id
    /// for manual Abort or Complete retries.
    pub partial: Option<MultiUploadResult>,
}

impl MultiUploadError {
    fn at_init(source: ClientError) -> Self {
        Self {
            stage: Stage::Init,
            source,
            abort: None,
            failed_parts: Vec::new(),
            partial: None,
        }
    }

    /// Whether the remote session was actually released by the follow-up
    /// Abort.
    pub fn aborted(&self) -> bool {
        matches!(self.abort, Some(Ok(())))
    }
}

impl From<MultiUploadError> for ClientError {
    fn from(err: MultiUploadError) -> Self {
        ClientError::StageFailed {
            stage: err.stage,
            source: Box::new(err.source),
        }
    }
}

/// Drives one multipart session end to end.
pub(crate) struct UploadCoordinator<'a> {
    client: &'a CosClient,
    session: UploadSession,
    cancel: CancelHandle,
}

impl<'a> UploadCoordinator<'a> {
    pub(crate) fn new(
        client: &'a CosClient,
        bucket: &str,
        key: &str,
        object_size: u64,
        cancel: CancelHandle,
    ) -> Self {
        let part_size = client.config().part_size;
        Self {
            client,
            session: UploadSession::new(bucket.to_string(), key.to_string(), object_size, part_size),
            cancel,
        }
    }

    pub(crate) async fn run(
        mut self,
        source: Arc<dyn ObjectSource>,
    ) -> Result<MultiUploadResult, MultiUploadError> {
        let bucket = self.session.bucket.clone();
        let key = self.session.key.clone();

        // Phase 1: Initiate. A failure here leaves no remote state, so there
        // is nothing to abort.
        let init = match self.client.initiate_upload(&bucket, &key).await {
            Ok(init) => init,
            Err(err) => {
                self.session.advance(SessionStatus::Failed);
                return Err(MultiUploadError::at_init(err));
            }
        };
        let upload_id = init.upload_id.clone();
        self.session.upload_id = Some(upload_id.clone());
        self.session.advance(SessionStatus::Initiated);
        let mut result = MultiUploadResult::from_init(&init);

        // The upload id is already allocated, so even a planning failure
        // must release the session.
        let descriptors =
            match plan::plan_parts(self.session.object_size, self.session.part_size) {
                Ok(descriptors) => descriptors,
                Err(err) => {
                    result.mark_upload();
                    let abort = self.client.abort_upload(&bucket, &key, &upload_id).await;
                    self.session.advance(if abort.is_ok() {
                        SessionStatus::Aborted
                    } else {
                        SessionStatus::Failed
                    });
                    return Err(MultiUploadError {
                        stage: Stage::Upload,
                        source: err,
                        abort: Some(abort),
                        failed_parts: Vec::new(),
                        partial: Some(result),
                    });
                }
            };

        // Phase 2: dispatch parts to workers under the concurrency bound.
        // Dispatch order is arbitrary; accounting is keyed by part number.
        self.session.advance(SessionStatus::InProgress);
        let aggregator = Arc::new(ResultAggregator::new(descriptors.len()));
        let semaphore = Arc::new(Semaphore::new(
            self.client.config().max_concurrent_parts.max(1),
        ));
        let mut tasks = JoinSet::new();
        for descriptor in descriptors {
            let job = PartUploadJob {
                bucket: bucket.clone(),
                key: key.clone(),
                upload_id: upload_id.clone(),
                descriptor,
                max_attempts: self.client.config().max_attempts,
                attempt_timeout: self.client.config().part_recv_timeout,
            };
            let transport = Arc::clone(self.client.transport());
            let source = Arc::clone(&source);
            let cancel = self.cancel.clone();
            let aggregator = Arc::clone(&aggregator);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let part = worker::upload_part(
                    &job,
                    source.as_ref(),
                    transport.as_ref(),
                    &cancel,
                )
                .await;
                if !part.is_success() {
                    // Fail-fast policy: stop remaining workers from retrying.
                    cancel.cancel();
                }
                aggregator.record(part);
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "part worker task did not complete");
            }
        }

        // Phase 3: Complete, or Abort when any part came up short.
        if aggregator.is_complete() {
            let manifest = match aggregator.manifest() {
                Ok(manifest) => manifest,
                Err(err) => {
                    self.session.advance(SessionStatus::Failed);
                    return Err(MultiUploadError {
                        stage: Stage::Complete,
                        source: err,
                        abort: None,
                        failed_parts: Vec::new(),
                        partial: Some(result),
                    });
                }
            };
            match self
                .client
                .complete_upload(&bucket, &key, &upload_id, &manifest)
                .await
            {
                Ok(complete) => {
                    result.copy_from_complete(&complete);
                    self.session.advance(SessionStatus::Completed);
                    Ok(result)
                }
                Err(err) => {
                    // The upload id stays allocated; the caller may retry
                    // Complete or explicitly Abort.
                    self.session.advance(SessionStatus::Failed);
                    Err(MultiUploadError {
                        stage: Stage::Complete,
                        source: err,
                        abort: None,
                        failed_parts: Vec::new(),
                        partial: Some(result),
                    })
                }
            }
        } else {
            let failed_parts = aggregator.failures();
            result.mark_upload();
            let source_err = match failed_parts.first() {
                Some(PartResult {
                    part_number,
                    outcome: PartOutcome::Failed(reason),
                    ..
                }) => ClientError::PartUploadFailed {
                    part_number: *part_number,
                    reason: reason.clone(),
                },
                _ => ClientError::Incomplete("not all parts were recorded".to_string()),
            };

            let abort = self.client.abort_upload(&bucket, &key, &upload_id).await;
            if let Err(err) = &abort {
                warn!(upload_id = %upload_id, error = %err, "abort after upload failure did not succeed");
            }
            self.session.advance(if abort.is_ok() {
                SessionStatus::Aborted
            } else {
                SessionStatus::Failed
            });
            Err(MultiUploadError {
                stage: Stage::Upload,
                source: source_err,
                abort: Some(abort),
                failed_parts,
                partial: Some(result),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use SessionStatus::*;
        assert!(Created.may_advance(Initiated));
        assert!(Created.may_advance(Failed));
        assert!(Initiated.may_advance(InProgress));
        assert!(InProgress.may_advance(Completed));
        assert!(InProgress.may_advance(Aborted));
        assert!(InProgress.may_advance(Failed));

        // One-directional: no re-entry into earlier or terminal states.
        assert!(!Initiated.may_advance(Created));
        assert!(!Completed.may_advance(InProgress));
        assert!(!Aborted.may_advance(Initiated));
        assert!(!Failed.may_advance(Created));
        assert!(!Completed.may_advance(Failed));
    }

    #[test]
    fn test_stage_failed_conversion() {
        let err = MultiUploadError::at_init(ClientError::MalformedBody("x".into()));
        assert!(err.partial.is_none());
        assert!(!err.aborted());
        let client_err: ClientError = err.into();
        match client_err {
            ClientError::StageFailed { stage, .. } => assert_eq!(stage, Stage::Init),
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }
}
