//! Main client implementation

use std::sync::Arc;

use bytes::Bytes;
use tracing::instrument;

use crate::aggregate::UploadManifest;
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::multipart::{MultiUploadError, UploadCoordinator};
use crate::source::{FileSource, ObjectSource};
use crate::transport::{
    AnonymousCredentials, Credentials, HttpTransport, TokenCredentials, Transport, WireRequest,
    WireResponse,
};
use crate::types::{
    CompleteResult, CopyResult, GetObjectResult, HeadObjectResult, InitResult, ListPartsResult,
    MultiUploadResult, PutObjectResult, UploadPartResult,
};
use crate::worker::CancelHandle;

/// Object-storage client
pub struct CosClient {
    config: Config,
    transport: Arc<dyn Transport>,
}

impl CosClient {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let credentials: Arc<dyn Credentials> = match &config.access_token {
            Some(token) => Arc::new(TokenCredentials::new(token.clone())),
            None => Arc::new(AnonymousCredentials),
        };
        let transport = Arc::new(HttpTransport::new(&config, credentials)?);
        Ok(Self { config, transport })
    }

    /// Create with endpoint URL
    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        Self::new(Config::new(endpoint))
    }

    /// Create over a custom transport (tests, alternative stacks)
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    // ==================== Single-shot Objects ====================

    /// Put an object in one request
    #[instrument(skip(self, data))]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes> + std::fmt::Debug,
    ) -> Result<PutObjectResult> {
        let request = WireRequest::new("PUT", object_path(bucket, key)).with_body(data.into());
        let response = self.send(request).await?;
        Ok(PutObjectResult::decode(&response))
    }

    /// Put a local file in one request, guessing its content type
    #[instrument(skip(self))]
    pub async fn put_object_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<std::path::Path> + std::fmt::Debug,
    ) -> Result<PutObjectResult> {
        let content_type = mime_guess::from_path(path.as_ref())
            .first_or_octet_stream()
            .to_string();
        let data = tokio::fs::read(path.as_ref()).await?;
        let request = WireRequest::new("PUT", object_path(bucket, key))
            .with_header("Content-Type", content_type)
            .with_body(data);
        let response = self.send(request).await?;
        Ok(PutObjectResult::decode(&response))
    }

    /// Get an object with its header-decoded attributes
    #[instrument(skip(self))]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectResult> {
        let request = WireRequest::new("GET", object_path(bucket, key));
        let response = self.send(request).await?;
        Ok(GetObjectResult::decode(&response))
    }

    /// Head an object (attributes without content)
    #[instrument(skip(self))]
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectResult> {
        let request = WireRequest::new("HEAD", object_path(bucket, key));
        let response = self.send(request).await?;
        Ok(HeadObjectResult::decode(&response))
    }

    /// Copy an object server-side
    #[instrument(skip(self))]
    pub async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<CopyResult> {
        let request = WireRequest::new("PUT", object_path(dest_bucket, dest_key))
            .with_header("x-cos-copy-source", object_path(source_bucket, source_key));
        let response = self.send(request).await?;
        CopyResult::decode(&response)
    }

    // ==================== Multipart Lifecycle ====================

    /// Initiate a multipart upload and obtain its upload id
    #[instrument(skip(self))]
    pub async fn initiate_upload(&self, bucket: &str, key: &str) -> Result<InitResult> {
        let request = WireRequest::new("POST", object_path(bucket, key)).with_query("uploads", "");
        let response = self.send(request).await?;
        InitResult::decode(&response)
    }

    /// Upload one part of a multipart session
    #[instrument(skip(self, data))]
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: impl Into<Bytes> + std::fmt::Debug,
    ) -> Result<UploadPartResult> {
        let request = WireRequest::new("PUT", object_path(bucket, key))
            .with_query("partNumber", part_number.to_string())
            .with_query("uploadId", upload_id)
            .with_body(data.into());
        let response = self.send(request).await?;
        Ok(UploadPartResult::decode(&response))
    }

    /// Finalize a multipart upload from its ordered manifest
    #[instrument(skip(self, manifest))]
    pub async fn complete_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        manifest: &UploadManifest,
    ) -> Result<CompleteResult> {
        let request = WireRequest::new("POST", object_path(bucket, key))
            .with_query("uploadId", upload_id)
            .with_header("Content-Type", "application/xml")
            .with_body(manifest.to_xml());
        let response = self.send(request).await?;
        CompleteResult::decode(&response)
    }

    /// Abort a multipart upload, releasing the remote session
    #[instrument(skip(self))]
    pub async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let request =
            WireRequest::new("DELETE", object_path(bucket, key)).with_query("uploadId", upload_id);
        self.send(request).await?;
        Ok(())
    }

    /// List uploaded parts of a session. No auto-pagination: the reply
    /// carries `is_truncated` and `next_part_number_marker` for continuation.
    #[instrument(skip(self))]
    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: Option<u64>,
        part_number_marker: Option<u64>,
    ) -> Result<ListPartsResult> {
        let mut request =
            WireRequest::new("GET", object_path(bucket, key)).with_query("uploadId", upload_id);
        if let Some(max_parts) = max_parts {
            request = request.with_query("max-parts", max_parts.to_string());
        }
        if let Some(marker) = part_number_marker {
            request = request.with_query("part-number-marker", marker.to_string());
        }
        let response = self.send(request).await?;
        ListPartsResult::decode(&response)
    }

    // ==================== Orchestrated Upload ====================

    /// Upload a whole object through the three-phase multipart flow
    #[instrument(skip(self, source))]
    pub async fn multi_upload_object(
        &self,
        bucket: &str,
        key: &str,
        source: Arc<dyn ObjectSource>,
    ) -> std::result::Result<MultiUploadResult, MultiUploadError> {
        self.multi_upload_object_with_cancel(bucket, key, source, CancelHandle::new())
            .await
    }

    /// Same as [`multi_upload_object`](Self::multi_upload_object) but
    /// cancellable: cancelling the handle stops in-flight part retries and
    /// aborts the remote session.
    pub async fn multi_upload_object_with_cancel(
        &self,
        bucket: &str,
        key: &str,
        source: Arc<dyn ObjectSource>,
        cancel: CancelHandle,
    ) -> std::result::Result<MultiUploadResult, MultiUploadError> {
        let coordinator = UploadCoordinator::new(self, bucket, key, source.len(), cancel);
        coordinator.run(source).await
    }

    /// Upload a local file, switching between the single-shot and multipart
    /// paths on the configured threshold. Returns the object's ETag.
    #[instrument(skip(self))]
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<std::path::Path> + std::fmt::Debug,
    ) -> Result<String> {
        let source = FileSource::open(path.as_ref()).await?;
        if source.len() < self.config.multipart_threshold {
            let result = self.put_object_file(bucket, key, path.as_ref()).await?;
            Ok(result.etag().to_string())
        } else {
            let result = self
                .multi_upload_object(bucket, key, Arc::new(source))
                .await?;
            Ok(result.etag().to_string())
        }
    }

    // ==================== Helper Methods ====================

    /// Dispatch a request and decode a non-2xx reply into a service error.
    async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::from_error_xml(&response.body, response.status));
        }
        Ok(response)
    }
}

fn object_path(bucket: &str, key: &str) -> String {
    format!("/{}/{}", bucket, key)
}
