//! Client configuration

use std::time::Duration;

use crate::plan;

/// Client configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Service endpoint URL
    pub endpoint: String,
    /// Access token for the signing layer
    pub access_token: Option<String>,
    /// Whole-request timeout on the HTTP client
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Upload attempts per part, including the first
    pub max_attempts: u32,
    /// Receive timeout per part-upload attempt
    pub part_recv_timeout: Duration,
    /// Part size for multipart uploads (bytes)
    pub part_size: u64,
    /// Objects at or above this size go through multipart upload
    pub multipart_threshold: u64,
    /// Maximum parts uploaded concurrently; 1 means sequential
    pub max_concurrent_parts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("cos-client/{}", env!("CARGO_PKG_VERSION")),
            max_attempts: 3,
            part_recv_timeout: Duration::from_secs(60),
            part_size: 8 * 1024 * 1024,
            multipart_threshold: 100 * 1024 * 1024,
            max_concurrent_parts: 4,
        }
    }
}

impl Config {
    /// Create a new config with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the whole-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the multipart part size
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.clamp(plan::MIN_PART_SIZE, plan::MAX_PART_SIZE);
        self
    }

    /// Set the per-attempt receive timeout for part uploads
    pub fn with_part_recv_timeout(mut self, timeout: Duration) -> Self {
        self.part_recv_timeout = timeout;
        self
    }

    /// Set the part-upload concurrency bound
    pub fn with_max_concurrent_parts(mut self, concurrency: usize) -> Self {
        self.max_concurrent_parts = concurrency.max(1);
        self
    }

    /// Set the upload attempt budget per part
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}
