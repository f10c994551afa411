//! # COS Client SDK
//!
//! A client SDK for COS-style remote object storage.
//!
//! ## Features
//!
//! - **Single-shot upload**: put small objects in one request
//! - **Multipart upload**: large objects in independently-retried parts,
//!   uploaded under a bounded worker pool and finalized from an ordered
//!   part manifest
//! - **Lifecycle control**: initiate, list parts, complete and abort
//! - **Tolerant decoding**: XML replies and header maps decode into typed
//!   results; unknown fields are logged, never fatal
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cos_client::{BytesSource, Config, CosClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CosClient::new(
//!         Config::new("http://cos.example.com").with_token("your-token"),
//!     )?;
//!
//!     // Small object in one request
//!     client.put_object("my-bucket", "hello.txt", &b"Hello, World!"[..]).await?;
//!
//!     // Large object through the multipart flow
//!     let data = vec![0u8; 64 * 1024 * 1024];
//!     let result = client
//!         .multi_upload_object("my-bucket", "big.bin", Arc::new(BytesSource::new(data)))
//!         .await?;
//!     println!("uploaded to {}", result.location);
//!
//!     Ok(())
//! }
//! ```

mod aggregate;
mod client;
mod config;
mod decode;
mod error;
mod multipart;
mod plan;
mod source;
mod transport;
mod types;
mod worker;

pub use aggregate::{ManifestEntry, PartOutcome, PartResult, ResultAggregator, UploadManifest};
pub use client::CosClient;
pub use config::Config;
pub use decode::META_PREFIX;
pub use error::{ClientError, Result, Stage};
pub use multipart::{MultiUploadError, SessionStatus, UploadSession};
pub use plan::{plan_parts, PartDescriptor, MAX_PART_COUNT, MAX_PART_SIZE, MIN_PART_SIZE};
pub use source::{BytesSource, FileSource, ObjectSource};
pub use transport::{
    AnonymousCredentials, Credentials, HttpTransport, TokenCredentials, Transport, WireRequest,
    WireResponse,
};
pub use types::{
    Actor, CommonFields, CompleteResult, CopyResult, GetObjectResult, HeadObjectResult,
    InitResult, ListPartsResult, MultiUploadResult, Part, PutObjectResult, UploadPartResult,
};
pub use worker::CancelHandle;
