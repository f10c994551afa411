//! Typed result entities decoded from wire replies.
//!
//! Each entity is a read-only value object populated by the decode layer;
//! unknown XML fields are logged and skipped so the service can add fields
//! without breaking older clients.

use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decode::{self, Element};
use crate::error::{Result, Stage};
use crate::transport::WireResponse;

/// Fields shared by every reply: standard headers plus the raw exchange.
#[derive(Clone, Debug, Default)]
pub struct CommonFields {
    pub content_length: u64,
    pub content_type: String,
    pub etag: String,
    pub connection: String,
    pub date: String,
    pub server: String,
    pub request_id: String,
    pub trace_id: String,
    /// All response headers as received.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Bytes,
}

impl CommonFields {
    pub fn from_response(response: &WireResponse) -> Self {
        let headers = &response.headers;
        Self {
            content_length: decode::parse_u64(&decode::header_or_empty(headers, "content-length")),
            content_type: decode::header_or_empty(headers, "content-type"),
            etag: trim_etag(&decode::header_or_empty(headers, "etag")),
            connection: decode::header_or_empty(headers, "connection"),
            date: decode::header_or_empty(headers, "date"),
            server: decode::header_or_empty(headers, "server"),
            request_id: decode::header_or_empty(headers, "x-cos-request-id"),
            trace_id: decode::header_or_empty(headers, "x-cos-trace-id"),
            headers: headers.clone(),
            body: response.body.clone(),
        }
    }
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Initiate reply, root `InitiateMultipartUploadResult`.
#[derive(Clone, Debug, Default)]
pub struct InitResult {
    pub common: CommonFields,
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

impl InitResult {
    pub fn decode(response: &WireResponse) -> Result<Self> {
        let root = decode::decode_xml(&response.body, "InitiateMultipartUploadResult")?;
        let mut out = Self {
            common: CommonFields::from_response(response),
            ..Self::default()
        };
        for child in &root.children {
            match child.name.as_str() {
                "Bucket" => out.bucket = child.text.clone(),
                "Key" => out.key = child.text.clone(),
                "UploadId" => out.upload_id = child.text.clone(),
                other => warn!(
                    field = other,
                    "unknown field in InitiateMultipartUploadResult node"
                ),
            }
        }
        Ok(out)
    }
}

/// Upload-part reply; carries no body, the ETag travels as a header.
#[derive(Clone, Debug, Default)]
pub struct UploadPartResult {
    pub common: CommonFields,
}

impl UploadPartResult {
    pub fn decode(response: &WireResponse) -> Self {
        Self {
            common: CommonFields::from_response(response),
        }
    }

    pub fn etag(&self) -> &str {
        &self.common.etag
    }
}

/// Complete reply, root `CompleteMultipartUploadResult`.
#[derive(Clone, Debug, Default)]
pub struct CompleteResult {
    pub common: CommonFields,
    pub location: String,
    pub bucket: String,
    pub key: String,
    pub etag: String,
}

impl CompleteResult {
    pub fn decode(response: &WireResponse) -> Result<Self> {
        let root = decode::decode_xml(&response.body, "CompleteMultipartUploadResult")?;
        let mut out = Self {
            common: CommonFields::from_response(response),
            ..Self::default()
        };
        for child in &root.children {
            match child.name.as_str() {
                "Location" => out.location = child.text.clone(),
                "Bucket" => out.bucket = child.text.clone(),
                "Key" => out.key = child.text.clone(),
                "ETag" => out.etag = child.text.trim_matches('"').to_string(),
                other => warn!(
                    field = other,
                    "unknown field in CompleteMultipartUploadResult node"
                ),
            }
        }
        Ok(out)
    }
}

/// `Owner` or `Initiator` block in a ListParts reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
}

impl Actor {
    fn from_element(element: &Element, context: &str) -> Self {
        let mut actor = Self::default();
        for child in &element.children {
            match child.name.as_str() {
                "ID" => actor.id = child.text.clone(),
                "DisplayName" => actor.display_name = child.text.clone(),
                other => warn!(field = other, context, "unknown field in actor node"),
            }
        }
        actor
    }
}

/// One uploaded part as reported by ListParts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub part_number: u32,
    pub last_modified: String,
    pub etag: String,
    pub size: u64,
}

impl Part {
    fn from_element(element: &Element) -> Self {
        let mut part = Self::default();
        for child in &element.children {
            match child.name.as_str() {
                "PartNumber" => part.part_number = decode::parse_u64(&child.text) as u32,
                "LastModified" => part.last_modified = child.text.clone(),
                "ETag" => part.etag = child.text.trim_matches('"').to_string(),
                "Size" => part.size = decode::parse_u64(&child.text),
                other => warn!(field = other, "unknown field in Part node"),
            }
        }
        part
    }
}

/// ListParts reply, root `ListPartsResult`. Parts are kept in document
/// order; the Complete manifest is ordered from actual part numbers, never
/// from list position.
#[derive(Clone, Debug, Default)]
pub struct ListPartsResult {
    pub common: CommonFields,
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub encoding_type: String,
    pub initiator: Actor,
    pub owner: Actor,
    pub storage_class: String,
    pub part_number_marker: u64,
    pub next_part_number_marker: u64,
    pub max_parts: u64,
    pub is_truncated: bool,
    pub parts: Vec<Part>,
}

impl ListPartsResult {
    pub fn decode(response: &WireResponse) -> Result<Self> {
        let root = decode::decode_xml(&response.body, "ListPartsResult")?;
        let mut out = Self {
            common: CommonFields::from_response(response),
            ..Self::default()
        };
        for child in &root.children {
            match child.name.as_str() {
                "Bucket" => out.bucket = child.text.clone(),
                "Encoding-type" => out.encoding_type = child.text.clone(),
                "Key" => out.key = child.text.clone(),
                "UploadId" => out.upload_id = child.text.clone(),
                "Initiator" => out.initiator = Actor::from_element(child, "Initiator"),
                "Owner" => out.owner = Actor::from_element(child, "Owner"),
                "StorageClass" => out.storage_class = child.text.clone(),
                "PartNumberMarker" => out.part_number_marker = decode::parse_u64(&child.text),
                "NextPartNumberMarker" => {
                    out.next_part_number_marker = decode::parse_u64(&child.text)
                }
                "MaxParts" => out.max_parts = decode::parse_u64(&child.text),
                "IsTruncated" => out.is_truncated = decode::parse_bool(&child.text),
                "Part" => out.parts.push(Part::from_element(child)),
                other => warn!(field = other, "unknown field in ListPartsResult node"),
            }
        }
        Ok(out)
    }
}

/// Copy reply, root `CopyObjectResult`.
#[derive(Clone, Debug, Default)]
pub struct CopyResult {
    pub common: CommonFields,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CopyResult {
    pub fn decode(response: &WireResponse) -> Result<Self> {
        let root = decode::decode_xml(&response.body, "CopyObjectResult")?;
        let mut out = Self {
            common: CommonFields::from_response(response),
            ..Self::default()
        };
        for child in &root.children {
            match child.name.as_str() {
                "ETag" => out.etag = child.text.trim_matches('"').to_string(),
                "LastModified" => {
                    out.last_modified = DateTime::parse_from_rfc3339(&child.text)
                        .ok()
                        .map(|d| d.with_timezone(&Utc))
                }
                other => warn!(field = other, "unknown field in CopyObjectResult node"),
            }
        }
        Ok(out)
    }
}

/// Single-shot put reply; header-only.
#[derive(Clone, Debug, Default)]
pub struct PutObjectResult {
    pub common: CommonFields,
}

impl PutObjectResult {
    pub fn decode(response: &WireResponse) -> Self {
        Self {
            common: CommonFields::from_response(response),
        }
    }

    pub fn etag(&self) -> &str {
        &self.common.etag
    }
}

/// Get reply: object data plus header-decoded attributes.
#[derive(Clone, Debug, Default)]
pub struct GetObjectResult {
    pub common: CommonFields,
    pub data: Bytes,
    pub last_modified: String,
    pub object_type: String,
    pub storage_class: String,
    /// User metadata with the `x-cos-meta-` prefix stripped.
    pub metadata: HashMap<String, String>,
}

impl GetObjectResult {
    pub fn decode(response: &WireResponse) -> Self {
        let headers = &response.headers;
        Self {
            common: CommonFields::from_response(response),
            data: response.body.clone(),
            last_modified: decode::header_or_empty(headers, "last-modified"),
            object_type: decode::header_or_empty(headers, "x-cos-object-type"),
            storage_class: decode::header_or_empty(headers, "x-cos-storage-class"),
            metadata: decode::user_metadata(headers),
        }
    }
}

/// Head reply; attributes without the body.
#[derive(Clone, Debug, Default)]
pub struct HeadObjectResult {
    pub common: CommonFields,
    pub last_modified: String,
    pub object_type: String,
    pub storage_class: String,
    /// User metadata with the `x-cos-meta-` prefix stripped.
    pub metadata: HashMap<String, String>,
}

impl HeadObjectResult {
    pub fn decode(response: &WireResponse) -> Self {
        let headers = &response.headers;
        Self {
            common: CommonFields::from_response(response),
            last_modified: decode::header_or_empty(headers, "last-modified"),
            object_type: decode::header_or_empty(headers, "x-cos-object-type"),
            storage_class: decode::header_or_empty(headers, "x-cos-storage-class"),
            metadata: decode::user_metadata(headers),
        }
    }
}

/// Composite result of the orchestrated multipart flow, tagged with the
/// phase that produced the terminal outcome.
///
/// The shared field set lives in [`CommonFields`] and is copied wholesale
/// from whichever underlying reply decoded last, so no phase duplicates
/// per-field copy logic.
#[derive(Clone, Debug)]
pub struct MultiUploadResult {
    pub stage: Stage,
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    pub location: String,
    pub common: CommonFields,
}

impl MultiUploadResult {
    pub fn from_init(init: &InitResult) -> Self {
        Self {
            stage: Stage::Init,
            upload_id: init.upload_id.clone(),
            bucket: init.bucket.clone(),
            key: init.key.clone(),
            location: String::new(),
            common: init.common.clone(),
        }
    }

    /// Tag the upload phase as the terminal one. The last successfully
    /// decoded reply (Init's) stays as the common field set.
    pub fn mark_upload(&mut self) {
        self.stage = Stage::Upload;
    }

    pub fn copy_from_complete(&mut self, complete: &CompleteResult) {
        self.stage = Stage::Complete;
        self.location = complete.location.clone();
        self.bucket = complete.bucket.clone();
        self.key = complete.key.clone();
        self.common = complete.common.clone();
        if self.common.etag.is_empty() {
            self.common.etag = complete.etag.clone();
        }
    }

    pub fn etag(&self) -> &str {
        &self.common.etag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_body(body: &[u8]) -> WireResponse {
        WireResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn test_decode_init_result() {
        let body = br#"<InitiateMultipartUploadResult>
    <Bucket>bucket-1</Bucket>
    <Key>big.bin</Key>
    <UploadId>U1</UploadId>
</InitiateMultipartUploadResult>"#;

        let init = InitResult::decode(&response_with_body(body)).unwrap();
        assert_eq!(init.bucket, "bucket-1");
        assert_eq!(init.key, "big.bin");
        assert_eq!(init.upload_id, "U1");
    }

    #[test]
    fn test_unknown_element_is_ignored() {
        let body = br#"<InitiateMultipartUploadResult>
    <Bucket>bucket-1</Bucket>
    <UploadId>U1</UploadId>
    <ServerSideEncryption>AES256</ServerSideEncryption>
</InitiateMultipartUploadResult>"#;

        let init = InitResult::decode(&response_with_body(body)).unwrap();
        assert_eq!(init.upload_id, "U1");
        assert_eq!(init.key, "");
    }

    #[test]
    fn test_decode_complete_result() {
        let body = br#"<CompleteMultipartUploadResult>
    <Location>http://bucket-1.cos.example.com/big.bin</Location>
    <Bucket>bucket-1</Bucket>
    <Key>big.bin</Key>
    <ETag>"ab-3"</ETag>
</CompleteMultipartUploadResult>"#;

        let complete = CompleteResult::decode(&response_with_body(body)).unwrap();
        assert_eq!(complete.location, "http://bucket-1.cos.example.com/big.bin");
        assert_eq!(complete.etag, "ab-3");
    }

    #[test]
    fn test_decode_list_parts_full() {
        let body = br#"<ListPartsResult>
    <Bucket>bucket-1</Bucket>
    <Key>big.bin</Key>
    <UploadId>U1</UploadId>
    <Initiator><ID>init-1</ID><DisplayName>init</DisplayName></Initiator>
    <Owner><ID>own-1</ID><DisplayName>own</DisplayName></Owner>
    <PartNumberMarker>1</PartNumberMarker>
    <Part>
        <PartNumber>2</PartNumber>
        <LastModified>Wed, 01 Jan 2025 00:00:00 GMT</LastModified>
        <ETag>"e2"</ETag>
        <Size>5242880</Size>
    </Part>
    <Part>
        <PartNumber>1</PartNumber>
        <ETag>"e1"</ETag>
        <Size>oops</Size>
    </Part>
    <NextPartNumberMarker>5</NextPartNumberMarker>
    <StorageClass>Standard</StorageClass>
    <MaxParts>2</MaxParts>
    <IsTruncated>true</IsTruncated>
</ListPartsResult>"#;

        let list = ListPartsResult::decode(&response_with_body(body)).unwrap();
        assert_eq!(list.upload_id, "U1");
        assert_eq!(list.initiator.id, "init-1");
        assert_eq!(list.owner.display_name, "own");
        assert!(list.is_truncated);
        assert_eq!(list.next_part_number_marker, 5);
        assert_eq!(list.max_parts, 2);
        // Document order preserved, not renumbered.
        assert_eq!(list.parts.len(), 2);
        assert_eq!(list.parts[0].part_number, 2);
        assert_eq!(list.parts[1].part_number, 1);
        // Malformed numeric text decodes as zero, parsing continues.
        assert_eq!(list.parts[1].size, 0);
    }

    #[test]
    fn test_decode_copy_result() {
        let body = br#"<CopyObjectResult>
    <ETag>"cafebabe"</ETag>
    <LastModified>2025-01-01T00:00:00Z</LastModified>
</CopyObjectResult>"#;

        let copy = CopyResult::decode(&response_with_body(body)).unwrap();
        assert_eq!(copy.etag, "cafebabe");
        assert!(copy.last_modified.is_some());
    }

    #[test]
    fn test_head_result_from_headers() {
        let mut headers = HashMap::new();
        headers.insert("etag".to_string(), "\"h1\"".to_string());
        headers.insert("content-length".to_string(), "42".to_string());
        headers.insert(
            "last-modified".to_string(),
            "Wed, 01 Jan 2025 00:00:00 GMT".to_string(),
        );
        headers.insert("x-cos-object-type".to_string(), "normal".to_string());
        headers.insert("x-cos-storage-class".to_string(), "Standard".to_string());
        headers.insert("x-cos-meta-color".to_string(), "green".to_string());
        let response = WireResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };

        let head = HeadObjectResult::decode(&response);
        assert_eq!(head.common.etag, "h1");
        assert_eq!(head.common.content_length, 42);
        assert_eq!(head.object_type, "normal");
        assert_eq!(head.storage_class, "Standard");
        assert_eq!(head.metadata.get("color").map(String::as_str), Some("green"));
    }

    #[test]
    fn test_composite_copy_is_stage_tagged() {
        let init_body = br#"<InitiateMultipartUploadResult>
    <Bucket>bucket-1</Bucket><Key>k</Key><UploadId>U1</UploadId>
</InitiateMultipartUploadResult>"#;
        let init = InitResult::decode(&response_with_body(init_body)).unwrap();
        let mut result = MultiUploadResult::from_init(&init);
        assert_eq!(result.stage, Stage::Init);
        assert_eq!(result.upload_id, "U1");

        result.mark_upload();
        assert_eq!(result.stage, Stage::Upload);

        let complete_body = br#"<CompleteMultipartUploadResult>
    <Location>http://example/k</Location>
    <Bucket>bucket-1</Bucket><Key>k</Key><ETag>"final"</ETag>
</CompleteMultipartUploadResult>"#;
        let complete = CompleteResult::decode(&response_with_body(complete_body)).unwrap();
        result.copy_from_complete(&complete);
        assert_eq!(result.stage, Stage::Complete);
        assert_eq!(result.location, "http://example/k");
        assert_eq!(result.etag(), "final");
    }
}
