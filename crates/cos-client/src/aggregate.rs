//! Part-result accumulation and manifest assembly.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{ClientError, Result};

/// Outcome of one part's attempt cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartOutcome {
    Success,
    Failed(String),
}

/// Result of uploading one part.
#[derive(Clone, Debug)]
pub struct PartResult {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
    pub outcome: PartOutcome,
}

impl PartResult {
    pub fn is_success(&self) -> bool {
        self.outcome == PartOutcome::Success
    }
}

/// One entry of the Complete manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub part_number: u32,
    pub etag: String,
}

/// Ordered `(part_number, etag)` list submitted to Complete. Always sorted
/// ascending by part number; built only from successful parts.
#[derive(Clone, Debug, Default)]
pub struct UploadManifest {
    pub entries: Vec<ManifestEntry>,
}

impl UploadManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as the `CompleteMultipartUpload` request body. ETags are
    /// re-quoted on the wire.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<CompleteMultipartUpload>");
        for entry in &self.entries {
            xml.push_str(&format!(
                "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag></Part>",
                entry.part_number, entry.etag
            ));
        }
        xml.push_str("</CompleteMultipartUpload>");
        xml
    }
}

/// Collects part results as workers finish.
///
/// Results arrive in arbitrary order and are keyed by part number; the
/// manifest comes out numerically sorted regardless. Recording the same
/// part number twice overwrites the earlier entry.
pub struct ResultAggregator {
    expected: usize,
    results: Mutex<BTreeMap<u32, PartResult>>,
}

impl ResultAggregator {
    /// `expected` is the number of parts in the session's plan.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, result: PartResult) {
        let mut results = self.results.lock();
        if let Some(prior) = results.insert(result.part_number, result) {
            warn!(
                part = prior.part_number,
                "duplicate part result recorded, overwriting prior entry"
            );
        }
    }

    /// True once every expected part has a successful result.
    pub fn is_complete(&self) -> bool {
        let results = self.results.lock();
        results.len() == self.expected && results.values().all(PartResult::is_success)
    }

    /// The ordered manifest, or `Incomplete` naming what is missing or
    /// failed.
    pub fn manifest(&self) -> Result<UploadManifest> {
        let results = self.results.lock();
        if results.len() != self.expected {
            return Err(ClientError::Incomplete(format!(
                "{} of {} parts recorded",
                results.len(),
                self.expected
            )));
        }
        let failed: Vec<u32> = results
            .values()
            .filter(|r| !r.is_success())
            .map(|r| r.part_number)
            .collect();
        if !failed.is_empty() {
            return Err(ClientError::Incomplete(format!(
                "parts {:?} did not succeed",
                failed
            )));
        }

        // BTreeMap iteration is ascending by part number.
        let entries = results
            .values()
            .map(|r| ManifestEntry {
                part_number: r.part_number,
                etag: r.etag.clone(),
            })
            .collect();
        Ok(UploadManifest { entries })
    }

    /// All failed outcomes, for diagnostic reporting before an Abort.
    pub fn failures(&self) -> Vec<PartResult> {
        self.results
            .lock()
            .values()
            .filter(|r| !r.is_success())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(part_number: u32) -> PartResult {
        PartResult {
            part_number,
            etag: format!("e{}", part_number),
            size: 1024,
            outcome: PartOutcome::Success,
        }
    }

    #[test]
    fn test_manifest_sorted_regardless_of_arrival_order() {
        let aggregator = ResultAggregator::new(4);
        for part_number in [3, 1, 4, 2] {
            aggregator.record(success(part_number));
        }

        assert!(aggregator.is_complete());
        let manifest = aggregator.manifest().unwrap();
        let numbers: Vec<u32> = manifest.entries.iter().map(|e| e.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(manifest.entries[0].etag, "e1");
    }

    #[test]
    fn test_manifest_incomplete_when_parts_missing() {
        let aggregator = ResultAggregator::new(3);
        aggregator.record(success(1));
        assert!(!aggregator.is_complete());
        assert!(matches!(
            aggregator.manifest(),
            Err(ClientError::Incomplete(_))
        ));
    }

    #[test]
    fn test_manifest_incomplete_when_part_failed() {
        let aggregator = ResultAggregator::new(2);
        aggregator.record(success(1));
        aggregator.record(PartResult {
            part_number: 2,
            etag: String::new(),
            size: 1024,
            outcome: PartOutcome::Failed("503 from service".into()),
        });

        assert!(!aggregator.is_complete());
        assert!(aggregator.manifest().is_err());
        let failures = aggregator.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].part_number, 2);
    }

    #[test]
    fn test_duplicate_record_overwrites() {
        let aggregator = ResultAggregator::new(1);
        aggregator.record(PartResult {
            part_number: 1,
            etag: "old".into(),
            size: 10,
            outcome: PartOutcome::Failed("transient".into()),
        });
        aggregator.record(success(1));

        assert!(aggregator.is_complete());
        let manifest = aggregator.manifest().unwrap();
        assert_eq!(manifest.entries[0].etag, "e1");
    }

    #[test]
    fn test_manifest_xml_round_trip_shape() {
        let manifest = UploadManifest {
            entries: vec![
                ManifestEntry {
                    part_number: 1,
                    etag: "e1".into(),
                },
                ManifestEntry {
                    part_number: 2,
                    etag: "e2".into(),
                },
            ],
        };
        let xml = manifest.to_xml();
        assert!(xml.starts_with("<CompleteMultipartUpload>"));
        assert!(xml.contains("<Part><PartNumber>1</PartNumber><ETag>\"e1\"</ETag></Part>"));
        assert!(xml.contains("<Part><PartNumber>2</PartNumber><ETag>\"e2\"</ETag></Part>"));
        assert!(xml.ends_with("</CompleteMultipartUpload>"));
    }
}
