//! Byte sources for uploads.
//!
//! Part workers read disjoint ranges of the same source concurrently, so a
//! source must support independent positioned reads rather than a shared
//! cursor.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{ClientError, Result};

/// A seekable byte source with independent range reads.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Total size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `length` bytes starting at `offset`.
    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes>;
}

/// In-memory source backed by `Bytes`.
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ObjectSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= self.data.len() as u64)
            .ok_or_else(|| {
                ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "range past end of source",
                ))
            })?;
        Ok(self.data.slice(offset as usize..end as usize))
    }
}

/// File-backed source. Every read opens its own handle, so workers never
/// contend on a shared cursor.
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&path).await?.len();
        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ObjectSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_bytes_source_range_reads() {
        let source = BytesSource::new(&b"0123456789"[..]);
        assert_eq!(source.len(), 10);
        assert_eq!(source.read_range(0, 4).await.unwrap().as_ref(), b"0123");
        assert_eq!(source.read_range(6, 4).await.unwrap().as_ref(), b"6789");
        assert!(source.read_range(8, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_file_source_concurrent_reads() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefghij").unwrap();
        tmp.flush().unwrap();

        let source = std::sync::Arc::new(FileSource::open(tmp.path()).await.unwrap());
        assert_eq!(source.len(), 10);

        let a = {
            let source = std::sync::Arc::clone(&source);
            tokio::spawn(async move { source.read_range(0, 5).await })
        };
        let b = {
            let source = std::sync::Arc::clone(&source);
            tokio::spawn(async move { source.read_range(5, 5).await })
        };

        assert_eq!(a.await.unwrap().unwrap().as_ref(), b"abcde");
        assert_eq!(b.await.unwrap().unwrap().as_ref(), b"fghij");
    }
}
