//! Multipart upload demonstration
//!
//! This example demonstrates:
//! - Single-shot object upload
//! - Driving the multipart lifecycle by hand (init, parts, list, complete)
//! - The orchestrated multipart flow with per-stage failure diagnosis
//!
//! Run with: cargo run --example multi_upload

use std::sync::Arc;

use bytes::Bytes;
use cos_client::{BytesSource, Config, CosClient, ManifestEntry, Stage, UploadManifest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "cos_client=debug".to_string()),
        )
        .init();

    let config = Config::new("http://localhost:9000").with_token("your-token-here");
    let client = CosClient::new(config)?;
    let bucket = "demo-bucket";

    // ==================== Single-shot Upload ====================

    println!("Uploading a small object...");
    let put = client
        .put_object(bucket, "hello.txt", &b"Hello, World!"[..])
        .await?;
    println!("   ETag: {}", put.etag());

    // ==================== Manual Multipart Lifecycle ====================

    println!("\nManual multipart upload...");
    let init = client.initiate_upload(bucket, "manual.bin").await?;
    println!("   Upload ID: {}", init.upload_id);

    let part_size = 1024 * 1024;
    let data: Vec<u8> = (0..2 * part_size).map(|i| (i % 251) as u8).collect();

    let mut entries = Vec::new();
    for (index, chunk) in data.chunks(part_size).enumerate() {
        let part_number = index as u32 + 1;
        let part = client
            .upload_part(
                bucket,
                "manual.bin",
                &init.upload_id,
                part_number,
                Bytes::copy_from_slice(chunk),
            )
            .await?;
        println!("   Part {} uploaded, ETag: {}", part_number, part.etag());
        entries.push(ManifestEntry {
            part_number,
            etag: part.etag().to_string(),
        });
    }

    let listed = client
        .list_parts(bucket, "manual.bin", &init.upload_id, Some(10), None)
        .await?;
    println!(
        "   {} parts on the remote side, truncated: {}",
        listed.parts.len(),
        listed.is_truncated
    );

    let complete = client
        .complete_upload(
            bucket,
            "manual.bin",
            &init.upload_id,
            &UploadManifest { entries },
        )
        .await?;
    println!("   Completed at {}", complete.location);

    // ==================== Orchestrated Multipart Upload ====================

    println!("\nOrchestrated multipart upload (16 MiB)...");
    let big: Vec<u8> = vec![42u8; 16 * 1024 * 1024];
    match client
        .multi_upload_object(bucket, "big.bin", Arc::new(BytesSource::new(big)))
        .await
    {
        Ok(result) => {
            println!("   Location: {}", result.location);
            println!("   Key: {}", result.key);
            println!("   ETag: {}", result.etag());
        }
        Err(failure) => {
            // The stage tag tells which remote side-effect is left behind.
            match failure.stage {
                Stage::Init => println!("   Init failed, nothing to clean up: {}", failure.source),
                Stage::Upload => println!(
                    "   Upload failed ({} parts), session released: {}",
                    failure.failed_parts.len(),
                    failure.aborted()
                ),
                Stage::Complete => {
                    let upload_id = failure
                        .partial
                        .as_ref()
                        .map(|p| p.upload_id.as_str())
                        .unwrap_or_default();
                    println!(
                        "   Complete failed, retry or abort upload {}: {}",
                        upload_id, failure.source
                    );
                }
            }
        }
    }

    Ok(())
}
