//! # Offset Scan
//!
//! Helps finding the offsets to configure for a new meter: every message read
//! is scanned for integer fields and the result is written as one JSON file per
//! message. Diffing files taken a while apart shows which offsets carry the
//! counters that move.

use crate::error::SmlError;
use crate::sml::field::{scan_fields, ScanRecord};
use crate::sml::reader::FrameReader;
use crate::sml::transport::SerialTransport;
use crate::util::logging::LogThrottle;
use chrono::Local;
use log::{info, warn};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of a scan run
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub out_dir: PathBuf,
    pub offsets: Range<usize>,
    /// Stop after this many records; `None` scans until the stream fails
    /// `max_failures` times in a row
    pub count: Option<usize>,
    pub interval: Duration,
    pub max_failures: usize,
}

/// Reads messages and writes a `ScanRecord` for each one. Returns the paths
/// written.
pub async fn run_scan<T: SerialTransport>(
    reader: &mut FrameReader<T>,
    options: &ScanOptions,
) -> Result<Vec<PathBuf>, SmlError> {
    tokio::fs::create_dir_all(&options.out_dir)
        .await
        .map_err(|e| SmlError::Other(format!("{}: {e}", options.out_dir.display())))?;

    let mut written = Vec::new();
    let mut failures = 0;
    let mut throttle = LogThrottle::new(60_000, 3);

    while options.count.map_or(true, |count| written.len() < count) {
        match reader.read_message().await {
            Ok(message) => {
                failures = 0;
                let mut record = scan_fields(&message, options.offsets.clone());
                record.captured_at = Some(Local::now());
                let path = write_record(&options.out_dir, &record, written.len()).await?;
                info!("{} fields -> {}", record.len(), path.display());
                written.push(path);
            }
            Err(e) => {
                failures += 1;
                if throttle.allow() {
                    warn!("Scan read failed ({failures} in a row): {e}");
                }
                if failures >= options.max_failures {
                    return Err(e);
                }
            }
        }

        if options.count.map_or(false, |count| written.len() >= count) {
            break;
        }
        tokio::time::sleep(options.interval).await;
    }

    Ok(written)
}

/// Writes `record` as `%Y%m%d_%H%M%S.json`. `seq` disambiguates records
/// captured within the same second.
async fn write_record(dir: &Path, record: &ScanRecord, seq: usize) -> Result<PathBuf, SmlError> {
    let stamp = record
        .captured_at
        .unwrap_or_else(Local::now)
        .format("%Y%m%d_%H%M%S");

    let mut path = dir.join(format!("{stamp}.json"));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        path = dir.join(format!("{stamp}_{seq}.json"));
    }

    let json = serde_json::to_vec_pretty(record).map_err(|e| SmlError::Other(e.to_string()))?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| SmlError::Other(format!("{}: {e}", path.display())))?;
    Ok(path)
}
