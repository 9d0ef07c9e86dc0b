//! Transfer measurements and the append-only performance log.

use std::path::Path;
use std::time::Duration;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Marker line opening each record in the performance log.
pub const RECORD_MARKER: &str = "''^||^''";

/// Bytes moved and time taken by one completed transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferReport {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferReport {
    /// Average throughput in bytes per second (0 when no time elapsed).
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Render the record block written to the performance log.
    pub fn record(&self, loss_rate: f64) -> String {
        format!(
            "{RECORD_MARKER}\nLOSS RATE={loss_rate}\nNUMBER OF BYTES={}\nTOTAL TIME={}\nAVERAGE THROUGHPUT={}\n",
            self.bytes,
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

/// Append-only file of [`TransferReport`] records.
#[derive(Debug, Clone)]
pub struct PerformanceLog<P> {
    path: P,
}

impl<P: AsRef<Path>> PerformanceLog<P> {
    pub fn new(path: P) -> Self {
        Self { path }
    }

    /// Append one record, creating the file on first use.
    pub async fn append(&self, loss_rate: f64, report: &TransferReport) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_ref())
            .await?;
        file.write_all(report.record(loss_rate).as_bytes()).await?;
        file.flush().await
    }
}
