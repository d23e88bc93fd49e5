//! Metrics collection and reporting for table downloads.
//!
//! The scheduler updates a [`TransferMetrics`] as it goes; the final value is
//! returned to the caller as the report of one download operation.
//!
//! # Thread Safety
//!
//! Metrics belong to a single transfer and are updated from one thread.

use std::time::{Duration, Instant};

/// Counters and timing for one download operation.
#[derive(Debug, Clone)]
pub struct TransferMetrics {
    // === Timing ===
    /// When the transfer started
    pub start_time: Instant,

    /// When the transfer ended (set on completion)
    pub end_time: Option<Instant>,

    // === Tables ===
    /// Table instances scheduled for download
    pub tables_planned: u64,

    /// Table instances whose last chunk was accepted
    pub tables_sent: u64,

    // === Chunks ===
    /// Bytes scheduled, each table rounded up to whole chunks
    pub bytes_planned: u64,

    /// Bytes acknowledged by the device (whole chunks)
    pub bytes_sent: u64,

    /// Chunks acknowledged by the device
    pub chunks_sent: u64,

    /// Requests answered with Busy
    pub busy_replies: u64,

    // === Verification ===
    /// Verify requests issued
    pub verify_polls: u64,

    /// Last reported progress, 0..=100
    pub progress: u8,
}

impl TransferMetrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            tables_planned: 0,
            tables_sent: 0,
            bytes_planned: 0,
            bytes_sent: 0,
            chunks_sent: 0,
            busy_replies: 0,
            verify_polls: 0,
            progress: 0,
        }
    }

    /// Mark the transfer as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Acknowledged bytes per second.
    pub fn throughput_bps(&self) -> f64 {
        let duration_secs = self.duration().as_secs_f64();
        if duration_secs == 0.0 {
            0.0
        } else {
            self.bytes_sent as f64 / duration_secs
        }
    }

    /// Busy replies per issued request.
    pub fn busy_rate(&self) -> f64 {
        let requests = self.chunks_sent + self.busy_replies + self.verify_polls;
        if requests == 0 {
            0.0
        } else {
            self.busy_replies as f64 / requests as f64
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Download Summary ===");
        println!("Duration: {} ms", self.duration().as_millis());
        println!("Result: {}", if self.is_complete() { "verified" } else { "incomplete" });
        println!();

        println!("=== Tables ===");
        println!("Planned: {}", self.tables_planned);
        println!("Sent: {}", self.tables_sent);
        println!();

        println!("=== Chunks ===");
        println!("Bytes planned: {}", self.bytes_planned);
        println!("Bytes sent: {}", self.bytes_sent);
        println!("Chunks sent: {}", self.chunks_sent);
        println!("Busy replies: {} ({:.2}%)", self.busy_replies, self.busy_rate() * 100.0);
        println!("Verify polls: {}", self.verify_polls);
        println!();

        println!("Throughput: {:.2} KB/s", self.throughput_bps() / 1000.0);
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             tables_planned={}\n\
             tables_sent={}\n\
             bytes_planned={}\n\
             bytes_sent={}\n\
             chunks_sent={}\n\
             busy_replies={}\n\
             verify_polls={}\n\
             progress={}\n",
            self.duration().as_millis(),
            self.tables_planned,
            self.tables_sent,
            self.bytes_planned,
            self.bytes_sent,
            self.chunks_sent,
            self.busy_replies,
            self.verify_polls,
            self.progress,
        )
    }
}

impl Default for TransferMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TransferMetrics::new();
        assert!(!metrics.is_complete());
        assert!(metrics.duration().as_millis() < 100);
    }

    #[test]
    fn test_busy_rate() {
        let mut metrics = TransferMetrics::new();
        metrics.chunks_sent = 8;
        metrics.busy_replies = 1;
        metrics.verify_polls = 1;

        assert_eq!(metrics.busy_rate(), 0.1);
    }

    #[test]
    fn test_throughput() {
        let mut metrics = TransferMetrics::new();
        metrics.bytes_sent = 4096;

        std::thread::sleep(Duration::from_millis(10));
        metrics.complete();

        assert!(metrics.throughput_bps() > 0.0);
    }

    #[test]
    fn test_export_text() {
        let mut metrics = TransferMetrics::new();
        metrics.bytes_sent = 512;
        metrics.chunks_sent = 2;
        metrics.progress = 100;

        let text = metrics.export_text();
        assert!(text.contains("bytes_sent=512"));
        assert!(text.contains("chunks_sent=2"));
        assert!(text.contains("progress=100"));
    }
}
