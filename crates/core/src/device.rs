//! Simulated lookup-table receiver.
//!
//! [`SimulatedDevice`] is a [`Session`] that behaves like the controller's
//! table download endpoint, with seeded fault injection so transfers can be
//! exercised without hardware.
//!
//! # Simulated Behavior
//!
//! - **Storage**: chunks are appended per table instance; a chunk at offset 0
//!   restarts that instance, any other offset must continue where the last
//!   accepted chunk ended
//! - **Verification**: takes `verify_polls` extra polls, then parses every
//!   received frame and checks its CRC
//! - **Busy**: requests are refused with probability `busy_rate`
//! - **Timeout**: requests go unanswered with probability `timeout_rate`
//!
//! # Determinism
//!
//! All randomness comes from a seeded ChaCha8 RNG. Given the same seed and
//! requests, the replies are identical.

use crate::error::{Error, Result};
use crate::frame::{parse_frame, HEADER_SIZE};
use crate::session::{Request, ResponseStatus, Session};
use crate::table::{TableInstance, MAX_INSTANCES};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// Raw status: chunk offset does not continue the stored frame
pub const STATUS_OUT_OF_ORDER: u32 = 10;

/// Raw status: a received frame failed its CRC check
pub const STATUS_CRC_FAILED: u32 = 11;

/// Raw status: a received frame is malformed or incomplete
pub const STATUS_BAD_FRAME: u32 = 12;

/// Configuration for the simulated device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    /// Probability [0.0, 1.0] that a request is answered Busy
    pub busy_rate: f64,

    /// Probability [0.0, 1.0] that a request times out
    pub timeout_rate: f64,

    /// Polls answered VerificationRunning before verification completes
    pub verify_polls: u32,

    /// Random seed for determinism
    pub seed: u64,
}

impl DeviceConfig {
    /// A device that accepts everything immediately.
    pub fn perfect(seed: u64) -> Self {
        Self {
            busy_rate: 0.0,
            timeout_rate: 0.0,
            verify_polls: 0,
            seed,
        }
    }

    /// A device that is occasionally busy and slow to verify, but never times out.
    pub fn default_with_seed(seed: u64) -> Self {
        Self {
            busy_rate: 0.1,
            timeout_rate: 0.0,
            verify_polls: 3,
            seed,
        }
    }
}

/// Statistics about simulated device behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Requests received
    pub requests: u64,

    /// Chunks stored
    pub chunks_stored: u64,

    /// Busy replies injected
    pub busy_injected: u64,

    /// Timeouts injected
    pub timeouts_injected: u64,

    /// Requests rejected with an unexpected status
    pub rejected: u64,
}

/// In-memory stand-in for the controller's table download endpoint.
pub struct SimulatedDevice {
    config: DeviceConfig,
    rng: ChaCha8Rng,

    /// Received bytes per instance, chunk padding included
    received: [Vec<u8>; MAX_INSTANCES],

    /// Samples of instances that passed verification
    tables: [Option<Vec<f32>>; MAX_INSTANCES],

    /// Remaining VerificationRunning polls, `None` when no verification is underway
    polls_left: Option<u32>,

    stats: DeviceStats,
}

impl SimulatedDevice {
    /// Create a new simulated device with the given configuration.
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            received: Default::default(),
            tables: Default::default(),
            polls_left: None,
            stats: DeviceStats::default(),
        }
    }

    /// Samples of `instance` as of the last successful verification.
    pub fn table(&self, instance: TableInstance) -> Option<&[f32]> {
        self.tables[instance.slot()].as_deref()
    }

    /// Raw bytes received for `instance` since its last restart.
    pub fn received(&self, instance: TableInstance) -> &[u8] {
        &self.received[instance.slot()]
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Roll for an injected fault.
    fn roll(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        let roll: f64 = self.rng.gen();
        roll < rate
    }

    /// Answer a request with a raw status code.
    fn handle(&mut self, request: &Request) -> u32 {
        if self.roll(self.config.timeout_rate) {
            self.stats.timeouts_injected += 1;
            return ResponseStatus::Timeout.code();
        }
        if self.roll(self.config.busy_rate) {
            self.stats.busy_injected += 1;
            return ResponseStatus::Busy.code();
        }

        match request {
            Request::Download {
                instance,
                offset,
                data,
            } => self.store_chunk(*instance, *offset as usize, data),
            Request::Verify => self.verify(),
        }
    }

    fn store_chunk(&mut self, instance: TableInstance, offset: usize, data: &[u8]) -> u32 {
        let buffer = &mut self.received[instance.slot()];

        if offset == 0 {
            buffer.clear();
            self.tables[instance.slot()] = None;
        } else if offset != buffer.len() {
            warn!(
                "instance {}: chunk at offset {} but {} bytes stored",
                instance,
                offset,
                buffer.len()
            );
            return STATUS_OUT_OF_ORDER;
        }

        buffer.extend_from_slice(data);
        self.polls_left = None;
        self.stats.chunks_stored += 1;
        ResponseStatus::Accepted.code()
    }

    fn verify(&mut self) -> u32 {
        let polls_left = self.polls_left.unwrap_or(self.config.verify_polls);
        if polls_left > 0 {
            self.polls_left = Some(polls_left - 1);
            return ResponseStatus::VerificationRunning.code();
        }
        self.polls_left = None;

        let mut verified: [Option<Vec<f32>>; MAX_INSTANCES] = Default::default();
        for instance in TableInstance::all() {
            let buffer = &self.received[instance.slot()];
            if buffer.is_empty() {
                continue;
            }

            if buffer.len() < HEADER_SIZE {
                return STATUS_BAD_FRAME;
            }
            let total_length =
                u32::from_le_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]) as usize;
            if total_length < HEADER_SIZE || total_length > buffer.len() {
                debug!(
                    "instance {}: frame claims {} bytes, {} received",
                    instance,
                    total_length,
                    buffer.len()
                );
                return STATUS_BAD_FRAME;
            }

            match parse_frame(&buffer[..total_length]) {
                Ok(frame) => verified[instance.slot()] = Some(frame.samples),
                Err(Error::Crc { expected, actual }) => {
                    warn!(
                        "instance {}: CRC mismatch, stored {:#010x}, computed {:#010x}",
                        instance, expected, actual
                    );
                    return STATUS_CRC_FAILED;
                }
                Err(e) => {
                    warn!("instance {}: {}", instance, e);
                    return STATUS_BAD_FRAME;
                }
            }
        }

        for (slot, samples) in verified.into_iter().enumerate() {
            if samples.is_some() {
                self.tables[slot] = samples;
            }
        }
        ResponseStatus::Accepted.code()
    }
}

impl Session for SimulatedDevice {
    fn exchange(&mut self, request: &Request) -> Result<ResponseStatus> {
        self.stats.requests += 1;

        let status = ResponseStatus::from_code(self.handle(request));
        if let ResponseStatus::Unexpected(_) = status {
            self.stats.rejected += 1;
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_column, FrameSet};
    use crate::session::CHUNK_SIZE;
    use crate::table::Column;
    use crate::transfer::{run_transfer, TransferOptions};

    fn instance(id: u8) -> TableInstance {
        TableInstance::new(id).unwrap()
    }

    fn download(id: u8, offset: u32, bytes: &[u8]) -> Request {
        let mut data = [0u8; CHUNK_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Request::Download {
            instance: instance(id),
            offset,
            data,
        }
    }

    #[test]
    fn test_perfect_device_stores_tables() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        let mut frames = FrameSet::new();
        frames.insert(instance(3), encode_column(&Column::new(samples.clone())));

        let mut device = SimulatedDevice::new(DeviceConfig::perfect(1));
        run_transfer(frames, &mut device, &TransferOptions::default(), |_| {}).unwrap();

        assert_eq!(device.table(instance(3)), Some(samples.as_slice()));
        assert!(device.table(instance(1)).is_none());

        let stats = device.stats();
        assert_eq!(stats.chunks_stored, 2);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn test_out_of_order_chunk_rejected() {
        let mut device = SimulatedDevice::new(DeviceConfig::perfect(1));

        let status = device.exchange(&download(1, 256, &[0u8; 16])).unwrap();
        assert_eq!(status, ResponseStatus::Unexpected(STATUS_OUT_OF_ORDER));
        assert_eq!(device.stats().rejected, 1);
    }

    #[test]
    fn test_corrupted_frame_fails_verification() {
        let mut bytes = encode_column(&Column::new(vec![1.0, 2.0, 3.0])).into_bytes();
        bytes[14] ^= 0xFF;

        let mut device = SimulatedDevice::new(DeviceConfig::perfect(1));
        assert_eq!(device.exchange(&download(1, 0, &bytes)).unwrap(), ResponseStatus::Accepted);
        assert_eq!(
            device.exchange(&Request::Verify).unwrap(),
            ResponseStatus::Unexpected(STATUS_CRC_FAILED)
        );
        assert!(device.table(instance(1)).is_none());
    }

    #[test]
    fn test_incomplete_frame_fails_verification() {
        let bytes = encode_column(&Column::new(vec![0.5; 100])).into_bytes();

        let mut device = SimulatedDevice::new(DeviceConfig::perfect(1));
        device.exchange(&download(2, 0, &bytes[..CHUNK_SIZE])).unwrap();

        assert_eq!(
            device.exchange(&Request::Verify).unwrap(),
            ResponseStatus::Unexpected(STATUS_BAD_FRAME)
        );
    }

    #[test]
    fn test_verification_takes_configured_polls() {
        let config = DeviceConfig {
            verify_polls: 2,
            ..DeviceConfig::perfect(1)
        };
        let mut device = SimulatedDevice::new(config);

        assert_eq!(device.exchange(&Request::Verify).unwrap(), ResponseStatus::VerificationRunning);
        assert_eq!(device.exchange(&Request::Verify).unwrap(), ResponseStatus::VerificationRunning);
        assert_eq!(device.exchange(&Request::Verify).unwrap(), ResponseStatus::Accepted);
    }

    #[test]
    fn test_restart_at_offset_zero() {
        let bytes = encode_column(&Column::new(vec![0.5; 100])).into_bytes();
        let mut device = SimulatedDevice::new(DeviceConfig::perfect(1));

        device.exchange(&download(1, 0, &bytes[..CHUNK_SIZE])).unwrap();
        device.exchange(&download(1, 0, &bytes[..CHUNK_SIZE])).unwrap();
        assert_eq!(device.received(instance(1)).len(), CHUNK_SIZE);

        device
            .exchange(&download(1, CHUNK_SIZE as u32, &bytes[CHUNK_SIZE..]))
            .unwrap();
        assert_eq!(device.exchange(&Request::Verify).unwrap(), ResponseStatus::Accepted);
        assert_eq!(device.table(instance(1)).unwrap().len(), 100);
    }

    #[test]
    fn test_busy_injection_deterministic() {
        let config = DeviceConfig {
            busy_rate: 0.5,
            ..DeviceConfig::perfect(12345)
        };
        let mut first = SimulatedDevice::new(config);
        let mut second = SimulatedDevice::new(config);

        let request = download(1, 0, &[0u8; 4]);
        let replies = |device: &mut SimulatedDevice| -> Vec<ResponseStatus> {
            (0..50).map(|_| device.exchange(&request).unwrap()).collect()
        };

        let a = replies(&mut first);
        let b = replies(&mut second);
        assert_eq!(a, b);

        let busy = a.iter().filter(|s| **s == ResponseStatus::Busy).count();
        assert!(busy > 10 && busy < 40);
    }

    #[test]
    fn test_transfer_survives_busy_device() {
        let samples: Vec<f32> = (0..500).map(|i| (i as f32).sin()).collect();
        let mut frames = FrameSet::new();
        frames.insert(instance(1), encode_column(&Column::new(samples.clone())));

        let config = DeviceConfig {
            busy_rate: 0.3,
            timeout_rate: 0.0,
            verify_polls: 2,
            seed: 7,
        };
        let mut device = SimulatedDevice::new(config);

        let metrics = run_transfer(frames, &mut device, &TransferOptions::default(), |_| {}).unwrap();

        assert_eq!(device.table(instance(1)), Some(samples.as_slice()));
        assert_eq!(metrics.busy_replies + metrics.chunks_sent + metrics.verify_polls, device.stats().requests);
    }
}
