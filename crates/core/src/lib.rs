//! lut-transfer-core: lookup-table download to a command/response controller
//!
//! This library takes a waveform table definition from CSV text all the way
//! to a verified download on the device:
//! - Validates the table-definition file and extracts up to four columns
//! - Encodes each column as a CRC-protected binary frame
//! - Sends the frames in 256-byte chunks over a request/response session
//! - Handles busy, timeout and unexpected replies, then asks the device to verify
//!
//! # Architecture
//!
//! - `crc`: the device's CRC-32 variant
//! - `table`: table instances, columns and table sets
//! - `ingest`: CSV parsing and validation
//! - `frame`: binary frame encoding and parsing
//! - `session`: request/response boundary to the device
//! - `transfer`: chunked download state machine
//! - `device`: simulated receiver with seeded fault injection
//! - `metrics`: observable transfer behavior
//!
//! # Example
//!
//! ```
//! use lut_transfer_core::device::{DeviceConfig, SimulatedDevice};
//! use lut_transfer_core::frame::encode_table_set;
//! use lut_transfer_core::ingest::ingest_table;
//! use lut_transfer_core::transfer::{run_transfer, TransferOptions};
//!
//! let tables = ingest_table("Table Instance;1\n;0.0\n;0.5\n;1.0\n").unwrap();
//! let frames = encode_table_set(tables);
//!
//! let mut device = SimulatedDevice::new(DeviceConfig::perfect(42));
//! let metrics = run_transfer(frames, &mut device, &TransferOptions::default(), |_| {}).unwrap();
//! assert_eq!(metrics.progress, 100);
//! ```

pub mod crc;
pub mod device;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod metrics;
pub mod session;
pub mod table;
pub mod transfer;

// Re-export commonly used types
pub use error::{Error, Result};
