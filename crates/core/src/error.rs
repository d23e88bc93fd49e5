//! Error types for the lookup-table transfer system.
//!
//! All operations return structured errors rather than panicking.
//! Validation failures happen before any byte reaches the device; transfer
//! failures end the current download operation.

use crate::transfer::Phase;
use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Validation: the table-definition CSV is malformed
/// - Framing: an encoded table frame could not be parsed
/// - Transfer: the device rejected or stopped answering a download
/// - CRC: frame contents disagree with the stored checksum
/// - I/O: file system or link operations
#[derive(Debug, Error)]
pub enum Error {
    /// Table-definition file failed validation
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encoded frame is structurally invalid
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Chunked download failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// CRC validation failed, indicating data corruption
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },

    /// File or link I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Table-definition (CSV) validation errors.
///
/// Row numbers are 1-based line positions in the file, counting the header
/// as row 1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Header has fewer than 2 or more than 5 cells
    #[error("header has {count} columns, expected 2 to 5 (at most 4 tables)")]
    ColumnCountOutOfRange { count: usize },

    /// First header cell is not `Table Instance`, or an instance id is not in [1,4]
    #[error("bad header cell {column}: {value:?}")]
    BadHeaderCell { column: usize, value: String },

    /// The same table instance appears twice in the header
    #[error("table instance {instance} appears more than once in the header")]
    DuplicateInstance { instance: u8 },

    /// Body row cell count differs from the header
    #[error("row {row} has {actual} columns, header has {expected}")]
    RowLengthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// A value follows the end of a column
    #[error("table instance {instance} has a value in row {row} after its column ended")]
    NonEmptyAfterEnd { row: usize, instance: u8 },

    /// Column holds fewer samples than the device accepts
    #[error("table instance {instance} has {count} samples, minimum is {min}")]
    TooFewSamples { instance: u8, count: usize, min: usize },

    /// Column holds more samples than the device accepts
    #[error("table instance {instance} exceeds {max} samples at row {row}")]
    TooManySamples { instance: u8, row: usize, max: usize },
}

/// Encoded table frame parsing errors.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Buffer is too short to contain a frame header
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Length field disagrees with the buffer
    #[error("frame length mismatch: header says {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Table type other than the plain float table
    #[error("unsupported table type {0}")]
    UnsupportedTableType(u32),

    /// Payload is not a whole number of f32 samples
    #[error("payload of {len} bytes is not a multiple of 4")]
    MisalignedPayload { len: usize },
}

/// Chunked transfer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The session reported a timeout; the operation is abandoned
    #[error("communication timeout during {during}")]
    CommunicationTimeout { during: Phase },

    /// The device answered with a status this phase does not accept
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u32),

    /// The device stayed busy beyond the caller's retry budget
    #[error("device still busy after {retries} retries")]
    DeviceBusy { retries: u32 },

    /// The transfer already reached a terminal phase
    #[error("transfer already finished")]
    Finished,
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
