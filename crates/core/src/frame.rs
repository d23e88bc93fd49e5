//! Binary lookup-table frame encoding and parsing.
//!
//! Each table instance is downloaded as one self-describing frame.
//!
//! # Frame Format
//!
//! ```text
//! +-------------------+
//! | crc (4 bytes)     |  u32 LE, CRC over everything after this field
//! +-------------------+
//! | total_length (4)  |  u32 LE, whole frame including this header
//! +-------------------+
//! | table_type (4)    |  u32 LE, always 0 (plain f32 table)
//! +-------------------+
//! | samples           |  f32 LE, 4 bytes each
//! | (variable)        |
//! +-------------------+
//! ```
//!
//! # CRC Coverage
//!
//! The CRC covers `total_length`, `table_type` and the samples, i.e. bytes
//! `[4..total_length)`. See [`crate::crc`] for the checksum variant.

use crate::crc::crc32;
use crate::error::{Error, FramingError, Result};
use crate::table::{Column, TableInstance, TableSet, MAX_INSTANCES};

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 12;

/// Table type of a plain float lookup table
pub const TABLE_TYPE_FLOAT: u32 = 0;

/// Encoded bytes of one table instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
}

impl EncodedFrame {
    /// The full frame, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total frame length (the `total_length` field).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Stored checksum.
    pub fn crc(&self) -> u32 {
        read_u32(&self.bytes, 0)
    }

    /// Number of samples in the payload.
    pub fn sample_count(&self) -> usize {
        (self.bytes.len() - HEADER_SIZE) / 4
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A parsed and checksum-verified frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFrame {
    pub crc: u32,
    pub table_type: u32,
    pub samples: Vec<f32>,
}

/// Encoded frames for up to four table instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSet {
    slots: [Option<EncodedFrame>; MAX_INSTANCES],
}

impl FrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: TableInstance, frame: EncodedFrame) -> Option<EncodedFrame> {
        self.slots[instance.slot()].replace(frame)
    }

    pub fn get(&self, instance: TableInstance) -> Option<&EncodedFrame> {
        self.slots[instance.slot()].as_ref()
    }

    /// Present frames in ascending instance order.
    pub fn iter(&self) -> impl Iterator<Item = (TableInstance, &EncodedFrame)> {
        TableInstance::all().filter_map(move |instance| self.get(instance).map(|f| (instance, f)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Encode one column into a frame.
///
/// Encoding is deterministic: the same column always yields identical bytes.
pub fn encode_column(column: &Column) -> EncodedFrame {
    let total_length = HEADER_SIZE + 4 * column.len();
    let mut bytes = Vec::with_capacity(total_length);

    // CRC placeholder, filled in once the covered bytes are written
    bytes.extend_from_slice(&[0u8; 4]);
    bytes.extend_from_slice(&(total_length as u32).to_le_bytes());
    bytes.extend_from_slice(&TABLE_TYPE_FLOAT.to_le_bytes());

    for sample in column.samples() {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    let crc = crc32(&bytes[4..]);
    bytes[0..4].copy_from_slice(&crc.to_le_bytes());

    EncodedFrame { bytes }
}

/// Encode every present column of a table set.
pub fn encode_table_set(tables: TableSet) -> FrameSet {
    let mut frames = FrameSet::new();
    for (instance, column) in tables.into_columns() {
        frames.insert(instance, encode_column(&column));
    }
    frames
}

/// Parse a frame and verify its checksum.
///
/// # Errors
/// - `FramingError::FrameTooShort` if the buffer cannot hold a header
/// - `FramingError::LengthMismatch` if `total_length` disagrees with the buffer
/// - `FramingError::UnsupportedTableType` for a table type other than 0
/// - `FramingError::MisalignedPayload` if the payload is not whole samples
/// - `Error::Crc` if the checksum does not match
pub fn parse_frame(bytes: &[u8]) -> Result<TableFrame> {
    if bytes.len() < HEADER_SIZE {
        return Err(FramingError::FrameTooShort {
            required: HEADER_SIZE,
            actual: bytes.len(),
        }
        .into());
    }

    let crc = read_u32(bytes, 0);
    let total_length = read_u32(bytes, 4) as usize;
    let table_type = read_u32(bytes, 8);

    if total_length != bytes.len() {
        return Err(FramingError::LengthMismatch {
            expected: total_length,
            actual: bytes.len(),
        }
        .into());
    }

    let computed = crc32(&bytes[4..]);
    if computed != crc {
        return Err(Error::Crc {
            expected: crc,
            actual: computed,
        });
    }

    if table_type != TABLE_TYPE_FLOAT {
        return Err(FramingError::UnsupportedTableType(table_type).into());
    }

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() % 4 != 0 {
        return Err(FramingError::MisalignedPayload { len: payload.len() }.into());
    }

    let samples = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(TableFrame {
        crc,
        table_type,
        samples,
    })
}
