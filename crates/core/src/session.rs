//! The request/response boundary to the controller.
//!
//! The transfer scheduler never touches the physical link. It hands a
//! [`Request`] to a [`Session`] and gets back a [`ResponseStatus`]; the session
//! owns the connection, renders the request onto the wire and translates the
//! device's raw status code.
//!
//! # Wire Format
//!
//! Requests are ASCII. A download request carries the command code, the table
//! instance (2 hex digits), the byte offset (8 hex digits) and the chunk
//! (512 hex digits, upper case):
//!
//! ```text
//! TD 01 00000100 3F800000...
//! ```
//!
//! (spaces added for readability). A verify request is the bare command code.

use crate::error::Result;
use crate::table::TableInstance;

/// Bytes carried by one download request.
pub const CHUNK_SIZE: usize = 256;

/// Command code of a table download request.
pub const DOWNLOAD_COMMAND: &str = "TD";

/// Command code of a table verify request.
pub const VERIFY_COMMAND: &str = "TV";

/// A request to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store `data` at `offset` within the frame for `instance`
    Download {
        instance: TableInstance,
        offset: u32,
        data: [u8; CHUNK_SIZE],
    },

    /// Check and commit all downloaded tables
    Verify,
}

impl Request {
    /// Render the request as its ASCII wire frame.
    pub fn to_wire(&self) -> String {
        match self {
            Request::Download {
                instance,
                offset,
                data,
            } => format!(
                "{}{:02X}{:08X}{}",
                DOWNLOAD_COMMAND,
                instance.id(),
                offset,
                hex::encode_upper(data)
            ),
            Request::Verify => VERIFY_COMMAND.to_string(),
        }
    }
}

/// Device answer to a request, as translated by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// Request accepted (for verify: verification completed)
    Accepted,
    /// Device cannot take the request yet; send it again
    Busy,
    /// Verification started but has not finished
    VerificationRunning,
    /// No answer within the session's deadline
    Timeout,
    /// Any other status code
    Unexpected(u32),
}

impl ResponseStatus {
    /// Translate a raw device status code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResponseStatus::Accepted,
            1 => ResponseStatus::Busy,
            2 => ResponseStatus::VerificationRunning,
            3 => ResponseStatus::Timeout,
            other => ResponseStatus::Unexpected(other),
        }
    }

    /// The raw code this status corresponds to.
    pub fn code(self) -> u32 {
        match self {
            ResponseStatus::Accepted => 0,
            ResponseStatus::Busy => 1,
            ResponseStatus::VerificationRunning => 2,
            ResponseStatus::Timeout => 3,
            ResponseStatus::Unexpected(code) => code,
        }
    }
}

/// A request/response channel to one controller.
///
/// Each call blocks until the device answers or the session gives up, in
/// which case it returns [`ResponseStatus::Timeout`]. Link-level failures
/// other than timeouts are reported as `Error::Io`.
pub trait Session {
    fn exchange(&mut self, request: &Request) -> Result<ResponseStatus>;
}

impl<S: Session + ?Sized> Session for &mut S {
    fn exchange(&mut self, request: &Request) -> Result<ResponseStatus> {
        (**self).exchange(request)
    }
}
