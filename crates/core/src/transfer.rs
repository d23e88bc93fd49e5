//! Chunked lookup-table download.
//!
//! A [`Transfer`] walks the encoded frames of one table set through a
//! [`Session`], one 256-byte chunk per round trip, then asks the device to
//! verify what it received.
//!
//! # Phases
//!
//! ```text
//! INIT -> SELECT_TABLE -> SEND_CHUNK -+-> SELECT_TABLE ... -> VERIFY -> DONE
//!              ^              |  ^    |
//!              +--------------+  +----+ (next chunk / busy)
//!
//! timeout or unexpected status in any phase -> FAILED
//! ```
//!
//! - Instances go out in ascending order, absent instances are skipped
//! - Chunks of one instance go out in ascending offset order, never overlapping
//! - A busy reply re-sends the identical request
//! - Progress is capped at 95% until the device confirms verification
//!
//! All working state lives in the [`TransferState`] owned by one `Transfer`;
//! a new download starts from a new `Transfer` and every instance restarts
//! at offset 0.

use crate::error::{Error, Result, TransferError};
use crate::frame::{EncodedFrame, FrameSet};
use crate::metrics::TransferMetrics;
use crate::session::{Request, ResponseStatus, Session, CHUNK_SIZE};
use crate::table::{TableInstance, MAX_INSTANCES};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Highest progress reported before verification succeeds.
pub const PROGRESS_CAP: u8 = 95;

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    SelectTable,
    SendChunk,
    Verify,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::SelectTable => "table selection",
            Phase::SendChunk => "chunk download",
            Phase::Verify => "verification",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Working fields of one download operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    pub phase: Phase,
    /// Instance being sent; `None` before the first and after the last
    pub current_instance: Option<TableInstance>,
    /// Offset of the next chunk within the current frame
    pub byte_offset: usize,
    pub total_bytes_planned: u64,
    pub total_bytes_sent: u64,
    pub progress: u8,
}

impl TransferState {
    fn new() -> Self {
        Self {
            phase: Phase::Init,
            current_instance: None,
            byte_offset: 0,
            total_bytes_planned: 0,
            total_bytes_sent: 0,
            progress: 0,
        }
    }
}

/// Result of one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A chunk was accepted; carries the new progress
    Progress(u8),
    /// The device was busy; the same chunk goes out again
    Busy,
    /// Verification has not finished yet; poll again
    Verifying,
    /// The device verified every table
    Done,
}

/// Caller-side retry policy for busy replies.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Pause before re-sending after a busy or still-verifying reply
    pub busy_delay: Duration,

    /// Consecutive busy replies tolerated for one request (`None` = unlimited)
    pub max_busy_retries: Option<u32>,
}

/// Bytes a frame occupies on the wire, rounded up to whole chunks.
pub fn planned_bytes(frame: &EncodedFrame) -> u64 {
    let chunks = (frame.len() + CHUNK_SIZE - 1) / CHUNK_SIZE;
    (chunks * CHUNK_SIZE) as u64
}

/// Copy the chunk at `offset`, zero-filling past the end of the frame.
fn chunk_at(frame: &[u8], offset: usize) -> [u8; CHUNK_SIZE] {
    let mut data = [0u8; CHUNK_SIZE];
    if offset < frame.len() {
        let end = (offset + CHUNK_SIZE).min(frame.len());
        data[..end - offset].copy_from_slice(&frame[offset..end]);
    }
    data
}

/// One download operation over a set of encoded frames.
pub struct Transfer {
    frames: FrameSet,
    state: TransferState,
    metrics: TransferMetrics,
}

impl Transfer {
    /// Create a transfer in the INIT phase.
    pub fn new(frames: FrameSet) -> Self {
        Self {
            frames,
            state: TransferState::new(),
            metrics: TransferMetrics::new(),
        }
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn progress(&self) -> u8 {
        self.state.progress
    }

    pub fn metrics(&self) -> &TransferMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> TransferMetrics {
        self.metrics
    }

    /// Whether the transfer reached DONE or FAILED.
    pub fn is_finished(&self) -> bool {
        matches!(self.state.phase, Phase::Done | Phase::Failed)
    }

    /// Advance to and perform the next round trip.
    ///
    /// INIT and SELECT_TABLE need no device traffic and are passed through
    /// until a request has been exchanged.
    ///
    /// # Errors
    /// - `TransferError::CommunicationTimeout` if the session timed out
    /// - `TransferError::UnexpectedStatus` for a status the phase does not accept
    /// - Any error the session itself returns
    /// - `TransferError::Finished` once the transfer is DONE or FAILED
    ///
    /// Every error except `Finished` moves the transfer to FAILED.
    pub fn step<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<Step> {
        loop {
            match self.state.phase {
                Phase::Init => self.plan(),
                Phase::SelectTable => self.select_next_table(),
                Phase::SendChunk => {
                    let Some((instance, frame)) = self.current_frame() else {
                        self.state.phase = Phase::SelectTable;
                        continue;
                    };
                    let offset = self.state.byte_offset;
                    let frame_len = frame.len();
                    let request = Request::Download {
                        instance,
                        offset: offset as u32,
                        data: chunk_at(frame.as_bytes(), offset),
                    };
                    return self.send_chunk(session, &request, frame_len);
                }
                Phase::Verify => return self.verify(session),
                Phase::Done | Phase::Failed => return Err(TransferError::Finished.into()),
            }
        }
    }

    fn plan(&mut self) {
        let planned: u64 = self.frames.iter().map(|(_, frame)| planned_bytes(frame)).sum();

        self.state = TransferState::new();
        self.state.total_bytes_planned = planned;
        self.state.phase = Phase::SelectTable;

        self.metrics = TransferMetrics::new();
        self.metrics.tables_planned = self.frames.len() as u64;
        self.metrics.bytes_planned = planned;

        info!(
            "starting lookup table download: {} table(s), {} bytes planned",
            self.frames.len(),
            planned
        );
    }

    fn select_next_table(&mut self) {
        let first_slot = self.state.current_instance.map_or(0, |i| i.slot() + 1);
        let next = (first_slot..MAX_INSTANCES)
            .filter_map(TableInstance::from_slot)
            .find(|instance| self.frames.get(*instance).is_some());

        match next {
            Some(instance) => {
                debug!("sending table instance {}", instance);
                self.state.current_instance = Some(instance);
                self.state.byte_offset = 0;
                self.state.phase = Phase::SendChunk;
            }
            None => {
                debug!("all tables sent, verifying");
                self.state.current_instance = None;
                self.state.phase = Phase::Verify;
            }
        }
    }

    fn current_frame(&self) -> Option<(TableInstance, &EncodedFrame)> {
        let instance = self.state.current_instance?;
        Some((instance, self.frames.get(instance)?))
    }

    fn send_chunk<S: Session + ?Sized>(
        &mut self,
        session: &mut S,
        request: &Request,
        frame_len: usize,
    ) -> Result<Step> {
        match self.exchange(session, request)? {
            ResponseStatus::Accepted => {
                self.state.byte_offset += CHUNK_SIZE;
                self.state.total_bytes_sent += CHUNK_SIZE as u64;
                self.state.progress = self.capped_progress();

                self.metrics.chunks_sent += 1;
                self.metrics.bytes_sent = self.state.total_bytes_sent;
                self.metrics.progress = self.state.progress;

                debug!(
                    "chunk accepted: instance {:?}, next offset {}, progress {}%",
                    self.state.current_instance.map(TableInstance::id),
                    self.state.byte_offset,
                    self.state.progress
                );

                if self.state.byte_offset >= frame_len {
                    self.metrics.tables_sent += 1;
                    self.state.phase = Phase::SelectTable;
                }
                Ok(Step::Progress(self.state.progress))
            }
            ResponseStatus::Busy => {
                self.metrics.busy_replies += 1;
                warn!("device busy at offset {}, re-sending chunk", self.state.byte_offset);
                Ok(Step::Busy)
            }
            ResponseStatus::Timeout => Err(self.abort(TransferError::CommunicationTimeout {
                during: Phase::SendChunk,
            })),
            status @ (ResponseStatus::VerificationRunning | ResponseStatus::Unexpected(_)) => {
                Err(self.abort(TransferError::UnexpectedStatus(status.code())))
            }
        }
    }

    fn verify<S: Session + ?Sized>(&mut self, session: &mut S) -> Result<Step> {
        let status = self.exchange(session, &Request::Verify)?;
        self.metrics.verify_polls += 1;

        match status {
            ResponseStatus::Accepted => {
                self.state.phase = Phase::Done;
                self.state.progress = 100;
                self.metrics.progress = 100;
                self.metrics.complete();
                info!(
                    "lookup table download verified in {} ms",
                    self.metrics.duration().as_millis()
                );
                Ok(Step::Done)
            }
            ResponseStatus::Busy | ResponseStatus::VerificationRunning => {
                debug!("verification pending ({:?})", status);
                Ok(Step::Verifying)
            }
            ResponseStatus::Timeout => Err(self.abort(TransferError::CommunicationTimeout {
                during: Phase::Verify,
            })),
            ResponseStatus::Unexpected(code) => Err(self.abort(TransferError::UnexpectedStatus(code))),
        }
    }

    fn exchange<S: Session + ?Sized>(&mut self, session: &mut S, request: &Request) -> Result<ResponseStatus> {
        match session.exchange(request) {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!("session failed during {}: {}", self.state.phase, e);
                self.reset_failed();
                Err(e)
            }
        }
    }

    fn capped_progress(&self) -> u8 {
        if self.state.total_bytes_planned == 0 {
            return 0;
        }
        let percent = 100 * self.state.total_bytes_sent / self.state.total_bytes_planned;
        percent.min(PROGRESS_CAP as u64) as u8
    }

    /// Abandon the operation with `error`.
    fn abort(&mut self, error: TransferError) -> Error {
        warn!("lookup table download aborted during {}: {}", self.state.phase, error);
        self.reset_failed();
        error.into()
    }

    fn reset_failed(&mut self) {
        self.state.phase = Phase::Failed;
        self.state.current_instance = None;
        self.state.byte_offset = 0;
    }
}

/// Download `frames` to completion.
///
/// `on_progress` is called each time the reported progress changes, ending
/// with 100 on success. Busy and still-verifying replies are retried after
/// `options.busy_delay`, at most `options.max_busy_retries` times in a row.
///
/// # Errors
/// As [`Transfer::step`], plus `TransferError::DeviceBusy` when the retry
/// budget runs out.
pub fn run_transfer<S, F>(
    frames: FrameSet,
    session: &mut S,
    options: &TransferOptions,
    mut on_progress: F,
) -> Result<TransferMetrics>
where
    S: Session + ?Sized,
    F: FnMut(u8),
{
    let mut transfer = Transfer::new(frames);
    let mut last_progress = 0u8;
    let mut busy_streak = 0u32;

    loop {
        match transfer.step(session)? {
            Step::Progress(progress) => {
                busy_streak = 0;
                if progress != last_progress {
                    last_progress = progress;
                    on_progress(progress);
                }
            }
            Step::Busy | Step::Verifying => {
                busy_streak += 1;
                if let Some(max) = options.max_busy_retries {
                    if busy_streak > max {
                        return Err(transfer.abort(TransferError::DeviceBusy { retries: max }));
                    }
                }
                if !options.busy_delay.is_zero() {
                    std::thread::sleep(options.busy_delay);
                }
            }
            Step::Done => {
                on_progress(100);
                return Ok(transfer.into_metrics());
            }
        }
    }
}
