//! Multi-frame credential transfer over bus identifier 1.
//!
//! A transfer opens with a Start message declaring both field lengths and
//! chunk counts, carries up to six bytes per chunk addressed by index, and
//! closes with an End message holding the XOR of every credential byte.
//! [`ProvisioningSession`] owns the single in-flight transfer and discards it
//! when no message arrives for the configured idle timeout.
//!
//! [`ProvisioningEncoder`] produces the matching frame stream for a sender.

use core::fmt;
use core::time::Duration;

use crate::config::PROVISIONING_TIMEOUT;
use crate::credentials::{Credentials, MAX_PASSWORD_LEN, MAX_SSID_LEN, xor_checksum};
use crate::frame::{BusFrame, MAX_DATA_LEN};
use crate::telemetry::TelemetryInstant;

/// Bus identifier carrying provisioning messages.
pub const PROVISIONING_FRAME_ID: u32 = 1;
/// Credential bytes carried by one chunk message.
pub const CHUNK_PAYLOAD_LEN: usize = 6;
/// Reassembly buffer sizes (field maximum plus one spare byte).
pub const SSID_BUFFER_LEN: usize = MAX_SSID_LEN + 1;
pub const PASSWORD_BUFFER_LEN: usize = MAX_PASSWORD_LEN + 1;

const START_LEN: usize = 5;
const CHUNK_HEADER_LEN: usize = 2;

/// Message type carried in the first payload byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageType {
    Start,
    SsidChunk,
    PasswordChunk,
    End,
}

impl MessageType {
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            MessageType::Start => 1,
            MessageType::SsidChunk => 2,
            MessageType::PasswordChunk => 3,
            MessageType::End => 4,
        }
    }

    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(MessageType::Start),
            2 => Some(MessageType::SsidChunk),
            3 => Some(MessageType::PasswordChunk),
            4 => Some(MessageType::End),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::Start => "start",
            MessageType::SsidChunk => "ssid-chunk",
            MessageType::PasswordChunk => "password-chunk",
            MessageType::End => "end",
        })
    }
}

/// Credential field addressed by a chunk.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Ssid,
    Password,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Ssid => "ssid",
            Field::Password => "password",
        })
    }
}

/// Why an active transfer was discarded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AbortReason {
    MissingChunks,
    ChecksumMismatch,
    MissingChecksum,
    TimedOut,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbortReason::MissingChunks => "missing-chunks",
            AbortReason::ChecksumMismatch => "checksum-mismatch",
            AbortReason::MissingChecksum => "missing-checksum",
            AbortReason::TimedOut => "timed-out",
        })
    }
}

/// Rejected or failed provisioning messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProvisioningError {
    /// Payload had no message type byte.
    EmptyPayload,
    UnknownMessageType(u8),
    /// Message shorter than its fixed header.
    Truncated(MessageType),
    /// Start declared a field longer than the module accepts.
    LengthOutOfRange { ssid_len: u8, password_len: u8 },
    /// Chunk or End arrived with no transfer in progress.
    NoActiveSession(MessageType),
    ChunkIndexOutOfRange { field: Field, index: u8, chunks: u8 },
    /// End arrived before every declared chunk; the transfer was discarded.
    MissingChunks {
        ssid_received: u8,
        ssid_chunks: u8,
        password_received: u8,
        password_chunks: u8,
    },
    /// Checksum did not match the reassembled bytes; the transfer was discarded.
    ChecksumMismatch { expected: u8, computed: u8 },
    /// End carried no checksum byte; the transfer was discarded.
    MissingChecksum,
}

impl ProvisioningError {
    /// Returns the abort reason when the error also discarded the transfer.
    #[must_use]
    pub const fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            ProvisioningError::MissingChunks { .. } => Some(AbortReason::MissingChunks),
            ProvisioningError::ChecksumMismatch { .. } => Some(AbortReason::ChecksumMismatch),
            ProvisioningError::MissingChecksum => Some(AbortReason::MissingChecksum),
            _ => None,
        }
    }
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningError::EmptyPayload => f.write_str("empty payload"),
            ProvisioningError::UnknownMessageType(raw) => {
                write!(f, "unknown message type {raw:#04x}")
            }
            ProvisioningError::Truncated(kind) => write!(f, "truncated {kind} message"),
            ProvisioningError::LengthOutOfRange {
                ssid_len,
                password_len,
            } => write!(
                f,
                "declared lengths out of range (ssid={ssid_len}, password={password_len})"
            ),
            ProvisioningError::NoActiveSession(kind) => {
                write!(f, "{kind} without start message")
            }
            ProvisioningError::ChunkIndexOutOfRange {
                field,
                index,
                chunks,
            } => write!(f, "{field} chunk index {index} outside 0..{chunks}"),
            ProvisioningError::MissingChunks {
                ssid_received,
                ssid_chunks,
                password_received,
                password_chunks,
            } => write!(
                f,
                "missing chunks (ssid {ssid_received}/{ssid_chunks}, password {password_received}/{password_chunks})"
            ),
            ProvisioningError::ChecksumMismatch { expected, computed } => write!(
                f,
                "checksum mismatch (expected {expected:#04x}, computed {computed:#04x})"
            ),
            ProvisioningError::MissingChecksum => f.write_str("end message without checksum"),
        }
    }
}

/// Successful transitions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisioningUpdate {
    Started(TransferHeader),
    ChunkAccepted { field: Field, index: u8 },
    Committed(Credentials),
}

/// Lengths and chunk counts announced by a Start message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferHeader {
    pub ssid_len: u8,
    pub password_len: u8,
    pub ssid_chunks: u8,
    pub password_chunks: u8,
}

impl TransferHeader {
    fn parse(payload: &[u8]) -> Result<Self, ProvisioningError> {
        let &[_, ssid_len, password_len, ssid_chunks, password_chunks, ..] = payload else {
            return Err(ProvisioningError::Truncated(MessageType::Start));
        };
        if usize::from(ssid_len) > MAX_SSID_LEN || usize::from(password_len) > MAX_PASSWORD_LEN {
            return Err(ProvisioningError::LengthOutOfRange {
                ssid_len,
                password_len,
            });
        }
        Ok(Self {
            ssid_len,
            password_len,
            ssid_chunks,
            password_chunks,
        })
    }

    const fn chunks(&self, field: Field) -> u8 {
        match field {
            Field::Ssid => self.ssid_chunks,
            Field::Password => self.password_chunks,
        }
    }
}

/// Fixed-size reassembly buffer with bounds-checked chunk writes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CredentialBuffer<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> CredentialBuffer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: [0; N] }
    }

    /// Copies `chunk` to `index * 6`, dropping bytes at or past `declared_len`.
    pub fn write_chunk(&mut self, index: u8, chunk: &[u8], declared_len: usize) {
        let offset = usize::from(index) * CHUNK_PAYLOAD_LEN;
        let limit = declared_len.min(N);
        for (position, byte) in (offset..limit).zip(chunk.iter().take(CHUNK_PAYLOAD_LEN)) {
            self.bytes[position] = *byte;
        }
    }

    /// The first `len` bytes.
    #[must_use]
    pub fn prefix(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(N)]
    }
}

impl<const N: usize> Default for CredentialBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct Transfer<TInstant> {
    header: TransferHeader,
    ssid_received: u8,
    password_received: u8,
    ssid: CredentialBuffer<SSID_BUFFER_LEN>,
    password: CredentialBuffer<PASSWORD_BUFFER_LEN>,
    last_activity: TInstant,
}

impl<TInstant> Transfer<TInstant> {
    fn new(header: TransferHeader, now: TInstant) -> Self {
        Self {
            header,
            ssid_received: 0,
            password_received: 0,
            ssid: CredentialBuffer::new(),
            password: CredentialBuffer::new(),
            last_activity: now,
        }
    }

    fn ssid(&self) -> &[u8] {
        self.ssid.prefix(usize::from(self.header.ssid_len))
    }

    fn password(&self) -> &[u8] {
        self.password.prefix(usize::from(self.header.password_len))
    }

    fn complete(&self) -> bool {
        self.ssid_received == self.header.ssid_chunks
            && self.password_received == self.header.password_chunks
    }
}

/// Read-only view of the transfer in progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferProgress {
    pub header: TransferHeader,
    pub ssid_received: u8,
    pub password_received: u8,
}

/// Reassembly state machine for the single provisioning slot.
#[derive(Clone, Debug)]
pub struct ProvisioningSession<TInstant> {
    transfer: Option<Transfer<TInstant>>,
    timeout: Duration,
}

impl<TInstant> ProvisioningSession<TInstant>
where
    TInstant: TelemetryInstant,
{
    /// Creates an idle session with the default 5 s idle timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_timeout(PROVISIONING_TIMEOUT)
    }

    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            transfer: None,
            timeout,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.transfer.is_some()
    }

    #[must_use]
    pub fn progress(&self) -> Option<TransferProgress> {
        self.transfer.as_ref().map(|transfer| TransferProgress {
            header: transfer.header,
            ssid_received: transfer.ssid_received,
            password_received: transfer.password_received,
        })
    }

    /// Applies one provisioning payload received at `now`.
    pub fn on_frame(
        &mut self,
        payload: &[u8],
        now: TInstant,
    ) -> Result<ProvisioningUpdate, ProvisioningError> {
        let (&raw, _) = payload
            .split_first()
            .ok_or(ProvisioningError::EmptyPayload)?;
        let kind = MessageType::from_raw(raw).ok_or(ProvisioningError::UnknownMessageType(raw))?;

        match kind {
            MessageType::Start => self.start(payload, now),
            MessageType::SsidChunk => self.chunk(Field::Ssid, payload, now),
            MessageType::PasswordChunk => self.chunk(Field::Password, payload, now),
            MessageType::End => self.end(payload),
        }
    }

    /// Discards the transfer when it has been idle for longer than the timeout.
    pub fn sweep(&mut self, now: TInstant) -> Option<AbortReason> {
        let expired = self.transfer.as_ref().is_some_and(|transfer| {
            now.saturating_duration_since(transfer.last_activity) > self.timeout
        });
        if expired {
            self.transfer = None;
            Some(AbortReason::TimedOut)
        } else {
            None
        }
    }

    fn start(
        &mut self,
        payload: &[u8],
        now: TInstant,
    ) -> Result<ProvisioningUpdate, ProvisioningError> {
        let header = TransferHeader::parse(payload)?;
        self.transfer = Some(Transfer::new(header, now));
        Ok(ProvisioningUpdate::Started(header))
    }

    fn chunk(
        &mut self,
        field: Field,
        payload: &[u8],
        now: TInstant,
    ) -> Result<ProvisioningUpdate, ProvisioningError> {
        let kind = match field {
            Field::Ssid => MessageType::SsidChunk,
            Field::Password => MessageType::PasswordChunk,
        };
        let transfer = self
            .transfer
            .as_mut()
            .ok_or(ProvisioningError::NoActiveSession(kind))?;
        let index = *payload
            .get(1)
            .ok_or(ProvisioningError::Truncated(kind))?;

        let chunks = transfer.header.chunks(field);
        if index >= chunks {
            return Err(ProvisioningError::ChunkIndexOutOfRange {
                field,
                index,
                chunks,
            });
        }

        let end = payload.len().min(MAX_DATA_LEN);
        let data = &payload[CHUNK_HEADER_LEN.min(end)..end];
        match field {
            Field::Ssid => {
                let declared = usize::from(transfer.header.ssid_len);
                transfer.ssid.write_chunk(index, data, declared);
                transfer.ssid_received = transfer.ssid_received.saturating_add(1);
            }
            Field::Password => {
                let declared = usize::from(transfer.header.password_len);
                transfer.password.write_chunk(index, data, declared);
                transfer.password_received = transfer.password_received.saturating_add(1);
            }
        }
        transfer.last_activity = now;

        Ok(ProvisioningUpdate::ChunkAccepted { field, index })
    }

    fn end(&mut self, payload: &[u8]) -> Result<ProvisioningUpdate, ProvisioningError> {
        let transfer = self
            .transfer
            .take()
            .ok_or(ProvisioningError::NoActiveSession(MessageType::End))?;

        if !transfer.complete() {
            return Err(ProvisioningError::MissingChunks {
                ssid_received: transfer.ssid_received,
                ssid_chunks: transfer.header.ssid_chunks,
                password_received: transfer.password_received,
                password_chunks: transfer.header.password_chunks,
            });
        }

        let expected = *payload.get(1).ok_or(ProvisioningError::MissingChecksum)?;
        let computed = xor_checksum(xor_checksum(0, transfer.ssid()), transfer.password());
        if computed != expected {
            return Err(ProvisioningError::ChecksumMismatch { expected, computed });
        }

        let credentials = Credentials::new(transfer.ssid(), transfer.password()).map_err(|_| {
            ProvisioningError::LengthOutOfRange {
                ssid_len: transfer.header.ssid_len,
                password_len: transfer.header.password_len,
            }
        })?;
        Ok(ProvisioningUpdate::Committed(credentials))
    }
}

impl<TInstant> Default for ProvisioningSession<TInstant>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Number of chunk messages needed for `len` bytes.
#[must_use]
pub const fn chunk_count(len: usize) -> usize {
    len.div_ceil(CHUNK_PAYLOAD_LEN)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum EncoderStage {
    Start,
    Chunk(Field, usize),
    End,
    Done,
}

/// Sender-side generator for the provisioning frame stream.
#[derive(Clone, Debug)]
pub struct ProvisioningEncoder<'a> {
    credentials: &'a Credentials,
    stage: EncoderStage,
}

impl<'a> ProvisioningEncoder<'a> {
    #[must_use]
    pub const fn new(credentials: &'a Credentials) -> Self {
        Self {
            credentials,
            stage: EncoderStage::Start,
        }
    }

    fn field_bytes(&self, field: Field) -> &'a [u8] {
        match field {
            Field::Ssid => self.credentials.ssid_bytes(),
            Field::Password => self.credentials.password_bytes(),
        }
    }

    fn after_chunk(&self, field: Field, index: usize) -> EncoderStage {
        let next = index + 1;
        match field {
            _ if next < chunk_count(self.field_bytes(field).len()) => {
                EncoderStage::Chunk(field, next)
            }
            Field::Ssid => self.first_chunk(Field::Password),
            Field::Password => EncoderStage::End,
        }
    }

    fn first_chunk(&self, field: Field) -> EncoderStage {
        match field {
            _ if !self.field_bytes(field).is_empty() => EncoderStage::Chunk(field, 0),
            Field::Ssid => self.first_chunk(Field::Password),
            Field::Password => EncoderStage::End,
        }
    }
}

impl Iterator for ProvisioningEncoder<'_> {
    type Item = BusFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let mut data = [0u8; MAX_DATA_LEN];
        let (frame, next) = match self.stage {
            EncoderStage::Start => {
                let ssid_len = self.credentials.ssid_bytes().len();
                let password_len = self.credentials.password_bytes().len();
                data[0] = MessageType::Start.to_raw();
                data[1] = saturating_u8(ssid_len);
                data[2] = saturating_u8(password_len);
                data[3] = saturating_u8(chunk_count(ssid_len));
                data[4] = saturating_u8(chunk_count(password_len));
                (
                    BusFrame::from_array(PROVISIONING_FRAME_ID, data, START_LEN),
                    self.first_chunk(Field::Ssid),
                )
            }
            EncoderStage::Chunk(field, index) => {
                let bytes = self.field_bytes(field);
                let offset = index * CHUNK_PAYLOAD_LEN;
                let end = (offset + CHUNK_PAYLOAD_LEN).min(bytes.len());
                let chunk = &bytes[offset..end];
                data[0] = match field {
                    Field::Ssid => MessageType::SsidChunk.to_raw(),
                    Field::Password => MessageType::PasswordChunk.to_raw(),
                };
                data[1] = saturating_u8(index);
                data[CHUNK_HEADER_LEN..CHUNK_HEADER_LEN + chunk.len()].copy_from_slice(chunk);
                (
                    BusFrame::from_array(
                        PROVISIONING_FRAME_ID,
                        data,
                        CHUNK_HEADER_LEN + chunk.len(),
                    ),
                    self.after_chunk(field, index),
                )
            }
            EncoderStage::End => {
                data[0] = MessageType::End.to_raw();
                data[1] = self.credentials.checksum();
                (
                    BusFrame::from_array(PROVISIONING_FRAME_ID, data, 2),
                    EncoderStage::Done,
                )
            }
            EncoderStage::Done => return None,
        };
        self.stage = next;
        Some(frame)
    }
}

fn saturating_u8(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    struct MillisInstant(u64);

    impl TelemetryInstant for MillisInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(earlier.0))
        }
    }

    fn at(ms: u64) -> MillisInstant {
        MillisInstant(ms)
    }

    #[test]
    fn buffer_drops_bytes_past_declared_length() {
        let mut buffer = CredentialBuffer::<SSID_BUFFER_LEN>::new();
        buffer.write_chunk(1, b"ABCDEF", 9);
        assert_eq!(buffer.prefix(9), b"\0\0\0\0\0\0ABC");
    }

    #[test]
    fn buffer_ignores_indices_beyond_capacity() {
        let mut buffer = CredentialBuffer::<8>::new();
        buffer.write_chunk(200, b"ABCDEF", 8);
        assert_eq!(buffer.prefix(8), &[0; 8]);
    }

    #[test]
    fn start_rejects_oversized_lengths_without_touching_session() {
        let mut session = ProvisioningSession::new();
        session
            .on_frame(&[1, 4, 4, 1, 1], at(0))
            .expect("start accepted");
        assert_eq!(
            session.on_frame(&[1, 33, 4, 6, 1], at(1)),
            Err(ProvisioningError::LengthOutOfRange {
                ssid_len: 33,
                password_len: 4,
            })
        );
        let progress = session.progress().expect("session still active");
        assert_eq!(progress.header.ssid_len, 4);
    }

    #[test]
    fn truncated_start_is_rejected() {
        let mut session = ProvisioningSession::<MillisInstant>::new();
        assert_eq!(
            session.on_frame(&[1, 4, 4], at(0)),
            Err(ProvisioningError::Truncated(MessageType::Start))
        );
        assert!(!session.is_active());
    }

    #[test]
    fn chunk_without_start_is_a_protocol_violation() {
        let mut session = ProvisioningSession::<MillisInstant>::new();
        assert_eq!(
            session.on_frame(&[2, 0, b'a'], at(0)),
            Err(ProvisioningError::NoActiveSession(MessageType::SsidChunk))
        );
        assert_eq!(
            session.on_frame(&[4, 0], at(0)),
            Err(ProvisioningError::NoActiveSession(MessageType::End))
        );
    }

    #[test]
    fn unknown_type_leaves_session_alone() {
        let mut session = ProvisioningSession::new();
        session
            .on_frame(&[1, 1, 1, 1, 1], at(0))
            .expect("start accepted");
        assert_eq!(
            session.on_frame(&[7, 0], at(1)),
            Err(ProvisioningError::UnknownMessageType(7))
        );
        assert!(session.is_active());
    }

    #[test]
    fn end_without_checksum_aborts() {
        let mut session = ProvisioningSession::new();
        session
            .on_frame(&[1, 0, 0, 0, 0], at(0))
            .expect("start accepted");
        let err = session.on_frame(&[4], at(1)).expect_err("must abort");
        assert_eq!(err.abort_reason(), Some(AbortReason::MissingChecksum));
        assert!(!session.is_active());
    }

    #[test]
    fn timeout_is_strictly_greater_than_window() {
        let mut session = ProvisioningSession::new();
        session
            .on_frame(&[1, 1, 1, 1, 1], at(1_000))
            .expect("start accepted");
        assert_eq!(session.sweep(at(6_000)), None);
        assert_eq!(session.sweep(at(6_001)), Some(AbortReason::TimedOut));
        assert!(!session.is_active());
        assert_eq!(session.sweep(at(20_000)), None);
    }

    #[test]
    fn encoder_emits_start_chunks_and_end() {
        let credentials = Credentials::new(b"HelloWorld1", b"Secret01").expect("valid");
        let frames: Vec<BusFrame, 8> = ProvisioningEncoder::new(&credentials).collect();

        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0].payload(), &[1, 11, 8, 2, 2]);
        assert_eq!(frames[1].payload(), b"\x02\x00HelloW");
        assert_eq!(frames[2].payload(), b"\x02\x01orld1");
        assert_eq!(frames[3].payload(), b"\x03\x00Secret");
        assert_eq!(frames[4].payload(), b"\x03\x0101");
        assert_eq!(frames[5].payload(), &[4, credentials.checksum()]);
        assert!(frames.iter().all(|frame| frame.id() == PROVISIONING_FRAME_ID));
    }

    #[test]
    fn encoder_skips_empty_fields() {
        let credentials = Credentials::new(b"open", b"").expect("valid");
        let frames: Vec<BusFrame, 8> = ProvisioningEncoder::new(&credentials).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), &[1, 4, 0, 1, 0]);
        assert_eq!(frames[2].payload()[0], 4);
    }
}
