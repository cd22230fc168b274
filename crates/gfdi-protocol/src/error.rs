//! Protocol error types.

use thiserror::Error;

use crate::types::{ProtobufStatusCode, TransferResponse};

/// Errors raised while validating the framing of one inbound buffer.
///
/// None of these can be answered: the type code of a bad frame is not
/// trustworthy, so the buffer is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length does not match the number of bytes received.
    #[error("frame length mismatch: declared {declared:?}, received {actual} bytes")]
    LengthMismatch {
        /// Declared total length, if the buffer was long enough to hold it.
        declared: Option<u16>,
        /// Bytes actually received.
        actual: usize,
    },

    /// Frame is consistent but too short to hold a type code and checksum.
    #[error("frame too short: {actual} bytes")]
    TooShort {
        /// Bytes actually received.
        actual: usize,
    },

    /// Trailing checksum does not match the computed one.
    #[error("frame checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch {
        /// Checksum computed over the frame.
        expected: u16,
        /// Checksum carried in the frame.
        actual: u16,
    },
}

/// Errors raised while decoding the payload of a known message type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A read ran past the end of the payload.
    #[error("payload truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// A coded field carried a value this implementation does not know.
    #[error("unknown {field} code: {code}")]
    UnknownCode {
        /// Name of the field.
        field: &'static str,
        /// Code received.
        code: u32,
    },

    /// Any other malformed payload.
    #[error("invalid payload: {0}")]
    Invalid(String),
}

impl DecodeError {
    /// Create an unknown-code error.
    pub fn unknown(field: &'static str, code: impl Into<u32>) -> Self {
        DecodeError::UnknownCode {
            field,
            code: code.into(),
        }
    }
}

/// Errors raised while building an outbound message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A length-prefixed string exceeds 255 bytes.
    #[error("string too long: {len} bytes (max 255)")]
    StringTooLong {
        /// Length in bytes.
        len: usize,
    },

    /// A settings push with no entries.
    #[error("settings push has no entries")]
    EmptySettings,

    /// A counted list exceeds what its one-byte count can express.
    #[error("too many entries: {count} (max {max})")]
    TooManyEntries {
        /// Entries supplied.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A setting string whose length collides with the boolean or integer tag.
    #[error("setting string of {len} bytes would be read back as a non-string value")]
    AmbiguousSettingString {
        /// Length in bytes.
        len: usize,
    },

    /// Encoded frame exceeds the session's maximum packet size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Frame size in bytes.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// A field value does not fit its wire width.
    #[error("value out of range for {field}: {value}")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// Value supplied.
        value: u64,
    },
}

/// Errors surfaced by a file transfer session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The peer refused the request.
    #[error("transfer rejected by peer: {0}")]
    Rejected(String),

    /// The peer answered a chunk with ABORT, or the transfer was cancelled.
    #[error("transfer aborted: {0}")]
    Aborted(String),

    /// Too many consecutive resend/mismatch cycles.
    #[error("transfer aborted after {retries} consecutive retries (last response {last:?})")]
    RetriesExhausted {
        /// Retries performed.
        retries: u32,
        /// Last response seen.
        last: TransferResponse,
    },

    /// A message arrived that the session cannot accept in its current state.
    #[error("unexpected message in state {state}: {message}")]
    InvalidState {
        /// State name.
        state: &'static str,
        /// What arrived.
        message: String,
    },

    /// Building the next outbound message failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Errors surfaced while reassembling an oversized structured payload.
///
/// Each variant maps onto one non-success status code sent back to the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    /// No reassembly is tracked under this request id.
    #[error("unknown request id {0}")]
    UnknownRequestId(u16),

    /// The chunk overlaps bytes already received.
    #[error("duplicate chunk for request {request_id} at offset {offset}")]
    DuplicatePacket {
        /// Request id.
        request_id: u16,
        /// Offset of the duplicate chunk.
        offset: u32,
    },

    /// Completion was requested while bytes are still missing.
    #[error("request {request_id} is missing {missing} bytes")]
    MissingPacket {
        /// Request id.
        request_id: u16,
        /// Bytes not yet received.
        missing: u32,
    },

    /// The chunk runs past the declared total length, or the total is too large.
    #[error("request {request_id} exceeds total length {total_length}")]
    ExceededTotalLength {
        /// Request id.
        request_id: u16,
        /// Declared total length.
        total_length: u32,
    },

    /// The assembled payload failed to parse.
    #[error("request {request_id} payload failed to parse: {reason}")]
    ParseError {
        /// Request id.
        request_id: u16,
        /// Parser message.
        reason: String,
    },
}

impl ReassemblyError {
    /// Status code reported to the peer for this error.
    pub fn status_code(&self) -> ProtobufStatusCode {
        match self {
            ReassemblyError::UnknownRequestId(_) => ProtobufStatusCode::UnknownRequestId,
            ReassemblyError::DuplicatePacket { .. } => ProtobufStatusCode::DuplicatePacket,
            ReassemblyError::MissingPacket { .. } => ProtobufStatusCode::MissingPacket,
            ReassemblyError::ExceededTotalLength { .. } => {
                ProtobufStatusCode::ExceededTotalProtobufLength
            }
            ReassemblyError::ParseError { .. } => ProtobufStatusCode::ProtobufParseError,
        }
    }
}

/// Errors raised while validating a [`crate::ProtocolConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value the protocol cannot work with.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
