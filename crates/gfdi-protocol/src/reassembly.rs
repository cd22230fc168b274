//! Oversized structured payloads.
//!
//! A payload too large for one frame travels as PROTOBUF_REQUEST/RESPONSE
//! chunks tagged with a request id, an offset and the total length. Inbound
//! chunks are collected in a [`ReassemblyBuffer`]; outbound payloads are split
//! by a [`PayloadChunker`], which sends the next chunk each time the peer
//! reports the previous one kept. The payload format itself is opaque here and
//! checked by a [`PayloadDecoder`] once complete.

use std::collections::HashMap;
use std::fmt;

use log::{debug, info, warn};

use crate::constants::*;
use crate::error::ReassemblyError;
use crate::messages::{Message, ProtobufChunk};
use crate::responses::{Response, ResponseBody};
use crate::types::{ProtobufChunkStatus, ProtobufStatusCode};

/// Validates a reassembled payload before it is handed on.
pub trait PayloadDecoder: fmt::Debug + Send {
    /// Check that `payload` parses; the error text is logged.
    fn validate(&self, request_id: u16, payload: &[u8]) -> Result<(), String>;
}

/// Accepts every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaquePayload;

impl PayloadDecoder for OpaquePayload {
    fn validate(&self, _request_id: u16, _payload: &[u8]) -> Result<(), String> {
        Ok(())
    }
}

/// Result of accepting one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    /// More chunks expected.
    Pending,
    /// Every byte received.
    Complete(Vec<u8>),
}

#[derive(Debug)]
struct ReassemblyState {
    total_length: u32,
    /// Received `(start, end)` ranges, sorted and non-overlapping.
    ranges: Vec<(u32, u32)>,
    received: u32,
    buffer: Vec<u8>,
    created: u64,
}

impl ReassemblyState {
    fn overlaps(&self, start: u32, end: u32) -> bool {
        self.ranges.iter().any(|&(s, e)| s < end && start < e)
    }

    fn insert(&mut self, start: u32, data: &[u8]) {
        let end = start + data.len() as u32;
        self.buffer[start as usize..end as usize].copy_from_slice(data);
        let index = self.ranges.partition_point(|&(s, _)| s < start);
        self.ranges.insert(index, (start, end));
        self.received += data.len() as u32;
    }
}

/// Inbound reassembly keyed by request id.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    entries: HashMap<u16, ReassemblyState>,
    max_entries: usize,
    max_total_length: u32,
    created: u64,
}

impl ReassemblyBuffer {
    /// Create a buffer tracking at most `max_entries` payloads of at most
    /// `max_total_length` bytes each.
    pub fn new(max_entries: usize, max_total_length: u32) -> Self {
        ReassemblyBuffer {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            max_total_length,
            created: 0,
        }
    }

    /// Number of incomplete payloads tracked.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Whether a payload is being reassembled under `request_id`.
    pub fn contains(&self, request_id: u16) -> bool {
        self.entries.contains_key(&request_id)
    }

    /// Accept one chunk.
    ///
    /// A chunk that carries the whole payload completes at once. Otherwise the
    /// first chunk for a request id opens its state, at any offset.
    pub fn accept(&mut self, chunk: &ProtobufChunk) -> Result<Reassembly, ReassemblyError> {
        let request_id = chunk.request_id;
        let exceeded = ReassemblyError::ExceededTotalLength {
            request_id,
            total_length: chunk.total_length,
        };
        if chunk.total_length > self.max_total_length {
            return Err(exceeded);
        }
        let end = chunk.data_offset as u64 + chunk.data.len() as u64;
        if end > chunk.total_length as u64 {
            return Err(exceeded);
        }

        if chunk.is_complete() && !self.entries.contains_key(&request_id) {
            debug!("request {} arrived in one chunk", request_id);
            return Ok(Reassembly::Complete(chunk.data.clone()));
        }
        if chunk.data.is_empty() {
            return Err(ReassemblyError::DuplicatePacket {
                request_id,
                offset: chunk.data_offset,
            });
        }

        if !self.entries.contains_key(&request_id) {
            self.evict_if_full();
            self.created += 1;
            self.entries.insert(
                request_id,
                ReassemblyState {
                    total_length: chunk.total_length,
                    ranges: Vec::new(),
                    received: 0,
                    buffer: vec![0; chunk.total_length as usize],
                    created: self.created,
                },
            );
        }
        let Some(state) = self.entries.get_mut(&request_id) else {
            return Err(ReassemblyError::UnknownRequestId(request_id));
        };

        if state.total_length != chunk.total_length {
            warn!(
                "request {} changed total length from {} to {}",
                request_id, state.total_length, chunk.total_length
            );
            return Err(ReassemblyError::UnknownRequestId(request_id));
        }
        let end = end as u32;
        if state.overlaps(chunk.data_offset, end) {
            return Err(ReassemblyError::DuplicatePacket {
                request_id,
                offset: chunk.data_offset,
            });
        }

        state.insert(chunk.data_offset, &chunk.data);
        debug!(
            "request {}: {}/{} bytes",
            request_id, state.received, state.total_length
        );
        if state.received == state.total_length {
            let buffer = self
                .entries
                .remove(&request_id)
                .map(|state| state.buffer)
                .unwrap_or_default();
            info!("request {} reassembled ({} bytes)", request_id, buffer.len());
            return Ok(Reassembly::Complete(buffer));
        }
        Ok(Reassembly::Pending)
    }

    /// Accept one chunk and validate the payload if it completes.
    pub fn accept_validated(
        &mut self,
        chunk: &ProtobufChunk,
        decoder: &dyn PayloadDecoder,
    ) -> Result<Reassembly, ReassemblyError> {
        match self.accept(chunk)? {
            Reassembly::Complete(payload) => {
                decoder
                    .validate(chunk.request_id, &payload)
                    .map_err(|reason| ReassemblyError::ParseError {
                        request_id: chunk.request_id,
                        reason,
                    })?;
                Ok(Reassembly::Complete(payload))
            }
            Reassembly::Pending => Ok(Reassembly::Pending),
        }
    }

    /// Demand the completed payload of `request_id`.
    ///
    /// Fails with `MissingPacket` while bytes are outstanding.
    pub fn finish(&mut self, request_id: u16) -> Result<Vec<u8>, ReassemblyError> {
        let Some(state) = self.entries.get(&request_id) else {
            return Err(ReassemblyError::UnknownRequestId(request_id));
        };
        if state.received < state.total_length {
            return Err(ReassemblyError::MissingPacket {
                request_id,
                missing: state.total_length - state.received,
            });
        }
        Ok(self
            .entries
            .remove(&request_id)
            .map(|state| state.buffer)
            .unwrap_or_default())
    }

    /// Drop the state of `request_id`. Returns whether any existed.
    pub fn abort(&mut self, request_id: u16) -> bool {
        self.entries.remove(&request_id).is_some()
    }

    /// Drop every tracked payload.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_if_full(&mut self) {
        while self.entries.len() >= self.max_entries {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, state)| state.created)
                .map(|(id, _)| *id)
            else {
                return;
            };
            warn!("evicting incomplete request {}", oldest);
            self.entries.remove(&oldest);
        }
    }
}

/// RESPONSE answering one inbound chunk.
pub fn chunk_status(
    request_type: u16,
    chunk: &ProtobufChunk,
    result: &Result<Reassembly, ReassemblyError>,
) -> Response {
    let (chunk_status, status_code) = match result {
        Ok(_) => (ProtobufChunkStatus::Kept, ProtobufStatusCode::NoError),
        Err(error) => (ProtobufChunkStatus::Discarded, error.status_code()),
    };
    Response::ack_with(
        request_type,
        ResponseBody::Protobuf {
            request_id: chunk.request_id,
            data_offset: chunk.data_offset,
            chunk_status,
            status_code,
        },
    )
}

/// Which half of the envelope an outbound payload travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// PROTOBUF_REQUEST.
    Request,
    /// PROTOBUF_RESPONSE.
    Response,
}

impl PayloadKind {
    fn wrap(self, chunk: ProtobufChunk) -> Message {
        match self {
            PayloadKind::Request => Message::ProtobufRequest(chunk),
            PayloadKind::Response => Message::ProtobufResponse(chunk),
        }
    }

    /// Type code of the envelope.
    pub fn type_code(self) -> u16 {
        match self {
            PayloadKind::Request => MESSAGE_PROTOBUF_REQUEST,
            PayloadKind::Response => MESSAGE_PROTOBUF_RESPONSE,
        }
    }
}

#[derive(Debug)]
struct OutboundPayload {
    kind: PayloadKind,
    chunk_size: usize,
    data: Vec<u8>,
}

/// Splits outbound payloads into chunks.
#[derive(Debug)]
pub struct PayloadChunker {
    last_request_id: u16,
    chunk_size: usize,
    pending: HashMap<u16, OutboundPayload>,
}

impl PayloadChunker {
    /// Create a chunker with the given chunk size.
    pub fn new(chunk_size: usize) -> Self {
        PayloadChunker {
            last_request_id: 0,
            chunk_size: chunk_size.max(1),
            pending: HashMap::new(),
        }
    }

    /// Change the chunk size for payloads started from now on.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    /// Allocate the next request id, wrapping at 65536.
    pub fn next_request_id(&mut self) -> u16 {
        self.last_request_id = self.last_request_id.wrapping_add(1);
        self.last_request_id
    }

    /// Payloads waiting for acknowledgement of a further chunk.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Start sending `data` under a fresh request id; yields the first chunk.
    pub fn start(&mut self, kind: PayloadKind, data: Vec<u8>) -> Message {
        let request_id = self.next_request_id();
        self.start_with_id(kind, request_id, data)
    }

    /// Start sending `data` under `request_id`, e.g. to answer a request.
    pub fn start_with_id(&mut self, kind: PayloadKind, request_id: u16, data: Vec<u8>) -> Message {
        let total_length = data.len() as u32;
        let first = data[..data.len().min(self.chunk_size)].to_vec();
        if data.len() > self.chunk_size {
            let chunk_size = self.chunk_size;
            self.pending.insert(
                request_id,
                OutboundPayload {
                    kind,
                    chunk_size,
                    data,
                },
            );
        }
        kind.wrap(ProtobufChunk {
            request_id,
            data_offset: 0,
            total_length,
            data: first,
        })
    }

    /// React to the peer's status for one of our chunks.
    ///
    /// Yields the next chunk when the peer kept the previous one. A discarded
    /// chunk abandons the payload.
    pub fn on_status(
        &mut self,
        request_id: u16,
        data_offset: u32,
        chunk_status: ProtobufChunkStatus,
        status_code: ProtobufStatusCode,
    ) -> Option<Message> {
        if chunk_status != ProtobufChunkStatus::Kept || status_code != ProtobufStatusCode::NoError
        {
            if self.pending.remove(&request_id).is_some() {
                warn!(
                    "peer discarded chunk {} of request {}: {:?}",
                    data_offset, request_id, status_code
                );
            }
            return None;
        }

        let payload = self.pending.get(&request_id)?;
        let start = data_offset as usize + payload.chunk_size;
        if start >= payload.data.len() {
            self.pending.remove(&request_id);
            return None;
        }
        let end = (start + payload.chunk_size).min(payload.data.len());
        let message = payload.kind.wrap(ProtobufChunk {
            request_id,
            data_offset: start as u32,
            total_length: payload.data.len() as u32,
            data: payload.data[start..end].to_vec(),
        });
        if end == payload.data.len() {
            self.pending.remove(&request_id);
        }
        Some(message)
    }
}
