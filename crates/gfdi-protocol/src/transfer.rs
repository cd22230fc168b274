//! Chunked file transfer.
//!
//! A [`TransferSession`] either receives a file (the host downloading from the
//! device) or sends one (the host uploading, or answering a download request
//! when emulating a device). Both sides track the next byte offset and the
//! running CRC at that offset; a chunk is accepted only if both match, and the
//! receiver's answer tells the sender exactly where to resume.
//!
//! ```text
//! Requested -> SizeNegotiated -> Transferring -> Complete
//!      \______________\________________\-------> Aborted
//! ```

use log::{debug, info, trace, warn};

use crate::checksum::crc16;
use crate::constants::*;
use crate::error::{DecodeError, TransferError};
use crate::messages::{CreateFile, DownloadRequest, FileTransferData, NotificationData, UploadRequest};
use crate::responses::{Response, ResponseBody};
use crate::types::*;

// ============================================================================
// Directory listing
// ============================================================================

/// One entry of the device's directory file (file index 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Index used to download the file.
    pub file_index: u16,
    /// Data type.
    pub data_type: u8,
    /// Sub-type.
    pub sub_type: u8,
    /// File number within its type.
    pub file_number: u16,
    /// Type-specific flags.
    pub specific_flags: u8,
    /// File flags (archive, ...).
    pub file_flags: u8,
    /// Size in bytes.
    pub file_size: u32,
    /// Device-epoch timestamp.
    pub timestamp: u32,
}

impl DirectoryEntry {
    /// Parse a downloaded directory file.
    ///
    /// A trailing partial entry is logged and ignored.
    pub fn parse_all(data: &[u8]) -> Result<Vec<DirectoryEntry>, DecodeError> {
        let chunks = data.chunks_exact(DIRECTORY_ENTRY_SIZE);
        if !chunks.remainder().is_empty() {
            warn!(
                "directory listing has {} trailing bytes",
                chunks.remainder().len()
            );
        }
        chunks.map(DirectoryEntry::parse).collect()
    }

    fn parse(entry: &[u8]) -> Result<DirectoryEntry, DecodeError> {
        let mut reader = crate::codec::MessageReader::new(entry);
        Ok(DirectoryEntry {
            file_index: reader.read_u16()?,
            data_type: reader.read_u8()?,
            sub_type: reader.read_u8()?,
            file_number: reader.read_u16()?,
            specific_flags: reader.read_u8()?,
            file_flags: reader.read_u8()?,
            file_size: reader.read_u32()?,
            timestamp: reader.read_u32()?,
        })
    }

    /// Type pair of the file.
    pub fn file_type(&self) -> FileType {
        FileType::new(self.data_type, self.sub_type)
    }

    /// Whether the device has archived the file.
    pub fn is_archived(&self) -> bool {
        self.file_flags & FILE_FLAG_ARCHIVE != 0
    }
}

// ============================================================================
// Transfer session
// ============================================================================

/// Which side of the chunk exchange this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRole {
    /// Receives chunks and answers each one.
    Receiver,
    /// Sends chunks and reacts to each answer.
    Sender,
}

/// Lifecycle of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Request sent, awaiting the peer's answer.
    Requested,
    /// Size agreed, no chunk exchanged yet.
    SizeNegotiated,
    /// Chunks flowing.
    Transferring,
    /// Every byte transferred.
    Complete,
    /// Abandoned.
    Aborted,
}

impl TransferState {
    /// State name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TransferState::Requested => "requested",
            TransferState::SizeNegotiated => "size negotiated",
            TransferState::Transferring => "transferring",
            TransferState::Complete => "complete",
            TransferState::Aborted => "aborted",
        }
    }

    /// Whether no further chunks will be exchanged.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Complete | TransferState::Aborted)
    }
}

/// Outcome of one received chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadProgress {
    /// More chunks expected.
    Continue,
    /// Every byte received. Holds the bytes received by this session.
    Complete(Vec<u8>),
    /// The session gave up.
    Aborted(TransferError),
}

/// Answer to a received chunk, plus what it means for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReply {
    /// RESPONSE to send back.
    pub response: Response,
    /// Session progress.
    pub progress: DownloadProgress,
}

/// What a sender does after the peer answers a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendProgress {
    /// Send this chunk next.
    Next(FileTransferData),
    /// The peer has every byte.
    Complete,
    /// The peer paused; call [`TransferSession::resume`] to continue.
    Paused,
}

/// Position to resume an interrupted download from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCheckpoint {
    /// File being transferred.
    pub file_index: u16,
    /// First byte not yet received.
    pub data_offset: u32,
    /// Running CRC over every byte before `data_offset`.
    pub crc_seed: u16,
}

/// State of one chunked file transfer.
#[derive(Debug, Clone)]
pub struct TransferSession {
    role: TransferRole,
    state: TransferState,
    file_index: u16,
    request_kind: RequestKind,
    file_type: Option<FileType>,
    start_offset: u32,
    start_crc: u16,
    data_offset: u32,
    crc: u16,
    total_size: u32,
    data: Vec<u8>,
    chunk_size: usize,
    last_chunk: Option<(u32, usize, u16)>,
    retries: u32,
    max_retries: u32,
}

impl TransferSession {
    fn base(role: TransferRole, file_index: u16, max_retries: u32) -> Self {
        TransferSession {
            role,
            state: TransferState::Requested,
            file_index,
            request_kind: RequestKind::New,
            file_type: None,
            start_offset: 0,
            start_crc: 0,
            data_offset: 0,
            crc: 0,
            total_size: 0,
            data: Vec::new(),
            chunk_size: 1,
            last_chunk: None,
            retries: 0,
            max_retries,
        }
    }

    /// Download a whole file from offset zero.
    pub fn download(file_index: u16, max_retries: u32) -> Self {
        TransferSession::base(TransferRole::Receiver, file_index, max_retries)
    }

    /// Resume an interrupted download.
    pub fn resume_download(checkpoint: TransferCheckpoint, max_retries: u32) -> Self {
        let mut session =
            TransferSession::base(TransferRole::Receiver, checkpoint.file_index, max_retries);
        session.request_kind = RequestKind::Continue;
        session.start_offset = checkpoint.data_offset;
        session.start_crc = checkpoint.crc_seed;
        session.data_offset = checkpoint.data_offset;
        session.crc = checkpoint.crc_seed;
        session
    }

    /// Upload a new file; starts with a CREATE_FILE request.
    pub fn upload(file_type: FileType, data: Vec<u8>, chunk_size: usize, max_retries: u32) -> Self {
        let mut session = TransferSession::base(TransferRole::Sender, 0, max_retries);
        session.file_type = Some(file_type);
        session.total_size = data.len() as u32;
        session.data = data;
        session.chunk_size = chunk_size.max(1);
        session
    }

    /// Upload into an existing file slot; starts with an UPLOAD_REQUEST.
    pub fn upload_existing(
        file_index: u16,
        data: Vec<u8>,
        chunk_size: usize,
        max_retries: u32,
    ) -> Self {
        let mut session = TransferSession::upload(FileType::new(0, 0), data, chunk_size, max_retries);
        session.file_type = None;
        session.file_index = file_index;
        session
    }

    /// Answer a download request with `data`, acting as the device.
    ///
    /// Returns the session and the RESPONSE to send. A refused request yields
    /// an aborted session.
    pub fn serve_download(
        request: &DownloadRequest,
        data: Vec<u8>,
        chunk_size: usize,
        max_retries: u32,
    ) -> (Self, Response) {
        let mut session = TransferSession::base(TransferRole::Sender, request.file_index, max_retries);
        session.request_kind = request.request_kind;
        session.total_size = data.len() as u32;
        session.data = data;
        session.chunk_size = chunk_size.max(1);

        let status = match request.request_kind {
            RequestKind::New => DownloadStatus::Ok,
            RequestKind::Continue if request.data_offset > session.total_size => {
                DownloadStatus::ExceedsFileSize
            }
            RequestKind::Continue
                if crc16(0, &session.data[..request.data_offset as usize])
                    != request.crc_seed =>
            {
                DownloadStatus::CrcIncorrect
            }
            RequestKind::Continue => DownloadStatus::Ok,
            RequestKind::Unknown(_) => DownloadStatus::RequestInvalid,
        };

        if status == DownloadStatus::Ok {
            if request.request_kind == RequestKind::Continue {
                session.start_offset = request.data_offset;
                session.start_crc = request.crc_seed;
                session.data_offset = request.data_offset;
                session.crc = request.crc_seed;
            }
            session.state = TransferState::SizeNegotiated;
        } else {
            session.state = TransferState::Aborted;
        }

        let response = Response::ack_with(
            MESSAGE_DOWNLOAD_REQUEST,
            ResponseBody::Download {
                status,
                max_file_size: session.total_size,
            },
        );
        (session, response)
    }

    /// Which side this session plays.
    pub fn role(&self) -> TransferRole {
        self.role
    }

    /// Current state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// File being transferred.
    pub fn file_index(&self) -> u16 {
        self.file_index
    }

    /// Next byte offset.
    pub fn data_offset(&self) -> u32 {
        self.data_offset
    }

    /// Running CRC at [`Self::data_offset`].
    pub fn crc(&self) -> u16 {
        self.crc
    }

    /// Negotiated total size.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Consecutive retries since the last accepted chunk.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Where a fresh session would resume this transfer.
    pub fn checkpoint(&self) -> TransferCheckpoint {
        TransferCheckpoint {
            file_index: self.file_index,
            data_offset: self.data_offset,
            crc_seed: self.crc,
        }
    }

    /// DOWNLOAD_REQUEST that opens (or resumes) this download.
    pub fn download_request(&self) -> DownloadRequest {
        DownloadRequest {
            file_index: self.file_index,
            data_offset: self.start_offset,
            request_kind: self.request_kind,
            crc_seed: self.start_crc,
            data_size: 0,
        }
    }

    /// CREATE_FILE that opens this upload, if it targets a new file.
    pub fn create_request(&self) -> Option<CreateFile> {
        self.file_type
            .map(|file_type| CreateFile::new(self.total_size, file_type))
    }

    /// UPLOAD_REQUEST for the current file index.
    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            file_index: self.file_index,
            data_size: self.total_size,
            data_offset: self.data_offset,
            crc_seed: self.crc,
        }
    }

    /// Abandon the transfer.
    ///
    /// A receiver gets back the ABORT answer for the peer.
    pub fn abort(&mut self, reason: &str) -> Option<Response> {
        if self.state.is_terminal() {
            return None;
        }
        warn!("aborting transfer of file {}: {}", self.file_index, reason);
        self.state = TransferState::Aborted;
        match self.role {
            TransferRole::Receiver => Some(self.chunk_response(TransferResponse::Abort)),
            TransferRole::Sender => None,
        }
    }

    fn fail(&mut self, error: TransferError) -> TransferError {
        warn!("transfer of file {} failed: {}", self.file_index, error);
        self.state = TransferState::Aborted;
        error
    }

    fn invalid_state(&self, message: &str) -> TransferError {
        TransferError::InvalidState {
            state: self.state.name(),
            message: message.to_string(),
        }
    }

    fn bump_retries(&mut self, last: TransferResponse) -> Result<(), TransferError> {
        self.retries += 1;
        if self.retries > self.max_retries {
            return Err(self.fail(TransferError::RetriesExhausted {
                retries: self.retries - 1,
                last,
            }));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Receiver
    // ------------------------------------------------------------------

    /// Handle the device's answer to the download request.
    pub fn on_download_response(&mut self, response: &Response) -> Result<(), TransferError> {
        if self.role != TransferRole::Receiver || self.state != TransferState::Requested {
            return Err(self.invalid_state("download response"));
        }
        match (&response.body, response.status) {
            (
                ResponseBody::Download {
                    status: DownloadStatus::Ok,
                    max_file_size,
                },
                Status::Ack,
            ) => {
                if *max_file_size < self.start_offset {
                    return Err(self.fail(TransferError::Rejected(format!(
                        "file size {} is below resume offset {}",
                        max_file_size, self.start_offset
                    ))));
                }
                self.total_size = *max_file_size;
                self.state = TransferState::SizeNegotiated;
                debug!(
                    "download of file {} negotiated: {} bytes",
                    self.file_index, self.total_size
                );
                Ok(())
            }
            (ResponseBody::Download { status, .. }, _) => {
                Err(self.fail(TransferError::Rejected(format!("{:?}", status))))
            }
            (_, status) => Err(self.fail(TransferError::Rejected(format!("{:?}", status)))),
        }
    }

    /// Whether a zero-length file completed on negotiation.
    pub fn is_empty_download(&self) -> bool {
        self.state == TransferState::SizeNegotiated && self.data_offset == self.total_size
    }

    fn chunk_response(&self, response: TransferResponse) -> Response {
        Response::ack_with(
            MESSAGE_FILE_TRANSFER_DATA,
            ResponseBody::FileTransferData {
                response,
                next_data_offset: self.data_offset,
            },
        )
    }

    fn aborted_reply(&mut self, error: TransferError) -> ChunkReply {
        let error = self.fail(error);
        ChunkReply {
            response: self.chunk_response(TransferResponse::Abort),
            progress: DownloadProgress::Aborted(error),
        }
    }

    /// Handle one received chunk and build the answer for the peer.
    pub fn on_chunk(&mut self, chunk: &FileTransferData) -> ChunkReply {
        if self.role != TransferRole::Receiver
            || !matches!(
                self.state,
                TransferState::SizeNegotiated | TransferState::Transferring
            )
        {
            let error = self.invalid_state("file transfer data");
            return self.aborted_reply(error);
        }

        if chunk.data_offset != self.data_offset {
            debug!(
                "chunk at offset {} but expected {}",
                chunk.data_offset, self.data_offset
            );
            return self.retry_reply(TransferResponse::OffsetMismatch);
        }

        let computed = crc16(self.crc, &chunk.data);
        if computed != chunk.crc {
            debug!(
                "chunk at offset {} has crc 0x{:04X}, computed 0x{:04X}",
                chunk.data_offset, chunk.crc, computed
            );
            return self.retry_reply(TransferResponse::CrcMismatch);
        }

        let end = self.data_offset as u64 + chunk.data.len() as u64;
        if end > self.total_size as u64 {
            return self.aborted_reply(TransferError::Aborted(format!(
                "chunk ends at {} past file size {}",
                end, self.total_size
            )));
        }

        self.data.extend_from_slice(&chunk.data);
        self.data_offset = end as u32;
        self.crc = computed;
        self.retries = 0;
        self.state = TransferState::Transferring;
        trace!(
            "file {}: {}/{} bytes",
            self.file_index,
            self.data_offset,
            self.total_size
        );

        let response = self.chunk_response(TransferResponse::TransferSuccessful);
        if self.data_offset == self.total_size {
            self.state = TransferState::Complete;
            info!(
                "download of file {} complete ({} bytes)",
                self.file_index, self.total_size
            );
            return ChunkReply {
                response,
                progress: DownloadProgress::Complete(std::mem::take(&mut self.data)),
            };
        }
        ChunkReply {
            response,
            progress: DownloadProgress::Continue,
        }
    }

    fn retry_reply(&mut self, answer: TransferResponse) -> ChunkReply {
        match self.bump_retries(answer) {
            Ok(()) => ChunkReply {
                response: self.chunk_response(answer),
                progress: DownloadProgress::Continue,
            },
            Err(error) => ChunkReply {
                response: self.chunk_response(TransferResponse::Abort),
                progress: DownloadProgress::Aborted(error),
            },
        }
    }

    // ------------------------------------------------------------------
    // Sender
    // ------------------------------------------------------------------

    /// Handle the answer to CREATE_FILE; yields the UPLOAD_REQUEST to send.
    pub fn on_create_file_response(
        &mut self,
        response: &Response,
    ) -> Result<UploadRequest, TransferError> {
        if self.role != TransferRole::Sender || self.state != TransferState::Requested {
            return Err(self.invalid_state("create file response"));
        }
        match &response.body {
            ResponseBody::CreateFile {
                status: CreateFileStatus::Ok,
                file_index,
                ..
            } if response.is_ack() => {
                self.file_index = *file_index;
                debug!("created file {}", file_index);
                Ok(self.upload_request())
            }
            ResponseBody::CreateFile { status, .. } => {
                Err(self.fail(TransferError::Rejected(format!("{:?}", status))))
            }
            _ => Err(self.fail(TransferError::Rejected(format!("{:?}", response.status)))),
        }
    }

    /// Handle the answer to UPLOAD_REQUEST; yields the first chunk.
    ///
    /// The device may ask to start at a later offset (resuming an earlier
    /// upload); its CRC seed must match the data at that offset.
    pub fn on_upload_response(
        &mut self,
        response: &Response,
    ) -> Result<SendProgress, TransferError> {
        if self.role != TransferRole::Sender || self.state != TransferState::Requested {
            return Err(self.invalid_state("upload response"));
        }
        match &response.body {
            ResponseBody::Upload {
                status: UploadStatus::Ok,
                data_offset,
                max_file_size,
                crc_seed,
            } if response.is_ack() => {
                if self.total_size > *max_file_size {
                    return Err(self.fail(TransferError::Rejected(format!(
                        "{} bytes do not fit in {}",
                        self.total_size, max_file_size
                    ))));
                }
                if *data_offset > self.total_size
                    || crc16(0, &self.data[..*data_offset as usize]) != *crc_seed
                {
                    return Err(self.fail(TransferError::Rejected(format!(
                        "cannot resume at offset {} with crc 0x{:04X}",
                        data_offset, crc_seed
                    ))));
                }
                self.start_offset = *data_offset;
                self.start_crc = *crc_seed;
                self.data_offset = *data_offset;
                self.crc = *crc_seed;
                self.state = TransferState::SizeNegotiated;
                Ok(self.next_or_complete())
            }
            ResponseBody::Upload { status, .. } => {
                Err(self.fail(TransferError::Rejected(format!("{:?}", status))))
            }
            _ => Err(self.fail(TransferError::Rejected(format!("{:?}", response.status)))),
        }
    }

    fn crc_at(&self, offset: u32) -> u16 {
        let start = self.start_offset as usize;
        crc16(self.start_crc, &self.data[start..offset as usize])
    }

    fn seek(&mut self, offset: u32) {
        if offset != self.data_offset {
            self.crc = self.crc_at(offset);
            self.data_offset = offset;
        }
    }

    /// Build the chunk at the current offset, or `None` when every byte is sent.
    pub fn next_chunk(&mut self) -> Option<FileTransferData> {
        if self.role != TransferRole::Sender || self.data_offset >= self.total_size {
            return None;
        }
        let start = self.data_offset as usize;
        let end = (start + self.chunk_size).min(self.total_size as usize);
        let data = self.data[start..end].to_vec();
        let crc = crc16(self.crc, &data);
        self.last_chunk = Some((self.data_offset, data.len(), crc));
        self.state = TransferState::Transferring;
        trace!(
            "file {}: sending {} bytes at offset {}",
            self.file_index,
            data.len(),
            self.data_offset
        );
        Some(FileTransferData {
            flags: 0,
            crc,
            data_offset: self.data_offset,
            data,
        })
    }

    fn next_or_complete(&mut self) -> SendProgress {
        match self.next_chunk() {
            Some(chunk) => SendProgress::Next(chunk),
            None => {
                self.state = TransferState::Complete;
                info!(
                    "transfer of file {} complete ({} bytes)",
                    self.file_index, self.total_size
                );
                SendProgress::Complete
            }
        }
    }

    /// Continue a paused transfer.
    pub fn resume(&mut self) -> Option<FileTransferData> {
        self.next_chunk()
    }

    /// Handle the peer's answer to the last chunk sent.
    pub fn on_chunk_response(&mut self, response: &Response) -> Result<SendProgress, TransferError> {
        if self.role != TransferRole::Sender || self.state != TransferState::Transferring {
            return Err(self.invalid_state("file transfer response"));
        }
        if !response.is_ack() {
            return Err(self.fail(TransferError::Rejected(format!("{:?}", response.status))));
        }
        let ResponseBody::FileTransferData {
            response: answer,
            next_data_offset,
        } = response.body
        else {
            return Err(self.fail(self.invalid_state("response without transfer body")));
        };
        let Some((last_offset, last_len, last_crc)) = self.last_chunk else {
            return Err(self.fail(self.invalid_state("response before any chunk")));
        };

        match answer {
            TransferResponse::TransferSuccessful => {
                let expected = last_offset + last_len as u32;
                if next_data_offset != expected {
                    warn!(
                        "peer acknowledged up to {} but chunk ended at {}",
                        next_data_offset, expected
                    );
                }
                if next_data_offset < self.start_offset || next_data_offset > self.total_size {
                    return Err(self.fail(TransferError::Aborted(format!(
                        "peer expects offset {} outside the transfer",
                        next_data_offset
                    ))));
                }
                self.retries = 0;
                if next_data_offset == expected {
                    self.data_offset = expected;
                    self.crc = last_crc;
                } else {
                    self.seek(next_data_offset);
                }
                Ok(self.next_or_complete())
            }
            TransferResponse::ResendLastPacket | TransferResponse::CrcMismatch => {
                self.bump_retries(answer)?;
                self.seek(last_offset);
                Ok(self.next_or_complete())
            }
            TransferResponse::OffsetMismatch => {
                self.bump_retries(answer)?;
                if next_data_offset < self.start_offset || next_data_offset > self.total_size {
                    return Err(self.fail(TransferError::Aborted(format!(
                        "cannot resynchronize to offset {}",
                        next_data_offset
                    ))));
                }
                self.seek(next_data_offset);
                Ok(self.next_or_complete())
            }
            TransferResponse::SilentSyncPaused => {
                debug!("transfer of file {} paused by peer", self.file_index);
                self.data_offset = last_offset + last_len as u32;
                self.crc = last_crc;
                Ok(SendProgress::Paused)
            }
            TransferResponse::Abort => {
                Err(self.fail(TransferError::Aborted("peer aborted".to_string())))
            }
            TransferResponse::Unknown(code) => Err(self.fail(TransferError::Aborted(format!(
                "unknown transfer response {}",
                code
            )))),
        }
    }
}

// ============================================================================
// Notification data upload
// ============================================================================

/// Chunked upload of notification attribute data.
///
/// Blocks carry the running CRC after the block and advance on each
/// successful NOTIFICATION_DATA answer.
#[derive(Debug, Clone)]
pub struct NotificationUpload {
    data: Vec<u8>,
    offset: usize,
    crc: u16,
    last_block: Option<(usize, u16)>,
    block_size: usize,
    retries: u32,
    max_retries: u32,
}

impl NotificationUpload {
    /// Prepare an upload. Data longer than a u16 can address is rejected.
    ///
    /// More than `max_retries` consecutive resend requests abort the upload.
    pub fn new(data: Vec<u8>, max_retries: u32) -> Result<Self, TransferError> {
        if data.len() > u16::MAX as usize {
            return Err(TransferError::Encode(crate::error::EncodeError::OutOfRange {
                field: "notification data",
                value: data.len() as u64,
            }));
        }
        Ok(NotificationUpload {
            data,
            offset: 0,
            crc: 0,
            last_block: None,
            block_size: NOTIFICATION_DATA_BLOCK_SIZE,
            retries: 0,
            max_retries,
        })
    }

    /// Whether every block has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.offset >= self.data.len() && self.last_block.is_none()
    }

    /// Build the next block, or `None` when every byte is sent.
    pub fn next_block(&mut self) -> Option<NotificationData> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.block_size).min(self.data.len());
        let block = self.data[self.offset..end].to_vec();
        let previous_crc = self.crc;
        self.crc = crc16(self.crc, &block);
        let message = NotificationData {
            data_size: self.data.len() as u16,
            crc: self.crc,
            data_offset: self.offset as u16,
            data: block,
        };
        self.last_block = Some((self.offset, previous_crc));
        self.offset = end;
        Some(message)
    }

    /// Handle the answer to the last block; yields the next block to send.
    pub fn on_status(&mut self, response: &Response) -> Result<Option<NotificationData>, TransferError> {
        let answer = match response.body {
            ResponseBody::NotificationData { response: answer } if response.is_ack() => answer,
            _ => TransferResponse::Abort,
        };
        match answer {
            TransferResponse::TransferSuccessful => {
                self.last_block = None;
                self.retries = 0;
                Ok(self.next_block())
            }
            TransferResponse::ResendLastPacket | TransferResponse::CrcMismatch => {
                self.retries += 1;
                if self.retries > self.max_retries {
                    warn!(
                        "notification upload gave up after {} resends",
                        self.max_retries
                    );
                    return Err(TransferError::RetriesExhausted {
                        retries: self.max_retries,
                        last: answer,
                    });
                }
                if let Some((offset, crc)) = self.last_block.take() {
                    self.offset = offset;
                    self.crc = crc;
                }
                Ok(self.next_block())
            }
            other => Err(TransferError::Aborted(format!(
                "notification upload answered with {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn negotiated(file_index: u16, size: u32) -> TransferSession {
        let mut session = TransferSession::download(file_index, 3);
        session
            .on_download_response(&Response::ack_with(
                MESSAGE_DOWNLOAD_REQUEST,
                ResponseBody::Download {
                    status: DownloadStatus::Ok,
                    max_file_size: size,
                },
            ))
            .unwrap();
        session
    }

    fn chunk_answer(answer: TransferResponse, next: u32) -> Response {
        Response::ack_with(
            MESSAGE_FILE_TRANSFER_DATA,
            ResponseBody::FileTransferData {
                response: answer,
                next_data_offset: next,
            },
        )
    }

    fn chunk(data: &[u8], offset: u32, seed: u16) -> FileTransferData {
        FileTransferData {
            flags: 0,
            crc: crc16(seed, data),
            data_offset: offset,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_download_to_completion() {
        let data = sample(10);
        let mut session = negotiated(3, 10);
        assert_eq!(session.state(), TransferState::SizeNegotiated);

        let reply = session.on_chunk(&chunk(&data[..6], 0, 0));
        assert_eq!(reply.progress, DownloadProgress::Continue);
        assert_eq!(reply.response, chunk_answer(TransferResponse::TransferSuccessful, 6));

        let seed = crc16(0, &data[..6]);
        let reply = session.on_chunk(&chunk(&data[6..], 6, seed));
        assert_eq!(reply.progress, DownloadProgress::Complete(data));
        assert_eq!(session.state(), TransferState::Complete);
    }

    #[test]
    fn test_download_offset_mismatch_reports_expected() {
        let data = sample(10);
        let mut session = negotiated(3, 10);
        let reply = session.on_chunk(&chunk(&data[4..], 4, 0));
        assert_eq!(reply.response, chunk_answer(TransferResponse::OffsetMismatch, 0));
        assert_eq!(session.data_offset(), 0);
        assert_eq!(session.retries(), 1);
    }

    #[test]
    fn test_download_crc_mismatch() {
        let data = sample(10);
        let mut session = negotiated(3, 10);
        let mut bad = chunk(&data, 0, 0);
        bad.crc ^= 1;
        let reply = session.on_chunk(&bad);
        assert_eq!(reply.response, chunk_answer(TransferResponse::CrcMismatch, 0));
        assert_eq!(session.state(), TransferState::SizeNegotiated);
    }

    #[test]
    fn test_download_retry_ceiling() {
        let data = sample(10);
        let mut session = negotiated(3, 10);
        for _ in 0..3 {
            let reply = session.on_chunk(&chunk(&data[2..], 2, 0));
            assert_eq!(reply.progress, DownloadProgress::Continue);
        }
        let reply = session.on_chunk(&chunk(&data[2..], 2, 0));
        assert_eq!(reply.response, chunk_answer(TransferResponse::Abort, 0));
        assert_eq!(
            reply.progress,
            DownloadProgress::Aborted(TransferError::RetriesExhausted {
                retries: 3,
                last: TransferResponse::OffsetMismatch,
            })
        );
        assert_eq!(session.state(), TransferState::Aborted);
    }

    #[test]
    fn test_download_chunk_past_end_aborts() {
        let data = sample(12);
        let mut session = negotiated(3, 10);
        let reply = session.on_chunk(&chunk(&data, 0, 0));
        assert!(matches!(reply.progress, DownloadProgress::Aborted(TransferError::Aborted(_))));
        assert_eq!(reply.response, chunk_answer(TransferResponse::Abort, 0));
    }

    #[test]
    fn test_download_rejected() {
        let mut session = TransferSession::download(9, 3);
        let result = session.on_download_response(&Response::ack_with(
            MESSAGE_DOWNLOAD_REQUEST,
            ResponseBody::Download {
                status: DownloadStatus::DataDoesNotExist,
                max_file_size: 0,
            },
        ));
        assert!(matches!(result, Err(TransferError::Rejected(_))));
        assert_eq!(session.state(), TransferState::Aborted);
    }

    #[test]
    fn test_resume_request_carries_checkpoint() {
        let data = sample(10);
        let mut session = negotiated(3, 10);
        session.on_chunk(&chunk(&data[..4], 0, 0));
        let checkpoint = session.checkpoint();
        assert_eq!(checkpoint.data_offset, 4);
        assert_eq!(checkpoint.crc_seed, crc16(0, &data[..4]));

        let resumed = TransferSession::resume_download(checkpoint, 3);
        let request = resumed.download_request();
        assert_eq!(request.request_kind, RequestKind::Continue);
        assert_eq!(request.data_offset, 4);
        assert_eq!(request.crc_seed, checkpoint.crc_seed);
    }

    #[test]
    fn test_serve_download_resend_on_offset_mismatch() {
        let request = DownloadRequest {
            file_index: 3,
            data_offset: 0,
            request_kind: RequestKind::New,
            crc_seed: 0,
            data_size: 1000,
        };
        let (mut sender, response) = TransferSession::serve_download(&request, sample(1000), 200, 5);
        assert!(matches!(
            response.body,
            ResponseBody::Download {
                status: DownloadStatus::Ok,
                max_file_size: 1000
            }
        ));

        let first = sender.next_chunk().unwrap();
        assert_eq!(first.data_offset, 0);
        let again = sender
            .on_chunk_response(&chunk_answer(TransferResponse::OffsetMismatch, 0))
            .unwrap();
        assert_eq!(again, SendProgress::Next(first));
        assert_eq!(sender.data_offset(), 0);
    }

    #[test]
    fn test_serve_download_refuses_bad_resume() {
        let request = DownloadRequest {
            file_index: 3,
            data_offset: 4,
            request_kind: RequestKind::Continue,
            crc_seed: 0x1234,
            data_size: 0,
        };
        let (sender, response) = TransferSession::serve_download(&request, sample(10), 4, 5);
        assert!(matches!(
            response.body,
            ResponseBody::Download {
                status: DownloadStatus::CrcIncorrect,
                ..
            }
        ));
        assert_eq!(sender.state(), TransferState::Aborted);
    }

    #[test]
    fn test_upload_flow() {
        let data = sample(25);
        let mut upload = TransferSession::upload(FileType::new(255, 17), data.clone(), 10, 2);
        let create = upload.create_request().unwrap();
        assert_eq!(create.file_size, 25);

        let request = upload
            .on_create_file_response(&Response::ack_with(
                MESSAGE_CREATE_FILE,
                ResponseBody::CreateFile {
                    status: CreateFileStatus::Ok,
                    file_index: 21,
                    data_type: 255,
                    sub_type: 17,
                    file_number: 0,
                },
            ))
            .unwrap();
        assert_eq!(request.file_index, 21);
        assert_eq!(request.data_size, 25);

        let SendProgress::Next(first) = upload
            .on_upload_response(&Response::ack_with(
                MESSAGE_UPLOAD_REQUEST,
                ResponseBody::Upload {
                    status: UploadStatus::Ok,
                    data_offset: 0,
                    max_file_size: 4096,
                    crc_seed: 0,
                },
            ))
            .unwrap()
        else {
            panic!("expected first chunk");
        };
        assert_eq!(first.data, data[..10]);

        // A CRC complaint resends the same chunk.
        let resent = upload
            .on_chunk_response(&chunk_answer(TransferResponse::CrcMismatch, 0))
            .unwrap();
        assert_eq!(resent, SendProgress::Next(first.clone()));

        let SendProgress::Next(second) = upload
            .on_chunk_response(&chunk_answer(TransferResponse::TransferSuccessful, 10))
            .unwrap()
        else {
            panic!("expected second chunk");
        };
        assert_eq!(second.data_offset, 10);
        assert_eq!(second.crc, crc16(0, &data[..20]));

        upload
            .on_chunk_response(&chunk_answer(TransferResponse::TransferSuccessful, 20))
            .unwrap();
        let done = upload
            .on_chunk_response(&chunk_answer(TransferResponse::TransferSuccessful, 25))
            .unwrap();
        assert_eq!(done, SendProgress::Complete);
        assert_eq!(upload.state(), TransferState::Complete);
    }

    #[test]
    fn test_upload_peer_abort() {
        let mut upload = TransferSession::upload_existing(4, sample(5), 10, 2);
        assert!(upload.create_request().is_none());
        upload
            .on_upload_response(&Response::ack_with(
                MESSAGE_UPLOAD_REQUEST,
                ResponseBody::Upload {
                    status: UploadStatus::Ok,
                    data_offset: 0,
                    max_file_size: 100,
                    crc_seed: 0,
                },
            ))
            .unwrap();
        let result = upload.on_chunk_response(&chunk_answer(TransferResponse::Abort, 0));
        assert!(matches!(result, Err(TransferError::Aborted(_))));
        assert_eq!(upload.state(), TransferState::Aborted);
    }

    #[test]
    fn test_directory_entries() {
        let mut data = vec![
            0x05, 0x00, 0x80, 0x04, 0x01, 0x00, 0x00, 0x10, 0x00, 0x04, 0x00, 0x00, 0x10, 0x27,
            0x00, 0x00,
        ];
        data.extend_from_slice(&[0xAA; 3]);
        let entries = DirectoryEntry::parse_all(&data).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = entries[0];
        assert_eq!(entry.file_index, 5);
        assert_eq!(entry.file_type(), FileType::new(128, 4));
        assert_eq!(entry.file_size, 1024);
        assert_eq!(entry.timestamp, 10_000);
        assert!(entry.is_archived());
    }

    #[test]
    fn test_notification_upload_blocks() {
        let data = sample(650);
        let mut upload = NotificationUpload::new(data.clone(), 3).unwrap();
        let first = upload.next_block().unwrap();
        assert_eq!(first.data.len(), 300);
        assert_eq!(first.data_size, 650);
        assert_eq!(first.crc, crc16(0, &data[..300]));

        let ok = Response::ack_with(
            MESSAGE_NOTIFICATION_DATA,
            ResponseBody::NotificationData {
                response: TransferResponse::TransferSuccessful,
            },
        );
        let resend = Response::ack_with(
            MESSAGE_NOTIFICATION_DATA,
            ResponseBody::NotificationData {
                response: TransferResponse::ResendLastPacket,
            },
        );
        let second = upload.on_status(&ok).unwrap().unwrap();
        assert_eq!(second.data_offset, 300);
        assert_eq!(upload.on_status(&resend).unwrap().unwrap(), second);
        let third = upload.on_status(&ok).unwrap().unwrap();
        assert_eq!(third.data.len(), 50);
        assert_eq!(third.crc, crc16(0, &data));
        assert_eq!(upload.on_status(&ok).unwrap(), None);
        assert!(upload.is_complete());
    }

    #[test]
    fn test_notification_upload_resend_ceiling() {
        let mut upload = NotificationUpload::new(sample(650), 2).unwrap();
        let first = upload.next_block().unwrap();
        let answer = |response| {
            Response::ack_with(
                MESSAGE_NOTIFICATION_DATA,
                ResponseBody::NotificationData { response },
            )
        };
        let crc = answer(TransferResponse::CrcMismatch);

        assert_eq!(upload.on_status(&crc).unwrap().unwrap(), first);
        assert_eq!(upload.on_status(&crc).unwrap().unwrap(), first);
        assert!(matches!(
            upload.on_status(&crc),
            Err(TransferError::RetriesExhausted {
                retries: 2,
                last: TransferResponse::CrcMismatch
            })
        ));

        // A success in between resets the count.
        let mut upload = NotificationUpload::new(sample(650), 1).unwrap();
        upload.next_block().unwrap();
        upload.on_status(&crc).unwrap();
        upload
            .on_status(&answer(TransferResponse::TransferSuccessful))
            .unwrap();
        assert!(upload.on_status(&crc).unwrap().is_some());
    }
}
