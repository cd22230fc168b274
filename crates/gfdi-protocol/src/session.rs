//! Per-connection protocol state.
//!
//! A [`Session`] wraps the [`Dispatcher`] and routes each dispatched message
//! to the exchange it belongs to: the current download, the current outgoing
//! file (an upload, or a file served in answer to a download request),
//! inbound payload reassembly, outbound payload chunking, and notification
//! data. It may replace the dispatcher's reply and queues follow-up frames.

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::ProtocolConfig;
use crate::constants::*;
use crate::dispatcher::Dispatcher;
use crate::error::{ConfigError, DecodeError, EncodeError, FrameError, TransferError};
use crate::events::DeviceEvent;
use crate::frame::FrameCodec;
use crate::messages::*;
use crate::reassembly::{
    chunk_status, OpaquePayload, PayloadChunker, PayloadDecoder, PayloadKind, Reassembly,
    ReassemblyBuffer,
};
use crate::responses::{Response, ResponseBody};
use crate::transfer::{
    DirectoryEntry, DownloadProgress, NotificationUpload, SendProgress, TransferCheckpoint,
    TransferSession,
};
use crate::types::*;

/// What handling one frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    /// Type code from the frame header.
    pub type_code: u16,
    /// Decoded message, or why it could not be decoded.
    pub message: Result<Message, DecodeError>,
    /// Frames to send, reply first.
    pub frames: Vec<Vec<u8>>,
    /// Events for the application.
    pub events: Vec<DeviceEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutgoingKind {
    Upload,
    Serve,
}

#[derive(Debug)]
struct Outgoing {
    kind: OutgoingKind,
    transfer: TransferSession,
}

/// One connection to a peer.
#[derive(Debug)]
pub struct Session {
    dispatcher: Dispatcher,
    peer: Option<DeviceInformation>,
    download: Option<TransferSession>,
    outgoing: Option<Outgoing>,
    served_files: HashMap<u16, Vec<u8>>,
    reassembly: ReassemblyBuffer,
    decoder: Box<dyn PayloadDecoder>,
    chunker: PayloadChunker,
    notification: Option<NotificationUpload>,
}

impl Session {
    /// Create a session reading the system clock.
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Session::from_dispatcher(Dispatcher::new(config)))
    }

    /// Create a session with an explicit clock.
    pub fn with_clock(config: ProtocolConfig, clock: Box<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Session::from_dispatcher(Dispatcher::with_clock(config, clock)))
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        let config = dispatcher.config();
        let reassembly =
            ReassemblyBuffer::new(config.max_reassembly_entries, config.max_protobuf_length);
        let chunker = PayloadChunker::new(config.protobuf_chunk_size());
        Session {
            dispatcher,
            peer: None,
            download: None,
            outgoing: None,
            served_files: HashMap::new(),
            reassembly,
            decoder: Box::new(OpaquePayload),
            chunker,
            notification: None,
        }
    }

    /// Validate reassembled payloads with `decoder`.
    pub fn with_decoder(mut self, decoder: Box<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Current configuration, including the adopted packet size.
    pub fn config(&self) -> &ProtocolConfig {
        self.dispatcher.config()
    }

    /// Frame codec for outbound frames.
    pub fn codec(&self) -> &FrameCodec {
        self.dispatcher.codec()
    }

    /// Identity the peer reported, once known.
    pub fn peer(&self) -> Option<&DeviceInformation> {
        self.peer.as_ref()
    }

    /// Encode and frame a message for this connection.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, EncodeError> {
        message.to_frame(self.codec())
    }

    /// Handle one inbound frame.
    pub fn handle_frame(&mut self, data: &[u8]) -> Result<SessionOutput, FrameError> {
        let mut dispatch = self.dispatcher.dispatch(data)?;
        let mut follow_ups = Vec::new();

        if let Ok(message) = &dispatch.message {
            match message {
                Message::DeviceInformation(info) => self.on_device_information(info),
                Message::Response(response) => {
                    self.on_response(response, &mut follow_ups, &mut dispatch.events)
                }
                Message::FileTransferData(chunk) => {
                    if let Some(reply) = self.on_file_chunk(chunk, &mut dispatch.events) {
                        dispatch.reply = Some(reply);
                    }
                }
                Message::DownloadRequest(request) => {
                    dispatch.reply = Some(self.on_download_request(request, &mut follow_ups));
                }
                Message::ProtobufRequest(chunk) | Message::ProtobufResponse(chunk) => {
                    dispatch
                        .events
                        .retain(|event| !matches!(event, DeviceEvent::StructuredPayload { .. }));
                    dispatch.reply =
                        Some(self.on_payload_chunk(dispatch.type_code, chunk, &mut dispatch.events));
                }
                _ => {}
            }
        }

        let mut frames = Vec::with_capacity(1 + follow_ups.len());
        match dispatch.reply_frame(self.codec()) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(e) => error!("cannot encode reply to {}: {}", dispatch.type_code, e),
        }
        for message in follow_ups {
            match self.encode(&message) {
                Ok(frame) => frames.push(frame),
                Err(e) => error!("cannot encode {}: {}", message.type_code(), e),
            }
        }

        Ok(SessionOutput {
            type_code: dispatch.type_code,
            message: dispatch.message,
            frames,
            events: dispatch.events,
        })
    }

    fn on_device_information(&mut self, info: &DeviceInformation) {
        let min_packet = FRAME_OVERHEAD + PROTOBUF_HEADER_SIZE + 1;
        if (info.max_packet_size as usize) < min_packet {
            warn!(
                "ignoring peer packet size {} below {}",
                info.max_packet_size, min_packet
            );
        } else {
            debug!("peer accepts frames up to {} bytes", info.max_packet_size);
            self.dispatcher.set_max_packet_size(info.max_packet_size);
            self.chunker
                .set_chunk_size(self.dispatcher.config().protobuf_chunk_size());
        }
        self.peer = Some(info.clone());
    }

    fn on_response(
        &mut self,
        response: &Response,
        follow_ups: &mut Vec<Message>,
        events: &mut Vec<DeviceEvent>,
    ) {
        match response.request_type {
            MESSAGE_DOWNLOAD_REQUEST => {
                let Some(download) = self.download.as_mut() else {
                    return;
                };
                match download.on_download_response(response) {
                    Ok(()) if download.is_empty_download() => {
                        let file_index = download.file_index();
                        self.download = None;
                        events.push(completed_download(file_index, Vec::new()));
                    }
                    Ok(()) => {}
                    Err(e) => {
                        let file_index = download.file_index();
                        self.download = None;
                        events.push(aborted(file_index, &e));
                    }
                }
            }
            MESSAGE_CREATE_FILE => {
                let Some(outgoing) = self.outgoing.as_mut() else {
                    return;
                };
                match outgoing.transfer.on_create_file_response(response) {
                    Ok(request) => follow_ups.push(Message::UploadRequest(request)),
                    Err(e) => {
                        let file_index = outgoing.transfer.file_index();
                        self.outgoing = None;
                        events.push(aborted(file_index, &e));
                    }
                }
            }
            MESSAGE_UPLOAD_REQUEST => {
                let Some(outgoing) = self.outgoing.as_mut() else {
                    return;
                };
                let progress = outgoing.transfer.on_upload_response(response);
                self.on_send_progress(progress, follow_ups, events);
            }
            MESSAGE_FILE_TRANSFER_DATA => {
                let Some(outgoing) = self.outgoing.as_mut() else {
                    return;
                };
                let progress = outgoing.transfer.on_chunk_response(response);
                self.on_send_progress(progress, follow_ups, events);
            }
            MESSAGE_NOTIFICATION_DATA => {
                let Some(upload) = self.notification.as_mut() else {
                    return;
                };
                match upload.on_status(response) {
                    Ok(Some(block)) => follow_ups.push(Message::NotificationData(block)),
                    Ok(None) => {
                        debug!("notification data delivered");
                        self.notification = None;
                    }
                    Err(e) => {
                        warn!("notification data upload failed: {}", e);
                        self.notification = None;
                    }
                }
            }
            MESSAGE_PROTOBUF_REQUEST | MESSAGE_PROTOBUF_RESPONSE => {
                if let ResponseBody::Protobuf {
                    request_id,
                    data_offset,
                    chunk_status,
                    status_code,
                } = response.body
                {
                    if let Some(next) =
                        self.chunker
                            .on_status(request_id, data_offset, chunk_status, status_code)
                    {
                        follow_ups.push(next);
                    }
                }
            }
            other => {
                if !response.is_ack() {
                    warn!(
                        "peer answered {} with {:?}",
                        crate::registry::name_of(other),
                        response.status
                    );
                }
            }
        }
    }

    fn on_send_progress(
        &mut self,
        progress: Result<SendProgress, TransferError>,
        follow_ups: &mut Vec<Message>,
        events: &mut Vec<DeviceEvent>,
    ) {
        match progress {
            Ok(SendProgress::Next(chunk)) => follow_ups.push(Message::FileTransferData(chunk)),
            Ok(SendProgress::Paused) => {}
            Ok(SendProgress::Complete) => {
                let Some(outgoing) = self.outgoing.take() else {
                    return;
                };
                if outgoing.kind == OutgoingKind::Upload {
                    events.push(DeviceEvent::UploadComplete {
                        file_index: outgoing.transfer.file_index(),
                    });
                    follow_ups.push(Message::SystemEvent(SystemEvent::new(
                        SystemEventType::SyncComplete,
                        0,
                    )));
                }
            }
            Err(e) => {
                if let Some(outgoing) = self.outgoing.take() {
                    events.push(aborted(outgoing.transfer.file_index(), &e));
                }
            }
        }
    }

    fn on_file_chunk(
        &mut self,
        chunk: &FileTransferData,
        events: &mut Vec<DeviceEvent>,
    ) -> Option<Response> {
        let Some(download) = self.download.as_mut() else {
            warn!(
                "file data at offset {} with no download in progress",
                chunk.data_offset
            );
            return Some(Response::ack_with(
                MESSAGE_FILE_TRANSFER_DATA,
                ResponseBody::FileTransferData {
                    response: TransferResponse::Abort,
                    next_data_offset: chunk.data_offset,
                },
            ));
        };
        let file_index = download.file_index();
        let reply = download.on_chunk(chunk);
        match reply.progress {
            DownloadProgress::Continue => {}
            DownloadProgress::Complete(data) => {
                self.download = None;
                events.push(completed_download(file_index, data));
            }
            DownloadProgress::Aborted(e) => {
                self.download = None;
                events.push(aborted(file_index, &e));
            }
        }
        Some(reply.response)
    }

    fn on_download_request(
        &mut self,
        request: &DownloadRequest,
        follow_ups: &mut Vec<Message>,
    ) -> Response {
        let refuse = |status| {
            Response::ack_with(
                MESSAGE_DOWNLOAD_REQUEST,
                ResponseBody::Download {
                    status,
                    max_file_size: 0,
                },
            )
        };
        if self.outgoing.is_some() {
            return refuse(DownloadStatus::NotReady);
        }
        let Some(data) = self.served_files.get(&request.file_index) else {
            return refuse(DownloadStatus::DataDoesNotExist);
        };

        let config = self.dispatcher.config();
        let (mut transfer, response) = TransferSession::serve_download(
            request,
            data.clone(),
            config.upload_chunk_size(),
            config.max_transfer_retries,
        );
        if transfer.state().is_terminal() {
            return response;
        }
        info!("serving file {}", request.file_index);
        if let Some(chunk) = transfer.next_chunk() {
            follow_ups.push(Message::FileTransferData(chunk));
            self.outgoing = Some(Outgoing {
                kind: OutgoingKind::Serve,
                transfer,
            });
        }
        response
    }

    fn on_payload_chunk(
        &mut self,
        type_code: u16,
        chunk: &ProtobufChunk,
        events: &mut Vec<DeviceEvent>,
    ) -> Response {
        let result = self.reassembly.accept_validated(chunk, self.decoder.as_ref());
        match &result {
            Ok(Reassembly::Complete(payload)) => events.push(DeviceEvent::StructuredPayload {
                request_id: chunk.request_id,
                payload: payload.clone(),
            }),
            Ok(Reassembly::Pending) => {}
            Err(e) => warn!("discarding payload chunk: {}", e),
        }
        chunk_status(type_code, chunk, &result)
    }

    // ------------------------------------------------------------------
    // Operations started by the application
    // ------------------------------------------------------------------

    /// Start downloading a file; returns the DOWNLOAD_REQUEST frame.
    pub fn download(&mut self, file_index: u16) -> Result<Vec<u8>, TransferError> {
        let transfer = TransferSession::download(file_index, self.config().max_transfer_retries);
        self.start_download(transfer)
    }

    /// Resume an interrupted download.
    pub fn resume_download(
        &mut self,
        checkpoint: TransferCheckpoint,
    ) -> Result<Vec<u8>, TransferError> {
        let transfer =
            TransferSession::resume_download(checkpoint, self.config().max_transfer_retries);
        self.start_download(transfer)
    }

    fn start_download(&mut self, transfer: TransferSession) -> Result<Vec<u8>, TransferError> {
        if let Some(current) = &self.download {
            return Err(busy(current, "download already in progress"));
        }
        let frame = self.encode(&Message::DownloadRequest(transfer.download_request()))?;
        self.download = Some(transfer);
        Ok(frame)
    }

    /// Where the current download would resume from.
    pub fn download_checkpoint(&self) -> Option<TransferCheckpoint> {
        self.download.as_ref().map(TransferSession::checkpoint)
    }

    /// Abandon the current download; returns the ABORT frame for the peer.
    pub fn abort_download(&mut self, reason: &str) -> Option<Vec<u8>> {
        let mut download = self.download.take()?;
        let response = download.abort(reason)?;
        self.encode(&Message::Response(response))
            .map_err(|e| error!("cannot encode abort: {}", e))
            .ok()
    }

    /// Start uploading a new file; returns the CREATE_FILE frame.
    pub fn upload(&mut self, file_type: FileType, data: Vec<u8>) -> Result<Vec<u8>, TransferError> {
        let config = self.config();
        let transfer = TransferSession::upload(
            file_type,
            data,
            config.upload_chunk_size(),
            config.max_transfer_retries,
        );
        let Some(request) = transfer.create_request() else {
            return Err(busy(&transfer, "upload without a file type"));
        };
        self.start_upload(transfer, Message::CreateFile(request))
    }

    /// Start overwriting an existing file; returns the UPLOAD_REQUEST frame.
    pub fn upload_existing(
        &mut self,
        file_index: u16,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, TransferError> {
        let config = self.config();
        let transfer = TransferSession::upload_existing(
            file_index,
            data,
            config.upload_chunk_size(),
            config.max_transfer_retries,
        );
        let request = Message::UploadRequest(transfer.upload_request());
        self.start_upload(transfer, request)
    }

    fn start_upload(
        &mut self,
        transfer: TransferSession,
        request: Message,
    ) -> Result<Vec<u8>, TransferError> {
        if let Some(current) = &self.outgoing {
            return Err(busy(&current.transfer, "outgoing transfer in progress"));
        }
        let frame = self.encode(&request)?;
        self.outgoing = Some(Outgoing {
            kind: OutgoingKind::Upload,
            transfer,
        });
        Ok(frame)
    }

    /// Continue a paused outgoing transfer; returns the next chunk frame.
    pub fn resume_upload(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        let Some(outgoing) = self.outgoing.as_mut() else {
            return Ok(None);
        };
        match outgoing.transfer.resume() {
            Some(chunk) => Ok(Some(self.encode(&Message::FileTransferData(chunk))?)),
            None => Ok(None),
        }
    }

    /// Abandon the current outgoing transfer.
    pub fn abort_upload(&mut self, reason: &str) {
        if let Some(mut outgoing) = self.outgoing.take() {
            outgoing.transfer.abort(reason);
        }
    }

    /// Offer `data` as file `file_index` to peers that request it.
    pub fn serve_file(&mut self, file_index: u16, data: Vec<u8>) {
        self.served_files.insert(file_index, data);
    }

    /// Start sending notification attribute data; returns the first block.
    pub fn send_notification_data(&mut self, data: Vec<u8>) -> Result<Vec<u8>, TransferError> {
        let mut upload = NotificationUpload::new(data, self.config().max_transfer_retries)?;
        let Some(block) = upload.next_block() else {
            return Err(TransferError::Rejected("empty notification data".to_string()));
        };
        let frame = self.encode(&Message::NotificationData(block))?;
        self.notification = Some(upload);
        Ok(frame)
    }

    /// Start sending a structured payload; returns the first chunk frame.
    pub fn send_payload(&mut self, kind: PayloadKind, data: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        check_payload_len(&data)?;
        let message = self.chunker.start(kind, data);
        self.encode(&message)
    }

    /// Answer a structured request under its own request id.
    pub fn respond_payload(&mut self, request_id: u16, data: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        check_payload_len(&data)?;
        let message = self
            .chunker
            .start_with_id(PayloadKind::Response, request_id, data);
        self.encode(&message)
    }
}

fn check_payload_len(data: &[u8]) -> Result<(), EncodeError> {
    if data.len() > u32::MAX as usize {
        return Err(EncodeError::OutOfRange {
            field: "payload length",
            value: data.len() as u64,
        });
    }
    Ok(())
}

fn busy(transfer: &TransferSession, message: &str) -> TransferError {
    TransferError::InvalidState {
        state: transfer.state().name(),
        message: message.to_string(),
    }
}

fn aborted(file_index: u16, error: &TransferError) -> DeviceEvent {
    DeviceEvent::TransferAborted {
        file_index,
        reason: error.to_string(),
    }
}

fn completed_download(file_index: u16, data: Vec<u8>) -> DeviceEvent {
    if file_index == 0 {
        match DirectoryEntry::parse_all(&data) {
            Ok(entries) => return DeviceEvent::DirectoryListing(entries),
            Err(e) => warn!("cannot parse directory: {}", e),
        }
    }
    DeviceEvent::DownloadComplete { file_index, data }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::checksum::crc16;
    use crate::registry;

    fn session() -> Session {
        Session::new(ProtocolConfig::default()).unwrap()
    }

    fn decode(frame: &[u8]) -> Message {
        let frame = FrameCodec::new(u16::MAX).decode(frame).unwrap();
        registry::decode(frame.type_code, &frame.payload).unwrap()
    }

    fn response_frame(response: Response) -> Vec<u8> {
        Message::Response(response).to_frame(&FrameCodec::default()).unwrap()
    }

    /// Relay frames between two sessions until both go quiet.
    fn pump(
        host: &mut Session,
        device: &mut Session,
        first: Vec<u8>,
    ) -> (Vec<DeviceEvent>, Vec<DeviceEvent>) {
        let mut queue = VecDeque::from([(true, first)]);
        let mut host_events = Vec::new();
        let mut device_events = Vec::new();
        while let Some((to_device, frame)) = queue.pop_front() {
            let (target, events) = if to_device {
                (&mut *device, &mut device_events)
            } else {
                (&mut *host, &mut host_events)
            };
            let output = target.handle_frame(&frame).unwrap();
            events.extend(output.events);
            queue.extend(output.frames.into_iter().map(|f| (!to_device, f)));
        }
        (host_events, device_events)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 13 % 256) as u8).collect()
    }

    #[test]
    fn test_download_between_sessions() {
        let mut host = session();
        let mut device = session();
        let data = sample(1000);
        device.serve_file(5, data.clone());

        let request = host.download(5).unwrap();
        assert!(matches!(host.download(6), Err(TransferError::InvalidState { .. })));
        let (host_events, _) = pump(&mut host, &mut device, request);
        assert_eq!(
            host_events,
            vec![DeviceEvent::DownloadComplete {
                file_index: 5,
                data
            }]
        );
        assert!(host.download_checkpoint().is_none());
    }

    #[test]
    fn test_download_of_missing_file_aborts() {
        let mut host = session();
        let mut device = session();
        let request = host.download(9).unwrap();
        let (host_events, _) = pump(&mut host, &mut device, request);
        assert!(matches!(
            host_events.as_slice(),
            [DeviceEvent::TransferAborted { file_index: 9, .. }]
        ));
    }

    #[test]
    fn test_directory_listing() {
        let mut directory = Vec::new();
        for (index, size) in [(1u16, 100u32), (2, 2048)] {
            directory.extend_from_slice(&index.to_le_bytes());
            directory.extend_from_slice(&[128, 4]);
            directory.extend_from_slice(&index.to_le_bytes());
            directory.extend_from_slice(&[0, 0]);
            directory.extend_from_slice(&size.to_le_bytes());
            directory.extend_from_slice(&0u32.to_le_bytes());
        }
        let mut host = session();
        let mut device = session();
        device.serve_file(0, directory);
        let request = host.download(0).unwrap();
        let (host_events, _) = pump(&mut host, &mut device, request);
        let [DeviceEvent::DirectoryListing(entries)] = host_events.as_slice() else {
            panic!("expected directory listing, got {host_events:?}");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].file_index, 2);
        assert_eq!(entries[1].file_size, 2048);
    }

    #[test]
    fn test_upload_completes_with_sync_event() {
        let mut host = session();
        let data = sample(40);
        let create = host.upload(FileType::new(128, 4), data.clone()).unwrap();
        assert!(matches!(decode(&create), Message::CreateFile(_)));

        let output = host
            .handle_frame(&response_frame(Response::ack_with(
                MESSAGE_CREATE_FILE,
                ResponseBody::CreateFile {
                    status: CreateFileStatus::Ok,
                    file_index: 7,
                    data_type: 128,
                    sub_type: 4,
                    file_number: 1,
                },
            )))
            .unwrap();
        let [upload_request] = output.frames.as_slice() else {
            panic!("expected one frame");
        };
        let Message::UploadRequest(request) = decode(upload_request) else {
            panic!("expected upload request");
        };
        assert_eq!(request.file_index, 7);
        assert_eq!(request.data_size, 40);

        let output = host
            .handle_frame(&response_frame(Response::ack_with(
                MESSAGE_UPLOAD_REQUEST,
                ResponseBody::Upload {
                    status: UploadStatus::Ok,
                    data_offset: 0,
                    max_file_size: 4096,
                    crc_seed: 0,
                },
            )))
            .unwrap();
        let Message::FileTransferData(chunk) = decode(&output.frames[0]) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.data, data);

        let output = host
            .handle_frame(&response_frame(Response::ack_with(
                MESSAGE_FILE_TRANSFER_DATA,
                ResponseBody::FileTransferData {
                    response: TransferResponse::TransferSuccessful,
                    next_data_offset: 40,
                },
            )))
            .unwrap();
        assert_eq!(output.events, vec![DeviceEvent::UploadComplete { file_index: 7 }]);
        assert_eq!(
            decode(&output.frames[0]),
            Message::SystemEvent(SystemEvent::new(SystemEventType::SyncComplete, 0))
        );
    }

    #[test]
    fn test_rejected_upload_aborts() {
        let mut host = session();
        host.upload(FileType::new(128, 4), sample(10)).unwrap();
        let output = host
            .handle_frame(&response_frame(Response::ack_with(
                MESSAGE_CREATE_FILE,
                ResponseBody::CreateFile {
                    status: CreateFileStatus::NoSpace,
                    file_index: 0,
                    data_type: 128,
                    sub_type: 4,
                    file_number: 0,
                },
            )))
            .unwrap();
        assert!(output.frames.is_empty());
        assert!(matches!(
            output.events.as_slice(),
            [DeviceEvent::TransferAborted { .. }]
        ));
        // The slot is free again.
        assert!(host.upload_existing(3, sample(10)).is_ok());
    }

    #[test]
    fn test_payload_reassembled_across_frames() {
        let mut host = session();
        let codec = FrameCodec::default();
        let first = Message::ProtobufRequest(ProtobufChunk {
            request_id: 4,
            data_offset: 0,
            total_length: 6,
            data: b"abc".to_vec(),
        });
        let second = Message::ProtobufRequest(ProtobufChunk {
            request_id: 4,
            data_offset: 3,
            total_length: 6,
            data: b"def".to_vec(),
        });

        let output = host.handle_frame(&first.to_frame(&codec).unwrap()).unwrap();
        assert!(output.events.is_empty());
        let Message::Response(reply) = decode(&output.frames[0]) else {
            panic!("expected status");
        };
        assert!(matches!(
            reply.body,
            ResponseBody::Protobuf {
                chunk_status: ProtobufChunkStatus::Kept,
                ..
            }
        ));

        let output = host.handle_frame(&second.to_frame(&codec).unwrap()).unwrap();
        assert_eq!(
            output.events,
            vec![DeviceEvent::StructuredPayload {
                request_id: 4,
                payload: b"abcdef".to_vec()
            }]
        );
    }

    #[test]
    fn test_duplicate_payload_chunk_discarded() {
        let mut host = session();
        let chunk = Message::ProtobufResponse(ProtobufChunk {
            request_id: 2,
            data_offset: 0,
            total_length: 10,
            data: b"abc".to_vec(),
        });
        let frame = chunk.to_frame(&FrameCodec::default()).unwrap();
        host.handle_frame(&frame).unwrap();
        let output = host.handle_frame(&frame).unwrap();
        let Message::Response(reply) = decode(&output.frames[0]) else {
            panic!("expected status");
        };
        assert_eq!(
            reply.body,
            ResponseBody::Protobuf {
                request_id: 2,
                data_offset: 0,
                chunk_status: ProtobufChunkStatus::Discarded,
                status_code: ProtobufStatusCode::DuplicatePacket,
            }
        );
    }

    #[test]
    fn test_payload_sent_between_sessions() {
        let mut host = session();
        let mut device = session();
        let payload = sample(1000);
        let first = host.send_payload(PayloadKind::Request, payload.clone()).unwrap();
        let (_, device_events) = pump(&mut host, &mut device, first);
        assert_eq!(
            device_events,
            vec![DeviceEvent::StructuredPayload {
                request_id: 1,
                payload
            }]
        );
    }

    #[test]
    fn test_device_information_adopts_packet_size() {
        let mut host = session();
        let info = DeviceInformation {
            protocol_version: 112,
            product_number: 2431,
            unit_number: 1,
            software_version: 1310,
            max_packet_size: 1024,
            bluetooth_name: "watch".to_string(),
            device_name: "watch".to_string(),
            device_model: "model".to_string(),
        };
        let frame = Message::DeviceInformation(info.clone())
            .to_frame(&FrameCodec::default())
            .unwrap();
        host.handle_frame(&frame).unwrap();
        assert_eq!(host.peer(), Some(&info));
        assert_eq!(host.codec().max_packet_size(), 1024);
        assert_eq!(host.config().upload_chunk_size(), 500);
    }

    #[test]
    fn test_notification_data_blocks() {
        let mut host = session();
        let data = sample(700);
        let first = host.send_notification_data(data.clone()).unwrap();
        let Message::NotificationData(block) = decode(&first) else {
            panic!("expected notification data");
        };
        assert_eq!(block.data.len(), NOTIFICATION_DATA_BLOCK_SIZE);

        let ok = response_frame(Response::ack_with(
            MESSAGE_NOTIFICATION_DATA,
            ResponseBody::NotificationData {
                response: TransferResponse::TransferSuccessful,
            },
        ));
        let output = host.handle_frame(&ok).unwrap();
        let Message::NotificationData(block) = decode(&output.frames[0]) else {
            panic!("expected second block");
        };
        assert_eq!(block.data_offset, 300);

        let output = host.handle_frame(&ok).unwrap();
        let Message::NotificationData(block) = decode(&output.frames[0]) else {
            panic!("expected last block");
        };
        assert_eq!(block.data, data[600..]);
        assert!(host.handle_frame(&ok).unwrap().frames.is_empty());
    }

    #[test]
    fn test_notification_resends_stop_at_retry_ceiling() {
        let mut host = session();
        let first = host.send_notification_data(sample(700)).unwrap();
        let crc_mismatch = response_frame(Response::ack_with(
            MESSAGE_NOTIFICATION_DATA,
            ResponseBody::NotificationData {
                response: TransferResponse::CrcMismatch,
            },
        ));
        for _ in 0..host.config().max_transfer_retries {
            let output = host.handle_frame(&crc_mismatch).unwrap();
            assert_eq!(output.frames, vec![first.clone()]);
        }
        assert!(host.handle_frame(&crc_mismatch).unwrap().frames.is_empty());
        assert!(host.handle_frame(&crc_mismatch).unwrap().frames.is_empty());
    }

    #[test]
    fn test_unsolicited_file_data_is_aborted() {
        let mut host = session();
        let chunk = Message::FileTransferData(FileTransferData {
            flags: 0,
            crc: crc16(0, b"stray"),
            data_offset: 40,
            data: b"stray".to_vec(),
        });
        let frame = host.encode(&chunk).unwrap();
        let output = host.handle_frame(&frame).unwrap();
        assert!(output.events.is_empty());
        let Message::Response(reply) = decode(&output.frames[0]) else {
            panic!("expected a response");
        };
        assert_eq!(reply.request_type, MESSAGE_FILE_TRANSFER_DATA);
        assert_eq!(
            reply.body,
            ResponseBody::FileTransferData {
                response: TransferResponse::Abort,
                next_data_offset: 40,
            }
        );
    }

    #[test]
    fn test_abort_download_answers_with_abort() {
        let mut host = session();
        host.download(3).unwrap();
        let frame = host.abort_download("user cancelled").unwrap();
        let Message::Response(response) = decode(&frame) else {
            panic!("expected response");
        };
        assert!(matches!(
            response.body,
            ResponseBody::FileTransferData {
                response: TransferResponse::Abort,
                ..
            }
        ));
        assert!(host.abort_download("again").is_none());
    }
}
