//! Status/response messages.
//!
//! Every RESPONSE starts with the type code of the message it answers and a
//! [`Status`]. What follows depends on that type code; a response whose body
//! is absent, or which answers a type with no body layout, is a generic
//! status.

use crate::codec::{MessageReader, MessageWriter};
use crate::constants::*;
use crate::error::{DecodeError, EncodeError};
use crate::messages::{
    read_music_commands, write_capabilities, write_music_commands, DeviceInformation,
    WeatherRequest, WireMessage,
};
use crate::types::*;

/// One entry of a supported file types answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedFileType {
    /// Type pair.
    pub file_type: FileType,
    /// Human-readable name.
    pub name: String,
}

/// Type-specific part of a RESPONSE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// No body.
    Generic,
    /// Answer to DOWNLOAD_REQUEST.
    Download {
        /// Outcome.
        status: DownloadStatus,
        /// Size of the file.
        max_file_size: u32,
    },
    /// Answer to UPLOAD_REQUEST.
    Upload {
        /// Outcome.
        status: UploadStatus,
        /// Offset the device expects first.
        data_offset: u32,
        /// Space available for the file.
        max_file_size: u32,
        /// Running CRC at `data_offset`.
        crc_seed: u16,
    },
    /// Answer to CREATE_FILE.
    CreateFile {
        /// Outcome.
        status: CreateFileStatus,
        /// Index of the new file.
        file_index: u16,
        /// Data type.
        data_type: u8,
        /// Sub-type.
        sub_type: u8,
        /// File number.
        file_number: u16,
    },
    /// Answer to one FILE_TRANSFER_DATA chunk.
    FileTransferData {
        /// Chunk outcome.
        response: TransferResponse,
        /// Offset the receiver expects next.
        next_data_offset: u32,
    },
    /// Answer to one NOTIFICATION_DATA chunk.
    NotificationData {
        /// Chunk outcome.
        response: TransferResponse,
    },
    /// Answer to NOTIFICATION_SUBSCRIPTION.
    NotificationSubscription {
        /// Stream status.
        status: NotificationStatus,
        /// Echoed enable flag.
        enable: bool,
        /// Echoed unknown byte.
        unknown: u8,
    },
    /// Answer to one PROTOBUF_REQUEST/RESPONSE chunk.
    Protobuf {
        /// Request id of the chunk.
        request_id: u16,
        /// Offset of the chunk.
        data_offset: u32,
        /// Whether the chunk was kept.
        chunk_status: ProtobufChunkStatus,
        /// Detailed status.
        status_code: ProtobufStatusCode,
    },
    /// Answer to SUPPORTED_FILE_TYPES_REQUEST.
    SupportedFileTypes(Vec<SupportedFileType>),
    /// Answer to DEVICE_INFORMATION: the host's own identity.
    DeviceInformation {
        /// Host identity.
        identity: DeviceInformation,
        /// Host protocol flags.
        protocol_flags: u8,
    },
    /// Answer to CONFIGURATION: accepted capabilities.
    Configuration(Capabilities),
    /// Answer to AUTH_NEGOTIATION.
    AuthNegotiation {
        /// Outcome.
        status: AuthNegotiationStatus,
        /// Echoed unknown byte.
        unknown: u8,
        /// Accepted flags.
        auth_flags: u32,
    },
    /// Answer to CURRENT_TIME_REQUEST.
    CurrentTime {
        /// Echoed correlation id.
        reference_id: u32,
        /// Device-epoch timestamp.
        timestamp: u32,
        /// Offset from UTC in seconds.
        timezone_offset: i32,
        /// Next daylight saving end, device epoch.
        next_dst_end: u32,
        /// Next daylight saving start, device epoch.
        next_dst_start: u32,
    },
    /// Answer to WEATHER_REQUEST: echoed parameters.
    Weather(WeatherRequest),
    /// Answer to MUSIC_CONTROL_CAPABILITIES: host-supported commands.
    MusicControlCapabilities(Vec<MusicControlCommand>),
}

/// The RESPONSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Type code of the message answered.
    pub request_type: u16,
    /// Coarse outcome.
    pub status: Status,
    /// Type-specific body.
    pub body: ResponseBody,
}

impl Response {
    /// Create a response.
    pub fn new(request_type: u16, status: Status, body: ResponseBody) -> Self {
        Response {
            request_type,
            status,
            body,
        }
    }

    /// Bodiless response with the given status.
    pub fn status(request_type: u16, status: Status) -> Self {
        Response::new(request_type, status, ResponseBody::Generic)
    }

    /// Bodiless ACK.
    pub fn ack(request_type: u16) -> Self {
        Response::status(request_type, Status::Ack)
    }

    /// ACK with a body.
    pub fn ack_with(request_type: u16, body: ResponseBody) -> Self {
        Response::new(request_type, Status::Ack, body)
    }

    /// Whether the peer accepted the request.
    pub fn is_ack(&self) -> bool {
        self.status == Status::Ack
    }
}

impl WireMessage for Response {
    const TYPE_CODE: u16 = MESSAGE_RESPONSE;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let request_type = reader.read_u16()?;
        let status = Status::try_from(reader.read_u8()?)?;
        let body = if reader.is_empty() {
            ResponseBody::Generic
        } else {
            decode_body(request_type, reader)?
        };
        Ok(Response {
            request_type,
            status,
            body,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.request_type);
        writer.write_u8(self.status.into());
        encode_body(&self.body, writer)
    }
}

fn decode_body(
    request_type: u16,
    reader: &mut MessageReader<'_>,
) -> Result<ResponseBody, DecodeError> {
    let body = match request_type {
        MESSAGE_DOWNLOAD_REQUEST => ResponseBody::Download {
            status: DownloadStatus::from(reader.read_u8()?),
            max_file_size: reader.read_u32()?,
        },
        MESSAGE_UPLOAD_REQUEST => ResponseBody::Upload {
            status: UploadStatus::from(reader.read_u8()?),
            data_offset: reader.read_u32()?,
            max_file_size: reader.read_u32()?,
            crc_seed: reader.read_u16()?,
        },
        MESSAGE_CREATE_FILE => ResponseBody::CreateFile {
            status: CreateFileStatus::from(reader.read_u8()?),
            file_index: reader.read_u16()?,
            data_type: reader.read_u8()?,
            sub_type: reader.read_u8()?,
            file_number: reader.read_u16()?,
        },
        MESSAGE_FILE_TRANSFER_DATA => ResponseBody::FileTransferData {
            response: TransferResponse::from(reader.read_u8()?),
            next_data_offset: reader.read_u32()?,
        },
        MESSAGE_NOTIFICATION_DATA => ResponseBody::NotificationData {
            response: TransferResponse::from(reader.read_u8()?),
        },
        MESSAGE_NOTIFICATION_SUBSCRIPTION => ResponseBody::NotificationSubscription {
            status: NotificationStatus::from(reader.read_u8()?),
            enable: reader.read_bool()?,
            unknown: reader.read_u8()?,
        },
        MESSAGE_PROTOBUF_REQUEST | MESSAGE_PROTOBUF_RESPONSE => ResponseBody::Protobuf {
            request_id: reader.read_u16()?,
            data_offset: reader.read_u32()?,
            chunk_status: ProtobufChunkStatus::from(reader.read_u8()?),
            status_code: ProtobufStatusCode::from(reader.read_u8()?),
        },
        MESSAGE_SUPPORTED_FILE_TYPES_REQUEST => {
            let count = reader.read_u8()?;
            let mut types = Vec::with_capacity(count as usize);
            for _ in 0..count {
                types.push(SupportedFileType {
                    file_type: FileType::new(reader.read_u8()?, reader.read_u8()?),
                    name: reader.read_string()?,
                });
            }
            ResponseBody::SupportedFileTypes(types)
        }
        MESSAGE_DEVICE_INFORMATION => ResponseBody::DeviceInformation {
            identity: DeviceInformation::decode(reader)?,
            protocol_flags: reader.read_u8()?,
        },
        MESSAGE_CONFIGURATION => {
            let count = reader.read_u8()? as usize;
            ResponseBody::Configuration(Capabilities::new(reader.read_bytes(count)?))
        }
        MESSAGE_AUTH_NEGOTIATION => ResponseBody::AuthNegotiation {
            status: AuthNegotiationStatus::from(reader.read_u8()?),
            unknown: reader.read_u8()?,
            auth_flags: reader.read_u32()?,
        },
        MESSAGE_CURRENT_TIME_REQUEST => ResponseBody::CurrentTime {
            reference_id: reader.read_u32()?,
            timestamp: reader.read_u32()?,
            timezone_offset: reader.read_i32()?,
            next_dst_end: reader.read_u32()?,
            next_dst_start: reader.read_u32()?,
        },
        MESSAGE_WEATHER_REQUEST => ResponseBody::Weather(WeatherRequest::decode(reader)?),
        MESSAGE_MUSIC_CONTROL_CAPABILITIES => {
            ResponseBody::MusicControlCapabilities(read_music_commands(reader)?)
        }
        _ => ResponseBody::Generic,
    };
    Ok(body)
}

fn encode_body(body: &ResponseBody, writer: &mut MessageWriter) -> Result<(), EncodeError> {
    match body {
        ResponseBody::Generic => {}
        ResponseBody::Download {
            status,
            max_file_size,
        } => {
            writer.write_u8((*status).into());
            writer.write_u32(*max_file_size);
        }
        ResponseBody::Upload {
            status,
            data_offset,
            max_file_size,
            crc_seed,
        } => {
            writer.write_u8((*status).into());
            writer.write_u32(*data_offset);
            writer.write_u32(*max_file_size);
            writer.write_u16(*crc_seed);
        }
        ResponseBody::CreateFile {
            status,
            file_index,
            data_type,
            sub_type,
            file_number,
        } => {
            writer.write_u8((*status).into());
            writer.write_u16(*file_index);
            writer.write_u8(*data_type);
            writer.write_u8(*sub_type);
            writer.write_u16(*file_number);
        }
        ResponseBody::FileTransferData {
            response,
            next_data_offset,
        } => {
            writer.write_u8((*response).into());
            writer.write_u32(*next_data_offset);
        }
        ResponseBody::NotificationData { response } => writer.write_u8((*response).into()),
        ResponseBody::NotificationSubscription {
            status,
            enable,
            unknown,
        } => {
            writer.write_u8((*status).into());
            writer.write_bool(*enable);
            writer.write_u8(*unknown);
        }
        ResponseBody::Protobuf {
            request_id,
            data_offset,
            chunk_status,
            status_code,
        } => {
            writer.write_u16(*request_id);
            writer.write_u32(*data_offset);
            writer.write_u8((*chunk_status).into());
            writer.write_u8((*status_code).into());
        }
        ResponseBody::SupportedFileTypes(types) => {
            writer.write_count(types.len())?;
            for entry in types {
                writer.write_u8(entry.file_type.data_type);
                writer.write_u8(entry.file_type.sub_type);
                writer.write_string(&entry.name)?;
            }
        }
        ResponseBody::DeviceInformation {
            identity,
            protocol_flags,
        } => {
            identity.encode(writer)?;
            writer.write_u8(*protocol_flags);
        }
        ResponseBody::Configuration(capabilities) => write_capabilities(writer, capabilities)?,
        ResponseBody::AuthNegotiation {
            status,
            unknown,
            auth_flags,
        } => {
            writer.write_u8((*status).into());
            writer.write_u8(*unknown);
            writer.write_u32(*auth_flags);
        }
        ResponseBody::CurrentTime {
            reference_id,
            timestamp,
            timezone_offset,
            next_dst_end,
            next_dst_start,
        } => {
            writer.write_u32(*reference_id);
            writer.write_u32(*timestamp);
            writer.write_i32(*timezone_offset);
            writer.write_u32(*next_dst_end);
            writer.write_u32(*next_dst_start);
        }
        ResponseBody::Weather(request) => request.encode(writer)?,
        ResponseBody::MusicControlCapabilities(commands) => {
            write_music_commands(writer, commands)?
        }
    }
    Ok(())
}
