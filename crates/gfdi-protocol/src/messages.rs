//! Message catalog.
//!
//! Each message kind is a plain struct implementing [`WireMessage`], and
//! [`Message`] is the tagged union the dispatcher hands out. Replies live in
//! [`crate::Response`].

use log::warn;

use crate::codec::{MessageReader, MessageWriter};
use crate::constants::*;
use crate::error::{DecodeError, EncodeError};
use crate::frame::FrameCodec;
use crate::responses::Response;
use crate::types::*;

/// A message kind with a fixed type code and payload layout.
pub trait WireMessage: Sized {
    /// Type code in the frame header.
    const TYPE_CODE: u16;

    /// Decode the payload.
    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError>;

    /// Encode the payload.
    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError>;
}

// ============================================================================
// Identity and negotiation
// ============================================================================

/// Identity exchanged by both sides at connection start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformation {
    /// Protocol version spoken.
    pub protocol_version: u16,
    /// Product number.
    pub product_number: u16,
    /// Unit (serial) number.
    pub unit_number: u32,
    /// Software version, scaled by 100.
    pub software_version: u16,
    /// Largest frame the sender accepts.
    pub max_packet_size: u16,
    /// Radio name.
    pub bluetooth_name: String,
    /// Friendly device name.
    pub device_name: String,
    /// Model name.
    pub device_model: String,
}

impl WireMessage for DeviceInformation {
    const TYPE_CODE: u16 = MESSAGE_DEVICE_INFORMATION;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(DeviceInformation {
            protocol_version: reader.read_u16()?,
            product_number: reader.read_u16()?,
            unit_number: reader.read_u32()?,
            software_version: reader.read_u16()?,
            max_packet_size: reader.read_u16()?,
            bluetooth_name: reader.read_string()?,
            device_name: reader.read_string()?,
            device_model: reader.read_string()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.protocol_version);
        writer.write_u16(self.product_number);
        writer.write_u32(self.unit_number);
        writer.write_u16(self.software_version);
        writer.write_u16(self.max_packet_size);
        writer.write_string(&self.bluetooth_name)?;
        writer.write_string(&self.device_name)?;
        writer.write_string(&self.device_model)
    }
}

/// Capability bit-set declared by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Declared capabilities.
    pub capabilities: Capabilities,
}

impl WireMessage for Configuration {
    const TYPE_CODE: u16 = MESSAGE_CONFIGURATION;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u8()? as usize;
        Ok(Configuration {
            capabilities: Capabilities::new(reader.read_bytes(count)?),
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        write_capabilities(writer, &self.capabilities)
    }
}

pub(crate) fn write_capabilities(
    writer: &mut MessageWriter,
    capabilities: &Capabilities,
) -> Result<(), EncodeError> {
    writer.write_count(capabilities.as_bytes().len())?;
    writer.write_bytes(capabilities.as_bytes());
    Ok(())
}

/// Authentication negotiation offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthNegotiation {
    /// Leading byte of unknown meaning, echoed back.
    pub unknown: u8,
    /// Offered authentication flags.
    pub auth_flags: u32,
}

impl WireMessage for AuthNegotiation {
    const TYPE_CODE: u16 = MESSAGE_AUTH_NEGOTIATION;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(AuthNegotiation {
            unknown: reader.read_u8()?,
            auth_flags: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.unknown);
        writer.write_u32(self.auth_flags);
        Ok(())
    }
}

// ============================================================================
// Settings, time and system events
// ============================================================================

/// One-way push of typed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// Settings in wire order.
    pub settings: Vec<(DeviceSetting, SettingValue)>,
}

impl DeviceSettings {
    /// Create a settings push.
    pub fn new(settings: Vec<(DeviceSetting, SettingValue)>) -> Self {
        DeviceSettings { settings }
    }
}

impl WireMessage for DeviceSettings {
    const TYPE_CODE: u16 = MESSAGE_DEVICE_SETTINGS;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u8()?;
        let mut settings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let setting = DeviceSetting::from(reader.read_u8()?);
            let value = match reader.read_u8()? {
                1 => SettingValue::Boolean(reader.read_bool()?),
                4 => SettingValue::Integer(reader.read_u32()?),
                len => SettingValue::Text(reader.read_utf8(len as usize)?),
            };
            settings.push((setting, value));
        }
        Ok(DeviceSettings { settings })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        if self.settings.is_empty() {
            return Err(EncodeError::EmptySettings);
        }
        writer.write_count(self.settings.len())?;
        for (setting, value) in &self.settings {
            writer.write_u8((*setting).into());
            match value {
                SettingValue::Boolean(flag) => {
                    writer.write_u8(1);
                    writer.write_bool(*flag);
                }
                SettingValue::Integer(number) => {
                    writer.write_u8(4);
                    writer.write_u32(*number);
                }
                SettingValue::Text(text) => {
                    let len = text.len();
                    if len == 1 || len == 4 {
                        return Err(EncodeError::AmbiguousSettingString { len });
                    }
                    writer.write_string(text)?;
                }
            }
        }
        Ok(())
    }
}

/// One-way system event notice.
///
/// A one-byte value is an integer; anything longer is a length-prefixed
/// string. An empty string therefore reads back as `Integer(0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEvent {
    /// Event kind.
    pub event_type: SystemEventType,
    /// Event value.
    pub value: SystemEventValue,
}

impl SystemEvent {
    /// Create an event with an integer value.
    pub fn new(event_type: SystemEventType, value: u8) -> Self {
        SystemEvent {
            event_type,
            value: SystemEventValue::Integer(value),
        }
    }
}

impl WireMessage for SystemEvent {
    const TYPE_CODE: u16 = MESSAGE_SYSTEM_EVENT;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let event_type = SystemEventType::from(reader.read_u8()?);
        let value = if reader.remaining() == 1 {
            SystemEventValue::Integer(reader.read_u8()?)
        } else {
            SystemEventValue::Text(reader.read_string()?)
        };
        Ok(SystemEvent { event_type, value })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.event_type.into());
        match &self.value {
            SystemEventValue::Integer(value) => writer.write_u8(*value),
            SystemEventValue::Text(text) => writer.write_string(text)?,
        }
        Ok(())
    }
}

/// Device asks for the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTimeRequest {
    /// Correlation id echoed in the reply.
    pub reference_id: u32,
}

impl WireMessage for CurrentTimeRequest {
    const TYPE_CODE: u16 = MESSAGE_CURRENT_TIME_REQUEST;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(CurrentTimeRequest {
            reference_id: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u32(self.reference_id);
        Ok(())
    }
}

/// Device asks for a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherRequest {
    /// Requested unit format.
    pub format: u8,
    /// Latitude in semicircles.
    pub latitude: i32,
    /// Longitude in semicircles.
    pub longitude: i32,
    /// Forecast horizon.
    pub hours_of_forecast: u8,
}

impl WireMessage for WeatherRequest {
    const TYPE_CODE: u16 = MESSAGE_WEATHER_REQUEST;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(WeatherRequest {
            format: reader.read_u8()?,
            latitude: reader.read_i32()?,
            longitude: reader.read_i32()?,
            hours_of_forecast: reader.read_u8()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.format);
        writer.write_i32(self.latitude);
        writer.write_i32(self.longitude);
        writer.write_u8(self.hours_of_forecast);
        Ok(())
    }
}

/// Device announces data ready to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchronization {
    /// Sync kind.
    pub sync_type: u8,
    /// File-type bitmask, always encoded with 8 bytes.
    pub bitmask: u64,
}

impl Synchronization {
    /// Whether any file type bit is set.
    pub fn has_pending_files(&self) -> bool {
        self.bitmask != 0
    }
}

impl WireMessage for Synchronization {
    const TYPE_CODE: u16 = MESSAGE_SYNCHRONIZATION;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let sync_type = reader.read_u8()?;
        let bitmask = match reader.read_u8()? {
            4 => reader.read_u32()? as u64,
            8 => reader.read_u64()?,
            other => {
                return Err(DecodeError::Invalid(format!(
                    "unsupported bitmask size {other}"
                )))
            }
        };
        Ok(Synchronization { sync_type, bitmask })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.sync_type);
        writer.write_u8(8);
        writer.write_u64(self.bitmask);
        Ok(())
    }
}

// ============================================================================
// File lifecycle
// ============================================================================

/// Request a file from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRequest {
    /// File to fetch; 0 is the directory.
    pub file_index: u16,
    /// Offset to start at.
    pub data_offset: u32,
    /// Fresh start or resume.
    pub request_kind: RequestKind,
    /// Running CRC at `data_offset`.
    pub crc_seed: u16,
    /// Bytes requested; 0 means the whole file.
    pub data_size: u32,
}

impl DownloadRequest {
    /// Start a download of a whole file from offset zero.
    pub fn new(file_index: u16) -> Self {
        DownloadRequest {
            file_index,
            data_offset: 0,
            request_kind: RequestKind::New,
            crc_seed: 0,
            data_size: 0,
        }
    }
}

impl WireMessage for DownloadRequest {
    const TYPE_CODE: u16 = MESSAGE_DOWNLOAD_REQUEST;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(DownloadRequest {
            file_index: reader.read_u16()?,
            data_offset: reader.read_u32()?,
            request_kind: RequestKind::from(reader.read_u8()?),
            crc_seed: reader.read_u16()?,
            data_size: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.file_index);
        writer.write_u32(self.data_offset);
        writer.write_u8(self.request_kind.into());
        writer.write_u16(self.crc_seed);
        writer.write_u32(self.data_size);
        Ok(())
    }
}

/// Announce an upload into an existing file slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRequest {
    /// Destination file.
    pub file_index: u16,
    /// Total bytes to upload.
    pub data_size: u32,
    /// Offset to start at.
    pub data_offset: u32,
    /// Running CRC at `data_offset`.
    pub crc_seed: u16,
}

impl WireMessage for UploadRequest {
    const TYPE_CODE: u16 = MESSAGE_UPLOAD_REQUEST;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(UploadRequest {
            file_index: reader.read_u16()?,
            data_size: reader.read_u32()?,
            data_offset: reader.read_u32()?,
            crc_seed: reader.read_u16()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.file_index);
        writer.write_u32(self.data_size);
        writer.write_u32(self.data_offset);
        writer.write_u16(self.crc_seed);
        Ok(())
    }
}

/// Ask the device to allocate a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFile {
    /// Size of the file to create.
    pub file_size: u32,
    /// Data type.
    pub data_type: u8,
    /// Sub-type.
    pub sub_type: u8,
    /// Identifier chosen by the host.
    pub file_identifier: u16,
    /// Mask applied to the sub-type when matching.
    pub sub_type_mask: u8,
    /// Mask applied to the file number when matching.
    pub number_mask: u16,
    /// Random nonce.
    pub nonce: u64,
    /// Destination path, for file types that need one.
    pub path: Option<String>,
}

impl CreateFile {
    /// Create a request for a file of the given type.
    pub fn new(file_size: u32, file_type: FileType) -> Self {
        CreateFile {
            file_size,
            data_type: file_type.data_type,
            sub_type: file_type.sub_type,
            file_identifier: 0,
            sub_type_mask: 0xFF,
            number_mask: 0xFFFF,
            nonce: 0,
            path: None,
        }
    }
}

impl WireMessage for CreateFile {
    const TYPE_CODE: u16 = MESSAGE_CREATE_FILE;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let file_size = reader.read_u32()?;
        let data_type = reader.read_u8()?;
        let sub_type = reader.read_u8()?;
        let file_identifier = reader.read_u16()?;
        reader.read_u8()?;
        let sub_type_mask = reader.read_u8()?;
        let number_mask = reader.read_u16()?;
        reader.read_u16()?;
        let nonce = reader.read_u64()?;
        let path = if reader.is_empty() {
            None
        } else {
            Some(reader.read_string()?)
        };
        Ok(CreateFile {
            file_size,
            data_type,
            sub_type,
            file_identifier,
            sub_type_mask,
            number_mask,
            nonce,
            path,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u32(self.file_size);
        writer.write_u8(self.data_type);
        writer.write_u8(self.sub_type);
        writer.write_u16(self.file_identifier);
        writer.write_u8(0);
        writer.write_u8(self.sub_type_mask);
        writer.write_u16(self.number_mask);
        writer.write_u16(0);
        writer.write_u64(self.nonce);
        if let Some(path) = &self.path {
            writer.write_string(path)?;
        }
        Ok(())
    }
}

/// One chunk of a file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferData {
    /// Chunk flags.
    pub flags: u8,
    /// Running CRC after this chunk.
    pub crc: u16,
    /// Offset of the first byte of `data`.
    pub data_offset: u32,
    /// Chunk bytes.
    pub data: Vec<u8>,
}

impl WireMessage for FileTransferData {
    const TYPE_CODE: u16 = MESSAGE_FILE_TRANSFER_DATA;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(FileTransferData {
            flags: reader.read_u8()?,
            crc: reader.read_u16()?,
            data_offset: reader.read_u32()?,
            data: reader.read_rest(),
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.flags);
        writer.write_u16(self.crc);
        writer.write_u32(self.data_offset);
        writer.write_bytes(&self.data);
        Ok(())
    }
}

/// Change the flags of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetFileFlags {
    /// File to change.
    pub file_index: u16,
    /// New flags.
    pub flags: u8,
}

impl SetFileFlags {
    /// Archive a file so the device stops offering it.
    pub fn archive(file_index: u16) -> Self {
        SetFileFlags {
            file_index,
            flags: FILE_FLAG_ARCHIVE,
        }
    }
}

impl WireMessage for SetFileFlags {
    const TYPE_CODE: u16 = MESSAGE_SET_FILE_FLAGS;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(SetFileFlags {
            file_index: reader.read_u16()?,
            flags: reader.read_u8()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.file_index);
        writer.write_u8(self.flags);
        Ok(())
    }
}

/// Ask the device which file types it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportedFileTypesRequest;

impl WireMessage for SupportedFileTypesRequest {
    const TYPE_CODE: u16 = MESSAGE_SUPPORTED_FILE_TYPES_REQUEST;

    fn decode(_reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(SupportedFileTypesRequest)
    }

    fn encode(&self, _writer: &mut MessageWriter) -> Result<(), EncodeError> {
        Ok(())
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Push a notification change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationUpdate {
    /// Change kind.
    pub update_type: NotificationUpdateType,
    /// Category flags (silent, important, ...).
    pub category_flags: u8,
    /// Category.
    pub category: NotificationCategory,
    /// Number of notifications in this category.
    pub count: u8,
    /// Notification id.
    pub notification_id: u32,
    /// Host-specific flags.
    pub phone_flags: u8,
}

impl WireMessage for NotificationUpdate {
    const TYPE_CODE: u16 = MESSAGE_NOTIFICATION_UPDATE;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(NotificationUpdate {
            update_type: NotificationUpdateType::from(reader.read_u8()?),
            category_flags: reader.read_u8()?,
            category: NotificationCategory::from(reader.read_u8()?),
            count: reader.read_u8()?,
            notification_id: reader.read_u32()?,
            phone_flags: reader.read_u8()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.update_type.into());
        writer.write_u8(self.category_flags);
        writer.write_u8(self.category.into());
        writer.write_u8(self.count);
        writer.write_u32(self.notification_id);
        writer.write_u8(self.phone_flags);
        Ok(())
    }
}

/// One attribute requested by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRequest {
    /// Attribute wanted.
    pub attribute: NotificationAttribute,
    /// Longest value the device accepts, for attributes that carry one.
    pub max_length: Option<u16>,
    /// Extra option byte, for actions.
    pub option: Option<u8>,
}

impl AttributeRequest {
    /// Request an attribute, filling the wire extras it needs.
    pub fn new(attribute: NotificationAttribute, max_length: u16) -> Self {
        AttributeRequest {
            attribute,
            max_length: attribute.has_max_length().then_some(max_length),
            option: attribute.has_option_byte().then_some(0),
        }
    }
}

/// Body of a notification control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationControlCommand {
    /// Fetch attributes of the notification.
    GetAttributes(Vec<AttributeRequest>),
    /// Fetch attributes of an application.
    GetAppAttributes {
        /// Application identifier.
        app_identifier: String,
    },
    /// Accept or refuse, older devices.
    LegacyAction(LegacyNotificationAction),
    /// Perform an advertised action.
    Action {
        /// Action chosen.
        action: NotificationAction,
        /// Reply text, empty when not applicable.
        text: String,
    },
}

impl NotificationControlCommand {
    fn code(&self) -> NotificationCommand {
        match self {
            NotificationControlCommand::GetAttributes(_) => {
                NotificationCommand::GetNotificationAttributes
            }
            NotificationControlCommand::GetAppAttributes { .. } => {
                NotificationCommand::GetAppAttributes
            }
            NotificationControlCommand::LegacyAction(_) => {
                NotificationCommand::PerformLegacyNotificationAction
            }
            NotificationControlCommand::Action { .. } => {
                NotificationCommand::PerformNotificationAction
            }
        }
    }
}

/// Device pulls attributes of a notification or acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationControl {
    /// Notification concerned.
    pub notification_id: u32,
    /// What the device wants.
    pub command: NotificationControlCommand,
}

impl WireMessage for NotificationControl {
    const TYPE_CODE: u16 = MESSAGE_NOTIFICATION_CONTROL;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let code = NotificationCommand::from(reader.read_u8()?);
        let notification_id = reader.read_u32()?;
        let command = match code {
            NotificationCommand::GetNotificationAttributes => {
                let mut attributes = Vec::new();
                while !reader.is_empty() {
                    let raw = reader.read_u8()?;
                    let attribute = NotificationAttribute::from(raw);
                    if !attribute.is_known() {
                        return Err(DecodeError::unknown("notification attribute", raw));
                    }
                    let max_length = if attribute.has_max_length() {
                        Some(reader.read_u16()?)
                    } else {
                        None
                    };
                    let option = if attribute.has_option_byte() {
                        Some(reader.read_u8()?)
                    } else {
                        None
                    };
                    attributes.push(AttributeRequest {
                        attribute,
                        max_length,
                        option,
                    });
                }
                NotificationControlCommand::GetAttributes(attributes)
            }
            NotificationCommand::GetAppAttributes => NotificationControlCommand::GetAppAttributes {
                app_identifier: reader.read_string()?,
            },
            NotificationCommand::PerformLegacyNotificationAction => {
                NotificationControlCommand::LegacyAction(LegacyNotificationAction::from(
                    reader.read_u8()?,
                ))
            }
            NotificationCommand::PerformNotificationAction => {
                let action = NotificationAction::from(reader.read_u8()?);
                let text = if reader.is_empty() {
                    String::new()
                } else {
                    reader.read_string()?
                };
                NotificationControlCommand::Action { action, text }
            }
            NotificationCommand::Unknown(raw) => {
                return Err(DecodeError::unknown("notification command", raw))
            }
        };
        Ok(NotificationControl {
            notification_id,
            command,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.command.code().into());
        writer.write_u32(self.notification_id);
        match &self.command {
            NotificationControlCommand::GetAttributes(attributes) => {
                for request in attributes {
                    writer.write_u8(request.attribute.into());
                    if request.attribute.has_max_length() {
                        writer.write_u16(request.max_length.unwrap_or(0));
                    }
                    if request.attribute.has_option_byte() {
                        writer.write_u8(request.option.unwrap_or(0));
                    }
                }
            }
            NotificationControlCommand::GetAppAttributes { app_identifier } => {
                writer.write_string(app_identifier)?;
            }
            NotificationControlCommand::LegacyAction(action) => writer.write_u8((*action).into()),
            NotificationControlCommand::Action { action, text } => {
                writer.write_u8((*action).into());
                writer.write_string(text)?;
            }
        }
        Ok(())
    }
}

/// Chunk of notification attribute data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationData {
    /// Total size of the attribute data.
    pub data_size: u16,
    /// Running CRC after this chunk.
    pub crc: u16,
    /// Offset of the first byte of `data`.
    pub data_offset: u16,
    /// Chunk bytes.
    pub data: Vec<u8>,
}

impl WireMessage for NotificationData {
    const TYPE_CODE: u16 = MESSAGE_NOTIFICATION_DATA;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(NotificationData {
            data_size: reader.read_u16()?,
            crc: reader.read_u16()?,
            data_offset: reader.read_u16()?,
            data: reader.read_rest(),
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.data_size);
        writer.write_u16(self.crc);
        writer.write_u16(self.data_offset);
        writer.write_bytes(&self.data);
        Ok(())
    }
}

/// Device toggles the notification stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSubscription {
    /// Whether the device wants notifications.
    pub enable: bool,
    /// Byte of unknown meaning, echoed back.
    pub unknown: u8,
}

impl WireMessage for NotificationSubscription {
    const TYPE_CODE: u16 = MESSAGE_NOTIFICATION_SUBSCRIPTION;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(NotificationSubscription {
            enable: reader.read_bool()?,
            unknown: reader.read_u8()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_bool(self.enable);
        writer.write_u8(self.unknown);
        Ok(())
    }
}

// ============================================================================
// Find my phone and media
// ============================================================================

/// Device asks the host to ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindMyPhoneRequest {
    /// Ring duration in seconds.
    pub duration: u16,
}

impl WireMessage for FindMyPhoneRequest {
    const TYPE_CODE: u16 = MESSAGE_FIND_MY_PHONE_REQUEST;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(FindMyPhoneRequest {
            duration: reader.read_u16()?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u16(self.duration);
        Ok(())
    }
}

/// Device cancels a find-my-phone request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindMyPhoneCancel;

impl WireMessage for FindMyPhoneCancel {
    const TYPE_CODE: u16 = MESSAGE_FIND_MY_PHONE_CANCEL;

    fn decode(_reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(FindMyPhoneCancel)
    }

    fn encode(&self, _writer: &mut MessageWriter) -> Result<(), EncodeError> {
        Ok(())
    }
}

/// Media button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicControl {
    /// Button pressed.
    pub command: MusicControlCommand,
}

impl WireMessage for MusicControl {
    const TYPE_CODE: u16 = MESSAGE_MUSIC_CONTROL;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(MusicControl {
            command: MusicControlCommand::from(reader.read_u8()?),
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        writer.write_u8(self.command.into());
        Ok(())
    }
}

/// Media commands a side can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicControlCapabilities {
    /// Supported commands.
    pub commands: Vec<MusicControlCommand>,
}

impl WireMessage for MusicControlCapabilities {
    const TYPE_CODE: u16 = MESSAGE_MUSIC_CONTROL_CAPABILITIES;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        Ok(MusicControlCapabilities {
            commands: read_music_commands(reader)?,
        })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        write_music_commands(writer, &self.commands)
    }
}

pub(crate) fn read_music_commands(
    reader: &mut MessageReader<'_>,
) -> Result<Vec<MusicControlCommand>, DecodeError> {
    let count = reader.read_u8()? as usize;
    Ok(reader
        .read_bytes(count)?
        .into_iter()
        .map(MusicControlCommand::from)
        .collect())
}

pub(crate) fn write_music_commands(
    writer: &mut MessageWriter,
    commands: &[MusicControlCommand],
) -> Result<(), EncodeError> {
    writer.write_count(commands.len())?;
    for command in commands {
        writer.write_u8((*command).into());
    }
    Ok(())
}

/// One now-playing attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicEntityAttribute {
    /// Entity the attribute belongs to.
    pub entity: MusicEntity,
    /// Attribute code within the entity.
    pub attribute: u8,
    /// Update flags.
    pub flags: u8,
    /// Attribute value.
    pub value: String,
}

impl MusicEntityAttribute {
    /// A player attribute.
    pub fn player(attribute: PlayerAttribute, value: impl Into<String>) -> Self {
        MusicEntityAttribute {
            entity: MusicEntity::Player,
            attribute: attribute.into(),
            flags: 0,
            value: value.into(),
        }
    }

    /// A track attribute.
    pub fn track(attribute: TrackAttribute, value: impl Into<String>) -> Self {
        MusicEntityAttribute {
            entity: MusicEntity::Track,
            attribute: attribute.into(),
            flags: 0,
            value: value.into(),
        }
    }
}

/// Push now-playing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicControlEntityUpdate {
    /// Attributes in wire order.
    pub attributes: Vec<MusicEntityAttribute>,
}

impl WireMessage for MusicControlEntityUpdate {
    const TYPE_CODE: u16 = MESSAGE_MUSIC_CONTROL_ENTITY_UPDATE;

    fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let mut attributes = Vec::new();
        while !reader.is_empty() {
            attributes.push(MusicEntityAttribute {
                entity: MusicEntity::from(reader.read_u8()?),
                attribute: reader.read_u8()?,
                flags: reader.read_u8()?,
                value: reader.read_string()?,
            });
        }
        Ok(MusicControlEntityUpdate { attributes })
    }

    fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        for attribute in &self.attributes {
            writer.write_u8(attribute.entity.into());
            writer.write_u8(attribute.attribute);
            writer.write_u8(attribute.flags);
            writer.write_string(&attribute.value)?;
        }
        Ok(())
    }
}

// ============================================================================
// Oversized structured payloads
// ============================================================================

/// One chunk of an oversized structured payload.
///
/// Shared by the request and response halves of the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtobufChunk {
    /// Request id keying the reassembly.
    pub request_id: u16,
    /// Offset of the first byte of `data`.
    pub data_offset: u32,
    /// Length of the whole payload.
    pub total_length: u32,
    /// Chunk bytes.
    pub data: Vec<u8>,
}

impl ProtobufChunk {
    /// Decode a chunk.
    pub fn decode(reader: &mut MessageReader<'_>) -> Result<Self, DecodeError> {
        let request_id = reader.read_u16()?;
        let data_offset = reader.read_u32()?;
        let total_length = reader.read_u32()?;
        let chunk_length = reader.read_u32()? as usize;
        Ok(ProtobufChunk {
            request_id,
            data_offset,
            total_length,
            data: reader.read_bytes(chunk_length)?,
        })
    }

    /// Encode a chunk.
    pub fn encode(&self, writer: &mut MessageWriter) -> Result<(), EncodeError> {
        let chunk_length = u32::try_from(self.data.len()).map_err(|_| EncodeError::OutOfRange {
            field: "chunk_length",
            value: self.data.len() as u64,
        })?;
        writer.write_u16(self.request_id);
        writer.write_u32(self.data_offset);
        writer.write_u32(self.total_length);
        writer.write_u32(chunk_length);
        writer.write_bytes(&self.data);
        Ok(())
    }

    /// Whether this single chunk carries the whole payload.
    pub fn is_complete(&self) -> bool {
        self.data_offset == 0 && self.total_length as usize == self.data.len()
    }
}

// ============================================================================
// Message union
// ============================================================================

/// A decoded message of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Status/response wrapper.
    Response(Response),
    /// Download request.
    DownloadRequest(DownloadRequest),
    /// Upload request.
    UploadRequest(UploadRequest),
    /// File transfer chunk.
    FileTransferData(FileTransferData),
    /// File creation request.
    CreateFile(CreateFile),
    /// File flag change.
    SetFileFlags(SetFileFlags),
    /// FIT definition records, opaque.
    FitDefinition(Vec<u8>),
    /// FIT data records, opaque.
    FitData(Vec<u8>),
    /// Forecast request.
    WeatherRequest(WeatherRequest),
    /// Identity exchange.
    DeviceInformation(DeviceInformation),
    /// Settings push.
    DeviceSettings(DeviceSettings),
    /// System event.
    SystemEvent(SystemEvent),
    /// Supported file types request.
    SupportedFileTypesRequest(SupportedFileTypesRequest),
    /// Notification change.
    NotificationUpdate(NotificationUpdate),
    /// Notification attribute pull or action.
    NotificationControl(NotificationControl),
    /// Notification attribute chunk.
    NotificationData(NotificationData),
    /// Notification stream toggle.
    NotificationSubscription(NotificationSubscription),
    /// Sync announcement.
    Synchronization(Synchronization),
    /// Find-my-phone start.
    FindMyPhoneRequest(FindMyPhoneRequest),
    /// Find-my-phone stop.
    FindMyPhoneCancel(FindMyPhoneCancel),
    /// Media button press.
    MusicControl(MusicControl),
    /// Media capability advertisement.
    MusicControlCapabilities(MusicControlCapabilities),
    /// Oversized payload chunk, request half.
    ProtobufRequest(ProtobufChunk),
    /// Oversized payload chunk, response half.
    ProtobufResponse(ProtobufChunk),
    /// Now-playing update.
    MusicControlEntityUpdate(MusicControlEntityUpdate),
    /// Capability negotiation.
    Configuration(Configuration),
    /// Current time request.
    CurrentTimeRequest(CurrentTimeRequest),
    /// Authentication negotiation.
    AuthNegotiation(AuthNegotiation),
    /// A type code with no registered decoder.
    Unhandled {
        /// Type code received.
        type_code: u16,
        /// Raw payload.
        payload: Vec<u8>,
    },
}

macro_rules! impl_from_message {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for Message {
                fn from(value: $variant) -> Self {
                    Message::$variant(value)
                }
            }
        )+
    };
}

impl_from_message!(
    Response,
    DownloadRequest,
    UploadRequest,
    FileTransferData,
    CreateFile,
    SetFileFlags,
    WeatherRequest,
    DeviceInformation,
    DeviceSettings,
    SystemEvent,
    SupportedFileTypesRequest,
    NotificationUpdate,
    NotificationControl,
    NotificationData,
    NotificationSubscription,
    Synchronization,
    FindMyPhoneRequest,
    FindMyPhoneCancel,
    MusicControl,
    MusicControlCapabilities,
    MusicControlEntityUpdate,
    Configuration,
    CurrentTimeRequest,
    AuthNegotiation,
);

impl Message {
    /// Type code this message travels under.
    pub fn type_code(&self) -> u16 {
        match self {
            Message::Response(_) => MESSAGE_RESPONSE,
            Message::DownloadRequest(_) => MESSAGE_DOWNLOAD_REQUEST,
            Message::UploadRequest(_) => MESSAGE_UPLOAD_REQUEST,
            Message::FileTransferData(_) => MESSAGE_FILE_TRANSFER_DATA,
            Message::CreateFile(_) => MESSAGE_CREATE_FILE,
            Message::SetFileFlags(_) => MESSAGE_SET_FILE_FLAGS,
            Message::FitDefinition(_) => MESSAGE_FIT_DEFINITION,
            Message::FitData(_) => MESSAGE_FIT_DATA,
            Message::WeatherRequest(_) => MESSAGE_WEATHER_REQUEST,
            Message::DeviceInformation(_) => MESSAGE_DEVICE_INFORMATION,
            Message::DeviceSettings(_) => MESSAGE_DEVICE_SETTINGS,
            Message::SystemEvent(_) => MESSAGE_SYSTEM_EVENT,
            Message::SupportedFileTypesRequest(_) => MESSAGE_SUPPORTED_FILE_TYPES_REQUEST,
            Message::NotificationUpdate(_) => MESSAGE_NOTIFICATION_UPDATE,
            Message::NotificationControl(_) => MESSAGE_NOTIFICATION_CONTROL,
            Message::NotificationData(_) => MESSAGE_NOTIFICATION_DATA,
            Message::NotificationSubscription(_) => MESSAGE_NOTIFICATION_SUBSCRIPTION,
            Message::Synchronization(_) => MESSAGE_SYNCHRONIZATION,
            Message::FindMyPhoneRequest(_) => MESSAGE_FIND_MY_PHONE_REQUEST,
            Message::FindMyPhoneCancel(_) => MESSAGE_FIND_MY_PHONE_CANCEL,
            Message::MusicControl(_) => MESSAGE_MUSIC_CONTROL,
            Message::MusicControlCapabilities(_) => MESSAGE_MUSIC_CONTROL_CAPABILITIES,
            Message::ProtobufRequest(_) => MESSAGE_PROTOBUF_REQUEST,
            Message::ProtobufResponse(_) => MESSAGE_PROTOBUF_RESPONSE,
            Message::MusicControlEntityUpdate(_) => MESSAGE_MUSIC_CONTROL_ENTITY_UPDATE,
            Message::Configuration(_) => MESSAGE_CONFIGURATION,
            Message::CurrentTimeRequest(_) => MESSAGE_CURRENT_TIME_REQUEST,
            Message::AuthNegotiation(_) => MESSAGE_AUTH_NEGOTIATION,
            Message::Unhandled { type_code, .. } => *type_code,
        }
    }

    /// Encode the payload (without framing).
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut writer = MessageWriter::new();
        match self {
            Message::Response(m) => m.encode(&mut writer)?,
            Message::DownloadRequest(m) => m.encode(&mut writer)?,
            Message::UploadRequest(m) => m.encode(&mut writer)?,
            Message::FileTransferData(m) => m.encode(&mut writer)?,
            Message::CreateFile(m) => m.encode(&mut writer)?,
            Message::SetFileFlags(m) => m.encode(&mut writer)?,
            Message::FitDefinition(bytes) | Message::FitData(bytes) => writer.write_bytes(bytes),
            Message::WeatherRequest(m) => m.encode(&mut writer)?,
            Message::DeviceInformation(m) => m.encode(&mut writer)?,
            Message::DeviceSettings(m) => m.encode(&mut writer)?,
            Message::SystemEvent(m) => m.encode(&mut writer)?,
            Message::SupportedFileTypesRequest(m) => m.encode(&mut writer)?,
            Message::NotificationUpdate(m) => m.encode(&mut writer)?,
            Message::NotificationControl(m) => m.encode(&mut writer)?,
            Message::NotificationData(m) => m.encode(&mut writer)?,
            Message::NotificationSubscription(m) => m.encode(&mut writer)?,
            Message::Synchronization(m) => m.encode(&mut writer)?,
            Message::FindMyPhoneRequest(m) => m.encode(&mut writer)?,
            Message::FindMyPhoneCancel(m) => m.encode(&mut writer)?,
            Message::MusicControl(m) => m.encode(&mut writer)?,
            Message::MusicControlCapabilities(m) => m.encode(&mut writer)?,
            Message::ProtobufRequest(m) | Message::ProtobufResponse(m) => m.encode(&mut writer)?,
            Message::MusicControlEntityUpdate(m) => m.encode(&mut writer)?,
            Message::Configuration(m) => m.encode(&mut writer)?,
            Message::CurrentTimeRequest(m) => m.encode(&mut writer)?,
            Message::AuthNegotiation(m) => m.encode(&mut writer)?,
            Message::Unhandled { payload, .. } => writer.write_bytes(payload),
        }
        Ok(writer.into_bytes())
    }

    /// Encode and frame the message.
    pub fn to_frame(&self, codec: &FrameCodec) -> Result<Vec<u8>, EncodeError> {
        codec.encode(self.type_code(), &self.encode()?)
    }
}

/// Decode a payload as `T`, warning about bytes the decoder left unread.
pub fn decode_payload<T: WireMessage>(payload: &[u8]) -> Result<T, DecodeError> {
    let mut reader = MessageReader::new(payload);
    let message = T::decode(&mut reader)?;
    warn_if_leftover(T::TYPE_CODE, &reader);
    Ok(message)
}

/// Log unread bytes left by a decoder. Never an error.
pub fn warn_if_leftover(type_code: u16, reader: &MessageReader<'_>) {
    if !reader.is_empty() {
        warn!(
            "{} leftover bytes when parsing message type {}: {:02x?}",
            reader.remaining(),
            type_code,
            reader.peek_rest()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::ResponseBody;

    fn round_trip(message: Message) {
        let payload = message.encode().unwrap();
        let decoded = crate::registry::decode(message.type_code(), &payload).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_settings_golden_payload() {
        let settings = DeviceSettings::new(vec![(
            DeviceSetting::DeviceName,
            SettingValue::Text("EN_US".to_string()),
        )]);
        let payload = Message::from(settings).encode().unwrap();
        assert_eq!(payload, vec![0x01, 0x00, 0x05, b'E', b'N', b'_', b'U', b'S']);
    }

    #[test]
    fn test_settings_typed_values() {
        let settings = DeviceSettings::new(vec![
            (DeviceSetting::AutoUploadEnabled, SettingValue::Boolean(true)),
            (DeviceSetting::TzOffset, SettingValue::Integer(3600)),
            (DeviceSetting::DeviceName, SettingValue::Text("watch".into())),
        ]);
        let payload = Message::from(settings.clone()).encode().unwrap();
        assert_eq!(&payload[..4], &[3, 6, 1, 1]);
        assert_eq!(&payload[4..10], &[3, 4, 0x10, 0x0E, 0, 0]);
        round_trip(settings.into());
    }

    #[test]
    fn test_settings_rejected_before_encoding() {
        assert_eq!(
            Message::from(DeviceSettings::new(vec![])).encode(),
            Err(EncodeError::EmptySettings)
        );

        let many = vec![(DeviceSetting::DeviceName, SettingValue::Boolean(true)); 256];
        assert!(matches!(
            Message::from(DeviceSettings::new(many)).encode(),
            Err(EncodeError::TooManyEntries { count: 256, .. })
        ));

        let ambiguous = vec![(DeviceSetting::DeviceName, SettingValue::Text("abcd".into()))];
        assert_eq!(
            Message::from(DeviceSettings::new(ambiguous)).encode(),
            Err(EncodeError::AmbiguousSettingString { len: 4 })
        );
    }

    #[test]
    fn test_system_event_values() {
        let event = SystemEvent::new(SystemEventType::SyncComplete, 0);
        assert_eq!(Message::from(event.clone()).encode().unwrap(), vec![0, 0]);
        round_trip(event.into());

        round_trip(
            SystemEvent {
                event_type: SystemEventType::PairStart,
                value: SystemEventValue::Text("host".into()),
            }
            .into(),
        );
    }

    #[test]
    fn test_notification_control_attributes() {
        let payload = [
            0x00, 0x2A, 0x00, 0x00, 0x00, // get attributes, id 42
            0x00, // app identifier
            0x01, 0x20, 0x00, // title, max 32
            0x7F, 0x10, 0x00, 0x01, // actions, max 16, option 1
        ];
        let decoded: NotificationControl = decode_payload(&payload).unwrap();
        assert_eq!(decoded.notification_id, 42);
        let NotificationControlCommand::GetAttributes(attributes) = &decoded.command else {
            panic!("expected attribute request");
        };
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].max_length, None);
        assert_eq!(attributes[1].max_length, Some(32));
        assert_eq!(attributes[2].option, Some(1));
        round_trip(decoded.into());
    }

    #[test]
    fn test_notification_control_unknown_attribute_fails() {
        let payload = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x20, 0x00, 0x06];
        assert_eq!(
            decode_payload::<NotificationControl>(&payload),
            Err(DecodeError::unknown("notification attribute", 6u8))
        );
    }

    #[test]
    fn test_notification_action() {
        round_trip(
            NotificationControl {
                notification_id: 7,
                command: NotificationControlCommand::Action {
                    action: NotificationAction::ReplyMessages,
                    text: "on my way".into(),
                },
            }
            .into(),
        );
        round_trip(
            NotificationControl {
                notification_id: 7,
                command: NotificationControlCommand::LegacyAction(LegacyNotificationAction::Refuse),
            }
            .into(),
        );
    }

    #[test]
    fn test_synchronization_bitmask_sizes() {
        let short = [0x00, 0x04, 0x08, 0x00, 0x00, 0x00];
        let decoded: Synchronization = decode_payload(&short).unwrap();
        assert_eq!(decoded.bitmask, 8);
        assert!(decoded.has_pending_files());
        assert_eq!(Message::from(decoded).encode().unwrap().len(), 10);

        assert!(matches!(
            decode_payload::<Synchronization>(&[0x00, 0x03, 0, 0, 0]),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn test_create_file_optional_path() {
        let mut create = CreateFile::new(1024, FileType::new(255, 17));
        round_trip(create.clone().into());
        create.path = Some("/GARMIN/Courses/route.fit".into());
        round_trip(create.into());
    }

    #[test]
    fn test_protobuf_chunk_bounds() {
        let chunk = ProtobufChunk {
            request_id: 3,
            data_offset: 0,
            total_length: 4,
            data: vec![1, 2, 3, 4],
        };
        assert!(chunk.is_complete());
        round_trip(Message::ProtobufRequest(chunk.clone()));

        let mut payload = Message::ProtobufResponse(chunk).encode().unwrap();
        payload.truncate(payload.len() - 1);
        assert!(matches!(
            ProtobufChunk::decode(&mut MessageReader::new(&payload)),
            Err(DecodeError::Truncated { needed: 4, remaining: 3 })
        ));
    }

    #[test]
    fn test_music_messages() {
        round_trip(
            MusicControlEntityUpdate {
                attributes: vec![
                    MusicEntityAttribute::track(TrackAttribute::Title, "Song"),
                    MusicEntityAttribute::player(PlayerAttribute::Volume, "0.50"),
                ],
            }
            .into(),
        );
        round_trip(
            MusicControlCapabilities {
                commands: MusicControlCommand::KNOWN.to_vec(),
            }
            .into(),
        );
    }

    #[test]
    fn test_device_information_round_trip() {
        round_trip(
            DeviceInformation {
                protocol_version: 112,
                product_number: 3869,
                unit_number: 0xDEADBEEF,
                software_version: 1109,
                max_packet_size: 375,
                bluetooth_name: "Forerunner 255".into(),
                device_name: "fr255".into(),
                device_model: "Forerunner 255".into(),
            }
            .into(),
        );
    }

    fn one_of_each() -> Vec<Message> {
        vec![
            Message::Response(Response::ack_with(
                MESSAGE_DOWNLOAD_REQUEST,
                ResponseBody::Download {
                    status: DownloadStatus::Ok,
                    max_file_size: 2048,
                },
            )),
            DownloadRequest::new(0).into(),
            UploadRequest {
                file_index: 0x0102,
                data_size: 4096,
                data_offset: 512,
                crc_seed: 0xBEEF,
            }
            .into(),
            FileTransferData {
                flags: 0,
                crc: 0x1234,
                data_offset: 300,
                data: vec![9, 8, 7],
            }
            .into(),
            CreateFile::new(1024, FileType::new(128, 4)).into(),
            SetFileFlags {
                file_index: 7,
                flags: 0x10,
            }
            .into(),
            Message::FitDefinition(vec![0x40, 0x00, 0x01]),
            Message::FitData(vec![0x00, 0x05, 0x06]),
            WeatherRequest {
                format: 0,
                latitude: 537_000_000,
                longitude: -1_000_000,
                hours_of_forecast: 12,
            }
            .into(),
            DeviceInformation {
                protocol_version: 150,
                product_number: 4315,
                unit_number: 3_900_000_001,
                software_version: 1096,
                max_packet_size: 375,
                bluetooth_name: "Venu 3".into(),
                device_name: "venu3".into(),
                device_model: "Venu 3".into(),
            }
            .into(),
            DeviceSettings::new(vec![(DeviceSetting::AutoUploadEnabled, SettingValue::Boolean(true))])
                .into(),
            SystemEvent::new(SystemEventType::SyncReady, 1).into(),
            SupportedFileTypesRequest.into(),
            NotificationUpdate {
                update_type: NotificationUpdateType::Modify,
                category_flags: 0x02,
                category: NotificationCategory::MissedCall,
                count: 3,
                notification_id: 0x01020304,
                phone_flags: 0x01,
            }
            .into(),
            NotificationControl {
                notification_id: 19,
                command: NotificationControlCommand::GetAppAttributes {
                    app_identifier: "com.example.chat".into(),
                },
            }
            .into(),
            NotificationData {
                data_size: 3,
                crc: 0x4444,
                data_offset: 0,
                data: vec![1, 2, 3],
            }
            .into(),
            NotificationSubscription {
                enable: true,
                unknown: 5,
            }
            .into(),
            Synchronization {
                sync_type: 1,
                bitmask: 1 << 40,
            }
            .into(),
            FindMyPhoneRequest { duration: 60 }.into(),
            FindMyPhoneCancel.into(),
            MusicControl {
                command: MusicControlCommand::SkipToNextItem,
            }
            .into(),
            MusicControlCapabilities {
                commands: vec![MusicControlCommand::TogglePlayPause],
            }
            .into(),
            Message::ProtobufRequest(ProtobufChunk {
                request_id: 1,
                data_offset: 0,
                total_length: 2,
                data: vec![0x08, 0x01],
            }),
            Message::ProtobufResponse(ProtobufChunk {
                request_id: 2,
                data_offset: 2,
                total_length: 6,
                data: vec![0x10, 0x02],
            }),
            MusicControlEntityUpdate {
                attributes: vec![MusicEntityAttribute::track(TrackAttribute::Artist, "Band")],
            }
            .into(),
            Configuration {
                capabilities: Capabilities::new(vec![0xFF, 0x01, 0x80]),
            }
            .into(),
            CurrentTimeRequest { reference_id: 77 }.into(),
            AuthNegotiation {
                unknown: 0,
                auth_flags: 0x0000_0003,
            }
            .into(),
        ]
    }

    #[test]
    fn test_every_registered_message_round_trips() {
        let messages = one_of_each();
        let covered: std::collections::BTreeSet<u16> =
            messages.iter().map(Message::type_code).collect();
        let registered: std::collections::BTreeSet<u16> = crate::registry::REGISTRY
            .iter()
            .map(|registration| registration.type_code)
            .collect();
        assert_eq!(covered, registered);

        for message in messages {
            round_trip(message);
        }
    }
}
