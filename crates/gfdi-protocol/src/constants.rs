//! Protocol constants
//!
//! These constants define the message type codes, status codes, and other
//! protocol-specific values used on the wire.

// ============================================================================
// Message Type Codes
// ============================================================================

/// Status/response wrapper. Payload starts with the original request's type.
pub const MESSAGE_RESPONSE: u16 = 5000;
/// Request a file (or the directory) from the device.
pub const MESSAGE_DOWNLOAD_REQUEST: u16 = 5002;
/// Announce an upload into an existing file slot.
pub const MESSAGE_UPLOAD_REQUEST: u16 = 5003;
/// One chunk of a file transfer, in either direction.
pub const MESSAGE_FILE_TRANSFER_DATA: u16 = 5004;
/// Ask the device to allocate a new file.
pub const MESSAGE_CREATE_FILE: u16 = 5005;
/// Change the flags of a file on the device (e.g. archive it).
pub const MESSAGE_SET_FILE_FLAGS: u16 = 5008;
/// FIT definition records.
pub const MESSAGE_FIT_DEFINITION: u16 = 5011;
/// FIT data records.
pub const MESSAGE_FIT_DATA: u16 = 5012;
/// Device asks for a weather forecast.
pub const MESSAGE_WEATHER_REQUEST: u16 = 5014;
/// Identity exchange. First message sent by the device.
pub const MESSAGE_DEVICE_INFORMATION: u16 = 5024;
/// Push a set of typed device settings.
pub const MESSAGE_DEVICE_SETTINGS: u16 = 5026;
/// One-way system event notice.
pub const MESSAGE_SYSTEM_EVENT: u16 = 5030;
/// Ask the device which file types it supports.
pub const MESSAGE_SUPPORTED_FILE_TYPES_REQUEST: u16 = 5031;
/// Push a notification add/modify/remove.
pub const MESSAGE_NOTIFICATION_UPDATE: u16 = 5033;
/// Device pulls attributes of a notification or performs an action on it.
pub const MESSAGE_NOTIFICATION_CONTROL: u16 = 5034;
/// Chunk of notification attribute data.
pub const MESSAGE_NOTIFICATION_DATA: u16 = 5035;
/// Device toggles the notification stream.
pub const MESSAGE_NOTIFICATION_SUBSCRIPTION: u16 = 5036;
/// Device announces that it has data ready to sync.
pub const MESSAGE_SYNCHRONIZATION: u16 = 5037;
/// Device asks the host to ring.
pub const MESSAGE_FIND_MY_PHONE_REQUEST: u16 = 5039;
/// Device cancels a find-my-phone request.
pub const MESSAGE_FIND_MY_PHONE_CANCEL: u16 = 5040;
/// Media button press.
pub const MESSAGE_MUSIC_CONTROL: u16 = 5041;
/// Device advertises the media commands it can send.
pub const MESSAGE_MUSIC_CONTROL_CAPABILITIES: u16 = 5042;
/// Oversized structured payload, request half.
pub const MESSAGE_PROTOBUF_REQUEST: u16 = 5043;
/// Oversized structured payload, response half.
pub const MESSAGE_PROTOBUF_RESPONSE: u16 = 5044;
/// Push now-playing information.
pub const MESSAGE_MUSIC_CONTROL_ENTITY_UPDATE: u16 = 5049;
/// Capability bit-set negotiation.
pub const MESSAGE_CONFIGURATION: u16 = 5050;
/// Device asks for the current time.
pub const MESSAGE_CURRENT_TIME_REQUEST: u16 = 5052;
/// Authentication negotiation.
pub const MESSAGE_AUTH_NEGOTIATION: u16 = 5101;

// ============================================================================
// Status Codes
// ============================================================================

/// Message accepted.
pub const STATUS_ACK: u8 = 0;
/// Message rejected.
pub const STATUS_NAK: u8 = 1;
/// Message type not supported by the receiver.
pub const STATUS_UNSUPPORTED: u8 = 2;
/// Payload could not be decoded.
pub const STATUS_DECODE_ERROR: u8 = 3;
/// Frame checksum mismatch.
pub const STATUS_CRC_ERROR: u8 = 4;
/// Frame length mismatch.
pub const STATUS_LENGTH_ERROR: u8 = 5;

// ============================================================================
// File Transfer Response Codes
// ============================================================================

/// Chunk stored.
pub const TRANSFER_OK: u8 = 0;
/// Sender should resend the last chunk.
pub const TRANSFER_RESEND: u8 = 1;
/// Receiver is abandoning the transfer.
pub const TRANSFER_ABORT: u8 = 2;
/// Chunk CRC did not match the running CRC.
pub const TRANSFER_CRC_ERROR: u8 = 3;
/// Chunk offset was not the expected next offset.
pub const TRANSFER_OFFSET_ERROR: u8 = 4;
/// Transfer paused by the device.
pub const TRANSFER_SYNC_PAUSED: u8 = 5;

// ============================================================================
// Download Request Kinds
// ============================================================================

/// Resume a previously interrupted download.
pub const REQUEST_KIND_CONTINUE: u8 = 0;
/// Start a download from offset zero.
pub const REQUEST_KIND_NEW: u8 = 1;

// ============================================================================
// Structured Payload Chunk Status
// ============================================================================

/// Chunk kept by the receiver.
pub const CHUNK_KEPT: u8 = 0;
/// Chunk discarded by the receiver.
pub const CHUNK_DISCARDED: u8 = 1;

// ============================================================================
// File Flags
// ============================================================================

/// Mark a file as archived so the device stops offering it for sync.
pub const FILE_FLAG_ARCHIVE: u8 = 0x10;

// ============================================================================
// Sizes
// ============================================================================

/// Bytes of framing around a payload: length (2) + type (2) + checksum (2).
pub const FRAME_OVERHEAD: usize = 6;
/// Bytes of a FILE_TRANSFER_DATA payload before the chunk data.
pub const FILE_TRANSFER_HEADER_SIZE: usize = 7;
/// Bytes of a PROTOBUF_* payload before the chunk data.
pub const PROTOBUF_HEADER_SIZE: usize = 14;
/// Size of one entry in the device's directory file.
pub const DIRECTORY_ENTRY_SIZE: usize = 16;
/// Default maximum packet size until the device reports its own.
pub const DEFAULT_MAX_PACKET_SIZE: u16 = 375;
/// Default chunk size for file uploads.
pub const DEFAULT_TRANSFER_CHUNK_SIZE: u32 = 500;
/// Default chunk size for outbound structured payloads.
pub const DEFAULT_PROTOBUF_CHUNK_SIZE: u32 = 375;
/// Block size for notification attribute uploads.
pub const NOTIFICATION_DATA_BLOCK_SIZE: usize = 300;
/// Longest string a length-prefixed field can hold.
pub const MAX_STRING_LEN: usize = 255;

// ============================================================================
// Time
// ============================================================================

/// Seconds between the unix epoch and the device epoch (1989-12-31T00:00:00Z).
pub const DEVICE_EPOCH_OFFSET: i64 = 631_065_600;
