//! Per-session protocol configuration.
//!
//! Nothing here is global: each [`crate::Session`] owns one
//! [`ProtocolConfig`] and updates its packet size from what the peer reports.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::messages::DeviceInformation;
use crate::types::{Capabilities, MusicControlCommand};

/// Identity the host reports in its DEVICE_INFORMATION answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostIdentity {
    /// Protocol version spoken.
    pub protocol_version: u16,
    /// Product number.
    pub product_number: u16,
    /// Unit number.
    pub unit_number: u32,
    /// Software version, scaled by 100.
    pub software_version: u16,
    /// Largest frame the host accepts.
    pub max_packet_size: u16,
    /// Radio name.
    pub bluetooth_name: String,
    /// Manufacturer, sent in the device name slot.
    pub manufacturer: String,
    /// Model name.
    pub device_model: String,
    /// Protocol flags appended to the answer.
    pub protocol_flags: u8,
}

impl Default for HostIdentity {
    fn default() -> Self {
        HostIdentity {
            protocol_version: 150,
            product_number: 0xFFFF,
            unit_number: 0xFFFF_FFFF,
            software_version: 7791,
            max_packet_size: 0xFFFF,
            bluetooth_name: "gfdi".to_string(),
            manufacturer: "gfdi-protocol".to_string(),
            device_model: "host".to_string(),
            protocol_flags: 0,
        }
    }
}

impl HostIdentity {
    /// Identity in the DEVICE_INFORMATION wire shape.
    pub fn to_device_information(&self) -> DeviceInformation {
        DeviceInformation {
            protocol_version: self.protocol_version,
            product_number: self.product_number,
            unit_number: self.unit_number,
            software_version: self.software_version,
            max_packet_size: self.max_packet_size,
            bluetooth_name: self.bluetooth_name.clone(),
            device_name: self.manufacturer.clone(),
            device_model: self.device_model.clone(),
        }
    }
}

/// Explicit configuration of one protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Largest outbound frame until the peer reports its own limit.
    pub max_packet_size: u16,
    /// Preferred chunk size for file uploads.
    pub transfer_chunk_size: u32,
    /// Preferred chunk size for outbound structured payloads.
    pub protobuf_chunk_size: u32,
    /// Consecutive resend/mismatch cycles tolerated before aborting.
    pub max_transfer_retries: u32,
    /// Concurrently tracked reassemblies; the oldest is evicted beyond this.
    pub max_reassembly_entries: usize,
    /// Largest structured payload accepted for reassembly.
    pub max_protobuf_length: u32,
    /// Identity sent in answer to DEVICE_INFORMATION.
    pub host: HostIdentity,
    /// Capabilities accepted in CONFIGURATION. `None` echoes the peer's set.
    pub capabilities: Option<Capabilities>,
    /// Media commands advertised by the host.
    pub music_commands: Vec<MusicControlCommand>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            transfer_chunk_size: DEFAULT_TRANSFER_CHUNK_SIZE,
            protobuf_chunk_size: DEFAULT_PROTOBUF_CHUNK_SIZE,
            max_transfer_retries: 5,
            max_reassembly_entries: 16,
            max_protobuf_length: 1024 * 1024,
            host: HostIdentity::default(),
            capabilities: None,
            music_commands: MusicControlCommand::KNOWN.to_vec(),
        }
    }
}

impl ProtocolConfig {
    /// Check that the values leave room for at least one byte per chunk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_packet = FRAME_OVERHEAD + PROTOBUF_HEADER_SIZE + 1;
        if (self.max_packet_size as usize) < min_packet {
            return Err(ConfigError::InvalidValue {
                field: "max_packet_size",
                reason: format!("must be at least {min_packet}"),
            });
        }
        if self.transfer_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer_chunk_size",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.protobuf_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protobuf_chunk_size",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.max_reassembly_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_reassembly_entries",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Upload chunk size that fits in one frame.
    pub fn upload_chunk_size(&self) -> usize {
        let fits = (self.max_packet_size as usize)
            .saturating_sub(FRAME_OVERHEAD + FILE_TRANSFER_HEADER_SIZE)
            .max(1);
        (self.transfer_chunk_size as usize).min(fits)
    }

    /// Structured payload chunk size that fits in one frame.
    pub fn protobuf_chunk_size(&self) -> usize {
        let fits = (self.max_packet_size as usize)
            .saturating_sub(FRAME_OVERHEAD + PROTOBUF_HEADER_SIZE)
            .max(1);
        (self.protobuf_chunk_size as usize).min(fits)
    }
}
