//! Static table from type code to decoder.

use crate::codec::MessageReader;
use crate::constants::*;
use crate::error::DecodeError;
use crate::messages::*;
use crate::responses::Response;

/// Decoder signature stored in the table.
pub type DecodeFn = fn(&mut MessageReader<'_>) -> Result<Message, DecodeError>;

/// One registered message kind.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Type code.
    pub type_code: u16,
    /// Name used in diagnostics.
    pub name: &'static str,
    /// Payload decoder.
    pub decode: DecodeFn,
}

fn decode_as<T: WireMessage + Into<Message>>(
    reader: &mut MessageReader<'_>,
) -> Result<Message, DecodeError> {
    T::decode(reader).map(Into::into)
}

fn decode_protobuf_request(reader: &mut MessageReader<'_>) -> Result<Message, DecodeError> {
    ProtobufChunk::decode(reader).map(Message::ProtobufRequest)
}

fn decode_protobuf_response(reader: &mut MessageReader<'_>) -> Result<Message, DecodeError> {
    ProtobufChunk::decode(reader).map(Message::ProtobufResponse)
}

fn decode_fit_definition(reader: &mut MessageReader<'_>) -> Result<Message, DecodeError> {
    Ok(Message::FitDefinition(reader.read_rest()))
}

fn decode_fit_data(reader: &mut MessageReader<'_>) -> Result<Message, DecodeError> {
    Ok(Message::FitData(reader.read_rest()))
}

const fn entry(type_code: u16, name: &'static str, decode: DecodeFn) -> Registration {
    Registration {
        type_code,
        name,
        decode,
    }
}

/// Every message kind this implementation decodes, sorted by type code.
pub static REGISTRY: &[Registration] = &[
    entry(MESSAGE_RESPONSE, "RESPONSE", decode_as::<Response>),
    entry(MESSAGE_DOWNLOAD_REQUEST, "DOWNLOAD_REQUEST", decode_as::<DownloadRequest>),
    entry(MESSAGE_UPLOAD_REQUEST, "UPLOAD_REQUEST", decode_as::<UploadRequest>),
    entry(MESSAGE_FILE_TRANSFER_DATA, "FILE_TRANSFER_DATA", decode_as::<FileTransferData>),
    entry(MESSAGE_CREATE_FILE, "CREATE_FILE", decode_as::<CreateFile>),
    entry(MESSAGE_SET_FILE_FLAGS, "SET_FILE_FLAGS", decode_as::<SetFileFlags>),
    entry(MESSAGE_FIT_DEFINITION, "FIT_DEFINITION", decode_fit_definition),
    entry(MESSAGE_FIT_DATA, "FIT_DATA", decode_fit_data),
    entry(MESSAGE_WEATHER_REQUEST, "WEATHER_REQUEST", decode_as::<WeatherRequest>),
    entry(MESSAGE_DEVICE_INFORMATION, "DEVICE_INFORMATION", decode_as::<DeviceInformation>),
    entry(MESSAGE_DEVICE_SETTINGS, "DEVICE_SETTINGS", decode_as::<DeviceSettings>),
    entry(MESSAGE_SYSTEM_EVENT, "SYSTEM_EVENT", decode_as::<SystemEvent>),
    entry(
        MESSAGE_SUPPORTED_FILE_TYPES_REQUEST,
        "SUPPORTED_FILE_TYPES_REQUEST",
        decode_as::<SupportedFileTypesRequest>,
    ),
    entry(MESSAGE_NOTIFICATION_UPDATE, "NOTIFICATION_UPDATE", decode_as::<NotificationUpdate>),
    entry(
        MESSAGE_NOTIFICATION_CONTROL,
        "NOTIFICATION_CONTROL",
        decode_as::<NotificationControl>,
    ),
    entry(MESSAGE_NOTIFICATION_DATA, "NOTIFICATION_DATA", decode_as::<NotificationData>),
    entry(
        MESSAGE_NOTIFICATION_SUBSCRIPTION,
        "NOTIFICATION_SUBSCRIPTION",
        decode_as::<NotificationSubscription>,
    ),
    entry(MESSAGE_SYNCHRONIZATION, "SYNCHRONIZATION", decode_as::<Synchronization>),
    entry(
        MESSAGE_FIND_MY_PHONE_REQUEST,
        "FIND_MY_PHONE_REQUEST",
        decode_as::<FindMyPhoneRequest>,
    ),
    entry(
        MESSAGE_FIND_MY_PHONE_CANCEL,
        "FIND_MY_PHONE_CANCEL",
        decode_as::<FindMyPhoneCancel>,
    ),
    entry(MESSAGE_MUSIC_CONTROL, "MUSIC_CONTROL", decode_as::<MusicControl>),
    entry(
        MESSAGE_MUSIC_CONTROL_CAPABILITIES,
        "MUSIC_CONTROL_CAPABILITIES",
        decode_as::<MusicControlCapabilities>,
    ),
    entry(MESSAGE_PROTOBUF_REQUEST, "PROTOBUF_REQUEST", decode_protobuf_request),
    entry(MESSAGE_PROTOBUF_RESPONSE, "PROTOBUF_RESPONSE", decode_protobuf_response),
    entry(
        MESSAGE_MUSIC_CONTROL_ENTITY_UPDATE,
        "MUSIC_CONTROL_ENTITY_UPDATE",
        decode_as::<MusicControlEntityUpdate>,
    ),
    entry(MESSAGE_CONFIGURATION, "CONFIGURATION", decode_as::<Configuration>),
    entry(
        MESSAGE_CURRENT_TIME_REQUEST,
        "CURRENT_TIME_REQUEST",
        decode_as::<CurrentTimeRequest>,
    ),
    entry(MESSAGE_AUTH_NEGOTIATION, "AUTH_NEGOTIATION", decode_as::<AuthNegotiation>),
];

/// Find the registration for a type code.
pub fn lookup(type_code: u16) -> Option<&'static Registration> {
    REGISTRY
        .binary_search_by_key(&type_code, |r| r.type_code)
        .ok()
        .map(|index| &REGISTRY[index])
}

/// Diagnostic name of a type code.
pub fn name_of(type_code: u16) -> &'static str {
    lookup(type_code).map(|r| r.name).unwrap_or("UNKNOWN")
}

/// Decode a payload by type code.
///
/// Unregistered codes yield [`Message::Unhandled`] carrying the raw payload.
/// Leftover bytes are logged, never rejected.
pub fn decode(type_code: u16, payload: &[u8]) -> Result<Message, DecodeError> {
    let Some(registration) = lookup(type_code) else {
        return Ok(Message::Unhandled {
            type_code,
            payload: payload.to_vec(),
        });
    };
    let mut reader = MessageReader::new(payload);
    let message = (registration.decode)(&mut reader)?;
    warn_if_leftover(type_code, &reader);
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_sorted_and_unique() {
        for pair in REGISTRY.windows(2) {
            assert!(pair[0].type_code < pair[1].type_code);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(MESSAGE_SYSTEM_EVENT).map(|r| r.name), Some("SYSTEM_EVENT"));
        assert!(lookup(5001).is_none());
        assert_eq!(name_of(5001), "UNKNOWN");
    }

    #[test]
    fn test_unregistered_code_is_unhandled() {
        let message = decode(4999, &[1, 2, 3]).unwrap();
        assert_eq!(
            message,
            Message::Unhandled {
                type_code: 4999,
                payload: vec![1, 2, 3]
            }
        );
        assert_eq!(message.type_code(), 4999);
    }

    #[test]
    fn test_leftover_bytes_tolerated() {
        let message = decode(MESSAGE_FIND_MY_PHONE_REQUEST, &[0x3C, 0x00, 0xFF]).unwrap();
        assert_eq!(
            message,
            Message::FindMyPhoneRequest(FindMyPhoneRequest { duration: 60 })
        );
    }

    #[test]
    fn test_registered_codes_match_messages() {
        // Every registered decoder yields a message that reports its own code.
        let samples: &[(u16, &[u8])] = &[
            (MESSAGE_FIND_MY_PHONE_CANCEL, &[]),
            (MESSAGE_FIT_DATA, &[1, 2]),
            (MESSAGE_MUSIC_CONTROL, &[0]),
            (MESSAGE_CURRENT_TIME_REQUEST, &[1, 0, 0, 0]),
        ];
        for (code, payload) in samples {
            assert_eq!(decode(*code, payload).unwrap().type_code(), *code);
        }
    }
}
