//! Common types used in the protocol.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::DecodeError;

/// Define a one-byte coded enum with an `Unknown(u8)` fallback.
///
/// Generates `From<u8>`, `From<Enum> for u8`, serde support through the raw
/// code, and a `KNOWN` table listing every named variant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "u8", into = "u8")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Code not known to this implementation.
            Unknown(u8),
        }

        impl $name {
            /// Every named variant, in code order.
            pub const KNOWN: &'static [$name] = &[$( $name::$variant ),+];

            /// Whether this is a named variant.
            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Unknown(_))
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $( $code => $name::$variant, )+
                    other => $name::Unknown(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $code, )+
                    $name::Unknown(v) => v,
                }
            }
        }
    };
}

/// Coarse outcome carried by every RESPONSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Accepted.
    Ack,
    /// Rejected.
    Nak,
    /// Message type not supported.
    Unsupported,
    /// Payload could not be decoded.
    DecodeError,
    /// Frame checksum mismatch.
    CrcError,
    /// Frame length mismatch.
    LengthError,
}

impl TryFrom<u8> for Status {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            STATUS_ACK => Ok(Status::Ack),
            STATUS_NAK => Ok(Status::Nak),
            STATUS_UNSUPPORTED => Ok(Status::Unsupported),
            STATUS_DECODE_ERROR => Ok(Status::DecodeError),
            STATUS_CRC_ERROR => Ok(Status::CrcError),
            STATUS_LENGTH_ERROR => Ok(Status::LengthError),
            other => Err(DecodeError::unknown("status", other)),
        }
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        match value {
            Status::Ack => STATUS_ACK,
            Status::Nak => STATUS_NAK,
            Status::Unsupported => STATUS_UNSUPPORTED,
            Status::DecodeError => STATUS_DECODE_ERROR,
            Status::CrcError => STATUS_CRC_ERROR,
            Status::LengthError => STATUS_LENGTH_ERROR,
        }
    }
}

impl Status {
    /// Every status, in code order.
    pub const ALL: [Status; 6] = [
        Status::Ack,
        Status::Nak,
        Status::Unsupported,
        Status::DecodeError,
        Status::CrcError,
        Status::LengthError,
    ];
}

wire_enum! {
    /// How a download request positions itself.
    pub enum RequestKind {
        /// Resume at the given offset and CRC seed.
        Continue = 0,
        /// Start over from offset zero.
        New = 1,
    }
}

wire_enum! {
    /// Device answer to a download request.
    pub enum DownloadStatus {
        /// Transfer will follow.
        Ok = 0,
        /// No such file.
        DataDoesNotExist = 1,
        /// File exists but cannot be read.
        ExistsButNotDownloadable = 2,
        /// Device busy.
        NotReady = 3,
        /// Malformed request.
        RequestInvalid = 4,
        /// Resume CRC seed does not match.
        CrcIncorrect = 5,
        /// Requested range beyond the end of the file.
        ExceedsFileSize = 6,
    }
}

wire_enum! {
    /// Device answer to an upload request.
    pub enum UploadStatus {
        /// Device ready for data.
        Ok = 0,
        /// No file at that index.
        IndexUnknown = 1,
        /// File exists but is read-only.
        IndexNotWriteable = 2,
        /// Not enough storage.
        NoSpaceLeft = 3,
        /// Malformed request.
        Invalid = 4,
        /// Device busy.
        NotReady = 5,
        /// Resume CRC seed does not match.
        CrcIncorrect = 6,
    }
}

wire_enum! {
    /// Device answer to a file creation request.
    pub enum CreateFileStatus {
        /// File allocated.
        Ok = 0,
        /// A file with this identity already exists.
        Duplicate = 1,
        /// Not enough storage.
        NoSpace = 2,
        /// File type not supported.
        Unsupported = 3,
        /// No free file slots.
        NoSlots = 4,
        /// No room left for this file type.
        NoSpaceForType = 5,
    }
}

wire_enum! {
    /// Per-chunk answer in a file transfer.
    pub enum TransferResponse {
        /// Chunk stored.
        TransferSuccessful = 0,
        /// Resend the last chunk.
        ResendLastPacket = 1,
        /// Abandon the transfer.
        Abort = 2,
        /// Chunk CRC did not match.
        CrcMismatch = 3,
        /// Chunk offset was not the expected one.
        OffsetMismatch = 4,
        /// Device paused the sync.
        SilentSyncPaused = 5,
    }
}

wire_enum! {
    /// Whether the receiver kept an oversized-payload chunk.
    pub enum ProtobufChunkStatus {
        /// Chunk kept.
        Kept = 0,
        /// Chunk discarded.
        Discarded = 1,
    }
}

wire_enum! {
    /// Detailed status of an oversized-payload chunk.
    pub enum ProtobufStatusCode {
        /// Chunk accepted.
        NoError = 0,
        /// No reassembly in progress for the request id.
        UnknownRequestId = 100,
        /// Chunk overlaps data already received.
        DuplicatePacket = 101,
        /// Data missing at completion.
        MissingPacket = 102,
        /// Chunk runs past the declared total length.
        ExceededTotalProtobufLength = 103,
        /// Assembled payload failed to parse.
        ProtobufParseError = 200,
        /// Parsed payload carried an unknown message.
        UnknownProtobufMessage = 201,
    }
}

wire_enum! {
    /// Kind of a one-way system event.
    pub enum SystemEventType {
        /// Sync finished.
        SyncComplete = 0,
        /// Sync failed.
        SyncFail = 1,
        /// Device is being reset.
        FactoryReset = 2,
        /// Pairing started.
        PairStart = 3,
        /// Pairing finished.
        PairComplete = 4,
        /// Pairing failed.
        PairFail = 5,
        /// Host application moved to the foreground.
        HostDidEnterForeground = 6,
        /// Host application moved to the background.
        HostDidEnterBackground = 7,
        /// Host ready to sync.
        SyncReady = 8,
        /// New data available for download.
        NewDownloadAvailable = 9,
        /// Firmware update pending.
        DeviceSoftwareUpdate = 10,
        /// Device is disconnecting.
        DeviceDisconnect = 11,
        /// Tutorial finished.
        TutorialComplete = 12,
        /// Setup wizard started.
        SetupWizardStart = 13,
        /// Setup wizard finished.
        SetupWizardComplete = 14,
        /// Setup wizard skipped.
        SetupWizardSkipped = 15,
        /// Device clock changed.
        TimeUpdated = 16,
    }
}

/// Value carried by a system event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEventValue {
    /// Length-prefixed string.
    Text(String),
    /// Single byte.
    Integer(u8),
}

impl Default for SystemEventValue {
    fn default() -> Self {
        SystemEventValue::Integer(0)
    }
}

wire_enum! {
    /// Identifier of a pushable device setting.
    pub enum DeviceSetting {
        /// Host-visible device name.
        DeviceName = 0,
        /// Current time.
        CurrentTime = 1,
        /// Daylight saving offset.
        DstOffset = 2,
        /// Time zone offset.
        TzOffset = 3,
        /// Next daylight saving start.
        NextDstStart = 4,
        /// Next daylight saving end.
        NextDstEnd = 5,
        /// Automatic activity upload.
        AutoUploadEnabled = 6,
        /// Weather conditions on the device.
        WeatherConditionsEnabled = 7,
        /// Weather alerts on the device.
        WeatherAlertsEnabled = 8,
    }
}

/// Typed value of a device setting.
///
/// On the wire each value is preceded by a size byte: 1 means boolean, 4 means
/// integer, anything else is string length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// UTF-8 string.
    Text(String),
    /// 4-byte integer.
    Integer(u32),
    /// 1-byte boolean.
    Boolean(bool),
}

wire_enum! {
    /// Change kind in a notification update.
    pub enum NotificationUpdateType {
        /// Notification posted.
        Add = 0,
        /// Notification changed.
        Modify = 1,
        /// Notification removed.
        Remove = 2,
    }
}

wire_enum! {
    /// Category of a notification.
    pub enum NotificationCategory {
        /// Anything else.
        Other = 0,
        /// Ringing call.
        IncomingCall = 1,
        /// Missed call.
        MissedCall = 2,
        /// Voicemail.
        Voicemail = 3,
        /// Social network.
        Social = 4,
        /// Calendar.
        Schedule = 5,
        /// Email.
        Email = 6,
        /// News.
        News = 7,
        /// Health and fitness.
        HealthAndFitness = 8,
        /// Business and finance.
        BusinessAndFinance = 9,
        /// Location.
        Location = 10,
        /// Entertainment.
        Entertainment = 11,
        /// Text message.
        Sms = 12,
    }
}

wire_enum! {
    /// Command in a notification control request.
    pub enum NotificationCommand {
        /// Fetch attributes of a notification.
        GetNotificationAttributes = 0,
        /// Fetch attributes of an application.
        GetAppAttributes = 1,
        /// Accept or refuse, older devices.
        PerformLegacyNotificationAction = 2,
        /// Perform one of the advertised actions.
        PerformNotificationAction = 128,
    }
}

wire_enum! {
    /// Attribute requested by a notification control request.
    pub enum NotificationAttribute {
        /// Source application identifier.
        AppIdentifier = 0,
        /// Title.
        Title = 1,
        /// Subtitle.
        Subtitle = 2,
        /// Body.
        Message = 3,
        /// Body size.
        MessageSize = 4,
        /// Post time.
        Date = 5,
        /// Label of the negative action.
        NegativeActionLabel = 7,
        /// Available actions.
        Actions = 127,
        /// Attachments.
        Attachments = 128,
    }
}

impl NotificationAttribute {
    /// Whether the device sends a 2-byte maximum length with this attribute.
    pub fn has_max_length(&self) -> bool {
        matches!(
            self,
            NotificationAttribute::Title
                | NotificationAttribute::Subtitle
                | NotificationAttribute::Message
                | NotificationAttribute::Actions
        )
    }

    /// Whether the device sends a further option byte with this attribute.
    pub fn has_option_byte(&self) -> bool {
        matches!(self, NotificationAttribute::Actions)
    }
}

wire_enum! {
    /// Action performed on a notification.
    pub enum NotificationAction {
        /// Reply to a ringing call with a message.
        ReplyIncomingCall = 94,
        /// Reply to a message.
        ReplyMessages = 95,
        /// Accept a ringing call.
        AcceptIncomingCall = 96,
        /// Reject a ringing call.
        RejectIncomingCall = 97,
        /// Dismiss.
        DismissNotification = 98,
        /// Block the source application.
        BlockApplication = 99,
    }
}

wire_enum! {
    /// Action performed by older devices.
    pub enum LegacyNotificationAction {
        /// Positive action.
        Accept = 0,
        /// Negative action.
        Refuse = 1,
    }
}

wire_enum! {
    /// Notification stream status reported back to the device.
    pub enum NotificationStatus {
        /// Stream active.
        Enabled = 0,
        /// Stream inactive.
        Disabled = 1,
    }
}

wire_enum! {
    /// Media button press.
    pub enum MusicControlCommand {
        /// Toggle playback.
        TogglePlayPause = 0,
        /// Next track.
        SkipToNextItem = 1,
        /// Previous track.
        SkipBackToPreviousItem = 2,
        /// Volume up.
        VolumeUp = 3,
        /// Volume down.
        VolumeDown = 4,
        /// Play.
        Play = 5,
        /// Pause.
        Pause = 6,
        /// Seek forward.
        SkipForward = 7,
        /// Seek backward.
        SkipBackwards = 8,
    }
}

wire_enum! {
    /// Entity of a now-playing update.
    pub enum MusicEntity {
        /// Player state.
        Player = 0,
        /// Play queue.
        Queue = 1,
        /// Current track.
        Track = 2,
    }
}

wire_enum! {
    /// Attribute of the player entity.
    pub enum PlayerAttribute {
        /// Player application name.
        Name = 0,
        /// Playback state, rate and position.
        PlaybackInfo = 1,
        /// Volume.
        Volume = 2,
    }
}

wire_enum! {
    /// Attribute of the track entity.
    pub enum TrackAttribute {
        /// Artist.
        Artist = 0,
        /// Album.
        Album = 1,
        /// Title.
        Title = 2,
        /// Duration in seconds.
        Duration = 3,
    }
}

wire_enum! {
    /// Result of an authentication negotiation.
    pub enum AuthNegotiationStatus {
        /// Flags accepted.
        GuessOk = 0,
        /// Flags refused.
        GuessKo = 1,
    }
}

/// Capability bit-set exchanged in CONFIGURATION messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(pub Vec<u8>);

impl Capabilities {
    /// Create a bit-set from raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Capabilities(bytes)
    }

    /// Whether bit `index` is set.
    pub fn contains(&self, index: usize) -> bool {
        self.0
            .get(index / 8)
            .map(|byte| byte & (1 << (index % 8)) != 0)
            .unwrap_or(false)
    }

    /// Indices of every set bit.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.0.len() * 8).filter(move |&i| self.contains(i))
    }

    /// Bits set in both, sized like `self`.
    pub fn intersect(&self, other: &Capabilities) -> Capabilities {
        Capabilities(
            self.0
                .iter()
                .enumerate()
                .map(|(i, b)| b & other.0.get(i).copied().unwrap_or(0))
                .collect(),
        )
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Type pair identifying a class of files on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileType {
    /// Data type (e.g. 128 for FIT).
    pub data_type: u8,
    /// Sub-type within the data type.
    pub sub_type: u8,
}

impl FileType {
    /// Create a file type.
    pub fn new(data_type: u8, sub_type: u8) -> Self {
        FileType {
            data_type,
            sub_type,
        }
    }
}
