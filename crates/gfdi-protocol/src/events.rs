//! Events surfaced to the application.

use crate::messages::{AttributeRequest, DeviceInformation, Synchronization};
use crate::transfer::DirectoryEntry;
use crate::types::*;

/// Something the application may want to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device identified itself.
    DeviceInformation(DeviceInformation),
    /// The device declared its capabilities.
    Capabilities(Capabilities),
    /// Authentication negotiated with the given flags.
    AuthNegotiated {
        /// Flags accepted.
        auth_flags: u32,
    },
    /// The device wants a forecast.
    WeatherRequested {
        /// Unit format.
        format: u8,
        /// Latitude in semicircles.
        latitude: i32,
        /// Longitude in semicircles.
        longitude: i32,
        /// Forecast horizon.
        hours_of_forecast: u8,
    },
    /// Media commands the device can issue.
    MusicCapabilities(Vec<MusicControlCommand>),
    /// The device toggled the notification stream. The application answers.
    NotificationSubscription {
        /// Whether notifications are wanted.
        enable: bool,
        /// Byte to echo back.
        unknown: u8,
    },
    /// Media control pressed on the device.
    Music(MusicControlCommand),
    /// Ring the host.
    FindPhoneStarted {
        /// Ring duration in seconds.
        duration: u16,
    },
    /// Stop ringing.
    FindPhoneStopped,
    /// The device wants notification attributes.
    NotificationAttributesRequested {
        /// Notification concerned.
        notification_id: u32,
        /// Attributes wanted.
        attributes: Vec<AttributeRequest>,
    },
    /// The device wants application attributes.
    AppAttributesRequested {
        /// Application identifier.
        app_identifier: String,
    },
    /// The user acted on a notification.
    NotificationAction {
        /// Notification concerned.
        notification_id: u32,
        /// Action chosen.
        action: NotificationAction,
        /// Reply text, empty when not applicable.
        text: String,
    },
    /// The user accepted or refused a notification on an older device.
    LegacyNotificationAction {
        /// Notification concerned.
        notification_id: u32,
        /// Action chosen.
        action: LegacyNotificationAction,
    },
    /// A system event arrived.
    SystemEvent {
        /// Event kind.
        event_type: SystemEventType,
        /// Event value.
        value: SystemEventValue,
    },
    /// The device has data to sync.
    SyncRequested(Synchronization),
    /// A structured payload was reassembled.
    StructuredPayload {
        /// Request id it travelled under.
        request_id: u16,
        /// Payload bytes.
        payload: Vec<u8>,
    },
    /// A download finished.
    DownloadComplete {
        /// File downloaded.
        file_index: u16,
        /// File contents.
        data: Vec<u8>,
    },
    /// The directory file was downloaded and parsed.
    DirectoryListing(Vec<DirectoryEntry>),
    /// An upload finished.
    UploadComplete {
        /// File written.
        file_index: u16,
    },
    /// A transfer gave up.
    TransferAborted {
        /// File concerned.
        file_index: u16,
        /// Why.
        reason: String,
    },
}
