//! One inbound frame in, one decoded message out.
//!
//! The dispatcher validates the frame, decodes the payload through the
//! registry, and computes the automatic reply from the parsed message, the
//! session configuration and the clock. It holds no per-exchange state; that
//! lives in [`crate::Session`].

use log::{debug, error, warn};

use crate::clock::{to_device_timestamp, Clock, SystemClock};
use crate::config::ProtocolConfig;
use crate::constants::*;
use crate::error::{DecodeError, EncodeError, FrameError};
use crate::events::DeviceEvent;
use crate::frame::FrameCodec;
use crate::messages::*;
use crate::registry;
use crate::responses::{Response, ResponseBody};
use crate::types::*;

/// Result of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Type code from the frame header.
    pub type_code: u16,
    /// Decoded message, or why it could not be decoded.
    pub message: Result<Message, DecodeError>,
    /// Automatic reply, if one is due.
    pub reply: Option<Response>,
    /// Events for the application.
    pub events: Vec<DeviceEvent>,
}

impl Dispatch {
    /// Encode the reply, if any.
    pub fn reply_frame(&self, codec: &FrameCodec) -> Result<Option<Vec<u8>>, EncodeError> {
        self.reply
            .as_ref()
            .map(|reply| Message::Response(reply.clone()).to_frame(codec))
            .transpose()
    }
}

/// Stateless per-frame protocol handling.
#[derive(Debug)]
pub struct Dispatcher {
    config: ProtocolConfig,
    codec: FrameCodec,
    clock: Box<dyn Clock>,
}

impl Dispatcher {
    /// Create a dispatcher reading the system clock.
    pub fn new(config: ProtocolConfig) -> Self {
        Dispatcher::with_clock(config, Box::new(SystemClock))
    }

    /// Create a dispatcher with an explicit clock.
    pub fn with_clock(config: ProtocolConfig, clock: Box<dyn Clock>) -> Self {
        let codec = FrameCodec::new(config.max_packet_size);
        Dispatcher {
            config,
            codec,
            clock,
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Frame codec used for replies.
    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Adopt the peer's packet size limit.
    pub fn set_max_packet_size(&mut self, max_packet_size: u16) {
        self.config.max_packet_size = max_packet_size;
        self.codec.set_max_packet_size(max_packet_size);
    }

    /// Dispatch one inbound frame.
    ///
    /// A frame that fails validation is logged and returned as an error; no
    /// reply is attempted since its type code cannot be trusted.
    pub fn dispatch(&self, data: &[u8]) -> Result<Dispatch, FrameError> {
        let frame = self.codec.decode(data).map_err(|e| {
            error!("discarding frame: {}", e);
            e
        })?;
        let type_code = frame.type_code;
        debug!(
            "received {} ({}), {} byte payload",
            registry::name_of(type_code),
            type_code,
            frame.payload.len()
        );

        let message = registry::decode(type_code, &frame.payload);
        let (reply, events) = match &message {
            Ok(message) => (self.reply_for(message), events_for(message)),
            Err(e) => {
                warn!("cannot decode {}: {}", registry::name_of(type_code), e);
                let reply = (type_code != MESSAGE_RESPONSE)
                    .then(|| Response::status(type_code, Status::DecodeError));
                (reply, Vec::new())
            }
        };

        Ok(Dispatch {
            type_code,
            message,
            reply,
            events,
        })
    }

    /// Automatic reply to a decoded message.
    pub fn reply_for(&self, message: &Message) -> Option<Response> {
        let type_code = message.type_code();
        let reply = match message {
            Message::Response(_) | Message::NotificationSubscription(_) => return None,
            Message::Unhandled { .. } => Response::status(type_code, Status::Unsupported),
            Message::DeviceInformation(_) => Response::ack_with(
                type_code,
                ResponseBody::DeviceInformation {
                    identity: self.config.host.to_device_information(),
                    protocol_flags: self.config.host.protocol_flags,
                },
            ),
            Message::Configuration(configuration) => {
                let accepted = self
                    .config
                    .capabilities
                    .clone()
                    .unwrap_or_else(|| configuration.capabilities.clone());
                Response::ack_with(type_code, ResponseBody::Configuration(accepted))
            }
            Message::AuthNegotiation(offer) => Response::ack_with(
                type_code,
                ResponseBody::AuthNegotiation {
                    status: AuthNegotiationStatus::GuessOk,
                    unknown: offer.unknown,
                    auth_flags: offer.auth_flags,
                },
            ),
            Message::CurrentTimeRequest(request) => {
                let now = self.clock.now();
                Response::ack_with(
                    type_code,
                    ResponseBody::CurrentTime {
                        reference_id: request.reference_id,
                        timestamp: to_device_timestamp(&now),
                        timezone_offset: now.offset().local_minus_utc(),
                        next_dst_end: 0,
                        next_dst_start: 0,
                    },
                )
            }
            Message::WeatherRequest(request) => {
                Response::ack_with(type_code, ResponseBody::Weather(*request))
            }
            Message::MusicControlCapabilities(_) => Response::ack_with(
                type_code,
                ResponseBody::MusicControlCapabilities(self.config.music_commands.clone()),
            ),
            Message::FileTransferData(chunk) => Response::ack_with(
                type_code,
                ResponseBody::FileTransferData {
                    response: TransferResponse::TransferSuccessful,
                    next_data_offset: chunk.data_offset.saturating_add(chunk.data.len() as u32),
                },
            ),
            Message::ProtobufRequest(chunk) | Message::ProtobufResponse(chunk) => {
                Response::ack_with(
                    type_code,
                    ResponseBody::Protobuf {
                        request_id: chunk.request_id,
                        data_offset: chunk.data_offset,
                        chunk_status: ProtobufChunkStatus::Kept,
                        status_code: ProtobufStatusCode::NoError,
                    },
                )
            }
            _ => Response::ack(type_code),
        };
        Some(reply)
    }
}

/// Events surfaced by a decoded message on its own.
pub fn events_for(message: &Message) -> Vec<DeviceEvent> {
    let event = match message {
        Message::DeviceInformation(info) => DeviceEvent::DeviceInformation(info.clone()),
        Message::Configuration(configuration) => {
            DeviceEvent::Capabilities(configuration.capabilities.clone())
        }
        Message::AuthNegotiation(offer) => DeviceEvent::AuthNegotiated {
            auth_flags: offer.auth_flags,
        },
        Message::WeatherRequest(request) => DeviceEvent::WeatherRequested {
            format: request.format,
            latitude: request.latitude,
            longitude: request.longitude,
            hours_of_forecast: request.hours_of_forecast,
        },
        Message::MusicControlCapabilities(capabilities) => {
            DeviceEvent::MusicCapabilities(capabilities.commands.clone())
        }
        Message::NotificationSubscription(subscription) => DeviceEvent::NotificationSubscription {
            enable: subscription.enable,
            unknown: subscription.unknown,
        },
        Message::MusicControl(control) => DeviceEvent::Music(control.command),
        Message::FindMyPhoneRequest(request) => DeviceEvent::FindPhoneStarted {
            duration: request.duration,
        },
        Message::FindMyPhoneCancel(_) => DeviceEvent::FindPhoneStopped,
        Message::NotificationControl(control) => notification_event(control),
        Message::SystemEvent(event) => DeviceEvent::SystemEvent {
            event_type: event.event_type,
            value: event.value.clone(),
        },
        Message::Synchronization(sync) => DeviceEvent::SyncRequested(*sync),
        Message::ProtobufRequest(chunk) | Message::ProtobufResponse(chunk)
            if chunk.is_complete() =>
        {
            DeviceEvent::StructuredPayload {
                request_id: chunk.request_id,
                payload: chunk.data.clone(),
            }
        }
        _ => return Vec::new(),
    };
    vec![event]
}

fn notification_event(control: &NotificationControl) -> DeviceEvent {
    let notification_id = control.notification_id;
    match &control.command {
        NotificationControlCommand::GetAttributes(attributes) => {
            DeviceEvent::NotificationAttributesRequested {
                notification_id,
                attributes: attributes.clone(),
            }
        }
        NotificationControlCommand::GetAppAttributes { app_identifier } => {
            DeviceEvent::AppAttributesRequested {
                app_identifier: app_identifier.clone(),
            }
        }
        NotificationControlCommand::LegacyAction(action) => {
            DeviceEvent::LegacyNotificationAction {
                notification_id,
                action: *action,
            }
        }
        NotificationControlCommand::Action { action, text } => DeviceEvent::NotificationAction {
            notification_id,
            action: *action,
            text: text.clone(),
        },
    }
}
