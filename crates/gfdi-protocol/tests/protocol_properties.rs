//! Property and scenario tests across the public API.

use gfdi_protocol::{
    checksum, registry, Dispatcher, DeviceSetting, DeviceSettings, DownloadProgress,
    DownloadRequest, FileTransferData, FrameCodec, FrameError, Message, NotificationCategory,
    NotificationControl, NotificationControlCommand, NotificationSubscription,
    NotificationUpdate, NotificationUpdateType, ProtobufChunk, ProtocolConfig, Reassembly,
    ReassemblyBuffer, ReassemblyError, RequestKind, Response, ResponseBody, SendProgress,
    SetFileFlags, SettingValue, Status, Synchronization, TransferResponse, TransferSession,
    UploadRequest, WeatherRequest, MESSAGE_DEVICE_SETTINGS, MESSAGE_FILE_TRANSFER_DATA,
};
use proptest::prelude::*;

fn frame_of(message: &Message) -> Vec<u8> {
    message.to_frame(&FrameCodec::new(u16::MAX)).unwrap()
}

fn decode_frame(frame: &[u8]) -> Message {
    let frame = FrameCodec::new(u16::MAX).decode(frame).unwrap();
    registry::decode(frame.type_code, &frame.payload).unwrap()
}

fn chunk_answer(response: TransferResponse, next_data_offset: u32) -> Response {
    Response::ack_with(
        MESSAGE_FILE_TRANSFER_DATA,
        ResponseBody::FileTransferData {
            response,
            next_data_offset,
        },
    )
}

/// Drive a served download into a receiver until it completes.
fn run_download(sender: &mut TransferSession, receiver: &mut TransferSession) -> Vec<u8> {
    let mut chunk = sender.next_chunk();
    while let Some(next) = chunk {
        let reply = receiver.on_chunk(&next);
        match reply.progress {
            DownloadProgress::Complete(data) => return data,
            DownloadProgress::Continue => {}
            DownloadProgress::Aborted(e) => panic!("download aborted: {e}"),
        }
        chunk = match sender.on_chunk_response(&reply.response).unwrap() {
            SendProgress::Next(chunk) => Some(chunk),
            SendProgress::Complete | SendProgress::Paused => None,
        };
    }
    panic!("sender finished before receiver completed");
}

fn setting_value() -> impl Strategy<Value = SettingValue> {
    prop_oneof![
        any::<u32>().prop_map(SettingValue::Integer),
        any::<bool>().prop_map(SettingValue::Boolean),
        "[a-zA-Z_ ]{0,40}"
            .prop_filter("length 1 and 4 strings are ambiguous", |s| {
                s.len() != 1 && s.len() != 4
            })
            .prop_map(SettingValue::Text),
    ]
}

fn chunked_payload() -> impl Strategy<Value = (Vec<u8>, usize, Vec<usize>)> {
    (prop::collection::vec(any::<u8>(), 1..2000), 1usize..300).prop_flat_map(|(data, size)| {
        let count = (data.len() + size - 1) / size;
        let order: Vec<usize> = (0..count).collect();
        (Just(data), Just(size), Just(order).prop_shuffle())
    })
}

fn chunk_at(data: &[u8], size: usize, index: usize) -> ProtobufChunk {
    let start = index * size;
    let end = (start + size).min(data.len());
    ProtobufChunk {
        request_id: 11,
        data_offset: start as u32,
        total_length: data.len() as u32,
        data: data[start..end].to_vec(),
    }
}

proptest! {
    #[test]
    fn prop_messages_survive_the_wire(
        file_index in any::<u16>(),
        data_offset in any::<u32>(),
        crc in any::<u16>(),
        data in prop::collection::vec(any::<u8>(), 0..300),
        bitmask in any::<u64>(),
        settings in prop::collection::vec((any::<u8>(), setting_value()), 1..8),
    ) {
        let messages = vec![
            Message::DownloadRequest(DownloadRequest {
                file_index,
                data_offset,
                request_kind: RequestKind::Continue,
                crc_seed: crc,
                data_size: 0,
            }),
            Message::FileTransferData(FileTransferData {
                flags: 0,
                crc,
                data_offset,
                data: data.clone(),
            }),
            Message::ProtobufResponse(ProtobufChunk {
                request_id: file_index,
                data_offset: 0,
                total_length: data.len() as u32,
                data,
            }),
            Message::Synchronization(Synchronization { sync_type: 2, bitmask }),
            Message::DeviceSettings(DeviceSettings::new(
                settings
                    .into_iter()
                    .map(|(id, value)| (DeviceSetting::from(id), value))
                    .collect(),
            )),
        ];
        for message in messages {
            prop_assert_eq!(decode_frame(&frame_of(&message)), message);
        }
    }

    #[test]
    fn prop_file_and_notification_messages_survive_the_wire(
        file_index in any::<u16>(),
        sizes in any::<(u32, u32, u16)>(),
        flags in any::<u8>(),
        position in any::<(i32, i32)>(),
        update in any::<(u8, u8, u8, u32)>(),
        app_identifier in "[a-z.]{0,60}",
        enable in any::<bool>(),
    ) {
        let (data_size, data_offset, crc_seed) = sizes;
        let (update_type, category, count, notification_id) = update;
        let messages = vec![
            Message::UploadRequest(UploadRequest {
                file_index,
                data_size,
                data_offset,
                crc_seed,
            }),
            Message::SetFileFlags(SetFileFlags { file_index, flags }),
            Message::WeatherRequest(WeatherRequest {
                format: flags,
                latitude: position.0,
                longitude: position.1,
                hours_of_forecast: count,
            }),
            Message::NotificationUpdate(NotificationUpdate {
                update_type: NotificationUpdateType::from(update_type),
                category_flags: flags,
                category: NotificationCategory::from(category),
                count,
                notification_id,
                phone_flags: flags,
            }),
            Message::NotificationControl(NotificationControl {
                notification_id,
                command: NotificationControlCommand::GetAppAttributes { app_identifier },
            }),
            Message::NotificationSubscription(NotificationSubscription {
                enable,
                unknown: flags,
            }),
        ];
        for message in messages {
            prop_assert_eq!(decode_frame(&frame_of(&message)), message);
        }
    }

    #[test]
    fn prop_single_bit_flip_is_detected(
        type_code in any::<u16>(),
        payload in prop::collection::vec(any::<u8>(), 1..300),
        bit in any::<prop::sample::Index>(),
    ) {
        let codec = FrameCodec::new(u16::MAX);
        let mut frame = codec.encode(type_code, &payload).unwrap();
        let bit = bit.index(payload.len() * 8);
        frame[4 + bit / 8] ^= 1 << (bit % 8);
        let is_checksum_mismatch = matches!(
            codec.decode(&frame),
            Err(FrameError::ChecksumMismatch { .. })
        );
        prop_assert!(is_checksum_mismatch);
    }

    #[test]
    fn prop_resized_frame_is_rejected(
        payload in prop::collection::vec(any::<u8>(), 0..100),
        cut in 1usize..8,
        pad in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        let codec = FrameCodec::new(u16::MAX);
        let frame = codec.encode(5030, &payload).unwrap();

        let truncated = &frame[..frame.len().saturating_sub(cut)];
        let rejected = matches!(
            codec.decode(truncated),
            Err(FrameError::LengthMismatch { .. } | FrameError::ChecksumMismatch { .. })
        );
        prop_assert!(rejected);

        let mut padded = frame.clone();
        padded.extend_from_slice(&pad);
        let rejected = matches!(
            codec.decode(&padded),
            Err(FrameError::LengthMismatch { .. } | FrameError::ChecksumMismatch { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn prop_reassembly_in_any_order((data, size, order) in chunked_payload()) {
        let mut buffer = ReassemblyBuffer::new(4, 1 << 20);
        let last = order.len() - 1;
        for (position, &index) in order.iter().enumerate() {
            let outcome = buffer.accept(&chunk_at(&data, size, index)).unwrap();
            if position == last {
                prop_assert_eq!(outcome, Reassembly::Complete(data.clone()));
            } else {
                prop_assert_eq!(outcome, Reassembly::Pending);
            }
        }
        prop_assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn prop_reassembly_duplicate_and_missing((data, size, order) in chunked_payload()) {
        prop_assume!(order.len() >= 2);
        let mut buffer = ReassemblyBuffer::new(4, 1 << 20);
        let first = chunk_at(&data, size, order[0]);
        prop_assert_eq!(buffer.accept(&first), Ok(Reassembly::Pending));
        let duplicate = buffer.accept(&first).unwrap_err();
        prop_assert_eq!(u8::from(duplicate.status_code()), 101);

        // Everything but the last chunk, then demand the result.
        for &index in &order[1..order.len() - 1] {
            buffer.accept(&chunk_at(&data, size, index)).unwrap();
        }
        let missing = buffer.finish(11).unwrap_err();
        let is_missing = matches!(missing, ReassemblyError::MissingPacket { .. });
        prop_assert!(is_missing);
        prop_assert_eq!(u8::from(missing.status_code()), 102);
    }

    #[test]
    fn prop_resumed_download_matches_uninterrupted(
        data in prop::collection::vec(any::<u8>(), 2..3000),
        chunk_size in 16usize..400,
        interrupt in any::<prop::sample::Index>(),
    ) {
        let (mut sender, _) =
            TransferSession::serve_download(&DownloadRequest::new(3), data.clone(), chunk_size, 5);
        let mut receiver = TransferSession::download(3, 5);
        receiver
            .on_download_response(&Response::ack_with(
                gfdi_protocol::MESSAGE_DOWNLOAD_REQUEST,
                ResponseBody::Download {
                    status: gfdi_protocol::DownloadStatus::Ok,
                    max_file_size: data.len() as u32,
                },
            ))
            .unwrap();

        // Receive whole chunks up to the interruption point.
        let stop = interrupt.index(data.len());
        while (receiver.data_offset() as usize) < stop {
            let Some(chunk) = sender.next_chunk() else { break };
            let reply = receiver.on_chunk(&chunk);
            if matches!(reply.progress, DownloadProgress::Complete(_)) {
                break;
            }
            sender.on_chunk_response(&reply.response).unwrap();
        }
        let checkpoint = receiver.checkpoint();
        prop_assume!((checkpoint.data_offset as usize) < data.len());

        let mut resumed = TransferSession::resume_download(checkpoint, 5);
        let request = resumed.download_request();
        prop_assert_eq!(request.request_kind, RequestKind::Continue);
        let (mut sender, response) =
            TransferSession::serve_download(&request, data.clone(), chunk_size, 5);
        resumed.on_download_response(&response).unwrap();
        let rest = run_download(&mut sender, &mut resumed);
        prop_assert_eq!(rest.as_slice(), &data[checkpoint.data_offset as usize..]);
    }

    #[test]
    fn prop_unregistered_type_is_unsupported(
        type_code in any::<u16>().prop_filter("registered", |c| registry::lookup(*c).is_none()),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let frame = FrameCodec::default().encode(type_code, &payload).unwrap();
        let dispatch = Dispatcher::new(ProtocolConfig::default()).dispatch(&frame).unwrap();
        prop_assert_eq!(dispatch.message, Ok(Message::Unhandled { type_code, payload }));
        let reply = dispatch.reply.unwrap();
        prop_assert_eq!(reply.status, Status::Unsupported);
        prop_assert_eq!(reply.request_type, type_code);
    }
}

#[test]
fn test_settings_push_golden_frame() {
    let message = Message::DeviceSettings(DeviceSettings::new(vec![(
        DeviceSetting::DeviceName,
        SettingValue::Text("EN_US".to_string()),
    )]));
    let payload = message.encode().unwrap();
    assert_eq!(payload, [0x01, 0x00, 0x05, b'E', b'N', b'_', b'U', b'S']);

    let frame = message.to_frame(&FrameCodec::default()).unwrap();
    assert_eq!(
        frame,
        [0x0e, 0x00, 0xa2, 0x13, 0x01, 0x00, 0x05, 0x45, 0x4e, 0x5f, 0x55, 0x53, 0xc3, 0xae]
    );
    assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), MESSAGE_DEVICE_SETTINGS);
    assert_eq!(checksum(&frame[..12]), 0xAEC3);
}

#[test]
fn test_offset_mismatch_reissues_chunk_at_zero() {
    let request = DownloadRequest {
        file_index: 3,
        data_offset: 0,
        request_kind: RequestKind::New,
        crc_seed: 0,
        data_size: 1000,
    };
    let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
    let (mut sender, response) = TransferSession::serve_download(&request, data.clone(), 300, 5);
    assert!(response.is_ack());

    let first = sender.next_chunk().unwrap();
    assert_eq!(first.data_offset, 0);

    let progress = sender
        .on_chunk_response(&chunk_answer(TransferResponse::OffsetMismatch, 0))
        .unwrap();
    let SendProgress::Next(again) = progress else {
        panic!("expected the chunk to be re-issued, got {progress:?}");
    };
    assert_eq!(again, first);
    assert_eq!(sender.data_offset(), 0);
    assert_eq!(sender.retries(), 1);
}
