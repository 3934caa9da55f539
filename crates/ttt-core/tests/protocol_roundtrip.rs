//! Integration tests for the ttt-core protocol codec.
//!
//! These tests drive the public API the way the client and a test server do:
//! typed message → envelope → Request/Response → frame, and back again
//! through a [`FrameDecoder`] fed with arbitrary read boundaries.

use ttt_core::{
    decode_request, decode_response, encode_request_frame, encode_response, frame,
    protocol::messages::{
        AuthInfo, CompetitionFinish, CompetitionOperation, GetStatistics, Operation, Placement,
        Statistics, SyncRequest,
    },
    CompetitionId, Envelope, FrameDecoder, GameMessage, MessageKind, PlayerId, ProtocolError,
    Response,
};
use uuid::Uuid;

/// Frames a server response carrying `message`.
fn response_frame(message: &GameMessage) -> Vec<u8> {
    frame(&encode_response(&Response::Body(Envelope::pack(message))))
}

/// Splits `stream` into chunks of `size` bytes and collects every frame the
/// decoder emits along the way.
fn decode_in_chunks(stream: &[u8], size: usize) -> Vec<Vec<u8>> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in stream.chunks(size) {
        decoder.extend(chunk);
        while let Some(payload) = decoder.next_frame().expect("stream must be valid") {
            frames.push(payload);
        }
    }
    assert_eq!(decoder.buffered(), 0, "no bytes may be left over");
    frames
}

fn open_response(payload: &[u8]) -> Option<GameMessage> {
    match decode_response(payload).expect("outer decode must succeed") {
        Response::Body(envelope) => envelope.open().expect("body must decode"),
        Response::Error(e) => panic!("unexpected error response: {e}"),
    }
}

fn server_messages() -> Vec<GameMessage> {
    let me = PlayerId(Uuid::new_v4());
    let other = PlayerId(Uuid::new_v4());
    vec![
        GameMessage::AuthInfo(AuthInfo {
            player_id: Some(me),
        }),
        GameMessage::CompetitionOperation(CompetitionOperation {
            id: CompetitionId(4321),
            operation: Operation::Create,
            ..Default::default()
        }),
        GameMessage::CompetitionOperation(CompetitionOperation {
            id: CompetitionId(4321),
            operation: Operation::Join,
            pos: None,
            player_a: Some(me),
            player_b: Some(other),
        }),
        GameMessage::PiecePlaced(Placement {
            x: 3,
            y: 1,
            myself: true,
        }),
        GameMessage::Statistics(Statistics {
            myself: false,
            wins: 2,
            losses: 9,
        }),
        GameMessage::CompetitionFinish(CompetitionFinish {
            winner: me.to_string(),
        }),
    ]
}

#[test]
fn test_every_request_kind_survives_framing() {
    let requests = [
        GameMessage::AuthInfo(AuthInfo::default()),
        GameMessage::CompetitionOperation(CompetitionOperation {
            id: CompetitionId(1234),
            operation: Operation::Leave,
            ..Default::default()
        }),
        GameMessage::CompetitionOperation(CompetitionOperation {
            id: CompetitionId(1234),
            operation: Operation::Put,
            pos: Some(Placement {
                x: 2,
                y: 2,
                myself: false,
            }),
            ..Default::default()
        }),
        GameMessage::Sync(SyncRequest),
        GameMessage::GetStatistics(GetStatistics { myself: true }),
    ];

    for original in requests {
        let frames = decode_in_chunks(&encode_request_frame(&original), 64);
        assert_eq!(frames.len(), 1);

        let request = decode_request(&frames[0]).expect("request must decode");

        assert_eq!(request.body.type_url, original.kind().type_url());
        assert_eq!(request.body.open().unwrap(), Some(original));
    }
}

#[test]
fn test_response_stream_is_identical_for_every_chunk_size() {
    let messages = server_messages();
    let mut stream = Vec::new();
    for m in &messages {
        stream.extend(response_frame(m));
    }

    let reference = decode_in_chunks(&stream, stream.len());
    for size in 1..=17 {
        assert_eq!(decode_in_chunks(&stream, size), reference, "chunk size {size}");
    }

    let decoded: Vec<_> = reference.iter().filter_map(|p| open_response(p)).collect();
    assert_eq!(decoded, messages);
}

#[test]
fn test_error_response_carries_no_routable_body() {
    // A Response with only `error = "boom"` set.
    let payload = encode_response(&Response::Error("boom".to_string()));

    let response = decode_response(&payload).unwrap();

    assert_eq!(response, Response::Error("boom".to_string()));
}

#[test]
fn test_blank_error_falls_through_to_body() {
    // Field 1 = "  " (blank error), no body.
    let payload = [0x0A, 0x02, b' ', b' '];

    let response = decode_response(&payload).unwrap();

    assert_eq!(response, Response::Body(Envelope::default()));
}

#[test]
fn test_unknown_kind_is_dropped_but_stream_continues() {
    let unknown = Envelope {
        type_url: "type.googleapis.com/top.gardel.chess.proto.Chat".to_string(),
        value: vec![0x0A, 0x01, b'x'],
    };
    let mut stream = frame(&encode_response(&Response::Body(unknown)));
    let sync = GameMessage::Sync(SyncRequest);
    stream.extend(response_frame(&sync));

    let frames = decode_in_chunks(&stream, 3);

    assert_eq!(frames.len(), 2);
    assert_eq!(open_response(&frames[0]), None);
    assert_eq!(open_response(&frames[1]), Some(sync));
}

#[test]
fn test_corrupt_inner_body_is_reported_separately_from_outer() {
    let broken = Envelope {
        type_url: MessageKind::AuthInfo.type_url(),
        value: vec![0x0A, 0x05, b'n', b'o'],
    };
    let payload = encode_response(&Response::Body(broken));

    // The outer structure is intact...
    let Response::Body(envelope) = decode_response(&payload).unwrap() else {
        panic!("expected a body");
    };

    // ...but the inner message is truncated.
    assert!(matches!(
        envelope.open(),
        Err(ProtocolError::Truncated { .. })
    ));
}

#[test]
fn test_garbage_outer_payload_is_an_error() {
    // Field 2, wire type 2, announces 100 bytes but carries 1.
    let payload = [0x12, 0x64, 0x00];

    assert!(decode_response(&payload).is_err());
}
