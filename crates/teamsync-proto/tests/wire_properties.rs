//! Property tests for the wire codec.

#![allow(clippy::unwrap_used)]

use proptest::prelude::{Strategy, any, prop_oneof, proptest};
use teamsync_proto::{
    ClientCommand, MessageId, PresenceOrigin, PresenceStatus, ReactionOp, RoomId, ServerEvent,
    UserId, wire,
};

fn arb_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        any::<Vec<u64>>().prop_map(|ids| ServerEvent::Snapshot {
            user_ids: ids.into_iter().map(UserId).collect(),
        }),
        (any::<u64>(), any::<bool>(), any::<u64>(), any::<bool>()).prop_map(
            |(user, online, ts, snap)| ServerEvent::Presence {
                user_id: UserId(user),
                status: if online { PresenceStatus::Online } else { PresenceStatus::Offline },
                timestamp: ts,
                origin: if snap { PresenceOrigin::Snapshot } else { PresenceOrigin::Incremental },
            }
        ),
        (any::<u64>(), any::<u64>(), ".{0,32}").prop_map(|(room, user, name)| {
            ServerEvent::TypingStart {
                room_id: RoomId(room),
                user_id: UserId(user),
                username: name,
            }
        }),
        (any::<u64>(), any::<u64>(), any::<u64>(), ".{0,128}", any::<u64>()).prop_map(
            |(room, msg, sender, content, ts)| ServerEvent::Message {
                room_id: RoomId(room),
                message_id: MessageId(msg),
                sender_id: UserId(sender),
                content,
                timestamp: ts,
            }
        ),
        (any::<u64>(), any::<u64>(), any::<u64>()).prop_map(|(room, user, last)| {
            ServerEvent::ReceiptUpdate {
                room_id: RoomId(room),
                user_id: UserId(user),
                last_read: MessageId(last),
            }
        }),
        any::<u64>().prop_map(|room| ServerEvent::RoomJoined { room_id: RoomId(room) }),
    ]
}

fn arb_command() -> impl Strategy<Value = ClientCommand> {
    prop_oneof![
        ".{0,64}".prop_map(|token| ClientCommand::Auth { token }),
        any::<u64>().prop_map(|room| ClientCommand::JoinRoom { room_id: RoomId(room) }),
        any::<u64>().prop_map(|room| ClientCommand::LeaveRoom { room_id: RoomId(room) }),
        (any::<u64>(), ".{0,128}", any::<u64>()).prop_map(|(room, content, ts)| {
            ClientCommand::Send { room_id: RoomId(room), content, timestamp: ts }
        }),
        (any::<u64>(), any::<u64>(), ".{1,16}", any::<bool>()).prop_map(
            |(room, msg, emoji, add)| ClientCommand::Reaction {
                room_id: RoomId(room),
                message_id: MessageId(msg),
                emoji,
                op: if add { ReactionOp::Add } else { ReactionOp::Remove },
            }
        ),
    ]
}

proptest! {
    #[test]
    fn event_round_trip(event in arb_event()) {
        let mut buf = Vec::new();
        wire::encode_event(&event, &mut buf).unwrap();
        let decoded = wire::decode_event(&buf).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn command_round_trip(command in arb_command()) {
        let mut buf = Vec::new();
        wire::encode_command(&command, &mut buf).unwrap();
        let decoded = wire::decode_command(&buf).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn decode_never_panics_on_arbitrary_bytes(bytes in any::<Vec<u8>>()) {
        let _ = wire::decode_event(&bytes);
        let _ = wire::decode_command(&bytes);
    }
}
