//! Length-delimited CBOR wire codec.
//!
//! Layout on the wire: `[body length: u32 BE] + [CBOR body]`.
//!
//! CBOR is self-describing (field names embedded) and needs no code
//! generation, so old clients fail loudly on unknown shapes instead of
//! misreading them. The size check happens before any CBOR parsing so a
//! malicious length prefix cannot drive a large allocation.

use bytes::BufMut;
use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientCommand, ProtocolError, ServerEvent};

/// Length-prefix size in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Maximum frame body size (1 MB). Chat payloads are small; anything
/// larger is a protocol violation.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

fn encode_frame<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
    let mut body = Vec::new();
    ciborium::ser::into_writer(value, &mut body)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: body.len(), max: MAX_FRAME_SIZE });
    }

    dst.put_u32(body.len() as u32);
    dst.put_slice(&body);
    Ok(())
}

fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let Some(prefix) = bytes.get(..LEN_PREFIX_SIZE) else {
        return Err(ProtocolError::FrameTruncated { expected: LEN_PREFIX_SIZE, actual: bytes.len() });
    };

    // Prefix slice is exactly LEN_PREFIX_SIZE bytes, checked above.
    let mut len_bytes = [0u8; LEN_PREFIX_SIZE];
    len_bytes.copy_from_slice(prefix);
    let body_len = u32::from_be_bytes(len_bytes) as usize;

    if body_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: body_len, max: MAX_FRAME_SIZE });
    }

    let body = bytes
        .get(LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + body_len)
        .ok_or(ProtocolError::FrameTruncated {
            expected: body_len,
            actual: bytes.len().saturating_sub(LEN_PREFIX_SIZE),
        })?;

    ciborium::de::from_reader(body).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

/// Encode a server event as a length-delimited frame.
///
/// # Errors
///
/// - [`ProtocolError::CborEncode`] if serialization fails
/// - [`ProtocolError::FrameTooLarge`] if the body exceeds [`MAX_FRAME_SIZE`]
pub fn encode_event(event: &ServerEvent, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
    encode_frame(event, dst)
}

/// Decode a server event from a length-delimited frame.
///
/// Trailing bytes beyond the claimed body length are ignored.
///
/// # Errors
///
/// - [`ProtocolError::FrameTruncated`] if the buffer is shorter than claimed
/// - [`ProtocolError::FrameTooLarge`] if the prefix claims an oversized body
/// - [`ProtocolError::CborDecode`] if the body is malformed
pub fn decode_event(bytes: &[u8]) -> Result<ServerEvent, ProtocolError> {
    decode_frame(bytes)
}

/// Encode a client command as a length-delimited frame.
///
/// # Errors
///
/// Same as [`encode_event`].
pub fn encode_command(command: &ClientCommand, dst: &mut impl BufMut) -> Result<(), ProtocolError> {
    encode_frame(command, dst)
}

/// Decode a client command from a length-delimited frame.
///
/// # Errors
///
/// Same as [`decode_event`].
pub fn decode_command(bytes: &[u8]) -> Result<ClientCommand, ProtocolError> {
    decode_frame(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{MessageId, PresenceOrigin, PresenceStatus, RoomId, UserId};

    #[test]
    fn event_round_trip() {
        let event = ServerEvent::Presence {
            user_id: UserId(7),
            status: PresenceStatus::Online,
            timestamp: 1_700_000_000_000,
            origin: PresenceOrigin::Incremental,
        };

        let mut wire = Vec::new();
        encode_event(&event, &mut wire).unwrap();
        assert_eq!(decode_event(&wire).unwrap(), event);
    }

    #[test]
    fn command_round_trip() {
        let command = ClientCommand::Reaction {
            room_id: RoomId(1),
            message_id: MessageId(42),
            emoji: "thumbsup".to_string(),
            op: crate::ReactionOp::Add,
        };

        let mut wire = Vec::new();
        encode_command(&command, &mut wire).unwrap();
        assert_eq!(decode_command(&wire).unwrap(), command);
    }

    #[test]
    fn reject_truncated_frame() {
        let event = ServerEvent::RoomJoined { room_id: RoomId(1) };
        let mut wire = Vec::new();
        encode_event(&event, &mut wire).unwrap();

        wire.truncate(wire.len() - 1);
        assert!(matches!(decode_event(&wire), Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn reject_oversized_length_prefix() {
        let mut wire = Vec::new();
        wire.put_u32(u32::MAX);
        wire.put_slice(&[0u8; 16]);

        assert!(matches!(decode_event(&wire), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn reject_garbage_body() {
        let mut wire = Vec::new();
        wire.put_u32(4);
        wire.put_slice(&[0xff, 0xff, 0xff, 0xff]);

        assert!(matches!(decode_event(&wire), Err(ProtocolError::CborDecode(_))));
    }
}
