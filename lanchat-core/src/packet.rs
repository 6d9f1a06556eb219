//! Wire packets: JSON datagrams tagged by a `type` discriminator.
//!
//! Two shapes exist on the wire. An `announcement` advertises a username's
//! presence; a `message` carries a fully serialized [`Message`]. Unknown
//! extra fields are ignored on decode so newer peers can add fields without
//! breaking older ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One UDP datagram's worth of protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Packet {
    /// Broadcast presence beacon.
    Announcement {
        username: String,
        timestamp: DateTime<Utc>,
    },
    /// Unicast direct message.
    Message { data: Message },
}

/// Encode a packet as a JSON datagram payload.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, PacketEncodeError> {
    Ok(serde_json::to_vec(packet)?)
}

/// Decode one datagram. Fails on a missing or unrecognized `type`
/// discriminator, missing required fields, or field type mismatches, and on
/// payloads truncated by the receive buffer.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, PacketDecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[derive(Debug, thiserror::Error)]
#[error("encode error: {0}")]
pub struct PacketEncodeError(#[from] serde_json::Error);

#[derive(Debug, thiserror::Error)]
#[error("malformed packet: {0}")]
pub struct PacketDecodeError(#[from] serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message::new(
            "alice",
            "bob",
            "Hi",
            "hello there",
            Some("c0ffee00".to_string()),
            None,
        )
    }

    #[test]
    fn roundtrip_announcement() {
        let packet = Packet::Announcement {
            username: "alice#1a2b".to_string(),
            timestamp: Utc::now(),
        };
        let bytes = encode_packet(&packet).unwrap();
        assert_eq!(decode_packet(&bytes).unwrap(), packet);
    }

    #[test]
    fn roundtrip_message() {
        let packet = Packet::Message {
            data: sample_message(),
        };
        let bytes = encode_packet(&packet).unwrap();
        assert_eq!(decode_packet(&bytes).unwrap(), packet);
    }

    #[test]
    fn announcement_wire_shape() {
        let packet = Packet::Announcement {
            username: "alice".to_string(),
            timestamp: Utc::now(),
        };
        let bytes = encode_packet(&packet).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "announcement");
        assert_eq!(value["username"], "alice");
        // ISO-8601 string, not a number.
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn missing_discriminator_rejected() {
        let err = decode_packet(br#"{"username":"alice"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn unknown_discriminator_rejected() {
        let err = decode_packet(br#"{"type":"handshake","username":"alice"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn missing_required_field_rejected() {
        let err = decode_packet(br#"{"type":"announcement","timestamp":"2026-01-01T00:00:00Z"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn field_type_mismatch_rejected() {
        let err = decode_packet(br#"{"type":"announcement","username":7,"timestamp":"2026-01-01T00:00:00Z"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn unknown_extra_fields_ignored() {
        let decoded = decode_packet(
            br#"{"type":"announcement","username":"alice","timestamp":"2026-01-01T00:00:00Z","hops":3}"#,
        )
        .unwrap();
        assert!(matches!(decoded, Packet::Announcement { ref username, .. } if username == "alice"));
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = encode_packet(&Packet::Message {
            data: sample_message(),
        })
        .unwrap();
        assert!(decode_packet(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn message_without_optionals_decodes() {
        let decoded = decode_packet(
            br#"{"type":"message","data":{"id":"m1","sender":"bob","recipient":"alice","title":"t","content":"c","timestamp":"2026-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        match decoded {
            Packet::Message { data } => {
                assert_eq!(data.conversation_id, None);
                assert_eq!(data.reply_to, None);
            }
            _ => panic!("expected Message"),
        }
    }
}
