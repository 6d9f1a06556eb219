//! lanchat protocol and state: wire packets, peer liveness, message store.
//! No I/O here; the daemon crate owns the socket and the loops.

pub mod message;
pub mod packet;
pub mod peers;
pub mod store;

pub use message::{conversation_id, Message};
pub use packet::{decode_packet, encode_packet, Packet, PacketDecodeError, PacketEncodeError};
pub use peers::{Peer, PeerTable};
pub use store::ConversationStore;
