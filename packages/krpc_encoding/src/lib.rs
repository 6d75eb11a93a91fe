//! Typed KRPC wire types for the BitTorrent Mainline DHT: the envelope
//! common to queries/responses/errors, and the compact node/peer encodings
//! used inside them.

mod booleans;
mod compact;
mod error;
mod messages;
mod node_id;

pub use compact::{decode_compact_nodes, encode_compact_nodes, node_info, Addr, NodeInfo};
pub use error::{Error, Result};
pub use messages::{Envelope, KRPCError, MessageType, Query, Response};
pub use node_id::NodeID;
