use crate::{booleans, compact::node_info, Addr, NodeID, NodeInfo};
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::fmt;

/// Top-level KRPC message: the envelope common to queries, responses and
/// errors, with the `y`-tagged body flattened in.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Envelope {
    /// Public IP address of the requester, sent by peers supporting BEP-42.
    pub ip: Option<Addr>,

    /// Transaction id generated by the querying node and echoed back.
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: Vec<u8>,

    /// Client version string.
    #[serde(rename = "v")]
    pub version: Option<ByteBuf>,

    #[serde(flatten)]
    pub body: MessageType,

    /// Set by read-only DHT nodes (BEP-43).
    #[serde(
        rename = "ro",
        default,
        skip_serializing_if = "booleans::is_false",
        deserialize_with = "booleans::deserialize"
    )]
    pub read_only: bool,
}

impl Envelope {
    pub fn decode(bytes: &[u8]) -> crate::Result<Envelope> {
        serde_bencode::de::from_bytes(bytes).map_err(|cause| crate::Error::Decode {
            cause: cause.to_string(),
        })
    }

    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        serde_bencode::ser::to_bytes(self).map_err(|cause| crate::Error::Encode {
            cause: cause.to_string(),
        })
    }

    pub fn query(transaction_id: Vec<u8>, query: Query) -> Envelope {
        Envelope {
            ip: None,
            transaction_id,
            version: None,
            body: MessageType::Query { query },
            read_only: false,
        }
    }

    pub fn response(transaction_id: Vec<u8>, response: Response) -> Envelope {
        Envelope {
            ip: None,
            transaction_id,
            version: None,
            body: MessageType::Response { response },
            read_only: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "y")]
pub enum MessageType {
    #[serde(rename = "q")]
    Query {
        #[serde(flatten)]
        query: Query,
    },

    #[serde(rename = "r")]
    Response {
        #[serde(rename = "r")]
        response: Response,
    },

    #[serde(rename = "e")]
    Error {
        #[serde(rename = "e")]
        error: KRPCError,
    },
}

/// Error sent when a query cannot be fulfilled. The crawler never emits
/// these and silently drops any it receives (see [`crate::Envelope`] docs on
/// the engine not maintaining a mandatory correlation table).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct KRPCError(pub u32, pub String);

impl fmt::Display for KRPCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "q", content = "a")]
pub enum Query {
    #[serde(rename = "ping")]
    Ping { id: NodeID },

    #[serde(rename = "find_node")]
    FindNode { id: NodeID, target: NodeID },

    #[serde(rename = "get_peers")]
    GetPeers {
        id: NodeID,
        info_hash: NodeID,
    },

    #[serde(rename = "announce_peer")]
    AnnouncePeer {
        id: NodeID,

        /// When true, `port` should be ignored in favor of the sender's UDP
        /// source port (BEP-5).
        #[serde(default, deserialize_with = "booleans::deserialize")]
        implied_port: bool,

        port: Option<u16>,
        info_hash: NodeID,

        #[serde(with = "serde_bytes")]
        token: Vec<u8>,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(untagged)]
pub enum Response {
    /// Response to `find_node`, and the "no peers, here are nodes instead"
    /// branch of `get_peers`.
    NextHop {
        id: NodeID,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<ByteBuf>,

        #[serde(with = "node_info")]
        nodes: Vec<NodeInfo>,
    },

    /// Response to `get_peers` when the queried node actually has peers.
    GetPeers {
        id: NodeID,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<ByteBuf>,

        #[serde(rename = "values")]
        peers: Vec<Addr>,
    },

    /// Response to `ping` and `announce_peer`.
    OnlyID { id: NodeID },
}
