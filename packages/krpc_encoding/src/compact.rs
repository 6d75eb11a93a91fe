use crate::node_id::NodeID;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};

/// A compact IPv4 peer contact: 4 bytes of address, 2 bytes of big-endian
/// port. This is the `values` entry format for `get_peers` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Addr(pub SocketAddrV4);

impl Addr {
    pub const LEN: usize = 6;

    pub fn encode(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[0..4].copy_from_slice(&self.0.ip().octets());
        out[4..6].copy_from_slice(&self.0.port().to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Addr> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Some(Addr(SocketAddrV4::new(ip, port)))
    }
}

impl From<SocketAddrV4> for Addr {
    fn from(addr: SocketAddrV4) -> Addr {
        Addr(addr)
    }
}

impl From<Addr> for SocketAddrV4 {
    fn from(addr: Addr) -> SocketAddrV4 {
        addr.0
    }
}

impl Serialize for Addr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::Bytes::new(&self.encode()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Addr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let buf = serde_bytes::ByteBuf::deserialize(deserializer)?;
        Addr::decode(&buf).ok_or_else(|| {
            serde::de::Error::custom(format!("compact peer must be 6 bytes, got {}", buf.len()))
        })
    }
}

/// A Kademlia contact as seen on the wire: node id plus its IPv4 socket
/// address, packed as 20 + 4 + 2 = 26 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeID,
    pub address: SocketAddrV4,
}

impl NodeInfo {
    pub const LEN: usize = NodeID::LEN + Addr::LEN;

    pub fn new(id: NodeID, address: SocketAddrV4) -> NodeInfo {
        NodeInfo { id, address }
    }

    fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..20].copy_from_slice(self.id.as_bytes());
        out[20..26].copy_from_slice(&Addr(self.address).encode());
        out
    }

    fn decode(bytes: &[u8]) -> Option<NodeInfo> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let id = NodeID::from_slice(&bytes[0..20])?;
        let address = Addr::decode(&bytes[20..26])?.0;
        Some(NodeInfo { id, address })
    }
}

/// Parses a "compact node info" byte string (BEP-5 §"find_node" response)
/// into individual 26-byte `NodeInfo`s. Per the testable property in the
/// spec, any length that isn't a multiple of 26 is rejected outright rather
/// than silently truncated.
pub fn decode_compact_nodes(bytes: &[u8]) -> Option<Vec<NodeInfo>> {
    if bytes.len() % NodeInfo::LEN != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(NodeInfo::LEN)
            .map(|chunk| NodeInfo::decode(chunk).expect("chunk is exactly NodeInfo::LEN"))
            .collect(),
    )
}

pub fn encode_compact_nodes(nodes: &[NodeInfo]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * NodeInfo::LEN);
    for node in nodes {
        out.extend_from_slice(&node.encode());
    }
    out
}

/// `serde(with = "node_info")` helper: (de)serializes `Vec<NodeInfo>` as the
/// single bencoded byte string KRPC expects, rather than as a bencode list.
pub mod node_info {
    use super::{decode_compact_nodes, encode_compact_nodes, NodeInfo};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_bytes::ByteBuf;

    pub fn serialize<S>(nodes: &[NodeInfo], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::Bytes::new(&encode_compact_nodes(nodes)).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<NodeInfo>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let buf = ByteBuf::deserialize(deserializer)?;
        decode_compact_nodes(&buf)
            .ok_or_else(|| serde::de::Error::custom("compact node list length not a multiple of 26"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_node_round_trip() {
        let node = NodeInfo::new(
            NodeID::random(),
            SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 6881),
        );
        let encoded = node.encode();
        let decoded = NodeInfo::decode(&encoded).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn decode_compact_nodes_rejects_bad_length() {
        assert!(decode_compact_nodes(&[0u8; 25]).is_none());
        assert!(decode_compact_nodes(&[0u8; 52]).unwrap().len() == 2);
    }

    #[test]
    fn addr_round_trip() {
        let addr = Addr(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 1234));
        let encoded = addr.encode();
        assert_eq!(Addr::decode(&encoded).unwrap(), addr);
    }
}
