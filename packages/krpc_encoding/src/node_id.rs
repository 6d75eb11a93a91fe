use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::fmt;

/// A 20-byte Kademlia node identifier. Also used, unmodified, as an
/// infohash — both are opaque 160-bit strings on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeID([u8; 20]);

impl NodeID {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> NodeID {
        NodeID(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<NodeID> {
        if bytes.len() != Self::LEN {
            return None;
        }
        let mut array = [0u8; 20];
        array.copy_from_slice(bytes);
        Some(NodeID(array))
    }

    pub fn random() -> NodeID {
        let mut bytes = [0u8; 20];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        NodeID(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Bitwise XOR distance. The result's byte-lexicographic order is the
    /// same as the 160-bit numeric order, so comparing two `NodeID`s
    /// returned from `distance` with `<`/`>` gives the correct "closer to"
    /// answer without needing a bignum type.
    pub fn distance(&self, other: &NodeID) -> NodeID {
        let mut out = [0u8; 20];
        for i in 0..20 {
            out[i] = self.0[i] ^ other.0[i];
        }
        NodeID(out)
    }

    /// Builds a node ID that looks maximally close to `target`: the first 19
    /// bytes of `target` plus one random byte. Used to respond to (and to
    /// issue) `find_node` queries so that peers believe this node is the
    /// best next hop toward whatever they're looking for, which in practice
    /// makes them route more `get_peers`/`announce_peer` traffic our way.
    pub fn spoof_close_to(target: &NodeID) -> NodeID {
        let mut bytes = target.0;
        bytes[19] = rand::random();
        NodeID(bytes)
    }
}

impl fmt::Debug for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeID({})", self.to_hex())
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for NodeID {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ByteBuf::from(self.0.to_vec()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeID {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let buf = ByteBuf::deserialize(deserializer)?;
        NodeID::from_slice(&buf).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "node id must be {} bytes, got {}",
                NodeID::LEN,
                buf.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoof_keeps_first_19_bytes() {
        let target = NodeID::from_bytes([0xAA; 20]);
        let spoofed = NodeID::spoof_close_to(&target);
        assert_eq!(&spoofed.as_bytes()[0..19], &target.as_bytes()[0..19]);
    }

    #[test]
    fn distance_to_self_is_zero() {
        let id = NodeID::random();
        assert_eq!(id.distance(&id), NodeID::from_bytes([0; 20]));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = NodeID::random();
        let b = NodeID::random();
        assert_eq!(a.distance(&b), b.distance(&a));
    }
}
