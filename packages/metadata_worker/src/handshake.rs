/// The fixed 68-byte BitTorrent handshake (BEP-3), with the BEP-10
/// extension-protocol bit set so peers know to expect an extended
/// handshake afterward.
pub const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";
pub const LEN: usize = 49 + PROTOCOL.len();

/// Bit 20 of the reserved bytes, counting from the LSB of the 64-bit
/// reserved field, i.e. `reserved[5] |= 0x10`. This is how a peer advertises
/// BEP-10 extension protocol support.
const EXTENSION_PROTOCOL_BIT: (usize, u8) = (5, 0x10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub reserved: [u8; 8],
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Handshake {
        let mut reserved = [0u8; 8];
        let (byte, bit) = EXTENSION_PROTOCOL_BIT;
        reserved[byte] |= bit;

        Handshake {
            reserved,
            info_hash,
            peer_id,
        }
    }

    pub fn supports_extensions(&self) -> bool {
        let (byte, bit) = EXTENSION_PROTOCOL_BIT;
        self.reserved[byte] & bit != 0
    }

    pub fn to_bytes(&self) -> [u8; LEN] {
        let mut out = [0u8; LEN];
        out[0] = PROTOCOL.len() as u8;
        out[1..20].copy_from_slice(PROTOCOL);
        out[20..28].copy_from_slice(&self.reserved);
        out[28..48].copy_from_slice(&self.info_hash);
        out[48..68].copy_from_slice(&self.peer_id);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Handshake> {
        if bytes.len() != LEN {
            return None;
        }
        if bytes[0] as usize != PROTOCOL.len() || &bytes[1..20] != PROTOCOL.as_slice() {
            return None;
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[20..28]);
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&bytes[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&bytes[48..68]);

        Some(Handshake {
            reserved,
            info_hash,
            peer_id,
        })
    }
}

pub fn random_peer_id() -> [u8; 20] {
    let mut id = [0u8; 20];
    rand::Rng::fill(&mut rand::thread_rng(), &mut id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let handshake = Handshake::new([0xAA; 20], [0xBB; 20]);
        let bytes = handshake.to_bytes();
        let decoded = Handshake::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, handshake);
        assert!(decoded.supports_extensions());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Handshake::from_bytes(&[0u8; 10]).is_none());
    }

    #[test]
    fn rejects_wrong_pstr() {
        let mut bytes = Handshake::new([0; 20], [0; 20]).to_bytes();
        bytes[1] = b'x';
        assert!(Handshake::from_bytes(&bytes).is_none());
    }
}
