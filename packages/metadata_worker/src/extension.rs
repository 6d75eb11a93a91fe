use crate::error::Error;
use bencode::Value;
use std::collections::BTreeMap;

pub const UT_METADATA: &[u8] = b"ut_metadata";
pub const OUR_UT_METADATA_ID: u8 = 1;

/// The extended handshake we send (BEP-10), sub-message id 0.
pub fn build_extended_handshake(listen_port: u16, user_agent: &str) -> Vec<u8> {
    let mut m = BTreeMap::new();
    m.insert(UT_METADATA.to_vec(), Value::Int(OUR_UT_METADATA_ID as i64));

    let mut dict = BTreeMap::new();
    dict.insert(b"m".to_vec(), Value::Dict(m));
    dict.insert(b"p".to_vec(), Value::Int(listen_port as i64));
    dict.insert(b"v".to_vec(), Value::bytes(user_agent.as_bytes().to_vec()));

    bencode::encode(&Value::Dict(dict))
}

/// The fields we care about from the peer's extended handshake.
pub struct PeerExtendedHandshake {
    pub ut_metadata_id: u8,
    pub metadata_size: i64,
}

pub fn parse_extended_handshake(payload: &[u8]) -> Result<PeerExtendedHandshake, Error> {
    let value = bencode::decode_exact(payload)
        .map_err(|e| Error::HandshakeFail(format!("malformed extended handshake: {e}")))?;

    let ut_metadata_id = value
        .get(b"m")
        .and_then(|m| m.get(UT_METADATA))
        .and_then(|v| v.as_int().ok())
        .ok_or_else(|| Error::HandshakeFail("peer does not support ut_metadata".into()))?;

    let metadata_size = value
        .get(b"metadata_size")
        .and_then(|v| v.as_int().ok())
        .ok_or_else(|| Error::HandshakeFail("peer did not advertise metadata_size".into()))?;

    if metadata_size <= 0 {
        return Err(Error::HandshakeFail(format!(
            "peer advertised non-positive metadata_size {metadata_size}"
        )));
    }

    Ok(PeerExtendedHandshake {
        ut_metadata_id: ut_metadata_id as u8,
        metadata_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_valid_handshake_dict() {
        let encoded = build_extended_handshake(6881, "crawler/1.0");
        let value = bencode::decode_exact(&encoded).unwrap();
        assert_eq!(
            value.get(b"m").unwrap().get(UT_METADATA).unwrap().as_int().unwrap(),
            OUR_UT_METADATA_ID as i64
        );
    }

    #[test]
    fn parses_peer_handshake() {
        let raw = b"d1:md11:ut_metadatai3ee13:metadata_sizei40000ee";
        let parsed = parse_extended_handshake(raw).unwrap();
        assert_eq!(parsed.ut_metadata_id, 3);
        assert_eq!(parsed.metadata_size, 40000);
    }

    #[test]
    fn rejects_missing_metadata_size() {
        let raw = b"d1:md11:ut_metadatai3eee";
        assert!(parse_extended_handshake(raw).is_err());
    }

    #[test]
    fn rejects_non_positive_metadata_size() {
        let raw = b"d1:md11:ut_metadatai3ee13:metadata_sizei0ee";
        assert!(parse_extended_handshake(raw).is_err());
    }
}
