use crate::error::Error;
use bencode::Value;
use std::collections::BTreeMap;

const MSG_TYPE_REQUEST: i64 = 0;
const MSG_TYPE_DATA: i64 = 1;
const MSG_TYPE_REJECT: i64 = 2;

/// Encodes a `ut_metadata` piece request: `{msg_type: 0, piece: <index>}`.
pub fn encode_request(piece: u32) -> Vec<u8> {
    let mut dict = BTreeMap::new();
    dict.insert(b"msg_type".to_vec(), Value::Int(MSG_TYPE_REQUEST));
    dict.insert(b"piece".to_vec(), Value::Int(piece as i64));
    bencode::encode(&Value::Dict(dict))
}

pub enum PieceReply {
    Data { piece: u32, total_size: i64, data: Vec<u8> },
    Reject { piece: u32 },
    Unknown,
}

/// A `ut_metadata` reply is a bencoded header immediately followed (with no
/// separator) by the piece's raw bytes when `msg_type` is `data`. We have to
/// decode just enough of the header to know where it ends before we can
/// slice the binary tail off.
pub fn parse_reply(payload: &[u8]) -> Result<PieceReply, Error> {
    let (value, consumed) = bencode::decode_prefix(payload)
        .map_err(|e| Error::ProtocolFail(format!("malformed ut_metadata message: {e}")))?;

    let msg_type = value
        .get(b"msg_type")
        .and_then(|v| v.as_int().ok())
        .ok_or_else(|| Error::ProtocolFail("ut_metadata message missing msg_type".into()))?;

    let piece = value
        .get(b"piece")
        .and_then(|v| v.as_int().ok())
        .ok_or_else(|| Error::ProtocolFail("ut_metadata message missing piece".into()))?;
    let piece = u32::try_from(piece)
        .map_err(|_| Error::ProtocolFail("ut_metadata piece index out of range".into()))?;

    match msg_type {
        MSG_TYPE_DATA => {
            let total_size = value
                .get(b"total_size")
                .and_then(|v| v.as_int().ok())
                .ok_or_else(|| Error::ProtocolFail("data message missing total_size".into()))?;
            Ok(PieceReply::Data {
                piece,
                total_size,
                data: payload[consumed..].to_vec(),
            })
        }
        MSG_TYPE_REJECT => Ok(PieceReply::Reject { piece }),
        _ => Ok(PieceReply::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request() {
        let encoded = encode_request(2);
        assert_eq!(encoded, b"d8:msg_typei0e5:piecei2ee");
    }

    #[test]
    fn parses_data_reply_with_binary_tail() {
        let mut payload = b"d8:msg_typei1e5:piecei0e10:total_sizei40000ee".to_vec();
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        match parse_reply(&payload).unwrap() {
            PieceReply::Data { piece, total_size, data } => {
                assert_eq!(piece, 0);
                assert_eq!(total_size, 40000);
                assert_eq!(data, vec![0xAA, 0xBB, 0xCC]);
            }
            _ => panic!("expected data reply"),
        }
    }

    #[test]
    fn parses_reject() {
        let payload = b"d8:msg_typei2e5:piecei1ee";
        match parse_reply(payload).unwrap() {
            PieceReply::Reject { piece } => assert_eq!(piece, 1),
            _ => panic!("expected reject"),
        }
    }

    #[test]
    fn treats_unknown_msg_type_as_unknown() {
        let payload = b"d8:msg_typei9e5:piecei1ee";
        assert!(matches!(parse_reply(payload).unwrap(), PieceReply::Unknown));
    }
}
