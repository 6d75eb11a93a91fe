use crate::error::{Error, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const EXTENDED_MESSAGE_ID: u8 = 20;

/// A length-prefixed BitTorrent wire message read off the socket, already
/// stripped of the 4-byte length. `Keepalive` is a length-0 message with no
/// id byte at all.
pub enum Frame {
    Keepalive,
    Message { id: u8, payload: Vec<u8> },
}

/// Reads exactly one length-prefixed frame, looping on partial reads the
/// way a real TCP stream demands.
pub async fn read_frame(stream: &mut TcpStream) -> Result<Frame> {
    let len = read_u32(stream).await?;
    if len == 0 {
        return Ok(Frame::Keepalive);
    }

    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|_| Error::ProtocolFail("connection closed mid-frame".into()))?;

    let id = body[0];
    let payload = body[1..].to_vec();
    Ok(Frame::Message { id, payload })
}

pub async fn write_message(stream: &mut TcpStream, id: u8, payload: &[u8]) -> Result<()> {
    let len = 1 + payload.len();
    let mut out = Vec::with_capacity(4 + len);
    out.extend_from_slice(&(len as u32).to_be_bytes());
    out.push(id);
    out.extend_from_slice(payload);

    stream
        .write_all(&out)
        .await
        .map_err(|cause| Error::Io(cause.to_string()))
}

async fn read_u32(stream: &mut TcpStream) -> Result<u32> {
    let mut buf = [0u8; 4];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|_| Error::ProtocolFail("connection closed before length prefix".into()))?;
    Ok(u32::from_be_bytes(buf))
}

/// Extracts `(sub_id, rest)` from an extension-protocol message payload
/// (message id 20). `rest` still contains the bencoded header followed by
/// any raw binary tail — extension.rs and piece.rs split that further.
pub fn split_extension_payload(payload: &[u8]) -> Result<(u8, &[u8])> {
    payload
        .split_first()
        .map(|(sub_id, rest)| (*sub_id, rest))
        .ok_or_else(|| Error::ProtocolFail("empty extension message".into()))
}
