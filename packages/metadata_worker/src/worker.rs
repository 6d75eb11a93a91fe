use crate::error::Error;
use crate::extension;
use crate::framing::{self, Frame, EXTENDED_MESSAGE_ID};
use crate::handshake::{self, Handshake};
use crate::outcome::Outcome;
use crate::piece::{self, PieceReply};
use sha1::{Digest, Sha1};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Metadata larger than this is refused outright — no legitimate torrent
/// carries a 10 MiB info dict, and anything claiming to is either lying or
/// a resource-exhaustion attempt.
pub const MAX_METADATA: i64 = 10 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const RECV_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FetchRequest {
    pub addr: SocketAddr,
    pub info_hash: [u8; 20],
    pub listen_port: u16,
    pub user_agent: String,
}

/// Connects to one peer and attempts to pull the full metadata (info dict)
/// for `request.info_hash`, verifying it against the hash before returning
/// it. Every failure mode collapses to an [`Outcome`] variant rather than
/// propagating — callers (the scheduler) never see a bare `Error`.
pub async fn fetch(request: FetchRequest) -> Outcome {
    match fetch_inner(&request).await {
        Ok(data) => {
            log::info!(target: "meta", "fetched {} bytes from {}", data.len(), request.addr);
            Outcome::Success(data)
        }
        Err(err) => {
            log::debug!(target: "meta", "fetch from {} failed: {}", request.addr, err);
            Outcome::from(err)
        }
    }
}

async fn fetch_inner(request: &FetchRequest) -> Result<Vec<u8>, Error> {
    let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(request.addr))
        .await
        .map_err(|_| Error::Timeout("connect".into()))?
        .map_err(|cause| Error::ConnRefused(cause.to_string()))?;

    let our_peer_id = handshake::random_peer_id();
    let outbound = Handshake::new(request.info_hash, our_peer_id);
    recv_timeout(
        tokio::io::AsyncWriteExt::write_all(&mut stream, &outbound.to_bytes()),
    )
    .await
    .map_err(|cause| Error::Io(cause.to_string()))?;

    let mut reply = [0u8; handshake::LEN];
    recv_timeout(tokio::io::AsyncReadExt::read_exact(&mut stream, &mut reply))
        .await
        .map_err(|_| Error::HandshakeFail("peer closed before handshake reply".into()))?;

    let peer_handshake = Handshake::from_bytes(&reply)
        .ok_or_else(|| Error::HandshakeFail("malformed handshake reply".into()))?;
    if peer_handshake.info_hash != request.info_hash {
        return Err(Error::HandshakeFail("info_hash mismatch".into()));
    }
    if !peer_handshake.supports_extensions() {
        return Err(Error::HandshakeFail("peer does not support BEP-10".into()));
    }

    let our_handshake_payload = extension::build_extended_handshake(
        request.listen_port,
        &request.user_agent,
    );
    let mut extended_out = vec![0u8];
    extended_out.extend_from_slice(&our_handshake_payload);
    recv_timeout(framing::write_message(
        &mut stream,
        EXTENDED_MESSAGE_ID,
        &extended_out,
    ))
    .await?;

    let peer_ext = read_peer_extended_handshake(&mut stream).await?;
    if peer_ext.metadata_size <= 0 || peer_ext.metadata_size > MAX_METADATA {
        return Err(Error::ProtocolFail(format!(
            "rejected metadata_size {}",
            peer_ext.metadata_size
        )));
    }

    let metadata = fetch_pieces(&mut stream, peer_ext.ut_metadata_id, peer_ext.metadata_size).await?;

    verify(&metadata, &request.info_hash)?;
    Ok(metadata)
}

async fn read_peer_extended_handshake(
    stream: &mut TcpStream,
) -> Result<extension::PeerExtendedHandshake, Error> {
    loop {
        let frame = recv_timeout(framing::read_frame(stream)).await?;
        match frame {
            Frame::Keepalive => continue,
            Frame::Message { id, payload } if id == EXTENDED_MESSAGE_ID => {
                let (sub_id, rest) = framing::split_extension_payload(&payload)?;
                if sub_id != 0 {
                    // Not the handshake (sub-id 0); a well-behaved peer sends
                    // its handshake first, so anything else here is noise.
                    continue;
                }
                return extension::parse_extended_handshake(rest);
            }
            Frame::Message { .. } => continue,
        }
    }
}

async fn fetch_pieces(
    stream: &mut TcpStream,
    peer_ut_metadata_id: u8,
    metadata_size: i64,
) -> Result<Vec<u8>, Error> {
    const PIECE_LEN: i64 = 16 * 1024;
    let piece_count = ((metadata_size + PIECE_LEN - 1) / PIECE_LEN) as usize;
    let mut pieces: Vec<Option<Vec<u8>>> = vec![None; piece_count];

    for index in 0..piece_count {
        let request_payload = piece::encode_request(index as u32);
        let mut extended_out = vec![peer_ut_metadata_id];
        extended_out.extend_from_slice(&request_payload);
        recv_timeout(framing::write_message(
            stream,
            EXTENDED_MESSAGE_ID,
            &extended_out,
        ))
        .await?;

        let piece_data = read_one_piece(stream, index as u32, metadata_size).await?;
        pieces[index] = Some(piece_data);
    }

    let mut metadata = Vec::with_capacity(metadata_size as usize);
    for piece in pieces {
        metadata.extend(piece.expect("every index was requested and filled in order"));
    }
    metadata.truncate(metadata_size as usize);
    Ok(metadata)
}

/// Reads frames until the reply for `expected_piece` arrives. A real peer
/// may interleave other extension or keep-alive traffic, so out-of-order
/// noise (but not out-of-order *data* — we request sequentially) is skipped
/// rather than treated as a protocol violation. Both `piece` and
/// `total_size` must match what we asked for and what the extended
/// handshake advertised; a `piece` match with a differing `total_size` is
/// rejected rather than silently accepted.
async fn read_one_piece(
    stream: &mut TcpStream,
    expected_piece: u32,
    expected_metadata_size: i64,
) -> Result<Vec<u8>, Error> {
    loop {
        let frame = recv_timeout(framing::read_frame(stream)).await?;
        let (id, payload) = match frame {
            Frame::Keepalive => continue,
            Frame::Message { id, payload } => (id, payload),
        };
        if id != EXTENDED_MESSAGE_ID {
            continue;
        }

        let (_sub_id, rest) = framing::split_extension_payload(&payload)?;
        match piece::parse_reply(rest)? {
            PieceReply::Data { piece, total_size, data } if piece == expected_piece => {
                if total_size != expected_metadata_size {
                    return Err(Error::ProtocolFail(format!(
                        "piece {piece} total_size {total_size} does not match advertised metadata_size {expected_metadata_size}"
                    )));
                }
                return Ok(data);
            }
            PieceReply::Data { .. } => continue,
            PieceReply::Reject { piece } if piece == expected_piece => {
                return Err(Error::ProtocolFail(format!("peer rejected piece {piece}")));
            }
            PieceReply::Reject { .. } | PieceReply::Unknown => continue,
        }
    }
}

fn verify(metadata: &[u8], info_hash: &[u8; 20]) -> Result<(), Error> {
    let mut hasher = Sha1::new();
    hasher.update(metadata);
    let digest = hasher.finalize();
    if digest.as_slice() == info_hash {
        Ok(())
    } else {
        Err(Error::HashMismatch("sha1 mismatch".into()))
    }
}

async fn recv_timeout<F, T, E>(fut: F) -> Result<T, Error>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    match timeout(RECV_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(Error::Io("io error during transfer".into())),
        Err(_) => Err(Error::Timeout("recv".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn mock_peer_handshake_reject(listener: TcpListener) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; handshake::LEN];
        socket.read_exact(&mut buf).await.unwrap();
        // Reply with a handshake advertising a *different* info_hash.
        let bogus = Handshake::new([0xFF; 20], handshake::random_peer_id());
        socket.write_all(&bogus.to_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn handshake_mismatch_is_handshake_fail() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(mock_peer_handshake_reject(listener));

        let outcome = fetch(FetchRequest {
            addr,
            info_hash: [0x11; 20],
            listen_port: 6881,
            user_agent: "test/1.0".into(),
        })
        .await;

        assert!(matches!(outcome, Outcome::HandshakeFail));
    }

    async fn mock_peer_full_exchange(listener: TcpListener, info_hash: [u8; 20], metadata: Vec<u8>) {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = [0u8; handshake::LEN];
        socket.read_exact(&mut buf).await.unwrap();
        let reply = Handshake::new(info_hash, handshake::random_peer_id());
        socket.write_all(&reply.to_bytes()).await.unwrap();

        // Read their extended handshake.
        let _ = framing::read_frame(&mut socket).await.unwrap();

        let our_ext = extension::build_extended_handshake(0, "mock/1.0");
        let mut out = vec![0u8];
        out.extend_from_slice(&our_ext);
        framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out)
            .await
            .unwrap();

        // The real peer's handshake includes metadata_size via a custom dict;
        // build it by hand here since extension::build_extended_handshake
        // doesn't know metadata_size.
        let metadata_size = metadata.len() as i64;
        let handshake_with_size = {
            use bencode::Value;
            use std::collections::BTreeMap;
            let mut m = BTreeMap::new();
            m.insert(b"ut_metadata".to_vec(), Value::Int(1));
            let mut dict = BTreeMap::new();
            dict.insert(b"m".to_vec(), Value::Dict(m));
            dict.insert(b"metadata_size".to_vec(), Value::Int(metadata_size));
            bencode::encode(&Value::Dict(dict))
        };
        let mut out2 = vec![0u8];
        out2.extend_from_slice(&handshake_with_size);
        framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out2)
            .await
            .unwrap();

        const PIECE_LEN: usize = 16 * 1024;
        let piece_count = (metadata.len() + PIECE_LEN - 1) / PIECE_LEN;
        for _ in 0..piece_count {
            let frame = framing::read_frame(&mut socket).await.unwrap();
            let (_id, payload) = match frame {
                Frame::Message { id, payload } => (id, payload),
                Frame::Keepalive => panic!("unexpected keepalive"),
            };
            let (_sub_id, rest) = framing::split_extension_payload(&payload).unwrap();
            let value = bencode::decode_prefix(rest).unwrap().0;
            let piece_index = value.get(b"piece").unwrap().as_int().unwrap() as usize;

            let start = piece_index * PIECE_LEN;
            let end = (start + PIECE_LEN).min(metadata.len());
            let chunk = &metadata[start..end];

            use bencode::Value as V;
            use std::collections::BTreeMap;
            let mut dict = BTreeMap::new();
            dict.insert(b"msg_type".to_vec(), V::Int(1));
            dict.insert(b"piece".to_vec(), V::Int(piece_index as i64));
            dict.insert(b"total_size".to_vec(), V::Int(metadata.len() as i64));
            let mut reply_payload = bencode::encode(&V::Dict(dict));
            reply_payload.extend_from_slice(chunk);

            let mut out = vec![1u8];
            out.extend_from_slice(&reply_payload);
            framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out)
                .await
                .unwrap();
        }
    }

    /// Like `mock_peer_full_exchange`, but the piece reply's `total_size`
    /// doesn't match what the extended handshake advertised.
    async fn mock_peer_lying_total_size(listener: TcpListener, info_hash: [u8; 20], metadata: Vec<u8>) {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = [0u8; handshake::LEN];
        socket.read_exact(&mut buf).await.unwrap();
        let reply = Handshake::new(info_hash, handshake::random_peer_id());
        socket.write_all(&reply.to_bytes()).await.unwrap();

        let _ = framing::read_frame(&mut socket).await.unwrap();

        let our_ext = extension::build_extended_handshake(0, "mock/1.0");
        let mut out = vec![0u8];
        out.extend_from_slice(&our_ext);
        framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out)
            .await
            .unwrap();

        let metadata_size = metadata.len() as i64;
        let handshake_with_size = {
            use bencode::Value;
            use std::collections::BTreeMap;
            let mut m = BTreeMap::new();
            m.insert(b"ut_metadata".to_vec(), Value::Int(1));
            let mut dict = BTreeMap::new();
            dict.insert(b"m".to_vec(), Value::Dict(m));
            dict.insert(b"metadata_size".to_vec(), Value::Int(metadata_size));
            bencode::encode(&Value::Dict(dict))
        };
        let mut out2 = vec![0u8];
        out2.extend_from_slice(&handshake_with_size);
        framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out2)
            .await
            .unwrap();

        let frame = framing::read_frame(&mut socket).await.unwrap();
        let (_id, payload) = match frame {
            Frame::Message { id, payload } => (id, payload),
            Frame::Keepalive => panic!("unexpected keepalive"),
        };
        let (_sub_id, rest) = framing::split_extension_payload(&payload).unwrap();
        let value = bencode::decode_prefix(rest).unwrap().0;
        let piece_index = value.get(b"piece").unwrap().as_int().unwrap() as usize;

        use bencode::Value as V;
        use std::collections::BTreeMap;
        let mut dict = BTreeMap::new();
        dict.insert(b"msg_type".to_vec(), V::Int(1));
        dict.insert(b"piece".to_vec(), V::Int(piece_index as i64));
        dict.insert(b"total_size".to_vec(), V::Int(metadata_size + 1));
        let mut reply_payload = bencode::encode(&V::Dict(dict));
        reply_payload.extend_from_slice(&metadata);

        let mut out = vec![1u8];
        out.extend_from_slice(&reply_payload);
        framing::write_message(&mut socket, EXTENDED_MESSAGE_ID, &out)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn successful_fetch_verifies_hash() {
        let metadata = vec![0x42u8; 40000];
        let mut hasher = Sha1::new();
        hasher.update(&metadata);
        let info_hash: [u8; 20] = hasher.finalize().into();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(mock_peer_full_exchange(listener, info_hash, metadata.clone()));

        let outcome = fetch(FetchRequest {
            addr,
            info_hash,
            listen_port: 6881,
            user_agent: "test/1.0".into(),
        })
        .await;

        match outcome {
            Outcome::Success(data) => assert_eq!(data, metadata),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hash_mismatch_is_hash_mismatch() {
        let real_metadata = vec![0x42u8; 1024];
        // Claim a hash that doesn't match what we'll actually send.
        let wrong_hash = [0x99; 20];

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(mock_peer_full_exchange(listener, wrong_hash, real_metadata));

        let outcome = fetch(FetchRequest {
            addr,
            info_hash: wrong_hash,
            listen_port: 6881,
            user_agent: "test/1.0".into(),
        })
        .await;

        assert!(matches!(outcome, Outcome::HashMismatch));
    }

    #[tokio::test]
    async fn total_size_mismatch_is_protocol_fail() {
        let metadata = vec![0x42u8; 1024];
        let mut hasher = Sha1::new();
        hasher.update(&metadata);
        let info_hash: [u8; 20] = hasher.finalize().into();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(mock_peer_lying_total_size(listener, info_hash, metadata));

        let outcome = fetch(FetchRequest {
            addr,
            info_hash,
            listen_port: 6881,
            user_agent: "test/1.0".into(),
        })
        .await;

        assert!(matches!(outcome, Outcome::ProtocolFail));
    }
}
