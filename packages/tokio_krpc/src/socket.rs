use crate::send::SendTransport;
use crate::ActiveTransactions;
use krpc_encoding::Envelope;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const RECV_BUF_SIZE: usize = 2048;
const INBOUND_CHANNEL_CAPACITY: usize = 1024;
const TRANSACTION_TABLE_CAPACITY: usize = 256;

/// A message arriving on the UDP socket that decoded successfully. Anything
/// that doesn't decode is dropped before it ever reaches this channel.
pub struct Inbound {
    pub from: SocketAddr,
    pub envelope: Envelope,
}

/// Owns the UDP socket. `serve` splits it into a cloneable [`SendTransport`]
/// and a stream of decoded inbound messages, which is the only thing the
/// recv side of this socket is ever used for.
pub struct KRPCNode {
    socket: Arc<UdpSocket>,
}

impl KRPCNode {
    pub async fn bind(addr: SocketAddr) -> crate::error::Result<KRPCNode> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|cause| crate::error::Error::Bind { addr, cause })?;
        Ok(KRPCNode {
            socket: Arc::new(socket),
        })
    }

    /// Spawns the single recv loop for this socket and returns the send
    /// handle plus the inbound message channel. There is exactly one recv
    /// loop per socket for the lifetime of the process — this is the
    /// "single-threaded, event-driven over one UDP socket" engine model.
    pub fn serve(self) -> (SendTransport, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let transactions = ActiveTransactions::new(TRANSACTION_TABLE_CAPACITY);
        let send_transport = SendTransport::new(self.socket.clone(), transactions.clone());

        tokio::spawn(recv_loop(self.socket, tx, transactions));

        (send_transport, rx)
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    inbound: mpsc::Sender<Inbound>,
    transactions: ActiveTransactions,
) {
    let mut buf = [0u8; RECV_BUF_SIZE];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                log::warn!("UDP recv error, retrying: {err}");
                continue;
            }
        };

        let envelope = match Envelope::decode(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::debug!("dropping malformed KRPC message from {from}: {err}");
                continue;
            }
        };

        if let krpc_encoding::MessageType::Error { error } = &envelope.body {
            log::debug!("dropping KRPC error from {from}: {error}");
            continue;
        }

        if matches!(envelope.body, krpc_encoding::MessageType::Response { .. }) {
            let resolved = transactions
                .resolve(&envelope.transaction_id, envelope.clone())
                .await;
            if resolved {
                continue;
            }
        }

        if inbound.send(Inbound { from, envelope }).await.is_err() {
            log::warn!("inbound channel closed, stopping recv loop");
            return;
        }
    }
}
