use crate::active_transactions::ActiveTransactions;
use crate::error::{Error, Result};
use crate::pacing::TokenBucket;
use crate::TransactionId;
use krpc_encoding::{Envelope, KRPCError, Query, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::Duration;

pub const DEFAULT_OUTBOUND_RATE: u32 = 200;

/// Sends KRPC messages, paced to avoid tripping rate limits on the nodes
/// being crawled.
///
/// Sending is not correlated to receiving by default: [`send_query`] fires a
/// query and returns as soon as the datagram is on the wire. Any response
/// shows up later, generically, on the [`crate::socket::Inbound`] channel —
/// this is the "crawl, don't look up" design the engine relies on. Callers
/// that specifically need a reply (tests, or a worker confirming a single
/// peer is alive) can use [`request`] instead, which waits on the optional
/// bounded transaction table.
#[derive(Clone)]
pub struct SendTransport {
    socket: Arc<UdpSocket>,
    transactions: ActiveTransactions,
    pacer: Arc<TokenBucket>,
}

impl SendTransport {
    pub fn new(socket: Arc<UdpSocket>, transactions: ActiveTransactions) -> SendTransport {
        SendTransport {
            socket,
            transactions,
            pacer: Arc::new(TokenBucket::new(DEFAULT_OUTBOUND_RATE)),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn random_transaction_id() -> TransactionId {
        rand::random::<u16>().to_be_bytes().to_vec()
    }

    /// Sends a query without waiting for a reply. Paced: this is the
    /// outbound `find_node` churn the token bucket exists to throttle.
    pub async fn send_query(&self, address: SocketAddr, query: Query) -> Result<TransactionId> {
        let transaction_id = Self::random_transaction_id();
        let envelope = Envelope::query(transaction_id.clone(), query);
        self.pacer.acquire().await;
        self.send(address, &envelope).await?;
        Ok(transaction_id)
    }

    /// Sends a query and waits up to `timeout` for its correlated response.
    /// Paced like [`send_query`].
    pub async fn request(
        &self,
        address: SocketAddr,
        query: Query,
        timeout: Duration,
    ) -> Result<Envelope> {
        let transaction_id = Self::random_transaction_id();
        let envelope = Envelope::query(transaction_id.clone(), query);

        let wait = self.transactions.wait_for(transaction_id, timeout);
        self.pacer.acquire().await;
        self.send(address, &envelope).await?;
        wait.await
    }

    /// Replies to an inbound query. Unpaced: the spec calls for inbound
    /// queries to be answered immediately, with backpressure coming only
    /// from the scheduler's queue (see `dht_crawler`), not from this bucket.
    pub async fn send_response(
        &self,
        address: SocketAddr,
        transaction_id: TransactionId,
        response: Response,
    ) -> Result<()> {
        let envelope = Envelope::response(transaction_id, response);
        self.send(address, &envelope).await
    }

    pub async fn send_error(
        &self,
        address: SocketAddr,
        transaction_id: TransactionId,
        error: KRPCError,
    ) -> Result<()> {
        let envelope = Envelope {
            ip: None,
            transaction_id,
            version: None,
            body: krpc_encoding::MessageType::Error { error },
            read_only: false,
        };
        self.send(address, &envelope).await
    }

    async fn send(&self, address: SocketAddr, envelope: &Envelope) -> Result<()> {
        let encoded = envelope.encode()?;
        self.socket
            .send_to(&encoded, address)
            .await
            .map_err(|cause| Error::Send { to: address, cause })?;
        Ok(())
    }
}
