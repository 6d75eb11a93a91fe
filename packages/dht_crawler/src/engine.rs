use crate::handlers;
use bootstrap_store::BootstrapStore;
use krpc_encoding::{MessageType, NodeID, NodeInfo, Query, Response};
use routing_table::{KNode, RoutingDeque};
use scheduler::EngineHandle;
use std::net::{SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use tokio_krpc::{Inbound, KRPCNode, SendTransport};

pub const DEFAULT_BIND: &str = "0.0.0.0:6881";

const CHURN_INTERVAL: Duration = Duration::from_millis(50);
const REJOIN_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const SELF_ID_ROTATE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const LOW_WATERMARK: usize = 16;

/// The single-threaded, event-driven DHT engine. Everything here runs on
/// one task: the routing deque, the self id, and the UDP send handle are
/// all owned exclusively by [`Dht::run`], so nothing inside needs a lock.
pub struct Dht {
    send: SendTransport,
    inbound: tokio::sync::mpsc::Receiver<Inbound>,
    routing: RoutingDeque,
    bootstrap: BootstrapStore,
    scheduler: EngineHandle,
    self_id: NodeID,
}

impl Dht {
    pub async fn bind(
        addr: SocketAddr,
        bootstrap_path: impl Into<PathBuf>,
        scheduler: EngineHandle,
    ) -> tokio_krpc::Result<Dht> {
        let node = KRPCNode::bind(addr).await?;
        let (send, inbound) = node.serve();

        Ok(Dht {
            send,
            inbound,
            routing: RoutingDeque::default(),
            bootstrap: BootstrapStore::new(bootstrap_path),
            scheduler,
            self_id: NodeID::random(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.send.local_addr()
    }

    /// Runs until the inbound channel closes (the UDP socket was dropped,
    /// e.g. on shutdown).
    pub async fn run(mut self) {
        self.rejoin().await;

        let mut churn_timer = tokio::time::interval(CHURN_INTERVAL);
        let mut rejoin_timer = tokio::time::interval(REJOIN_CHECK_INTERVAL);
        let mut rotate_timer = tokio::time::interval(SELF_ID_ROTATE_INTERVAL);

        loop {
            tokio::select! {
                maybe_msg = self.inbound.recv() => {
                    match maybe_msg {
                        Some(msg) => self.handle_inbound(msg).await,
                        None => return,
                    }
                }
                _ = churn_timer.tick() => {
                    self.churn_one().await;
                }
                _ = rejoin_timer.tick() => {
                    self.maybe_rejoin_or_persist().await;
                }
                _ = rotate_timer.tick() => {
                    self.self_id = NodeID::random();
                }
            }
        }
    }

    async fn handle_inbound(&mut self, msg: Inbound) {
        let Inbound { from, envelope } = msg;
        match envelope.body {
            MessageType::Query { query } => {
                self.handle_query(from, envelope.transaction_id, query).await;
            }
            MessageType::Response { response } => {
                self.handle_response(response);
            }
            MessageType::Error { .. } => {}
        }
    }

    async fn handle_query(&mut self, from: SocketAddr, transaction_id: Vec<u8>, query: Query) {
        let response = match &query {
            Query::Ping { .. } => handlers::ping_response(self.self_id),
            Query::FindNode { target, .. } => {
                let sample = self.sample_and_rotate(handlers::SAMPLE_NODES_PER_REPLY);
                handlers::find_node_response(target, sample)
            }
            Query::GetPeers { .. } => handlers::get_peers_response(self.self_id, handlers::random_token()),
            Query::AnnouncePeer { .. } => handlers::announce_peer_response(self.self_id),
        };

        if let Err(err) = self.send.send_response(from, transaction_id, response).await {
            log::debug!(target: "status", "failed to answer query from {from}: {err}");
        }

        self.harvest(from, &query).await;
    }

    /// Extracts an infohash observation from `get_peers`/`announce_peer`
    /// queries and forwards it to the scheduler. Enqueueing is cheap and
    /// self-limiting (the scheduler silently drops on a saturated queue),
    /// which is exactly the short-circuit the engine needs without adding
    /// its own backpressure bookkeeping.
    async fn harvest(&mut self, from: SocketAddr, query: &Query) {
        let info_hash = match handlers::info_hash_of(query) {
            Some(info_hash) => info_hash,
            None => return,
        };
        let sender = match from {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => return,
        };

        let peer_addr = match query {
            Query::AnnouncePeer { implied_port, port, .. } => {
                let port = handlers::announced_port(*implied_port, *port, sender.port());
                SocketAddrV4::new(*sender.ip(), port)
            }
            _ => sender,
        };

        self.scheduler.enqueue(*info_hash.as_bytes(), peer_addr).await;
    }

    fn handle_response(&mut self, response: Response) {
        if let Response::NextHop { nodes, .. } = response {
            self.routing.extend(nodes.into_iter().map(KNode::from));
        }
    }

    /// Drains one node from the head of the routing deque and sends it a
    /// `find_node` for a random target, spoofing our id close to that
    /// node's so it trusts the response. Triggers an immediate rejoin if
    /// the deque is empty.
    async fn churn_one(&mut self) {
        let node = match self.routing.pop_front() {
            Some(node) => node,
            None => {
                self.rejoin().await;
                return;
            }
        };

        let target = NodeID::random();
        let id = NodeID::spoof_close_to(&node.id);
        let query = Query::FindNode { id, target };

        if let Err(err) = self
            .send
            .send_query(SocketAddr::V4(node.socket_addr()), query)
            .await
        {
            log::debug!(target: "status", "find_node send to {:?} failed: {}", node.socket_addr(), err);
        }
    }

    async fn maybe_rejoin_or_persist(&mut self) {
        if self.routing.len() < LOW_WATERMARK {
            self.rejoin().await;
        } else {
            if let Err(err) = self.bootstrap.record(&self.routing.snapshot()) {
                log::warn!(target: "status", "failed to persist bootstrap store: {err}");
            }
        }
    }

    /// Sends `find_node` to every persisted bootstrap contact, then to the
    /// hard-coded fallback hostnames resolved via DNS. Used at startup and
    /// whenever the routing deque runs dry.
    async fn rejoin(&mut self) {
        log::info!(target: "status", "rejoining: routing deque has {} contacts", self.routing.len());

        let known = self.bootstrap.load().unwrap_or_default();
        for node in &known {
            let target = NodeID::random();
            let id = NodeID::spoof_close_to(&node.id);
            let _ = self
                .send
                .send_query(SocketAddr::V4(node.socket_addr()), Query::FindNode { id, target })
                .await;
        }

        for host in self.bootstrap.fallback_hosts() {
            match tokio::net::lookup_host(host).await {
                Ok(addrs) => {
                    for addr in addrs {
                        if let SocketAddr::V4(addr) = addr {
                            let query = Query::FindNode {
                                id: NodeID::random(),
                                target: NodeID::random(),
                            };
                            let _ = self.send.send_query(SocketAddr::V4(addr), query).await;
                            break;
                        }
                    }
                }
                Err(err) => log::warn!(target: "status", "failed to resolve bootstrap host {host}: {err}"),
            }
        }
    }

    /// Takes up to `k` nodes from the front of the deque and pushes them
    /// back to the tail, so a `find_node` reply both samples live contacts
    /// and keeps churning the pool, per the routing deque's own contract.
    fn sample_and_rotate(&mut self, k: usize) -> Vec<NodeInfo> {
        let mut taken = Vec::with_capacity(k);
        for _ in 0..k {
            match self.routing.pop_front() {
                Some(node) => taken.push(node),
                None => break,
            }
        }
        let sample = taken.iter().map(|node| NodeInfo::new(node.id, node.socket_addr())).collect();
        self.routing.extend(taken);
        sample
    }
}
