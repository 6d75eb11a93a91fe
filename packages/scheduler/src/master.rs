use crate::bad_peer::BadPeerMap;
use crate::fail_map::FailMap;
use crate::job::Job;
use crate::seen::SeenSet;
use metadata_worker::{fetch, FetchRequest, Outcome};
use peer_pool::MetadataPeerStore;
use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex, Semaphore};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_EXTRA_PEERS_PER_INFOHASH: usize = 2;

/// Where verified metadata goes once a job completes successfully. Kept as
/// a trait so the scheduler has no compile-time dependency on how storage
/// writes its magnet log or `.torrent` files.
pub trait MetadataSink: Send + Sync {
    fn on_success(&self, info_hash: [u8; 20], info_dict: Vec<u8>, peer: SocketAddrV4);
}

struct Inner {
    tx: mpsc::Sender<Job>,
    semaphore: Arc<Semaphore>,
    seen: Mutex<SeenSet>,
    fail_map: Mutex<FailMap>,
    bad_peer: Mutex<BadPeerMap>,
    peer_pool: Arc<Mutex<MetadataPeerStore>>,
    sink: Arc<dyn MetadataSink>,
    listen_port: u16,
    user_agent: String,
    extra_peers_per_infohash: usize,
}

/// The handle the DHT engine holds. Deliberately one-way: the engine pushes
/// observations in, the scheduler never calls back into the engine.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Inner>,
}

impl EngineHandle {
    /// Applies the enqueue contract (SeenSet / BadPeerMap / FailMap / queue
    /// capacity) and, if accepted, samples a few extra known-good peers for
    /// the same infohash from the peer pool. Returns whether the primary
    /// observation was accepted.
    pub async fn enqueue(&self, info_hash: [u8; 20], addr: SocketAddrV4) -> bool {
        let job = Job::new(info_hash, addr);
        let accepted = self.inner.try_enqueue(job).await;
        if accepted {
            self.inner.sample_extra_peers(info_hash, addr).await;
        }
        accepted
    }
}

impl Inner {
    async fn try_enqueue(&self, job: Job) -> bool {
        let now = now();

        if self.seen.lock().await.contains((job.info_hash, job.addr), now) {
            return false;
        }
        if self.bad_peer.lock().await.is_blacklisted(&job.addr, now) {
            return false;
        }
        if self.fail_map.lock().await.is_blacklisted(&job.info_hash, now) {
            return false;
        }

        match self.tx.try_send(job) {
            Ok(()) => {
                self.seen.lock().await.insert((job.info_hash, job.addr), now);
                true
            }
            Err(_) => false,
        }
    }

    async fn sample_extra_peers(&self, info_hash: [u8; 20], excluding: SocketAddrV4) {
        if self.extra_peers_per_infohash == 0 {
            return;
        }
        let candidates = self.peer_pool.lock().await.sample(self.extra_peers_per_infohash + 1);
        for addr in candidates {
            if addr == excluding {
                continue;
            }
            self.try_enqueue(Job::new(info_hash, addr)).await;
        }
    }
}

/// Owns the dispatch loop: pulls jobs off the queue, acquires a concurrency
/// permit, and spawns a metadata worker for each one.
pub struct Master {
    inner: Arc<Inner>,
    rx: mpsc::Receiver<Job>,
}

impl Master {
    pub fn new(
        queue_capacity: usize,
        concurrency: usize,
        peer_pool: Arc<Mutex<MetadataPeerStore>>,
        sink: Arc<dyn MetadataSink>,
        listen_port: u16,
        user_agent: String,
        extra_peers_per_infohash: usize,
    ) -> (Master, EngineHandle) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let inner = Arc::new(Inner {
            tx,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            seen: Mutex::new(SeenSet::new(crate::seen::DEFAULT_WINDOW)),
            fail_map: Mutex::new(FailMap::new(
                crate::fail_map::DEFAULT_THRESHOLD,
                crate::fail_map::DEFAULT_COOLDOWN_SECS,
            )),
            bad_peer: Mutex::new(BadPeerMap::new(crate::bad_peer::DEFAULT_TTL_SECS)),
            peer_pool,
            sink,
            listen_port,
            user_agent,
            extra_peers_per_infohash,
        });

        let master = Master { inner: inner.clone(), rx };
        let handle = EngineHandle { inner };
        (master, handle)
    }

    /// Runs the dispatch loop until the queue is closed (all `EngineHandle`
    /// clones dropped). Intended to run as its own task for the lifetime of
    /// the process.
    pub async fn run(mut self) {
        loop {
            let job = match self.rx.recv().await {
                Some(job) => job,
                None => break,
            };

            let permit = self
                .inner
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let inner = self.inner.clone();

            tokio::spawn(async move {
                let outcome = fetch(FetchRequest {
                    addr: job.addr.into(),
                    info_hash: job.info_hash,
                    listen_port: inner.listen_port,
                    user_agent: inner.user_agent.clone(),
                })
                .await;

                handle_outcome(&inner, job, outcome).await;
                drop(permit);
            });
        }
    }
}

async fn handle_outcome(inner: &Inner, job: Job, outcome: Outcome) {
    let now = now();
    match outcome {
        Outcome::Success(info_dict) => {
            inner.fail_map.lock().await.reset(&job.info_hash);
            inner.peer_pool.lock().await.mark_ok(job.addr);
            inner.sink.on_success(job.info_hash, info_dict, job.addr);
        }
        Outcome::HandshakeFail
        | Outcome::ProtocolFail
        | Outcome::HashMismatch
        | Outcome::Timeout
        | Outcome::ConnRefused => {
            inner.fail_map.lock().await.record_failure(job.info_hash, now);
            inner.bad_peer.lock().await.blacklist(job.addr, now);
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSink {
        count: AtomicUsize,
    }

    impl MetadataSink for CountingSink {
        fn on_success(&self, _info_hash: [u8; 20], _info_dict: Vec<u8>, _peer: SocketAddrV4) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn addr(byte: u8) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, byte), 6881)
    }

    #[tokio::test]
    async fn queue_saturation_drops_silently() {
        let peer_pool = Arc::new(Mutex::new(MetadataPeerStore::new(10, Duration::from_secs(60))));
        let sink = Arc::new(CountingSink { count: AtomicUsize::new(0) });
        let (_master, handle) = Master::new(4, 1, peer_pool, sink, 6881, "test/1.0".into(), 0);

        let mut accepted = 0;
        for i in 0..5u8 {
            if handle.enqueue([i; 20], addr(i)).await {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 4);
    }

    #[tokio::test]
    async fn dedup_within_window_rejects_repeat() {
        let peer_pool = Arc::new(Mutex::new(MetadataPeerStore::new(10, Duration::from_secs(60))));
        let sink = Arc::new(CountingSink { count: AtomicUsize::new(0) });
        let (_master, handle) = Master::new(10, 1, peer_pool, sink, 6881, "test/1.0".into(), 0);

        assert!(handle.enqueue([1; 20], addr(1)).await);
        assert!(!handle.enqueue([1; 20], addr(1)).await);
    }
}
