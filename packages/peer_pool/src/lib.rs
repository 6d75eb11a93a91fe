//! A cache of metadata peers that have delivered the `info` dict before.
//!
//! The scheduler samples from this pool to give popular infohashes extra
//! shots at succeeding beyond whatever peer the DHT happened to observe an
//! announce from, and workers write into it on every successful fetch.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_CAPACITY: usize = 4096;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read peer pool {path}: {cause}")]
    Read {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to write peer pool {path}: {cause}")]
    Write {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Deserialize)]
struct Record {
    ip: Ipv4Addr,
    port: u16,
    ts: u64,
}

pub struct MetadataPeerStore {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<SocketAddrV4, u64>,
    insertion_order: VecDeque<SocketAddrV4>,
}

impl MetadataPeerStore {
    pub fn new(capacity: usize, ttl: Duration) -> MetadataPeerStore {
        MetadataPeerStore {
            capacity,
            ttl,
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mark_ok(&mut self, addr: SocketAddrV4) {
        self.mark_ok_at(addr, now());
    }

    /// Inserting or refreshing an address always moves it to the back of
    /// `insertion_order`, so eviction drops the least-recently-confirmed
    /// address rather than whichever one happened to arrive first.
    pub fn mark_ok_at(&mut self, addr: SocketAddrV4, ts: u64) {
        let is_new = self.entries.insert(addr, ts).is_none();
        if !is_new {
            self.insertion_order.retain(|a| a != &addr);
        }
        self.insertion_order.push_back(addr);
        if is_new && self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        while self.entries.len() > self.capacity {
            match self.insertion_order.pop_front() {
                Some(addr) => {
                    self.entries.remove(&addr);
                }
                None => break,
            }
        }
    }

    /// Uniformly samples up to `k` non-expired addresses.
    pub fn sample(&mut self, k: usize) -> Vec<SocketAddrV4> {
        self.sample_at(k, now())
    }

    pub fn sample_at(&mut self, k: usize, now: u64) -> Vec<SocketAddrV4> {
        self.expire_at(now);
        let mut candidates: Vec<SocketAddrV4> = self.entries.keys().copied().collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates.truncate(k);
        candidates
    }

    /// Lazily drops entries older than the TTL. Called on every read so
    /// that `sample` never surfaces a stale entry, without needing a
    /// background sweep.
    fn expire_at(&mut self, now: u64) {
        let ttl_secs = self.ttl.as_secs();
        let expired: Vec<SocketAddrV4> = self
            .entries
            .iter()
            .filter(|(_, ts)| now.saturating_sub(**ts) > ttl_secs)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in expired {
            self.entries.remove(&addr);
            self.insertion_order.retain(|a| a != &addr);
        }
    }

    pub fn load(path: impl AsRef<Path>, capacity: usize, ttl: Duration) -> Result<MetadataPeerStore> {
        let path = path.as_ref();
        let mut store = MetadataPeerStore::new(capacity, ttl);

        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(cause) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    cause,
                })
            }
        };

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|cause| Error::Read {
                path: path.to_path_buf(),
                cause,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) => store.mark_ok_at(SocketAddrV4::new(record.ip, record.port), record.ts),
                Err(_) => log::warn!("peer pool: skipping malformed line"),
            }
        }

        store.expire_at(now());
        Ok(store)
    }

    pub fn persist(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.expire_at(now());

        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let mut file = std::fs::File::create(path).map_err(|cause| Error::Write {
            path: path.to_path_buf(),
            cause,
        })?;

        for addr in &self.insertion_order {
            if let Some(ts) = self.entries.get(addr) {
                let record = Record {
                    ip: *addr.ip(),
                    port: addr.port(),
                    ts: *ts,
                };
                let line = serde_json::to_string(&record).expect("Record serializes");
                writeln!(file, "{line}").map_err(|cause| Error::Write {
                    path: path.to_path_buf(),
                    cause,
                })?;
            }
        }
        Ok(())
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
