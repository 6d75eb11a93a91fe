//! Persists the DHT contacts the engine knows are alive so a restart doesn't
//! have to rediscover the network from nothing but the hard-coded fallback
//! hosts.

use krpc_encoding::NodeID;
use routing_table::KNode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Hard-coded bootstrap hostnames, used only when the routing deque (and
/// the persisted store) are both empty or critically low.
pub const FALLBACK_HOSTS: &[&str] = &[
    "router.bittorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "router.utorrent.com:6881",
];

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read bootstrap store {path}: {cause}")]
    Read {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to write bootstrap store {path}: {cause}")]
    Write {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Deserialize)]
struct Record {
    nid_hex: String,
    ip: Ipv4Addr,
    port: u16,
}

impl From<&KNode> for Record {
    fn from(node: &KNode) -> Record {
        Record {
            nid_hex: node.id.to_hex(),
            ip: node.ip,
            port: node.port,
        }
    }
}

impl Record {
    fn into_knode(self) -> Option<KNode> {
        let bytes = hex::decode_20(&self.nid_hex)?;
        Some(KNode::new(NodeID::from_bytes(bytes), self.ip, self.port))
    }
}

/// Tiny local hex decoder so this crate doesn't need a dependency just for
/// a 20-byte fixed-length parse.
mod hex {
    pub fn decode_20(text: &str) -> Option<[u8; 20]> {
        if text.len() != 40 {
            return None;
        }
        let mut out = [0u8; 20];
        for (i, chunk) in text.as_bytes().chunks_exact(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            out[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(out)
    }
}

pub struct BootstrapStore {
    path: PathBuf,
}

impl BootstrapStore {
    pub fn new(path: impl Into<PathBuf>) -> BootstrapStore {
        BootstrapStore { path: path.into() }
    }

    /// Reads up to [`DEFAULT_CAPACITY`] contacts from the state file. A
    /// missing file is treated as an empty store, not an error: the
    /// crawler falls back to [`FALLBACK_HOSTS`] either way.
    pub fn load(&self) -> Result<Vec<KNode>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(cause) => {
                return Err(Error::Read {
                    path: self.path.clone(),
                    cause,
                })
            }
        };

        let reader = BufReader::new(file);
        let mut nodes = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|cause| Error::Read {
                path: self.path.clone(),
                cause,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line).ok().and_then(Record::into_knode) {
                Some(node) => nodes.push(node),
                None => log::warn!("bootstrap store: skipping malformed line"),
            }
            if nodes.len() >= DEFAULT_CAPACITY {
                break;
            }
        }
        Ok(nodes)
    }

    /// Accepts candidate nodes observed during healthy operation, merges
    /// them with whatever is already persisted (de-duplicating by node id,
    /// most-recently-seen wins), and rewrites the file bounded to
    /// [`DEFAULT_CAPACITY`] entries.
    pub fn record(&self, nodes: &[KNode]) -> Result<()> {
        let mut merged: HashMap<NodeID, KNode> = self
            .load()
            .unwrap_or_default()
            .into_iter()
            .map(|node| (node.id, node))
            .collect();

        for node in nodes {
            merged.insert(node.id, *node);
        }

        let mut ordered: Vec<KNode> = merged.into_values().collect();
        ordered.truncate(DEFAULT_CAPACITY);

        self.write(&ordered)
    }

    fn write(&self, nodes: &[KNode]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let mut file = std::fs::File::create(&self.path).map_err(|cause| Error::Write {
            path: self.path.clone(),
            cause,
        })?;

        for node in nodes {
            let record = Record::from(node);
            let line = serde_json::to_string(&record).expect("Record serializes");
            writeln!(file, "{line}").map_err(|cause| Error::Write {
                path: self.path.clone(),
                cause,
            })?;
        }
        Ok(())
    }

    pub fn fallback_hosts(&self) -> &'static [&'static str] {
        FALLBACK_HOSTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(byte: u8) -> KNode {
        KNode::new(
            NodeID::from_bytes([byte; 20]),
            Ipv4Addr::new(1, 2, 3, byte),
            6881,
        )
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap_nodes.jsonl");
        let store = BootstrapStore::new(&path);

        store.record(&[sample(1), sample(2)]).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = BootstrapStore::new("/nonexistent/path/bootstrap_nodes.jsonl");
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn record_dedups_by_node_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootstrap_nodes.jsonl");
        let store = BootstrapStore::new(&path);

        store.record(&[sample(1)]).unwrap();
        store.record(&[sample(1)]).unwrap();

        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn fallback_hosts_are_well_known() {
        let store = BootstrapStore::new("unused.jsonl");
        assert!(store.fallback_hosts().contains(&"router.bittorrent.com:6881"));
    }
}
