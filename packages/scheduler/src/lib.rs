mod bad_peer;
mod fail_map;
mod job;
mod master;
mod seen;

pub use bad_peer::BadPeerMap;
pub use fail_map::FailMap;
pub use job::Job;
pub use master::{
    EngineHandle, Master, MetadataSink, DEFAULT_CONCURRENCY, DEFAULT_EXTRA_PEERS_PER_INFOHASH,
    DEFAULT_QUEUE_CAPACITY,
};
pub use seen::SeenSet;
