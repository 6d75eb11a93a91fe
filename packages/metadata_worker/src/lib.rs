mod error;
mod extension;
mod framing;
mod handshake;
mod outcome;
mod piece;
mod worker;

pub use error::{Error, Result};
pub use handshake::{random_peer_id, Handshake};
pub use outcome::Outcome;
pub use worker::{fetch, FetchRequest, MAX_METADATA};
