//! Async transport for KRPC: UDP framing, outbound pacing, and an optional
//! bounded transaction-correlation table that the DHT engine never depends
//! on for correctness (see [`active_transactions`] module docs).

mod active_transactions;
mod error;
mod pacing;
mod send;
mod socket;

pub use active_transactions::ActiveTransactions;
pub use error::{Error, Result};
pub use pacing::TokenBucket;
pub use send::SendTransport;
pub use socket::{Inbound, KRPCNode};

/// Raw KRPC transaction id bytes, as carried in the `t` field.
pub type TransactionId = Vec<u8>;
