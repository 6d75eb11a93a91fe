//! Bencode: the byte-string/integer/list/dictionary grammar used on both the
//! UDP KRPC wire and the TCP extension-protocol wire.
//!
//! This crate is deliberately a thin hand-rolled tree rather than a `serde`
//! data format: the ut_metadata piece reply interleaves a bencoded header
//! with a raw binary tail inside a single message frame, which a `serde`
//! visitor can't express without decoding the header and slicing the
//! remainder itself anyway. [`krpc_encoding`](../krpc_encoding) uses
//! `serde_bencode` for the strictly-typed KRPC envelope instead, since that
//! wire format really is "one bencoded value per datagram."

mod error;
mod value;

pub use error::{Error, Result};
pub use value::{decode_exact, decode_prefix, encode, encode_dict_pairs, Value};
