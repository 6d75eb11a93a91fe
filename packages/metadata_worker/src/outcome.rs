use crate::error::Error;

/// What came of attempting to fetch metadata from one peer for one
/// infohash. The scheduler (`packages/scheduler`) maps every variant other
/// than `Success` onto a `FailMap` increment and a `BadPeerMap` entry.
#[derive(Debug)]
pub enum Outcome {
    Success(Vec<u8>),
    HandshakeFail,
    ProtocolFail,
    HashMismatch,
    Timeout,
    ConnRefused,
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Outcome {
        match err {
            Error::ConnRefused(_) => Outcome::ConnRefused,
            Error::Timeout(_) => Outcome::Timeout,
            Error::HandshakeFail(_) => Outcome::HandshakeFail,
            Error::ProtocolFail(_) => Outcome::ProtocolFail,
            Error::HashMismatch(_) => Outcome::HashMismatch,
            Error::Io(_) => Outcome::ProtocolFail,
        }
    }
}
