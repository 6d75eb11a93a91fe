#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("connection refused or unreachable: {0}")]
    ConnRefused(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("handshake failed: {0}")]
    HandshakeFail(String),

    #[error("protocol error: {0}")]
    ProtocolFail(String),

    #[error("metadata hash mismatch: {0}")]
    HashMismatch(String),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;
