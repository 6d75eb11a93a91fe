#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to bind UDP socket on {addr}: {cause}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to send to {to}: {cause}")]
    Send {
        to: std::net::SocketAddr,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] krpc_encoding::Error),

    #[error("no in-flight transaction {transaction_id:?}")]
    TransactionNotFound { transaction_id: Vec<u8> },

    #[error("transaction table is full")]
    TransactionTableFull,
}

pub type Result<T> = std::result::Result<T, Error>;
