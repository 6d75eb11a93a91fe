#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to decode KRPC message: {cause}")]
    Decode { cause: String },

    #[error("failed to encode KRPC message: {cause}")]
    Encode { cause: String },
}

pub type Result<T> = std::result::Result<T, Error>;
