#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to write magnet log {path}: {cause}")]
    MagnetLog {
        path: std::path::PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to write torrent file {path}: {cause}")]
    TorrentFile {
        path: std::path::PathBuf,
        #[source]
        cause: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
