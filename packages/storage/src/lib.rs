mod error;
mod info;
mod magnet;
mod torrent_file;

pub use error::{Error, Result};
pub use info::{summarize, InfoSummary};
pub use magnet::{append_magnet_line, build_magnet_uri};
pub use torrent_file::{sanitize_filename, write_torrent_file};

use std::net::SocketAddrV4;
use std::path::PathBuf;

pub struct StorageConfig {
    pub magnet_log_path: PathBuf,
    pub torrent_dir: PathBuf,
    pub persist_torrent_files: bool,
}

/// Converts one verified `(info_hash, info_dict)` pair into the magnet log
/// line and, if enabled, the reconstructed `.torrent` file. This is the
/// single entry point the `crawler` binary wires the scheduler's
/// `MetadataSink` to.
pub fn store(config: &StorageConfig, info_hash: [u8; 20], info_dict: &[u8], peer: SocketAddrV4) -> Result<()> {
    let summary = info::summarize(info_dict);
    let uri = magnet::build_magnet_uri(&info_hash, &summary.name);
    magnet::append_magnet_line(&config.magnet_log_path, &uri)?;

    log::info!(
        target: "torrent_block",
        "{} name={:?} size={} files={} peer={}",
        hex::encode(info_hash),
        summary.name,
        summary.size,
        summary.file_count,
        peer,
    );

    if config.persist_torrent_files {
        let filename = torrent_file::sanitize_filename(&summary.name, &info_hash);
        torrent_file::write_torrent_file(&config.torrent_dir, &filename, info_dict)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn store_writes_magnet_line_and_torrent_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            magnet_log_path: dir.path().join("hash.log"),
            torrent_dir: dir.path().join("BT"),
            persist_torrent_files: true,
        };

        let raw_info = b"d6:lengthi5e4:name4:teste";
        let info_hash = [0x11u8; 20];
        let peer = SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 6881);

        store(&config, info_hash, raw_info, peer).unwrap();

        let log = std::fs::read_to_string(&config.magnet_log_path).unwrap();
        assert!(log.contains("magnet:?xt=urn:btih:"));

        let entries: Vec<_> = std::fs::read_dir(&config.torrent_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn store_skips_torrent_file_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            magnet_log_path: dir.path().join("hash.log"),
            torrent_dir: dir.path().join("BT"),
            persist_torrent_files: false,
        };

        store(&config, [0x22; 20], b"d4:name4:teste", SocketAddrV4::new(Ipv4Addr::new(1, 1, 1, 1), 1)).unwrap();

        assert!(!config.torrent_dir.exists());
    }
}
