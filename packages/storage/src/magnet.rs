use crate::error::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

const FRAGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'&').add(b'?').add(b'#').add(b'%');

/// Builds `magnet:?xt=urn:btih:<hex>&dn=<percent-encoded name>`. `name` is
/// already lossily decoded (bad bytes replaced) by the caller.
pub fn build_magnet_uri(info_hash: &[u8; 20], name: &str) -> String {
    let hex = hex::encode(info_hash);
    let encoded_name = utf8_percent_encode(name, FRAGMENT);
    format!("magnet:?xt=urn:btih:{hex}&dn={encoded_name}")
}

/// Appends one magnet URI line to the log. Opens in append mode so
/// concurrent writers never truncate each other's output; a single
/// `write_all` call keeps the line atomic against interleaving on
/// POSIX-compliant filesystems for writes under `PIPE_BUF`.
pub fn append_magnet_line(path: impl AsRef<Path>, line: &str) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|cause| Error::MagnetLog {
            path: path.to_path_buf(),
            cause,
        })?;

    writeln!(file, "{line}").map_err(|cause| Error::MagnetLog {
        path: path.to_path_buf(),
        cause,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_expected_uri() {
        let uri = build_magnet_uri(&[0xAB; 20], "my torrent");
        assert!(uri.starts_with("magnet:?xt=urn:btih:abababababababababababababababababababab"));
        assert!(uri.contains("dn=my%20torrent"));
    }

    #[test]
    fn appends_line_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hash.log");
        append_magnet_line(&path, "line one").unwrap();
        append_magnet_line(&path, "line two").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "line one\nline two\n");
    }
}
