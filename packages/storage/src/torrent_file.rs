use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_FILENAME_LEN: usize = 180;

/// Wraps a raw (already-bencoded) info dict in `{info: <raw>, announce: ''}`
/// without ever decoding it, so the bytes inside `info` are byte-for-byte
/// identical to what the peer sent and `sha1(info)` still equals the
/// infohash that named the file.
fn wrap_info_dict(raw_info_dict: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_info_dict.len() + 32);
    out.extend_from_slice(b"d8:announce0:4:info");
    out.extend_from_slice(raw_info_dict);
    out.push(b'e');
    out
}

/// Sanitizes a torrent name into a safe filename: strips path separators
/// and control characters, falls back to the hex infohash when the name is
/// empty, and clamps to `MAX_FILENAME_LEN` characters.
pub fn sanitize_filename(name: &str, info_hash: &[u8; 20]) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    let base = if trimmed.is_empty() {
        hex::encode(info_hash)
    } else {
        trimmed.chars().take(MAX_FILENAME_LEN).collect()
    };

    format!("{base}.torrent")
}

/// Writes the reconstructed `.torrent` file to `dir/<sanitized name>`,
/// creating `dir` if necessary.
pub fn write_torrent_file(
    dir: impl AsRef<Path>,
    filename: &str,
    raw_info_dict: &[u8],
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|cause| Error::TorrentFile {
        path: dir.to_path_buf(),
        cause,
    })?;

    let path = dir.join(filename);
    let bytes = wrap_info_dict(raw_info_dict);
    fs::write(&path, bytes).map_err(|cause| Error::TorrentFile {
        path: path.clone(),
        cause,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_info_dict_verbatim() {
        let raw_info = b"d6:lengthi1024e4:name4:test12:piece lengthi16384e6:pieces0:e";
        let wrapped = wrap_info_dict(raw_info);
        let value = bencode::decode_exact(&wrapped).unwrap();
        let info = value.get(b"info").unwrap();
        assert_eq!(bencode::encode(info), raw_info.to_vec());
    }

    #[test]
    fn sanitizes_path_separators() {
        let name = sanitize_filename("evil/../name", &[0u8; 20]);
        assert!(!name.contains('/'));
    }

    #[test]
    fn falls_back_to_hex_when_name_empty() {
        let name = sanitize_filename("", &[0xAB; 20]);
        assert!(name.starts_with("abababababababababababababababababababab"));
    }

    #[test]
    fn clamps_long_names() {
        let long_name = "a".repeat(500);
        let name = sanitize_filename(&long_name, &[0u8; 20]);
        // MAX_FILENAME_LEN chars plus the ".torrent" suffix.
        assert_eq!(name.len(), MAX_FILENAME_LEN + ".torrent".len());
    }

    #[test]
    fn writes_file_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let raw_info = b"d4:name4:teste";
        let path = write_torrent_file(dir.path(), "test.torrent", raw_info).unwrap();
        assert!(path.exists());
    }
}
