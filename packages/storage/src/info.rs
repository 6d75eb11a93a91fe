/// Fields pulled out of a decoded info dict purely for logging and for
/// naming the magnet/`.torrent` output — never used to re-derive the
/// infohash, which is always the hash of the raw bytes as received.
pub struct InfoSummary {
    pub name: String,
    pub size: u64,
    pub file_count: u32,
}

pub fn summarize(raw_info_dict: &[u8]) -> InfoSummary {
    let value = match bencode::decode_exact(raw_info_dict) {
        Ok(value) => value,
        Err(_) => {
            return InfoSummary {
                name: String::new(),
                size: 0,
                file_count: 0,
            }
        }
    };

    let name = value
        .get(b"name")
        .and_then(|v| v.as_bytes().ok())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();

    if let Some(files) = value.get(b"files").and_then(|v| v.as_list().ok()) {
        let mut size = 0u64;
        for file in files {
            if let Some(length) = file.get(b"length").and_then(|v| v.as_int().ok()) {
                size += length.max(0) as u64;
            }
        }
        InfoSummary {
            name,
            size,
            file_count: files.len() as u32,
        }
    } else {
        let size = value
            .get(b"length")
            .and_then(|v| v.as_int().ok())
            .map(|length| length.max(0) as u64)
            .unwrap_or(0);
        InfoSummary {
            name,
            size,
            file_count: 1,
        }
    }
}
