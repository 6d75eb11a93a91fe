//! KRPC encodes booleans as the integers `0`/`1`, never as bencode's native
//! (nonexistent) boolean type. These helpers bridge that to Rust `bool`.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value != 0)
}

pub fn is_false(value: &bool) -> bool {
    !value
}
