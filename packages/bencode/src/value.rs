use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// A decoded bencode value.
///
/// Dictionary keys are byte strings, stored in a `BTreeMap` so they are
/// always iterated in ascending order — which is exactly the order the
/// canonical encoding requires, so `Dict` never needs to sort on the way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Int(i64),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    pub fn bytes(b: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(b.into())
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(Error::TypeMismatch {
                expected: "bytes",
                found: other.kind(),
            }),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(Error::TypeMismatch {
                expected: "int",
                found: other.kind(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(Error::TypeMismatch {
                expected: "list",
                found: other.kind(),
            }),
        }
    }

    pub fn as_dict(&self) -> Result<&BTreeMap<Vec<u8>, Value>> {
        match self {
            Value::Dict(d) => Ok(d),
            other => Err(Error::TypeMismatch {
                expected: "dict",
                found: other.kind(),
            }),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        match self {
            Value::Dict(d) => d.get(key),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Int(_) => "int",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }
}

/// Decodes a single value starting at the front of `input`, returning the
/// value and the number of bytes consumed. Trailing bytes are left unread —
/// callers that require the whole buffer to be one value should use
/// [`decode_exact`].
pub fn decode_prefix(input: &[u8]) -> Result<(Value, usize)> {
    decode_at(input, 0).map(|(value, end)| (value, end))
}

/// Decodes a single value and rejects any bytes left over afterwards.
pub fn decode_exact(input: &[u8]) -> Result<Value> {
    let (value, consumed) = decode_prefix(input)?;
    if consumed != input.len() {
        return Err(Error::TrailingBytes {
            remaining: input.len() - consumed,
        });
    }
    Ok(value)
}

/// Encodes a value canonically. Dictionary keys come out of the `BTreeMap`
/// already sorted, so this can never itself fail with `KeyOrder` — that
/// variant exists for encoders that accept a pre-sorted key/value slice
/// instead of a `Value::Dict` (see [`encode_dict_pairs`]).
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bytes(b) => {
            out.extend_from_slice(b.len().to_string().as_bytes());
            out.push(b':');
            out.extend_from_slice(b);
        }
        Value::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (key, val) in map {
                encode_into(&Value::Bytes(key.clone()), out);
                encode_into(val, out);
            }
            out.push(b'e');
        }
    }
}

/// Encodes a dictionary from an already-assembled key/value slice, verifying
/// the caller presented it in ascending order. Used by call sites (like the
/// ut_metadata extended handshake) that build a small fixed dict by hand and
/// want the `KeyOrder` check rather than paying for a `BTreeMap`.
pub fn encode_dict_pairs(pairs: &[(&[u8], Value)]) -> Result<Vec<u8>> {
    for window in pairs.windows(2) {
        if window[0].0 >= window[1].0 {
            return Err(Error::KeyOrder {
                prev: window[0].0.to_vec(),
                next: window[1].0.to_vec(),
            });
        }
    }

    let mut out = vec![b'd'];
    for (key, val) in pairs {
        encode_into(&Value::Bytes(key.to_vec()), &mut out);
        encode_into(val, &mut out);
    }
    out.push(b'e');
    Ok(out)
}

fn decode_at(input: &[u8], offset: usize) -> Result<(Value, usize)> {
    let byte = *input.get(offset).ok_or(Error::Truncated {
        offset,
        expected: 1,
    })?;

    match byte {
        b'i' => decode_int(input, offset),
        b'l' => decode_list(input, offset),
        b'd' => decode_dict(input, offset),
        b'0'..=b'9' => decode_bytes(input, offset),
        _ => Err(Error::Malformed {
            offset,
            reason: format!("unexpected byte 0x{byte:02x}"),
        }),
    }
}

fn decode_int(input: &[u8], offset: usize) -> Result<(Value, usize)> {
    debug_assert_eq!(input[offset], b'i');
    let start = offset + 1;
    let end = find(input, b'e', start).ok_or(Error::Truncated {
        offset: start,
        expected: 1,
    })?;

    let digits = &input[start..end];
    if digits.is_empty() {
        return Err(Error::Malformed {
            offset: start,
            reason: "empty integer".into(),
        });
    }
    // "i-0e" and leading zeros ("i03e") are not canonical; reject them the
    // way every bencode consumer on the wire (KRPC, ut_metadata) expects.
    if digits == b"-0"
        || (digits[0] == b'0' && digits.len() > 1)
        || (digits.starts_with(b"-0") && digits.len() > 2)
    {
        return Err(Error::Malformed {
            offset: start,
            reason: "non-canonical integer".into(),
        });
    }

    let text = std::str::from_utf8(digits).map_err(|_| Error::Malformed {
        offset: start,
        reason: "integer is not UTF-8".into(),
    })?;
    let value: i64 = text.parse().map_err(|_| Error::Malformed {
        offset: start,
        reason: format!("not an integer: {text:?}"),
    })?;

    Ok((Value::Int(value), end + 1))
}

fn decode_bytes(input: &[u8], offset: usize) -> Result<(Value, usize)> {
    let colon = find(input, b':', offset).ok_or(Error::Truncated {
        offset,
        expected: 1,
    })?;

    let len_text = std::str::from_utf8(&input[offset..colon]).map_err(|_| Error::Malformed {
        offset,
        reason: "length prefix is not UTF-8".into(),
    })?;
    if len_text.len() > 1 && len_text.starts_with('0') {
        return Err(Error::Malformed {
            offset,
            reason: "non-canonical length prefix".into(),
        });
    }
    let len: usize = len_text.parse().map_err(|_| Error::Malformed {
        offset,
        reason: format!("bad length prefix: {len_text:?}"),
    })?;

    let start = colon + 1;
    let end = start.checked_add(len).ok_or(Error::Malformed {
        offset,
        reason: "length prefix overflows".into(),
    })?;
    if end > input.len() {
        return Err(Error::Truncated {
            offset: start,
            expected: end - input.len(),
        });
    }

    Ok((Value::Bytes(input[start..end].to_vec()), end))
}

fn decode_list(input: &[u8], offset: usize) -> Result<(Value, usize)> {
    debug_assert_eq!(input[offset], b'l');
    let mut pos = offset + 1;
    let mut items = Vec::new();

    loop {
        match input.get(pos) {
            None => {
                return Err(Error::Truncated {
                    offset: pos,
                    expected: 1,
                })
            }
            Some(b'e') => return Ok((Value::List(items), pos + 1)),
            Some(_) => {
                let (value, next) = decode_at(input, pos)?;
                items.push(value);
                pos = next;
            }
        }
    }
}

fn decode_dict(input: &[u8], offset: usize) -> Result<(Value, usize)> {
    debug_assert_eq!(input[offset], b'd');
    let mut pos = offset + 1;
    let mut map = BTreeMap::new();
    let mut last_key: Option<Vec<u8>> = None;

    loop {
        match input.get(pos) {
            None => {
                return Err(Error::Truncated {
                    offset: pos,
                    expected: 1,
                })
            }
            Some(b'e') => return Ok((Value::Dict(map), pos + 1)),
            Some(_) => {
                let (key_value, after_key) = decode_bytes(input, pos)?;
                let key = match key_value {
                    Value::Bytes(b) => b,
                    _ => unreachable!("decode_bytes always returns Value::Bytes"),
                };

                if let Some(prev) = &last_key {
                    if *prev >= key {
                        return Err(Error::KeyOrder {
                            prev: prev.clone(),
                            next: key,
                        });
                    }
                }

                let (value, after_value) = decode_at(input, after_key)?;
                last_key = Some(key.clone());
                map.insert(key, value);
                pos = after_value;
            }
        }
    }
}

fn find(input: &[u8], needle: u8, from: usize) -> Option<usize> {
    input[from..].iter().position(|&b| b == needle).map(|i| from + i)
}
