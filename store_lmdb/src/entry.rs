//! Value envelope: an 8-byte big-endian expiry (Unix seconds, `0` = never)
//! followed by the payload.

use plaudit_types::Timestamp;

use crate::LmdbError;

const HEADER_LEN: usize = 8;

pub fn encode(value: &[u8], expires_at: Option<Timestamp>) -> Vec<u8> {
    let deadline = expires_at.map(|t| t.as_secs()).unwrap_or(0);
    let mut buf = Vec::with_capacity(HEADER_LEN + value.len());
    buf.extend_from_slice(&deadline.to_be_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Split an envelope into its expiry and payload.
pub fn decode<'a>(key: &[u8], raw: &'a [u8]) -> Result<(Option<Timestamp>, &'a [u8]), LmdbError> {
    if raw.len() < HEADER_LEN {
        return Err(LmdbError::Corrupt(String::from_utf8_lossy(key).into_owned()));
    }
    let (header, payload) = raw.split_at(HEADER_LEN);
    let mut arr = [0u8; HEADER_LEN];
    arr.copy_from_slice(header);
    let deadline = u64::from_be_bytes(arr);
    let expires_at = (deadline != 0).then(|| Timestamp::new(deadline));
    Ok((expires_at, payload))
}

/// The payload, if the entry is still live at `now`.
pub fn live<'a>(key: &[u8], raw: &'a [u8], now: Timestamp) -> Result<Option<&'a [u8]>, LmdbError> {
    let (expires_at, payload) = decode(key, raw)?;
    match expires_at {
        Some(deadline) if now >= deadline => Ok(None),
        _ => Ok(Some(payload)),
    }
}
