use ring::digest::{Context, SHA256};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the checksum appended to cb58 payloads
pub const CB58_CHECKSUM_LEN: usize = 4;

/// Seconds since the unix epoch
pub fn current_timestamp() -> Result<u64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Config(format!("System time error: {e}")))?;
    Ok(duration.as_secs())
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&sha256_digest(data));
    out
}

/// base58 with the last four bytes of sha256(payload) appended
pub fn cb58_encode(data: &[u8]) -> String {
    let checksum = sha256_digest(data);
    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum[checksum.len() - CB58_CHECKSUM_LEN..]);
    bs58::encode(payload).into_string()
}

pub fn cb58_decode(data: &str) -> Result<Vec<u8>> {
    let raw = bs58::decode(data)
        .into_vec()
        .map_err(|e| BlockchainError::InvalidId(format!("Invalid base58 encoding: {e}")))?;
    if raw.len() < CB58_CHECKSUM_LEN {
        return Err(BlockchainError::InvalidId(format!(
            "cb58 string too short: {data}"
        )));
    }

    let (payload, checksum) = raw.split_at(raw.len() - CB58_CHECKSUM_LEN);
    let expected = sha256_digest(payload);
    if checksum != &expected[expected.len() - CB58_CHECKSUM_LEN..] {
        return Err(BlockchainError::InvalidId(format!(
            "cb58 checksum mismatch: {data}"
        )));
    }
    Ok(payload.to_vec())
}
