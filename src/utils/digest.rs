use bincode::config;
use serde::Serialize;

use crate::fs::Result;

/// cacluate [blake3] hash of a serilizeable object
pub fn digest<T: Serialize>(t: &T) -> Result<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    let config = config::legacy();
    hasher.update(&bincode::serde::encode_to_vec(t, config)?);
    Ok(*hasher.finalize().as_bytes())
}
