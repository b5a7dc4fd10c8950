//! Hash utilities

use digest::Digest;
use md5::Md5;

/// Lowercase hex MD5 of `data`, used to name deduplicated objects
pub fn md5_hash(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
