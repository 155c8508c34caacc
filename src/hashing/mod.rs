use blake3::Hasher;

/// Full BLAKE3 digest of an already-normalized query. Used as the exact-match memo key.
#[inline]
pub fn hash_query(normalized_query: &str) -> [u8; 32] {
    *blake3::hash(normalized_query.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for token buckets in the hashed bag-of-words embedding and for answer-option
/// fingerprints. Neither use is security sensitive; a collision at worst merges two
/// buckets or lets two option sets share a cache partition.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    truncate(blake3::hash(data))
}

/// Hashes an ordered list of parts with a separator so `["ab", "c"]` and `["a", "bc"]`
/// never collide.
#[inline]
pub fn hash_parts(parts: &[&str]) -> u64 {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    truncate(hasher.finalize())
}

#[inline]
fn truncate(hash: blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
