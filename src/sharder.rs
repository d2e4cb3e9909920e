//! Percentage bucketing of user identifiers.

/// Number of buckets a user can fall into. A percentage maps 1:1 to a count of buckets.
pub(crate) const TOTAL_BUCKETS: u64 = 100;

pub(crate) trait Sharder {
    /// Map `input` to a stable bucket in `0..TOTAL_BUCKETS`.
    fn get_bucket(&self, input: &str) -> u64;
}

/// The default sharder: CRC-32 (IEEE) of the UTF-8 bytes, modulo 100.
pub(crate) struct Crc32Sharder;

impl Sharder for Crc32Sharder {
    fn get_bucket(&self, input: &str) -> u64 {
        u64::from(crc32fast::hash(input.as_bytes())) % TOTAL_BUCKETS
    }
}

/// Return `true` if `user_id` is inside a rollout of `percentage` percent.
///
/// The bucket of a user never changes, so raising the percentage only ever adds users.
pub(crate) fn in_percentage(sharder: &impl Sharder, user_id: &str, percentage: i64) -> bool {
    if percentage >= 100 {
        return true;
    }
    if percentage <= 0 {
        return false;
    }
    sharder.get_bucket(user_id) < percentage as u64
}

#[cfg(test)]
pub(crate) struct DeterministicSharder(pub std::collections::HashMap<String, u64>);

#[cfg(test)]
impl Sharder for DeterministicSharder {
    fn get_bucket(&self, input: &str) -> u64 {
        self.0.get(input).copied().unwrap_or(0) % TOTAL_BUCKETS
    }
}
