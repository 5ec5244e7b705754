//! Shard placement for the routing tier.
//!
//! Placement is plain adjacency in the current shard list, not a consistent-hash
//! ring: the primary is `hash(short) mod N`, replicas are the list neighbours.
//! Changing `N` moves most keys to a different primary; nothing is migrated, and
//! neighbour fallback on read only partly covers for it.

/// Stable polynomial string hash (`h = 31 * h + c` over UTF-16 code units, wrapping `i32`).
///
/// Independent of process, platform and toolchain, and sensitive to character order.
pub fn stable_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Index of the primary shard for `key` among `shard_count` shards.
///
/// Returns `None` when there are no shards.
pub fn shard_index(key: &str, shard_count: usize) -> Option<usize> {
    if shard_count == 0 {
        return None;
    }
    let n = i64::try_from(shard_count).ok()?;
    usize::try_from(i64::from(stable_hash(key)).rem_euclid(n)).ok()
}

/// Shards that receive a WRITE, primary first.
///
/// `N == 1`: primary only. `N == 2`: primary and next. `N >= 3`: primary, next, previous.
pub fn replica_targets(index: usize, shard_count: usize) -> Vec<usize> {
    let n = shard_count;
    let mut targets = vec![index];
    if n > 1 {
        targets.push((index + 1) % n);
    }
    if n >= 3 {
        targets.push((index + n - 1) % n);
    }
    targets
}

/// Shards consulted by a READ, in order, until one returns a value.
///
/// The previous neighbour is only asked when `N > 3`.
pub fn fallback_targets(index: usize, shard_count: usize) -> Vec<usize> {
    let n = shard_count;
    let mut targets = vec![index];
    if n > 1 {
        targets.push((index + 1) % n);
    }
    if n > 3 {
        targets.push((index + n - 1) % n);
    }
    targets
}
