//! Bucket-array size tiers shared by both hash table variants.

/// Bucket-array sizes, all prime, roughly doubling.
pub(crate) const TABLE_SIZES: [u32; 26] = [
    53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613, 393241,
    786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611,
    402653189, 805306457, 1610612741,
];

pub(crate) const LAST_TIER: usize = TABLE_SIZES.len() - 1;

/// Odd multiplier spreading hashes before the modulo.
const SPREAD: u32 = 11;

#[inline]
pub(crate) fn table_size(tier: usize) -> usize {
    TABLE_SIZES[tier] as usize
}

/// Bucket for `hash` in a table of `size` buckets: `(hash * 11) mod size`,
/// with the multiplication wrapping at 32 bits.
#[inline]
pub(crate) fn bucket_index(hash: u32, size: usize) -> usize {
    hash.wrapping_mul(SPREAD) as usize % size
}

/// Most items a tier holds before it must grow (3/4 of its size).
#[inline]
pub(crate) fn load_limit(tier: usize) -> usize {
    let size = table_size(tier);
    size - size / 4
}

/// Smallest tier at or above `from` whose load limit admits `count`.
/// Never selects past the last tier.
pub(crate) fn grow_tier(count: usize, from: usize) -> usize {
    let mut tier = from;
    while tier < LAST_TIER && count > load_limit(tier) {
        tier += 1;
    }
    tier
}

/// Largest tier at or below `from` that keeps `count` at or above a quarter
/// of the bucket count. Tier 0 is the floor.
pub(crate) fn shrink_tier(count: usize, from: usize) -> usize {
    let mut tier = from;
    while tier > 0 && count < table_size(tier) / 4 {
        tier -= 1;
    }
    tier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_ascend() {
        assert!(TABLE_SIZES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn bucket_index_wraps_at_32_bits() {
        assert_eq!(bucket_index(1, 53), 11);
        let h = u32::MAX;
        assert_eq!(bucket_index(h, 97), (h.wrapping_mul(11) % 97) as usize);
    }

    #[test]
    fn grow_tier_respects_load_limit() {
        assert_eq!(load_limit(0), 40);
        assert_eq!(grow_tier(0, 0), 0);
        assert_eq!(grow_tier(40, 0), 0);
        assert_eq!(grow_tier(41, 0), 1);
        assert_eq!(grow_tier(41, 3), 3, "never goes below the starting tier");
        assert_eq!(grow_tier(usize::MAX, 0), LAST_TIER);
    }

    #[test]
    fn shrink_tier_stops_at_quarter_load() {
        // 97 / 4 == 24
        assert_eq!(shrink_tier(24, 1), 1);
        assert_eq!(shrink_tier(23, 1), 0);
        assert_eq!(shrink_tier(0, 5), 0);
    }
}
