// Allocation of a requested item count across sub-targets

/// Split `total` items across `targets` sub-targets.
///
/// Every share is `total / targets` or one more; the extra units go to the
/// earliest sub-targets. Shares always sum to `total`. Zero sub-targets
/// yields an empty allocation.
///
/// # Example
/// ```
/// use quizgen_core::application::allocation::allocate;
/// assert_eq!(allocate(10, 3), vec![4, 3, 3]);
/// assert_eq!(allocate(2, 5), vec![1, 1, 0, 0, 0]);
/// ```
pub fn allocate(total: u32, targets: usize) -> Vec<u32> {
    if targets == 0 {
        return Vec::new();
    }
    let k = targets as u64;
    let base = (total as u64 / k) as u32;
    let remainder = (total as u64 % k) as usize;

    (0..targets)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}
