//! Work partitioning for row-parallel accumulation.

/// Number of worker threads to use, `0` meaning the rayon pool size.
#[inline]
pub fn available_threads(max_threads: usize) -> usize {
    let pool = rayon::current_num_threads().max(1);
    if max_threads == 0 {
        pool
    } else {
        max_threads.min(pool)
    }
}

/// Caps `threads` so that `threads * bytes_per_task` stays within `budget_bytes`.
///
/// A zero budget means no cap. Never returns less than one.
pub fn memory_limited_threads(threads: usize, bytes_per_task: usize, budget_bytes: usize) -> usize {
    if budget_bytes == 0 || bytes_per_task == 0 {
        return threads.max(1);
    }
    (budget_bytes / bytes_per_task).clamp(1, threads.max(1))
}

/// Splits `count` work items into contiguous loads, one per thread.
///
/// No load is smaller than `overhead_limit` items unless there is only one
/// thread, and no more than `max_threads` loads are produced. Earlier loads
/// absorb the remainder, so loads differ by at most one item.
pub fn optimal_thread_loads(count: usize, overhead_limit: usize, max_threads: usize) -> Vec<usize> {
    if count == 0 {
        return Vec::new();
    }
    let overhead_limit = overhead_limit.max(1);
    let threads = (count / overhead_limit).clamp(1, max_threads.max(1));

    let base = count / threads;
    let remainder = count % threads;
    (0..threads)
        .map(|i| base + usize::from(i < remainder))
        .collect()
}
