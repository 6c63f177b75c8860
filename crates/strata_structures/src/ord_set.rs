//! Ordered id sets backed by plain sorted vectors
//!
//! Every function here keeps a vector strictly increasing (sorted, no
//! duplicates) as long as its inputs are. Bulk insertion merges in one
//! backwards pass and bulk removal compacts in one forwards pass, so neither
//! allocates beyond growing the target vector once.

/// Whether `values` is strictly increasing
pub fn is_ordered<T: Ord>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

/// Insert a single value. Returns false if it was already present.
pub fn insert_ord<T: Ord + Copy>(set: &mut Vec<T>, value: T) -> bool {
    match set.binary_search(&value) {
        Ok(_) => false,
        Err(pos) => {
            set.insert(pos, value);
            true
        }
    }
}

/// Remove a single value. Returns false if it was not present.
pub fn remove_ord<T: Ord + Copy>(set: &mut Vec<T>, value: T) -> bool {
    match set.binary_search(&value) {
        Ok(pos) => {
            set.remove(pos);
            true
        }
        Err(_) => false,
    }
}

/// Fold any number of strictly increasing `batches` into `set`.
///
/// The vector is grown once to fit every input, then filled from the back by
/// repeatedly taking the largest remaining head. Values already present (in
/// `set` or in an earlier batch) are dropped. Returns the number of dropped
/// duplicates.
pub fn merge_ord_sets<T: Ord + Copy>(set: &mut Vec<T>, batches: &[&[T]]) -> usize {
    let incoming: usize = batches.iter().map(|b| b.len()).sum();
    if incoming == 0 {
        return 0;
    }

    let Some(filler) = set.first().copied().or_else(|| batches.iter().find_map(|b| b.first().copied())) else {
        return 0;
    };

    let old_len = set.len();
    let total = old_len + incoming;
    set.resize(total, filler);

    // Exclusive end of the unread part of each input
    let mut set_end = old_len;
    let mut batch_ends: Vec<usize> = batches.iter().map(|b| b.len()).collect();
    let mut write = total;
    let mut last_written: Option<T> = None;
    let mut duplicates = 0;

    loop {
        // Find the largest head among the remaining inputs
        let mut best: Option<(T, Option<usize>)> = None;
        if set_end > 0 {
            best = Some((set[set_end - 1], None));
        }
        for (b, batch) in batches.iter().enumerate() {
            if batch_ends[b] == 0 {
                continue;
            }
            let head = batch[batch_ends[b] - 1];
            if best.map_or(true, |(v, _)| head > v) {
                best = Some((head, Some(b)));
            }
        }

        let Some((value, source)) = best else {
            break;
        };

        match source {
            None => set_end -= 1,
            Some(b) => batch_ends[b] -= 1,
        }

        if last_written == Some(value) {
            duplicates += 1;
            continue;
        }

        write -= 1;
        set[write] = value;
        last_written = Some(value);
    }

    set.copy_within(write..total, 0);
    set.truncate(total - write);
    duplicates
}

/// Remove adjacent duplicates from a sorted vector. Returns how many were removed.
pub fn compact_ord<T: PartialEq>(set: &mut Vec<T>) -> usize {
    let before = set.len();
    set.dedup();
    before - set.len()
}

/// Remove every value in the sorted `removals` from `set` in one forward
/// compaction pass. Returns how many values were removed.
pub fn erase_ord<T: Ord + Copy>(set: &mut Vec<T>, removals: &[T]) -> usize {
    let mut write = 0;
    let mut next_removal = 0;

    for read in 0..set.len() {
        let value = set[read];
        while next_removal < removals.len() && removals[next_removal] < value {
            next_removal += 1;
        }

        if next_removal < removals.len() && removals[next_removal] == value {
            continue;
        }

        set[write] = value;
        write += 1;
    }

    let removed = set.len() - write;
    set.truncate(write);
    removed
}
