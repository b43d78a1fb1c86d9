//! Query representation and the distinct-posting-list-run helpers shared by
//! every search algorithm.

/// A raw query as handed to the token table: an id (used only to suppress
/// self-matches) and its raw byte tokens. `tokens` carries the same tokens
/// already resolved to token ids, parallel to `raw_tokens` — the
/// disk-resident token table looks frequencies up by id, the memory-
/// resident one resolves raw bytes itself; both must agree on
/// `(tokens, counts, gids)` for the same input (see [`crate::token_table`]).
#[derive(Debug, Clone, Default)]
pub struct RawTokenSet {
    pub id: i64,
    pub tokens: Vec<i64>,
    pub raw_tokens: Vec<Vec<u8>>,
}

/// Finds the next distinct posting list after `curr_index`: the index of
/// the next query position whose gid differs from its predecessor's, and
/// the number of positions skipped over because they share a gid (and
/// therefore a posting list) with it.
///
/// Returns `(gids.len(), 0)` once `curr_index` is the last position.
pub fn next_distinct_list(gids: &[i64], curr_index: usize) -> (usize, i64) {
    let n = gids.len();
    if curr_index == n - 1 {
        return (n, 0);
    }
    let mut num_skipped = 0i64;
    let mut i = curr_index + 1;
    loop {
        if i < n - 1 && gids[i + 1] == gids[i] {
            num_skipped += 1;
            i += 1;
            continue;
        }
        return (i, num_skipped);
    }
}

/// Advances `batch_size` further distinct posting lists from `curr_index`,
/// returning the index reached (not the end-of-query sentinel, even if the
/// query is exhausted before `batch_size` lists are consumed).
pub fn next_batch_distinct_lists(gids: &[i64], curr_index: usize, batch_size: i64) -> usize {
    let n = gids.len();
    let mut curr_index = curr_index;
    let (mut next, _) = next_distinct_list(gids, curr_index);
    let mut count = 0i64;
    while next < n {
        curr_index = next;
        count += 1;
        if count == batch_size {
            break;
        }
        let (n2, _) = next_distinct_list(gids, curr_index);
        next = n2;
    }
    curr_index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_distinct_list_skips_equal_gid_runs() {
        // three query positions, last two share a gid
        let gids = vec![1, 2, 2];
        assert_eq!(next_distinct_list(&gids, 0), (1, 0));
        // from position 1, position 2 shares gid 2 with... wait gids[2]==gids[1]
        // next_distinct_list(1) looks from i=2: i==n-1 so loop body's
        // `i < n-1` guard is false, so it stops immediately at i=2.
        assert_eq!(next_distinct_list(&gids, 1), (2, 0));
    }

    #[test]
    fn next_distinct_list_coalesces_middle_run() {
        let gids = vec![1, 5, 5, 5, 9];
        // from 0: scan i=1 (gids[2]==gids[1] -> skip), i=2 (gids[3]==gids[2] -> skip),
        // i=3 (gids[4]!=gids[3] -> stop, listIndex=3)
        assert_eq!(next_distinct_list(&gids, 0), (3, 2));
        assert_eq!(next_distinct_list(&gids, 3), (4, 0));
        assert_eq!(next_distinct_list(&gids, 4), (5, 0));
    }

    #[test]
    fn next_distinct_list_last_position_terminates() {
        let gids = vec![1, 2, 3];
        assert_eq!(next_distinct_list(&gids, 2), (3, 0));
    }

    #[test]
    fn next_batch_distinct_lists_stops_at_batch_size_or_end() {
        let gids = vec![1, 2, 3, 4, 5];
        assert_eq!(next_batch_distinct_lists(&gids, 0, 2), 2);
        assert_eq!(next_batch_distinct_lists(&gids, 0, 10), 4);
    }
}
