//! The per-candidate bookkeeping JOSIE maintains in its counter.

use crate::cost_model::CostModel;

/// One unread candidate set seen by JOSIE while merging posting lists.
/// All positions are 0-based.
#[derive(Debug, Clone)]
pub struct CandidateEntry {
    pub id: i64,
    pub size: i64,
    /// The first query position where this candidate appeared.
    pub query_first_match_position: usize,
    /// The first position inside the candidate's own token sequence where
    /// a match was found.
    pub first_match_position: i64,
    /// The most recent position inside the candidate's token sequence
    /// where a match was found.
    pub latest_match_position: i64,
    /// Confirmed overlap contribution of query positions processed so far,
    /// including tokens skipped via the distinct-list optimization.
    pub partial_overlap: i64,
    /// Tight upper bound on the final overlap, given information so far.
    pub maximum_overlap: i64,
    pub estimated_overlap: i64,
    pub estimated_cost: f64,
    pub estimated_next_upperbound: i64,
    pub estimated_next_truncation: i64,
    pub read: bool,
}

impl CandidateEntry {
    /// Creates a new entry the first time a candidate is seen: the query
    /// and candidate positions that produced the match, plus the overlap
    /// contributed by whatever run of skipped (same-gid) positions led up
    /// to it.
    pub fn new(
        id: i64,
        size: i64,
        candidate_position: i64,
        query_position: usize,
        skipped_overlap: i64,
    ) -> Self {
        Self {
            id,
            size,
            query_first_match_position: query_position,
            first_match_position: candidate_position,
            latest_match_position: candidate_position,
            partial_overlap: skipped_overlap + 1,
            maximum_overlap: 0,
            estimated_overlap: 0,
            estimated_cost: 0.0,
            estimated_next_upperbound: 0,
            estimated_next_truncation: 0,
            read: false,
        }
    }

    /// Records a further overlapping token found at `candidate_position`.
    pub fn update(&mut self, candidate_position: i64, skipped_overlap: i64) {
        self.latest_match_position = candidate_position;
        self.partial_overlap += skipped_overlap + 1;
    }

    /// Number of candidate-set tokens not yet accounted for.
    pub fn suffix_length(&self) -> i64 {
        self.size - self.latest_match_position - 1
    }

    /// Tight upper bound on this candidate's final overlap, assuming
    /// [`update`](Self::update) has already been called for
    /// `query_position` if it matched.
    pub fn upperbound_overlap(&mut self, query_size: usize, query_position: usize) -> i64 {
        let remaining_query = query_size as i64 - query_position as i64 - 1;
        let remaining_candidate = self.size - self.latest_match_position - 1;
        self.maximum_overlap = self.partial_overlap + remaining_query.min(remaining_candidate);
        self.maximum_overlap
    }

    /// Estimated total overlap, extrapolating the observed overlap rate
    /// over the full query, clamped to the upper bound.
    pub fn estimate_overlap(&mut self, query_size: usize, query_position: usize) -> i64 {
        let sample_len = (query_position + 1 - self.query_first_match_position) as f64;
        let remaining = (query_size - self.query_first_match_position) as f64;
        let est = (self.partial_overlap as f64 / sample_len * remaining).round() as i64;
        self.estimated_overlap = est.min(self.upperbound_overlap(query_size, query_position));
        self.estimated_overlap
    }

    /// Estimated I/O cost of reading the rest of this candidate's tokens.
    pub fn estimate_cost(&mut self, cost_model: &CostModel) -> f64 {
        self.estimated_cost = cost_model.cost_set(self.suffix_length());
        self.estimated_cost
    }

    /// Estimated number of this candidate's remaining tokens that the next
    /// batch of posting lists (`query_position + 1 ..= next_batch_end`)
    /// will account for.
    pub fn estimate_truncation(
        &mut self,
        query_size: usize,
        query_position: usize,
        next_batch_end: usize,
    ) -> i64 {
        let jump = (next_batch_end - query_position) as f64;
        let span = (query_size - self.query_first_match_position) as f64;
        let candidate_span = (self.size - self.first_match_position) as f64;
        self.estimated_next_truncation = (jump / span * candidate_span) as i64;
        self.estimated_next_truncation
    }

    /// Estimated overlap upper bound after the next batch of posting lists
    /// has been merged.
    pub fn estimate_next_overlap_upperbound(
        &mut self,
        query_size: usize,
        query_position: usize,
        next_batch_end: usize,
    ) -> i64 {
        let query_jump_length = (next_batch_end - query_position) as f64;
        let query_prefix_length = (query_position + 1 - self.query_first_match_position) as f64;
        let additional_overlap =
            (self.partial_overlap as f64 / query_prefix_length * query_jump_length) as i64;
        let span = (query_size - self.query_first_match_position) as f64;
        let candidate_span = (self.size - self.first_match_position) as f64;
        let next_latest_match_position =
            (query_jump_length / span * candidate_span) as i64 + self.latest_match_position;
        let remaining_query = query_size as i64 - next_batch_end as i64 - 1;
        let remaining_candidate = self.size - next_latest_match_position - 1;
        self.estimated_next_upperbound =
            self.partial_overlap + additional_overlap + remaining_query.min(remaining_candidate);
        self.estimated_next_upperbound
    }

    /// Whether enough query positions have been sampled for this
    /// candidate's estimates to be trusted, i.e. more than `batch_size`
    /// positions have been observed since its first match.
    pub fn has_min_sample_size(&self, query_position: usize, batch_size: i64) -> bool {
        (query_position as i64 - self.query_first_match_position as i64 + 1) > batch_size
    }
}
