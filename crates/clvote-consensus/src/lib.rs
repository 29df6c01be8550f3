//! Plurality-vote consensus over per-platform result records.
//!
//! No platform is a trusted oracle, so the golden result for a test is
//! whatever value set strictly out-votes every alternative — and only if
//! enough platforms agree for the agreement to be signal rather than
//! noise. The computation is pure: deterministic, order-independent, and
//! idempotent over the same records.

use std::collections::BTreeMap;

use clvote_types::{GoldenResult, ResultRecord, ResultStatus, ValueSet};
use tracing::debug;

pub mod reconcile;
pub mod report;

/// Two agreeing platforms are still in the noise floor; a candidate must
/// collect strictly more votes than this to become golden. Calibrated for
/// bug-detection sensitivity — do not "improve" it.
pub const VOTE_NOISE_FLOOR: usize = 2;

/// Votes per distinct value set for one test. Error and timeout records
/// carry no signal about correctness and never appear here.
pub type VoteTally = BTreeMap<ValueSet, usize>;

/// Count the `Ok` records by canonical value set. Order-independent by
/// construction: the tally is keyed on the set itself.
pub fn tally_votes<'a, I>(records: I) -> VoteTally
where
    I: IntoIterator<Item = &'a ResultRecord>,
{
    let mut tally = VoteTally::new();
    for record in records {
        if let ResultStatus::Ok(values) = &record.status {
            *tally.entry(values.clone()).or_insert(0) += 1;
        }
    }
    tally
}

/// Derive the golden result from a tally. Golden requires a unique
/// maximum that clears the noise floor; ties at the maximum, a maximum at
/// or below the floor, and an empty tally all resolve to `Inconclusive`.
#[must_use]
pub fn golden_from_tally(tally: &VoteTally) -> GoldenResult {
    let Some(max_votes) = tally.values().copied().max() else {
        return GoldenResult::Inconclusive;
    };
    if max_votes <= VOTE_NOISE_FLOOR {
        return GoldenResult::Inconclusive;
    }
    let mut leaders = tally
        .iter()
        .filter(|&(_, &votes)| votes == max_votes)
        .map(|(values, _)| values);
    match (leaders.next(), leaders.next()) {
        (Some(winner), None) => GoldenResult::Conclusive(winner.clone()),
        _ => GoldenResult::Inconclusive,
    }
}

/// Group a flat record stream by test name.
pub fn group_by_test<I>(records: I) -> BTreeMap<String, Vec<ResultRecord>>
where
    I: IntoIterator<Item = ResultRecord>,
{
    let mut grouped: BTreeMap<String, Vec<ResultRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.test_name.clone()).or_default().push(record);
    }
    grouped
}

/// Compute the golden result for every test that contributed at least one
/// record.
pub fn compute_golden(
    records_by_test: &BTreeMap<String, Vec<ResultRecord>>,
) -> BTreeMap<String, GoldenResult> {
    let mut golden = BTreeMap::new();
    for (test_name, records) in records_by_test {
        let tally = tally_votes(records.iter());
        let verdict = golden_from_tally(&tally);
        debug!(
            test = %test_name,
            candidates = tally.len(),
            conclusive = verdict.is_conclusive(),
            "vote tallied"
        );
        golden.insert(test_name.clone(), verdict);
    }
    golden
}
