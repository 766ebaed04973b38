use std::collections::HashMap;

use crate::models::{Classification, ClassificationRecord, JoinedRecord, TeamSeasonRecord};

/// Left-join team seasons to tournament classifications on (year, team name).
///
/// Every input record yields exactly one output record, in input order.
/// Teams without a classification row get `Classification::Other`. When a
/// (year, team) pair appears more than once, the first row wins.
pub fn join_classifications<'a>(
    records: impl IntoIterator<Item = &'a TeamSeasonRecord>,
    classifications: &[ClassificationRecord],
) -> Vec<JoinedRecord> {
    let mut lookup: HashMap<(i32, &str), Classification> = HashMap::with_capacity(classifications.len());
    for row in classifications {
        lookup
            .entry((row.year, row.team.as_str()))
            .or_insert(row.classification);
    }

    records
        .into_iter()
        .map(|record| JoinedRecord {
            classification: lookup
                .get(&(record.season, record.team.as_str()))
                .copied()
                .unwrap_or(Classification::Other),
            record: record.clone(),
        })
        .collect()
}
