use std::collections::BTreeMap;

use crate::models::{
    ClassificationAggregate, Extremum, JoinedRecord, Metric, Seed, SeedAggregate,
    SeedLeader, SeedLeaderboard, TeamSeasonRecord,
};

/// Pick the single best item per group.
///
/// Items whose group key or value is missing (or non-finite) are ignored.
/// Comparison is strict, so on equal values the item seen first is kept.
/// Groups with no qualifying item do not appear in the result.
pub fn best_per_group<'a, T, K, G, V>(
    items: impl IntoIterator<Item = &'a T>,
    group: G,
    value: V,
    extremum: Extremum,
) -> BTreeMap<K, (&'a T, f64)>
where
    T: 'a,
    K: Ord,
    G: Fn(&T) -> Option<K>,
    V: Fn(&T) -> Option<f64>,
{
    let mut best: BTreeMap<K, (&'a T, f64)> = BTreeMap::new();

    for item in items {
        let (Some(key), Some(candidate)) = (group(item), value(item).filter(|v| v.is_finite())) else {
            continue;
        };

        match best.get_mut(&key) {
            Some(slot) => {
                if extremum.prefers(candidate, slot.1) {
                    *slot = (item, candidate);
                }
            }
            None => {
                best.insert(key, (item, candidate));
            }
        }
    }

    best
}

/// Best tournament team per seed for `metric`, ascending by seed.
///
/// Callers pass one season's records; non-participants are filtered here.
pub fn seed_best_teams<'a>(
    records: impl IntoIterator<Item = &'a TeamSeasonRecord>,
    metric: Metric,
) -> Vec<SeedAggregate> {
    let participants = records.into_iter().filter(|r| r.is_tournament_participant());

    best_per_group(participants, |r| r.seed, |r| r.metric(metric), metric.extremum())
        .into_iter()
        .map(|(seed, (record, value))| SeedAggregate {
            seed,
            metric,
            value,
            team: record.team.clone(),
            conference: record.short_conference.clone().or_else(|| record.conference.clone()),
        })
        .collect()
}

/// Best team per seed for each of `metrics`. A seed appears as soon as one
/// metric has a qualifying team.
pub fn seed_leaderboards(records: &[&TeamSeasonRecord], metrics: &[Metric]) -> Vec<SeedLeaderboard> {
    let mut boards: BTreeMap<Seed, SeedLeaderboard> = BTreeMap::new();

    for &metric in metrics {
        for aggregate in seed_best_teams(records.iter().copied(), metric) {
            boards
                .entry(aggregate.seed)
                .or_insert_with(|| SeedLeaderboard {
                    seed: aggregate.seed,
                    leaders: BTreeMap::new(),
                })
                .leaders
                .insert(
                    metric,
                    SeedLeader {
                        value: aggregate.value,
                        team: aggregate.team,
                        conference: aggregate.conference,
                    },
                );
        }
    }

    boards.into_values().collect()
}

/// Seed leaderboards for every season not in `skip`, keyed by season.
pub fn race_frames(records: &[TeamSeasonRecord], skip: &[i32]) -> BTreeMap<i32, Vec<SeedLeaderboard>> {
    let mut by_season: BTreeMap<i32, Vec<&TeamSeasonRecord>> = BTreeMap::new();
    for record in records.iter().filter(|r| !skip.contains(&r.season)) {
        by_season.entry(record.season).or_default().push(record);
    }

    by_season
        .into_iter()
        .map(|(season, rows)| (season, seed_leaderboards(&rows, &Metric::RACE)))
        .collect()
}

/// Best team per tournament classification for `metric`, deepest round first.
pub fn classification_best_teams(joined: &[JoinedRecord], metric: Metric) -> Vec<ClassificationAggregate> {
    best_per_group(
        joined,
        |j: &JoinedRecord| Some(j.classification),
        |j: &JoinedRecord| j.record.metric(metric),
        metric.extremum(),
    )
    .into_iter()
    .map(|(classification, (joined, value))| ClassificationAggregate {
        classification,
        metric,
        value,
        team: joined.record.team.clone(),
        seed: joined.record.seed,
    })
    .collect()
}
