use statrs::statistics::Statistics;
use std::collections::BTreeSet;

use crate::models::{Metric, ScatterPoint, SuccessFactorsView, TeamSeasonRecord};

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    Some((Statistics::min(values.iter()), Statistics::max(values.iter())))
}

/// Scatter of `metric` against net rating for one season's seeded teams,
/// with axis extents and the conference legend.
pub fn success_factors(records: &[TeamSeasonRecord], season: i32, metric: Metric) -> SuccessFactorsView {
    let points: Vec<ScatterPoint> = records
        .iter()
        .filter(|r| r.season == season && !r.team.is_empty())
        .filter_map(|r| {
            Some(ScatterPoint {
                team: r.team.clone(),
                conference: r.conference.clone()?,
                seed: r.seed?,
                x: r.metric(metric)?,
                net_rating: r.metric(Metric::NetRating)?,
                coach: r.coach.clone(),
            })
        })
        .collect();

    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.net_rating).collect();
    let conferences: BTreeSet<String> = points.iter().map(|p| p.conference.clone()).collect();

    tracing::debug!(
        "Success factors for {} ({}): {} teams, {} conferences",
        season,
        metric,
        points.len(),
        conferences.len()
    );

    SuccessFactorsView {
        season,
        metric,
        x_extent: extent(&xs),
        y_extent: extent(&ys),
        conferences: conferences.into_iter().collect(),
        points,
    }
}
