use crate::error::DataError;
use crate::models::{ClassificationRecord, HeatmapPanel, JoinedRecord, Metric, TeamSeasonRecord};
use crate::services::correlation::correlation_matrix;
use crate::services::joiner::join_classifications;

/// A value that can take part in a heatmap correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapField {
    Metric(Metric),
    Seed,
    Classification,
}

impl HeatmapField {
    pub fn label(&self) -> String {
        match self {
            HeatmapField::Metric(metric) => metric.label().to_string(),
            HeatmapField::Seed => "Seed".to_string(),
            HeatmapField::Classification => "Classification".to_string(),
        }
    }

    pub fn extract(&self, joined: &JoinedRecord) -> Option<f64> {
        match self {
            HeatmapField::Metric(metric) => joined.record.metric(*metric),
            HeatmapField::Seed => joined.record.seed.map(|s| s.get() as f64),
            HeatmapField::Classification => Some(joined.classification.depth() as f64),
        }
    }
}

struct PanelSpec {
    id: &'static str,
    title: &'static str,
    fields: [HeatmapField; 2],
}

const PANELS: [PanelSpec; 3] = [
    PanelSpec {
        id: "offensive-defensive",
        title: "Offensive vs Defensive Efficiency",
        fields: [
            HeatmapField::Metric(Metric::AdjustedOffense),
            HeatmapField::Metric(Metric::AdjustedDefense),
        ],
    },
    PanelSpec {
        id: "rating-experience",
        title: "Net Rating vs Experience",
        fields: [
            HeatmapField::Metric(Metric::NetRating),
            HeatmapField::Metric(Metric::Experience),
        ],
    },
    PanelSpec {
        id: "seed-performance",
        title: "Seed vs Tournament Performance",
        fields: [HeatmapField::Seed, HeatmapField::Classification],
    },
];

const REQUIRED: [Metric; 4] = [
    Metric::NetRating,
    Metric::AdjustedOffense,
    Metric::AdjustedDefense,
    Metric::Experience,
];

/// Seeded records for `season` with every heatmap metric present, joined to
/// their classifications.
pub fn heatmap_records(
    records: &[TeamSeasonRecord],
    classifications: &[ClassificationRecord],
    season: i32,
) -> Vec<JoinedRecord> {
    let qualifying = records.iter().filter(|r| {
        r.season == season && r.seed.is_some() && REQUIRED.iter().all(|m| r.metric(*m).is_some())
    });
    join_classifications(qualifying, classifications)
}

/// Build the three heatmap panels for `season`.
pub fn heatmap_panels(
    records: &[TeamSeasonRecord],
    classifications: &[ClassificationRecord],
    season: i32,
) -> Result<Vec<HeatmapPanel>, DataError> {
    let joined = heatmap_records(records, classifications, season);
    if joined.is_empty() {
        return Err(DataError::EmptySeason(season));
    }

    tracing::debug!("Building heatmaps for {} from {} teams", season, joined.len());

    Ok(PANELS
        .iter()
        .map(|panel| HeatmapPanel {
            id: panel.id.to_string(),
            title: panel.title.to_string(),
            matrix: correlation_matrix(&joined, &panel.fields, HeatmapField::label, |j, f| f.extract(j)),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, MetricValues, Seed};

    fn record(team: &str, seed: u8, off: f64, def: f64, net: f64, exp: f64) -> TeamSeasonRecord {
        TeamSeasonRecord {
            season: 2024,
            team: team.to_string(),
            conference: None,
            short_conference: None,
            coach: None,
            postseason: None,
            seed: Seed::new(seed),
            metrics: MetricValues {
                net_rating: Some(net),
                adjusted_offense: Some(off),
                adjusted_defense: Some(def),
                adjusted_tempo: None,
                experience: Some(exp),
            },
        }
    }

    #[test]
    fn test_heatmap_panels() {
        let records = vec![
            record("A", 1, 120.0, 88.0, 32.0, 2.0),
            record("B", 4, 115.0, 92.0, 23.0, 1.5),
            record("C", 8, 110.0, 95.0, 15.0, 2.4),
            record("D", 16, 100.0, 105.0, -5.0, 1.1),
        ];
        let classifications = vec![
            ClassificationRecord {
                year: 2024,
                team: "A".to_string(),
                classification: Classification::Champion,
            },
            ClassificationRecord {
                year: 2024,
                team: "B".to_string(),
                classification: Classification::SweetSixteen,
            },
        ];

        let panels = heatmap_panels(&records, &classifications, 2024).unwrap();
        assert_eq!(panels.len(), 3);
        assert_eq!(panels[0].matrix.fields, vec![
            "Adjusted Offensive Efficiency".to_string(),
            "Adjusted Defensive Efficiency".to_string(),
        ]);
        // better offense goes with lower defensive efficiency here
        assert!(panels[0].matrix.get(0, 1).unwrap() < 0.0);
        // higher seeds reached deeper rounds
        assert!(panels[2].matrix.get(0, 1).unwrap() < 0.0);
        for panel in &panels {
            assert_eq!(panel.matrix.get(0, 0), Some(1.0));
            assert_eq!(panel.matrix.get(0, 1), panel.matrix.get(1, 0));
        }
    }

    #[test]
    fn test_incomplete_records_are_filtered() {
        let mut missing = record("E", 2, 118.0, 90.0, 28.0, 2.0);
        missing.metrics.experience = None;
        let records = vec![missing, record("F", 3, 112.0, 93.0, 19.0, 1.7)];
        let joined = heatmap_records(&records, &[], 2024);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].classification, Classification::Other);
    }

    #[test]
    fn test_empty_season_is_an_error() {
        let records = vec![record("A", 1, 120.0, 88.0, 32.0, 2.0)];
        let err = heatmap_panels(&records, &[], 2019).unwrap_err();
        assert_eq!(err, DataError::EmptySeason(2019));
    }
}
