use csv::StringRecord;
use reqwest::Client;
use std::io::Read;

use crate::error::LoadError;
use crate::models::{Classification, ClassificationRecord, Metric, MetricValues, Seed, TeamSeasonRecord};

// ── Column layout ────────────────────────────────────────────────────────────

const SEASON: &[&str] = &["Season"];
const TEAM: &[&str] = &["Full Team Name"];
const CONFERENCE: &[&str] = &["Mapped Conference Name"];
const SHORT_CONFERENCE: &[&str] = &["Short Conference Name"];
const COACH: &[&str] = &["Current Coach"];
const POSTSEASON: &[&str] = &["Post-Season Tournament"];
const SEED: &[&str] = &["Seed"];

const CLASS_YEAR: &[&str] = &["Year", "Season"];
const CLASS_TEAM: &[&str] = &["Team", "Full Team Name"];
const CLASS_LABEL: &[&str] = &["Classification"];

fn metric_headers(metric: Metric) -> &'static [&'static str] {
    match metric {
        Metric::NetRating => &["Net Rating"],
        Metric::AdjustedOffense => &["Adjusted Offensive Efficiency", "AdjOE"],
        Metric::AdjustedDefense => &["Adjusted Defensive Efficiency", "AdjDE"],
        Metric::AdjustedTempo => &["Adjusted Tempo", "AdjTempo"],
        Metric::Experience => &["Experience"],
    }
}

/// Header positions resolved once per file; the first alias present wins.
struct ColumnIndex {
    headers: StringRecord,
}

impl ColumnIndex {
    fn new(headers: StringRecord) -> Self {
        Self { headers }
    }

    fn find(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h.trim() == *name))
    }

    fn require(&self, names: &[&'static str]) -> Result<usize, LoadError> {
        self.find(names).ok_or(LoadError::MissingColumn(names[0]))
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn parse_year(raw: Option<&str>) -> Option<i32> {
    let raw = raw?;
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i32))
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Parse the team-season CSV. Rows without a usable season or team name are
/// skipped; every other cell that fails validation becomes `None`.
pub fn parse_team_records<R: Read>(reader: R) -> Result<Vec<TeamSeasonRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnIndex::new(csv_reader.headers()?.clone());

    let season_col = columns.require(SEASON)?;
    let team_col = columns.require(TEAM)?;
    let conference_col = columns.find(CONFERENCE);
    let short_conference_col = columns.find(SHORT_CONFERENCE);
    let coach_col = columns.find(COACH);
    let postseason_col = columns.find(POSTSEASON);
    let seed_col = columns.find(SEED);
    let metric_cols: Vec<(Metric, Option<usize>)> = Metric::ALL
        .iter()
        .map(|&metric| (metric, columns.find(metric_headers(metric))))
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in csv_reader.records().enumerate() {
        let row = row?;

        let (Some(season), Some(team)) = (
            parse_year(cell(&row, Some(season_col))),
            cell(&row, Some(team_col)),
        ) else {
            skipped += 1;
            tracing::debug!("Skipping team row {}: missing season or team name", line + 2);
            continue;
        };

        let mut metrics = MetricValues::default();
        for (metric, col) in &metric_cols {
            metrics.set(*metric, parse_number(cell(&row, *col)));
        }

        records.push(TeamSeasonRecord {
            season,
            team: team.to_string(),
            conference: cell(&row, conference_col).map(str::to_string),
            short_conference: cell(&row, short_conference_col).map(str::to_string),
            coach: cell(&row, coach_col).map(str::to_string),
            postseason: cell(&row, postseason_col).map(str::to_string),
            seed: cell(&row, seed_col).and_then(Seed::parse),
            metrics,
        });
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} team rows without a season or team name", skipped);
    }

    Ok(records)
}

/// Parse the classification CSV (`Year`, `Team`, `Classification`).
pub fn parse_classification_records<R: Read>(reader: R) -> Result<Vec<ClassificationRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnIndex::new(csv_reader.headers()?.clone());

    let year_col = columns.require(CLASS_YEAR)?;
    let team_col = columns.require(CLASS_TEAM)?;
    let label_col = columns.find(CLASS_LABEL);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let (Some(year), Some(team)) = (
            parse_year(cell(&row, Some(year_col))),
            cell(&row, Some(team_col)),
        ) else {
            continue;
        };

        records.push(ClassificationRecord {
            year,
            team: team.to_string(),
            classification: cell(&row, label_col)
                .map(Classification::from_label)
                .unwrap_or(Classification::Other),
        });
    }

    Ok(records)
}

// ── Sources ──────────────────────────────────────────────────────────────────

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reads dataset files from disk or over HTTP.
pub struct DatasetLoader {
    client: Client,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn read_source(&self, source: &str) -> Result<String, LoadError> {
        if is_remote(source) {
            let http_err = |source_err| LoadError::Http {
                url: source.to_string(),
                source: source_err,
            };
            let response = self
                .client
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(http_err)?;
            response.text().await.map_err(http_err)
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|source_err| LoadError::Io {
                    path: source.to_string(),
                    source: source_err,
                })
        }
    }

    pub async fn load_teams(&self, source: &str) -> Result<Vec<TeamSeasonRecord>, LoadError> {
        tracing::info!("Loading team seasons from {}", source);
        let body = self.read_source(source).await?;
        let records = parse_team_records(body.as_bytes())?;
        tracing::info!("Loaded {} team-season rows", records.len());
        Ok(records)
    }

    pub async fn load_classifications(&self, source: &str) -> Result<Vec<ClassificationRecord>, LoadError> {
        tracing::info!("Loading classifications from {}", source);
        let body = self.read_source(source).await?;
        let records = parse_classification_records(body.as_bytes())?;
        tracing::info!("Loaded {} classification rows", records.len());
        Ok(records)
    }
}
