use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Tournament seed, always within 1..=16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Seed(u8);

impl Seed {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 16;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Parse a raw CSV cell. The "not in tournament" sentinel, blanks and
    /// anything outside 1..=16 come back as `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: f64 = raw.trim().parse().ok()?;
        if value.fract() != 0.0 || !value.is_finite() {
            return None;
        }
        if value < Self::MIN as f64 || value > Self::MAX as f64 {
            return None;
        }
        Self::new(value as u8)
    }
}

impl TryFrom<u8> for Seed {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Seed::new(value).ok_or_else(|| format!("seed {} outside 1-16", value))
    }
}

impl From<Seed> for u8 {
    fn from(seed: Seed) -> u8 {
        seed.0
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which end of a metric counts as "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Max,
    Min,
}

impl Extremum {
    /// True when `candidate` should replace `incumbent`. Strict, so the
    /// first record seen keeps ties.
    pub fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Extremum::Max => candidate > incumbent,
            Extremum::Min => candidate < incumbent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    NetRating,
    AdjustedOffense,
    AdjustedDefense,
    AdjustedTempo,
    Experience,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::NetRating,
        Metric::AdjustedOffense,
        Metric::AdjustedDefense,
        Metric::AdjustedTempo,
        Metric::Experience,
    ];

    /// Metrics shown in the seed race.
    pub const RACE: [Metric; 4] = [
        Metric::NetRating,
        Metric::AdjustedOffense,
        Metric::AdjustedDefense,
        Metric::AdjustedTempo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::NetRating => "Net Rating",
            Metric::AdjustedOffense => "Adjusted Offensive Efficiency",
            Metric::AdjustedDefense => "Adjusted Defensive Efficiency",
            Metric::AdjustedTempo => "Adjusted Tempo",
            Metric::Experience => "Experience",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Metric::NetRating => "net_rating",
            Metric::AdjustedOffense => "offensive",
            Metric::AdjustedDefense => "defensive",
            Metric::AdjustedTempo => "tempo",
            Metric::Experience => "experience",
        }
    }

    /// Lower defensive efficiency means better defense.
    pub fn extremum(self) -> Extremum {
        match self {
            Metric::AdjustedDefense => Extremum::Min,
            _ => Extremum::Max,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "net" | "netrating" => Ok(Metric::NetRating),
            "offensive" | "offense" | "adjoe" | "adjustedoffense" | "adjustedoffensiveefficiency" => {
                Ok(Metric::AdjustedOffense)
            }
            "defensive" | "defense" | "adjde" | "adjusteddefense" | "adjusteddefensiveefficiency" => {
                Ok(Metric::AdjustedDefense)
            }
            "tempo" | "adjtempo" | "adjustedtempo" => Ok(Metric::AdjustedTempo),
            "experience" | "exp" => Ok(Metric::Experience),
            _ => Err(format!(
                "unknown metric '{}'; use net, offensive, defensive, tempo or experience",
                s
            )),
        }
    }
}

/// Numeric metrics for one team-season. `None` marks a missing or
/// non-numeric cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub net_rating: Option<f64>,
    pub adjusted_offense: Option<f64>,
    pub adjusted_defense: Option<f64>,
    pub adjusted_tempo: Option<f64>,
    pub experience: Option<f64>,
}

impl MetricValues {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::NetRating => self.net_rating,
            Metric::AdjustedOffense => self.adjusted_offense,
            Metric::AdjustedDefense => self.adjusted_defense,
            Metric::AdjustedTempo => self.adjusted_tempo,
            Metric::Experience => self.experience,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::NetRating => &mut self.net_rating,
            Metric::AdjustedOffense => &mut self.adjusted_offense,
            Metric::AdjustedDefense => &mut self.adjusted_defense,
            Metric::AdjustedTempo => &mut self.adjusted_tempo,
            Metric::Experience => &mut self.experience,
        };
        *slot = value.filter(|v| v.is_finite());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSeasonRecord {
    pub season: i32,
    pub team: String,
    pub conference: Option<String>,
    pub short_conference: Option<String>,
    pub coach: Option<String>,
    pub postseason: Option<String>,
    pub seed: Option<Seed>,
    pub metrics: MetricValues,
}

impl TeamSeasonRecord {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(metric)
    }

    /// Seeded, and when the post-season column is filled it names the NCAA
    /// tournament rather than the NIT or CBI.
    pub fn is_tournament_participant(&self) -> bool {
        if self.seed.is_none() {
            return false;
        }
        match self.postseason.as_deref() {
            None => true,
            Some(event) => matches!(event.trim(), "March Madness" | "NCAA Tournament"),
        }
    }
}

/// Furthest round reached. Declaration order runs deepest first, which is
/// also the `Ord` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Champion")]
    Champion,
    #[serde(rename = "Final Four")]
    FinalFour,
    #[serde(rename = "Elite Eight")]
    EliteEight,
    #[serde(rename = "Sweet Sixteen")]
    SweetSixteen,
    #[serde(rename = "Round of 32")]
    RoundOf32,
    #[serde(rename = "First Round")]
    FirstRound,
    #[serde(rename = "Other")]
    Other,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::Champion => "Champion",
            Classification::FinalFour => "Final Four",
            Classification::EliteEight => "Elite Eight",
            Classification::SweetSixteen => "Sweet Sixteen",
            Classification::RoundOf32 => "Round of 32",
            Classification::FirstRound => "First Round",
            Classification::Other => "Other",
        }
    }

    /// Ordinal depth used when correlating seed against performance.
    pub fn depth(self) -> u8 {
        match self {
            Classification::Champion => 6,
            Classification::FinalFour => 5,
            Classification::EliteEight => 4,
            Classification::SweetSixteen => 3,
            Classification::RoundOf32 => 2,
            Classification::FirstRound => 1,
            Classification::Other => 0,
        }
    }

    /// Lenient label parsing; anything unrecognised is `Other`.
    pub fn from_label(raw: &str) -> Self {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "champion" | "champions" | "nationalchampion" => Classification::Champion,
            "finalfour" | "final4" => Classification::FinalFour,
            "eliteeight" | "elite8" => Classification::EliteEight,
            "sweetsixteen" | "sweet16" => Classification::SweetSixteen,
            "roundof32" | "secondround" => Classification::RoundOf32,
            "firstround" | "roundof64" => Classification::FirstRound,
            _ => Classification::Other,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub year: i32,
    pub team: String,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    #[serde(flatten)]
    pub record: TeamSeasonRecord,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedAggregate {
    pub seed: Seed,
    pub metric: Metric,
    pub value: f64,
    pub team: String,
    pub conference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationAggregate {
    pub classification: Classification,
    pub metric: Metric,
    pub value: f64,
    pub team: String,
    pub seed: Option<Seed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedLeader {
    pub value: f64,
    pub team: String,
    pub conference: Option<String>,
}

/// Best team per race metric for one seed in one season.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedLeaderboard {
    pub seed: Seed,
    pub leaders: BTreeMap<Metric, SeedLeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<String>,
    /// `None` where the coefficient is undefined (zero variance or fewer
    /// than two qualifying records).
    pub cells: Vec<Vec<Option<f64>>>,
    pub sample_size: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.cells.get(i).and_then(|row| row.get(j)).copied().flatten()
    }

    pub fn dimension(&self) -> usize {
        self.fields.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapPanel {
    pub id: String,
    pub title: String,
    pub matrix: CorrelationMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub team: String,
    pub conference: String,
    pub seed: Seed,
    pub x: f64,
    pub net_rating: f64,
    pub coach: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessFactorsView {
    pub season: i32,
    pub metric: Metric,
    pub points: Vec<ScatterPoint>,
    pub x_extent: Option<(f64, f64)>,
    pub y_extent: Option<(f64, f64)>,
    pub conferences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonList {
    pub all: Vec<i32>,
    pub playback: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    pub description: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostYearSection {
    pub year: i32,
    pub posts: Vec<Post>,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
