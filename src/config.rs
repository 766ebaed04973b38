use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::playback::DEFAULT_CADENCE;

pub const DEFAULT_TEAMS_CSV: &str = "assets/data/march_madness.csv";
pub const DEFAULT_CLASSIFICATIONS_CSV: &str = "assets/data/march_madness_classifications.csv";
pub const DEFAULT_YEAR: i32 = 2024;
/// 2020 had no tournament; 2025 is incomplete in the dataset.
pub const DEFAULT_SKIP_SEASONS: [i32; 2] = [2020, 2025];
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path or http(s) URL of the team-season CSV.
    pub teams_csv: String,
    /// Path or http(s) URL of the classification CSV.
    pub classifications_csv: String,
    pub content_dir: PathBuf,
    pub site_dir: PathBuf,
    pub default_year: i32,
    pub skip_seasons: Vec<i32>,
    pub playback_cadence: Duration,
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    pub notion_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            teams_csv: DEFAULT_TEAMS_CSV.to_string(),
            classifications_csv: DEFAULT_CLASSIFICATIONS_CSV.to_string(),
            content_dir: PathBuf::from("content"),
            site_dir: PathBuf::from("public"),
            default_year: DEFAULT_YEAR,
            skip_seasons: DEFAULT_SKIP_SEASONS.to_vec(),
            playback_cadence: DEFAULT_CADENCE,
            notion_token: None,
            notion_database_id: None,
            notion_api_url: DEFAULT_NOTION_API_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_year = match env::var("BRACKETLENS_DEFAULT_YEAR") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid BRACKETLENS_DEFAULT_YEAR '{}'", raw);
                defaults.default_year
            }),
            Err(_) => defaults.default_year,
        };

        let skip_seasons = env::var("BRACKETLENS_SKIP_SEASONS")
            .map(|raw| parse_year_list(&raw))
            .unwrap_or(defaults.skip_seasons);

        let playback_cadence = env::var("BRACKETLENS_PLAYBACK_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.playback_cadence);

        Self {
            teams_csv: env::var("BRACKETLENS_TEAMS_CSV").unwrap_or(defaults.teams_csv),
            classifications_csv: env::var("BRACKETLENS_CLASSIFICATIONS_CSV")
                .unwrap_or(defaults.classifications_csv),
            content_dir: env::var("BRACKETLENS_CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            site_dir: env::var("BRACKETLENS_SITE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.site_dir),
            default_year,
            skip_seasons,
            playback_cadence,
            notion_token: env::var("NOTION_TOKEN").ok().filter(|v| !v.is_empty()),
            notion_database_id: env::var("NOTION_DATABASE_ID").ok().filter(|v| !v.is_empty()),
            notion_api_url: env::var("NOTION_API_URL").unwrap_or(defaults.notion_api_url),
        }
    }
}

/// Parse "2020, 2025" style lists, dropping anything that is not a year.
fn parse_year_list(raw: &str) -> Vec<i32> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
