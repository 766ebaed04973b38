use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Config;
use crate::error::DataError;
use crate::models::{ClassificationRecord, Post, SeasonList, TeamSeasonRecord};
use crate::services::dataset_loader::DatasetLoader;
use crate::services::playback::Playback;
use crate::services::posts::load_posts;

pub const TEAMS_SOURCE: &str = "team season data";
pub const CLASSIFICATIONS_SOURCE: &str = "classification data";
pub const POSTS_SOURCE: &str = "blog posts";

type Snapshot<T> = Result<Arc<[T]>, DataError>;

/// Everything loaded at startup. Each source loads once, independently of
/// the others, and is handed out as an immutable shared snapshot.
#[derive(Debug, Clone)]
pub struct AppContext {
    teams: Snapshot<TeamSeasonRecord>,
    classifications: Snapshot<ClassificationRecord>,
    posts: Snapshot<Post>,
    skip_seasons: Vec<i32>,
}

impl AppContext {
    pub async fn load(config: &Config) -> Self {
        let loader = DatasetLoader::new();

        let teams = loader
            .load_teams(&config.teams_csv)
            .await
            .map(Arc::from)
            .map_err(|e| DataError::unavailable(TEAMS_SOURCE, e));

        let classifications = loader
            .load_classifications(&config.classifications_csv)
            .await
            .map(Arc::from)
            .map_err(|e| DataError::unavailable(CLASSIFICATIONS_SOURCE, e));

        let posts = load_posts(&config.content_dir)
            .await
            .map(Arc::from)
            .map_err(|e| DataError::unavailable(POSTS_SOURCE, format!("{:#}", e)));

        for err in [teams.as_ref().err(), classifications.as_ref().err(), posts.as_ref().err()]
            .into_iter()
            .flatten()
        {
            tracing::warn!("{}", err);
        }

        Self {
            teams,
            classifications,
            posts,
            skip_seasons: config.skip_seasons.clone(),
        }
    }

    #[cfg(test)]
    pub fn from_parts(
        teams: Snapshot<TeamSeasonRecord>,
        classifications: Snapshot<ClassificationRecord>,
        posts: Snapshot<Post>,
        skip_seasons: Vec<i32>,
    ) -> Self {
        Self {
            teams,
            classifications,
            posts,
            skip_seasons,
        }
    }

    pub fn teams(&self) -> Snapshot<TeamSeasonRecord> {
        self.teams.clone()
    }

    pub fn classifications(&self) -> Snapshot<ClassificationRecord> {
        self.classifications.clone()
    }

    pub fn posts(&self) -> Snapshot<Post> {
        self.posts.clone()
    }

    pub fn skip_seasons(&self) -> &[i32] {
        &self.skip_seasons
    }

    pub fn seasons(&self) -> Result<SeasonList, DataError> {
        let teams = self.teams()?;
        let all: Vec<i32> = teams
            .iter()
            .map(|r| r.season)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let playback = self.playback()?.years().to_vec();
        Ok(SeasonList { all, playback })
    }

    /// A fresh playback sequencer over the loaded seasons minus the skip list.
    pub fn playback(&self) -> Result<Playback, DataError> {
        let teams = self.teams()?;
        Ok(Playback::with_skipped(teams.iter().map(|r| r.season), &self.skip_seasons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricValues;

    fn record(season: i32) -> TeamSeasonRecord {
        TeamSeasonRecord {
            season,
            team: format!("Team {}", season),
            conference: None,
            short_conference: None,
            coach: None,
            postseason: None,
            seed: None,
            metrics: MetricValues::default(),
        }
    }

    #[test]
    fn test_seasons_and_playback() {
        let teams: Vec<TeamSeasonRecord> = [2019, 2020, 2021, 2021, 2025].into_iter().map(record).collect();
        let ctx = AppContext::from_parts(
            Ok(Arc::from(teams)),
            Ok(Arc::from(Vec::new())),
            Ok(Arc::from(Vec::new())),
            vec![2020, 2025],
        );

        let seasons = ctx.seasons().unwrap();
        assert_eq!(seasons.all, vec![2019, 2020, 2021, 2025]);
        assert_eq!(seasons.playback, vec![2019, 2021]);
    }

    #[test]
    fn test_sources_fail_independently() {
        let ctx = AppContext::from_parts(
            Err(DataError::unavailable(TEAMS_SOURCE, "connection refused")),
            Ok(Arc::from(Vec::new())),
            Ok(Arc::from(Vec::new())),
            Vec::new(),
        );
        assert!(ctx.teams().is_err());
        assert!(ctx.seasons().is_err());
        assert!(ctx.classifications().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            teams_csv: dir.path().join("missing.csv").display().to_string(),
            classifications_csv: dir.path().join("missing-too.csv").display().to_string(),
            content_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let ctx = AppContext::load(&config).await;
        assert!(matches!(ctx.teams(), Err(DataError::Unavailable { .. })));
        assert!(ctx.classifications().is_err());
        assert_eq!(ctx.posts().unwrap().len(), 0);
    }
}
