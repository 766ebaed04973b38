use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::models::{Metric, SeedAggregate, SeedLeaderboard, TeamSeasonRecord};
use crate::services::content_sync::{sync_posts, NotionClient};
use crate::services::playback::{spawn_driver, PlaybackCommand};
use crate::services::posts::{filter_posts, PostQuery};
use crate::services::{
    classification_best_teams, heatmap_panels, join_classifications, race_frames, seed_best_teams,
    success_factors, AppContext,
};
use crate::utils::{format_metric, season_label, suggest_names};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

fn season_rows(teams: &[TeamSeasonRecord], year: i32) -> impl Iterator<Item = &TeamSeasonRecord> {
    teams.iter().filter(move |r| r.season == year)
}

fn print_seed_table(aggregates: &[SeedAggregate]) {
    for aggregate in aggregates {
        println!(
            "   {:>2}  {:<24} {:>7}  {}",
            aggregate.seed.get(),
            aggregate.team,
            format_metric(Some(aggregate.value)),
            aggregate.conference.as_deref().unwrap_or("-")
        );
    }
}

pub async fn show_seeds(config: &Config, year: i32, metric: Metric) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;

    println!("🏀 Best {} by seed, {} season", metric, season_label(year));
    let aggregates = seed_best_teams(season_rows(&teams, year), metric);
    if aggregates.is_empty() {
        println!("📭 No tournament teams found for {}", year);
        return Ok(());
    }

    print_seed_table(&aggregates);
    Ok(())
}

fn print_leaderboards(year: i32, boards: &[SeedLeaderboard]) {
    println!("\n📅 {} ({})", year, season_label(year));
    for board in boards {
        let cells: Vec<String> = Metric::RACE
            .iter()
            .map(|metric| match board.leaders.get(metric) {
                Some(leader) => format!("{} {}", leader.team, format_metric(Some(leader.value))),
                None => "-".to_string(),
            })
            .collect();
        println!("   {:>2}  {}", board.seed.get(), cells.join(" | "));
    }
}

/// Animate the seed race through every playback season, one frame per tick.
pub async fn run_race(config: &Config) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;
    let frames: BTreeMap<i32, Vec<SeedLeaderboard>> = race_frames(&teams, ctx.skip_seasons());
    let playback = ctx.playback()?;

    if playback.years().is_empty() {
        println!("📭 No seasons to play back");
        return Ok(());
    }

    println!(
        "🏁 Seed race over {} seasons: {}",
        playback.years().len(),
        Metric::RACE.iter().map(|m| m.label()).collect::<Vec<_>>().join(" | ")
    );

    let (handle, driver) = spawn_driver(playback, config.playback_cadence);
    let mut updates = handle.frames();

    let mut shown = handle.current();
    if let Some(year) = shown.year {
        print_leaderboards(year, frames.get(&year).map(Vec::as_slice).unwrap_or_default());
    }
    handle.send(PlaybackCommand::Play).await?;

    while updates.changed().await.is_ok() {
        let frame = *updates.borrow_and_update();
        if frame.index != shown.index {
            if let Some(year) = frame.year {
                print_leaderboards(year, frames.get(&year).map(Vec::as_slice).unwrap_or_default());
            }
            shown = frame;
        }
        if !frame.playing {
            break;
        }
    }

    drop(handle);
    driver.await.context("playback driver panicked")?;
    println!("\n✅ Playback finished");
    Ok(())
}

pub async fn show_heatmaps(config: &Config, year: i32) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;
    let classifications = ctx.classifications()?;

    println!("🔥 Correlation heatmaps, {} season", season_label(year));
    for panel in heatmap_panels(&teams, &classifications, year)? {
        println!("\n{} (n = {})", panel.title, panel.matrix.sample_size);
        for (i, field) in panel.matrix.fields.iter().enumerate() {
            let row: Vec<String> = (0..panel.matrix.dimension())
                .map(|j| match panel.matrix.get(i, j) {
                    Some(r) => format!("{:>6.2}", r),
                    None => format!("{:>6}", "n/a"),
                })
                .collect();
            println!("   {:<28} {}", field, row.join(" "));
        }
    }

    Ok(())
}

pub async fn show_classifications(config: &Config, year: i32, metric: Metric) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;
    let classifications = ctx.classifications()?;

    let participants = season_rows(&teams, year).filter(|r| r.seed.is_some());
    let joined = join_classifications(participants, &classifications);

    println!("🏆 Best {} by tournament finish, {} season", metric, season_label(year));
    let best = classification_best_teams(&joined, metric);
    if best.is_empty() {
        println!("📭 No classified teams found for {}", year);
        return Ok(());
    }

    for entry in best {
        println!(
            "   {:<14} {:<24} {:>7}  seed {}",
            entry.classification.label(),
            entry.team,
            format_metric(Some(entry.value)),
            entry.seed.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

pub async fn show_success_factors(config: &Config, year: i32, metric: Metric) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;
    let view = success_factors(&teams, year, metric);

    println!("📈 {} vs {}, {} season", metric, Metric::NetRating, season_label(year));
    println!("   {} teams across {} conferences", view.points.len(), view.conferences.len());
    if let (Some((x_min, x_max)), Some((y_min, y_max))) = (view.x_extent, view.y_extent) {
        println!("   {}: {:.1} to {:.1}", metric, x_min, x_max);
        println!("   {}: {:.1} to {:.1}", Metric::NetRating, y_min, y_max);
    }

    let mut points = view.points;
    points.sort_by(|a, b| b.net_rating.total_cmp(&a.net_rating));
    for point in points.iter().take(10) {
        println!(
            "   {:<24} seed {:>2}  {:>7}  {:>7}  {}",
            point.team,
            point.seed.get(),
            format_metric(Some(point.x)),
            format_metric(Some(point.net_rating)),
            point.conference
        );
    }
    Ok(())
}

pub async fn query_team(config: &Config, name: &str) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;

    println!("🔍 Searching for team: {}", name);

    let mut seasons: Vec<&TeamSeasonRecord> = teams
        .iter()
        .filter(|r| r.team.eq_ignore_ascii_case(name.trim()))
        .collect();

    if seasons.is_empty() {
        println!("❌ No team named '{}'", name);
        let mut names: Vec<&str> = teams.iter().map(|r| r.team.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        let suggestions = suggest_names(name, names, 5);
        if !suggestions.is_empty() {
            println!("\n💡 Did you mean:");
            for suggestion in suggestions {
                println!("   • {}", suggestion);
            }
        }
        return Ok(());
    }

    seasons.sort_by_key(|r| r.season);
    println!("📊 {} ({} seasons)", seasons[0].team, seasons.len());
    for record in seasons {
        println!(
            "   {}  seed {:>2}  net {:>6}  off {:>6}  def {:>6}  {}",
            record.season,
            record.seed.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            format_metric(record.metric(Metric::NetRating)),
            format_metric(record.metric(Metric::AdjustedOffense)),
            format_metric(record.metric(Metric::AdjustedDefense)),
            record.postseason.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn list_posts(config: &Config, query: PostQuery) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let posts = ctx.posts()?;
    let sections = filter_posts(&posts, &query);

    if sections.is_empty() {
        println!("📭 No posts match");
        return Ok(());
    }

    for section in sections {
        println!("\n📅 {}", section.year);
        for post in section.posts {
            println!("   {}  {}", post.date.format("%b %d"), post.title);
            if !post.description.is_empty() {
                println!("      {}", post.description);
            }
        }
    }
    Ok(())
}

/// Write seed aggregates for `year` to `out` (or stdout).
pub fn write_seed_export<W: Write>(aggregates: &[SeedAggregate], format: ExportFormat, out: W) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(["seed", "metric", "value", "team", "conference"])?;
            for aggregate in aggregates {
                writer.write_record([
                    aggregate.seed.to_string(),
                    aggregate.metric.key().to_string(),
                    aggregate.value.to_string(),
                    aggregate.team.clone(),
                    aggregate.conference.clone().unwrap_or_default(),
                ])?;
            }
            writer.flush()?;
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(out, aggregates)?;
        }
    }
    Ok(())
}

pub async fn export_seeds(
    config: &Config,
    year: i32,
    metric: Metric,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let ctx = AppContext::load(config).await;
    let teams = ctx.teams()?;
    let aggregates = seed_best_teams(season_rows(&teams, year), metric);

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_seed_export(&aggregates, format, file)?;
            println!("✅ Wrote {} seeds to {}", aggregates.len(), path.display());
        }
        None => write_seed_export(&aggregates, format, std::io::stdout().lock())?,
    }
    Ok(())
}

pub async fn sync_content(config: &Config) -> Result<()> {
    let client = NotionClient::from_config(config)?;
    println!("📥 Syncing published posts to {}", config.content_dir.display());
    let written = sync_posts(&client, &config.content_dir).await?;
    println!("✅ Synced {} posts", written.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Seed;

    fn aggregates() -> Vec<SeedAggregate> {
        vec![
            SeedAggregate {
                seed: Seed::new(1).unwrap(),
                metric: Metric::NetRating,
                value: 31.5,
                team: "Purdue".to_string(),
                conference: Some("B10".to_string()),
            },
            SeedAggregate {
                seed: Seed::new(2).unwrap(),
                metric: Metric::NetRating,
                value: 28.0,
                team: "Iowa St.".to_string(),
                conference: None,
            },
        ]
    }

    #[test]
    fn test_csv_export() {
        let mut out = Vec::new();
        write_seed_export(&aggregates(), ExportFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "seed,metric,value,team,conference");
        assert_eq!(lines[1], "1,net_rating,31.5,Purdue,B10");
        assert_eq!(lines[2], "2,net_rating,28,Iowa St.,");
    }

    #[test]
    fn test_json_export() {
        let mut out = Vec::new();
        write_seed_export(&aggregates(), ExportFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["team"], "Purdue");
        assert_eq!(value[1]["seed"], 2);
    }
}
