use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{Post, PostYearSection};
use crate::utils::truncate_chars;

const DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct FrontMatter {
    title: String,
    date: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Split a markdown document into its YAML front matter and body.
fn split_front_matter(document: &str) -> Option<(&str, &str)> {
    let rest = document
        .strip_prefix("---\n")
        .or_else(|| document.strip_prefix("---\r\n"))?;
    let end = rest.find("\n---")?;
    let front = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(&['\r', '\n'][..]);
    Some((front, body))
}

/// First prose paragraph of a markdown body.
fn first_paragraph(body: &str) -> String {
    body.split("\n\n")
        .map(str::trim)
        .find(|block| {
            !block.is_empty()
                && !block.starts_with('#')
                && !block.starts_with("```")
                && !block.starts_with("![")
                && !block.starts_with("- ")
                && !block.starts_with("1. ")
        })
        .map(|block| block.replace('\n', " "))
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse one synced markdown post. Returns `None` when the front matter is
/// missing or unusable.
pub fn parse_post(slug: &str, document: &str) -> Option<Post> {
    let (front, body) = split_front_matter(document)?;
    let meta: FrontMatter = match serde_yaml::from_str(front) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!("Skipping post {}: invalid front matter: {}", slug, e);
            return None;
        }
    };

    let Some(date) = parse_date(&meta.date) else {
        tracing::warn!("Skipping post {}: invalid date '{}'", slug, meta.date);
        return None;
    };

    let description = meta
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| first_paragraph(body));

    Some(Post {
        slug: slug.to_string(),
        title: meta.title,
        date,
        description: truncate_chars(&description, DESCRIPTION_LIMIT),
        tags: meta.tags,
    })
}

/// Read every `*.md` post in `dir`, newest first. A missing directory means
/// nothing has been synced yet.
pub async fn load_posts(dir: &Path) -> Result<Vec<Post>> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tracing::debug!("Content directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;

    let mut posts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let Some(slug) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let document = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        if let Some(post) = parse_post(&slug, &document) {
            posts.push(post);
        }
    }

    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
    tracing::info!("Loaded {} posts from {}", posts.len(), dir.display());
    Ok(posts)
}

/// Search text plus an optional tag; `"all"` or an empty tag means no tag
/// filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    #[serde(default, alias = "q")]
    pub search: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl PostQuery {
    pub fn matches(&self, post: &Post) -> bool {
        let term = self.search.trim().to_lowercase();
        let matches_search = term.is_empty()
            || post.title.to_lowercase().contains(&term)
            || post.description.to_lowercase().contains(&term);

        let matches_tag = match self.tag.as_deref().map(str::trim) {
            None | Some("") | Some("all") => true,
            Some(tag) => post.tags.iter().any(|t| t == tag),
        };

        matches_search && matches_tag
    }
}

/// Matching posts grouped by year, newest year first. Years with no
/// matching post are left out.
pub fn filter_posts(posts: &[Post], query: &PostQuery) -> Vec<PostYearSection> {
    let mut by_year: BTreeMap<i32, Vec<Post>> = BTreeMap::new();
    for post in posts.iter().filter(|p| query.matches(p)) {
        by_year.entry(post.date.year()).or_default().push(post.clone());
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, mut posts)| {
            posts.sort_by(|a, b| b.date.cmp(&a.date));
            PostYearSection { year, posts }
        })
        .collect()
}
