use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::utils::slugify;

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

// ── Notion structures ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    pub plain_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    pub start: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title { title: Vec<RichText> },
    RichText { rich_text: Vec<RichText> },
    Date { date: Option<DateValue> },
    MultiSelect { multi_select: Vec<SelectOption> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBlock {
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeBlock {
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUrl {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    External { external: FileUrl },
    File { file: FileUrl },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        paragraph: TextBlock,
    },
    #[serde(rename = "heading_1")]
    Heading1 {
        heading_1: TextBlock,
    },
    #[serde(rename = "heading_2")]
    Heading2 {
        heading_2: TextBlock,
    },
    #[serde(rename = "heading_3")]
    Heading3 {
        heading_3: TextBlock,
    },
    BulletedListItem {
        bulleted_list_item: TextBlock,
    },
    NumberedListItem {
        numbered_list_item: TextBlock,
    },
    Code {
        code: CodeBlock,
    },
    Image {
        image: ImageSource,
    },
    #[serde(other)]
    Unsupported,
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn plain_text(parts: &[RichText]) -> String {
    parts.iter().map(|t| t.plain_text.as_str()).collect()
}

fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Markdown body for a flat list of blocks. Unsupported block types are
/// dropped.
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    let mut markdown = String::new();

    for block in blocks {
        match block {
            Block::Paragraph { paragraph } => {
                markdown.push_str(&plain_text(&paragraph.rich_text));
                markdown.push_str("\n\n");
            }
            Block::Heading1 { heading_1 } => {
                markdown.push_str(&format!("# {}\n\n", plain_text(&heading_1.rich_text)));
            }
            Block::Heading2 { heading_2 } => {
                markdown.push_str(&format!("## {}\n\n", plain_text(&heading_2.rich_text)));
            }
            Block::Heading3 { heading_3 } => {
                markdown.push_str(&format!("### {}\n\n", plain_text(&heading_3.rich_text)));
            }
            Block::BulletedListItem { bulleted_list_item } => {
                markdown.push_str(&format!("- {}\n", plain_text(&bulleted_list_item.rich_text)));
            }
            Block::NumberedListItem { numbered_list_item } => {
                markdown.push_str(&format!("1. {}\n", plain_text(&numbered_list_item.rich_text)));
            }
            Block::Code { code } => {
                markdown.push_str(&format!(
                    "```{}\n{}\n```\n\n",
                    code.language.as_deref().unwrap_or(""),
                    plain_text(&code.rich_text)
                ));
            }
            Block::Image { image } => {
                let url = match image {
                    ImageSource::External { external } => &external.url,
                    ImageSource::File { file } => &file.url,
                };
                markdown.push_str(&format!("![Image]({})\n\n", url));
            }
            Block::Unsupported => {}
        }
    }

    markdown
}

pub fn front_matter(title: &str, date: &str, tags: &[String]) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", yaml_quote(title)));
    out.push_str(&format!("date: {}\n", date));
    if !tags.is_empty() {
        let quoted: Vec<String> = tags.iter().map(|t| yaml_quote(t)).collect();
        out.push_str(&format!("tags: [{}]\n", quoted.join(", ")));
    }
    out.push_str("---\n\n");
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPost {
    pub file_name: String,
    pub markdown: String,
}

impl Page {
    fn text_property(&self, name: &str) -> Option<String> {
        let text = match self.properties.get(name)? {
            PropertyValue::Title { title } => plain_text(title),
            PropertyValue::RichText { rich_text } => plain_text(rich_text),
            _ => return None,
        };
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    pub fn title(&self) -> Option<String> {
        self.text_property("Title")
    }

    pub fn date(&self) -> Option<String> {
        match self.properties.get("Date")? {
            PropertyValue::Date { date: Some(date) } => Some(date.start.clone()),
            _ => None,
        }
    }

    pub fn tags(&self) -> Vec<String> {
        match self.properties.get("Tags") {
            Some(PropertyValue::MultiSelect { multi_select }) => {
                multi_select.iter().map(|o| o.name.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// `Slug` property, or a slug of the title when it is empty.
    pub fn slug(&self) -> Option<String> {
        self.text_property("Slug")
            .map(|s| slugify(&s))
            .filter(|s| !s.is_empty())
            .or_else(|| self.title().map(|t| slugify(&t)).filter(|s| !s.is_empty()))
    }
}

/// Front matter plus body for one page.
pub fn render_post(page: &Page, blocks: &[Block]) -> Result<RenderedPost> {
    let title = page
        .title()
        .ok_or_else(|| anyhow!("page {} has no title", page.id))?;
    let date = page
        .date()
        .ok_or_else(|| anyhow!("page '{}' has no date", title))?;
    let slug = page
        .slug()
        .ok_or_else(|| anyhow!("page '{}' has no usable slug", title))?;

    let mut markdown = front_matter(&title, &date, &page.tags());
    markdown.push_str(&blocks_to_markdown(blocks));

    Ok(RenderedPost {
        file_name: format!("{}.md", slug),
        markdown,
    })
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(base_url: &str, token: &str, database_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config
            .notion_token
            .as_deref()
            .ok_or_else(|| anyhow!("NOTION_TOKEN not set"))?;
        let database_id = config
            .notion_database_id
            .as_deref()
            .ok_or_else(|| anyhow!("NOTION_DATABASE_ID not set"))?;
        Ok(Self::new(&config.notion_api_url, token, database_id))
    }

    /// Published pages, newest first.
    pub async fn published_pages(&self) -> Result<Vec<Page>> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": { "property": "Status", "select": { "equals": "Published" } },
                "sorts": [{ "property": "Date", "direction": "descending" }],
                "page_size": PAGE_SIZE,
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let batch: Paginated<Page> = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .json(&body)
                .send()
                .await?
                .error_for_status()
                .context("database query failed")?
                .json()
                .await?;

            pages.extend(batch.results);
            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    pub async fn page_blocks(&self, page_id: &str) -> Result<Vec<Block>> {
        let url = format!("{}/v1/blocks/{}/children", self.base_url, page_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .query(&[("page_size", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let batch: Paginated<Block> = request
                .send()
                .await?
                .error_for_status()
                .with_context(|| format!("failed to list blocks for page {}", page_id))?
                .json()
                .await?;

            blocks.extend(batch.results);
            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }
}

/// Write every published page to `out_dir` as markdown. Any API or
/// filesystem error aborts the whole run.
pub async fn sync_posts(client: &NotionClient, out_dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let pages = client.published_pages().await?;
    tracing::info!("Found {} published posts", pages.len());

    let mut written = Vec::with_capacity(pages.len());
    for page in &pages {
        tracing::info!("Processing: {}", page.title().unwrap_or_else(|| page.id.clone()));
        let blocks = client.page_blocks(&page.id).await?;
        let post = render_post(page, &blocks)?;

        let path = out_dir.join(&post.file_name);
        tokio::fs::write(&path, &post.markdown)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Created: {}", path.display());
        written.push(path);
    }

    Ok(written)
}
