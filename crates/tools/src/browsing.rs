//! Browsing tool — web search/fetch, YouTube lookup, GIF search.
//!
//! One handler covers the three browsing modes. Web and YouTube results are
//! fed back to the model before it may reply; a GIF URL rides along with the
//! pending reply as an attachment.

use async_trait::async_trait;
use confab_core::error::ToolError;
use confab_core::reply::{BrowseMode, ToolCall};
use confab_core::tool::{ToolHandler, ToolKind, ToolOutput};
use rand::seq::SliceRandom;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PAGE_TEXT_LIMIT: usize = 2000;
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const GIPHY_URL: &str = "https://api.giphy.com/v1/gifs/search";
const YOUTUBE_URL: &str = "https://www.youtube.com/results";

pub struct BrowsingTool {
    client: reqwest::Client,
    giphy_api_key: Option<String>,
}

impl BrowsingTool {
    pub fn new(giphy_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            giphy_api_key,
        }
    }

    /// Fetch a page or run a text search, returning extracted page text.
    async fn web(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        let is_url = starts_with_ascii_ci(query, "http://") || starts_with_ascii_ci(query, "https://");
        let (url, params): (&str, Vec<(&str, &str)>) = if is_url {
            (query, vec![])
        } else {
            (SEARCH_URL, vec![("q", query)])
        };

        debug!(url = %url, "Browsing web");

        let response = self
            .client
            .get(url)
            .query(&params)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let html = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "browsing".into(),
            reason: e.to_string(),
        })?;

        let text = extract_text(&html);
        if text.is_empty() {
            return Ok("Could not extract content from page.".into());
        }
        Ok(truncate_chars(&text, PAGE_TEXT_LIMIT))
    }

    /// Search YouTube and return the first watch URL.
    async fn youtube(&self, query: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .get(YOUTUBE_URL)
            .query(&[("search_query", query)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: e.to_string(),
            })?;

        let html = response.text().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: "browsing".into(),
            reason: e.to_string(),
        })?;

        Ok(first_watch_url(&html).unwrap_or_else(|| "No YouTube video found.".into()))
    }

    /// Search Giphy and return a random URL from the first results page.
    async fn gif(&self, query: &str) -> Result<String, ToolError> {
        let api_key = self.giphy_api_key.as_deref().ok_or_else(|| {
            ToolError::NotAvailable("gif search requires a Giphy API key".into())
        })?;

        let response = self
            .client
            .get(GIPHY_URL)
            .query(&[("q", query), ("api_key", api_key), ("limit", "5"), ("rating", "g")])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: e.to_string(),
            })?;

        let data: serde_json::Value =
            response.json().await.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: e.to_string(),
            })?;

        let urls = gif_urls(&data);
        urls.choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: "browsing".into(),
                reason: format!("no GIFs found for '{query}'"),
            })
    }
}

#[async_trait]
impl ToolHandler for BrowsingTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Browsing
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let ToolCall::Browsing { query, mode } = call else {
            return Err(ToolError::InvalidArguments(format!(
                "expected browsing, got {}",
                call.kind()
            )));
        };

        match mode {
            BrowseMode::Web => Ok(ToolOutput::text(self.web(query).await?)),
            BrowseMode::Youtube => Ok(ToolOutput::text(self.youtube(query).await?)),
            BrowseMode::Gif => {
                let url = self.gif(query).await?;
                Ok(ToolOutput { text: format!("GIF found: {url}"), attachments: vec![url] })
            }
        }
    }
}

/// Strip tags from an HTML document, skipping script/style bodies, and
/// normalize whitespace.
fn extract_text(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;

    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    while !rest.is_empty() {
        if let Some(close) = skip_until {
            match find_ascii_ci(rest, close) {
                Some(pos) => {
                    rest = &rest[pos + close.len()..];
                    skip_until = None;
                }
                None => break,
            }
            continue;
        }

        let Some(c) = rest.chars().next() else { break };

        if in_tag {
            if c == '>' {
                in_tag = false;
            }
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c == '<' {
            if starts_with_ascii_ci(rest, "<script") {
                skip_until = Some("</script>");
            } else if starts_with_ascii_ci(rest, "<style") {
                skip_until = Some("</style>");
            } else {
                in_tag = true;
            }
            rest = &rest[1..];
            // A tag boundary separates words.
            out.push(' ');
            continue;
        }

        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset of the first ASCII-case-insensitive match. The needle must be
/// ASCII, so a match always lands on char boundaries.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

fn starts_with_ascii_ci(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Find the first `/watch?v=` video id in a results page.
fn first_watch_url(html: &str) -> Option<String> {
    let marker = "/watch?v=";
    let start = html.find(marker)? + marker.len();
    let id: String = html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(11)
        .collect();
    (id.len() == 11).then(|| format!("https://www.youtube.com/watch?v={id}"))
}

/// Pull the original-image URLs out of a Giphy search response.
fn gif_urls(data: &serde_json::Value) -> Vec<String> {
    data["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["images"]["original"]["url"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
