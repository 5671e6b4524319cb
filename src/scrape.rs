//! Storefront homepage metadata for the AI context.
//!
//! Extraction is regex based; it only needs the title, meta description,
//! section headings and promotion banners of a single known page.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "NongorBot/3.0 (Context Builder)";
const DEFAULT_TITLE: &str = "Nongor Premium";
const DEFAULT_DESCRIPTION: &str = "Quality clothing for modern Bangladesh";
const MAX_HEADINGS: usize = 10;
const SECTIONS_IN_CONTEXT: usize = 5;

lazy_static! {
    static ref TITLE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref META_TAG: Regex = Regex::new(r"(?is)<meta\b[^>]*>").unwrap();
    static ref NAME_DESCRIPTION: Regex =
        Regex::new(r#"(?is)\bname\s*=\s*["']description["']"#).unwrap();
    static ref CONTENT_ATTR: Regex = Regex::new(r#"(?is)\bcontent\s*=\s*"([^"]*)"|\bcontent\s*=\s*'([^']*)'"#).unwrap();
    static ref HEADING: Regex = Regex::new(r"(?is)<h[23]\b[^>]*>(.*?)</h[23]\s*>").unwrap();
    static ref CLASSED_ELEMENT: Regex =
        Regex::new(r#"(?is)<[a-z][a-z0-9]*\b[^>]*\bclass\s*=\s*["']([^"']*)["'][^>]*>(.*?)</"#).unwrap();
    static ref PROMO_CLASS: Regex = Regex::new(r"(?i)banner|promo|sale|offer").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Strip markup, decode entities and collapse whitespace
fn clean_text(fragment: &str) -> String {
    let without_tags = TAG.replace_all(fragment, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebsiteMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<String>,
    pub promotions: Vec<String>,
}

impl WebsiteMetadata {
    pub fn from_html(html: &str) -> Self {
        let title = TITLE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| clean_text(m.as_str()))
            .filter(|t| !t.is_empty());

        let description = META_TAG
            .find_iter(html)
            .map(|m| m.as_str())
            .find(|tag| NAME_DESCRIPTION.is_match(tag))
            .and_then(|tag| CONTENT_ATTR.captures(tag))
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| clean_text(m.as_str()))
            .filter(|d| !d.is_empty());

        let headings = HEADING
            .captures_iter(html)
            .take(MAX_HEADINGS)
            .filter_map(|c| c.get(1).map(|m| clean_text(m.as_str())))
            .filter(|h| !h.is_empty() && h.chars().count() < 50)
            .collect();

        let promotions = CLASSED_ELEMENT
            .captures_iter(html)
            .filter(|c| c.get(1).is_some_and(|class| PROMO_CLASS.is_match(class.as_str())))
            .filter_map(|c| c.get(2).map(|m| clean_text(m.as_str())))
            .filter(|p| !p.is_empty() && p.chars().count() < 100)
            .collect();

        Self {
            title,
            description,
            headings,
            promotions,
        }
    }

    /// The WEBSITE INFO block injected into prompts
    pub fn to_context(&self, url: &str) -> String {
        let description: String = self
            .description
            .as_deref()
            .unwrap_or(DEFAULT_DESCRIPTION)
            .chars()
            .take(200)
            .collect();

        let mut context = format!(
            "WEBSITE INFO:\nTitle: {}\nDescription: {}\nURL: {}\n",
            self.title.as_deref().unwrap_or(DEFAULT_TITLE),
            description,
            url
        );

        if !self.headings.is_empty() {
            let sections: Vec<&str> = self
                .headings
                .iter()
                .take(SECTIONS_IN_CONTEXT)
                .map(String::as_str)
                .collect();
            context.push_str(&format!("Sections: {}\n", sections.join(", ")));
        }

        if let Some(promo) = self.promotions.first() {
            context.push_str(&format!("Current Promotions: {promo}\n"));
        }

        context
    }
}

#[derive(Debug)]
pub enum ScrapeError {
    Timeout,
    Status(u16),
    Http(String),
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeError::Timeout => write!(f, "website request timed out"),
            ScrapeError::Status(code) => write!(f, "website returned HTTP {code}"),
            ScrapeError::Http(msg) => write!(f, "website request failed: {msg}"),
        }
    }
}

impl std::error::Error for ScrapeError {}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout
        } else {
            ScrapeError::Http(err.to_string())
        }
    }
}

/// Context used when the site answers too slowly
pub fn slow_site_context(url: &str) -> String {
    format!("WEBSITE INFO:\nURL: {url}\nStatus: Website available but slow to respond\n")
}

/// Context used when the site could not be read at all
pub fn unavailable_site_context(url: &str) -> String {
    format!(
        "WEBSITE INFO:\nURL: {url}\nDescription: {DEFAULT_TITLE} - {DEFAULT_DESCRIPTION}\n\
         Categories: T-Shirts, Hoodies, Jackets, Accessories\n"
    )
}

pub fn disabled_context() -> String {
    "WEBSITE INFO: Web scraping disabled.\n".to_string()
}

/// Download and parse the storefront homepage
pub async fn fetch_metadata(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<WebsiteMetadata, ScrapeError> {
    debug!(url = %url, "Fetching website metadata");
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        warn!(url = %url, status = status.as_u16(), "Website returned non-success status");
        return Err(ScrapeError::Status(status.as_u16()));
    }

    let html = response.text().await?;
    Ok(WebsiteMetadata::from_html(&html))
}
