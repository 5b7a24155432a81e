//! Landing-page fetching and text extraction.

use crate::error::{QuillError, Result};
use futures_util::future::BoxFuture;
use scraper::{Html, Node, Selector};
use std::time::Duration;

/// Title used when a page has no `<title>`.
pub const NO_TITLE: &str = "No title found";

/// Elements whose content never reaches the prompt.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "img", "input"];

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetched page reduced to its title and visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Website {
    pub url: String,
    pub title: String,
    pub text: String,
}

impl Website {
    /// Extract title and body text from an HTML document.
    ///
    /// Body text nodes are trimmed, empty ones dropped, and the rest joined
    /// with newlines.
    pub fn from_html(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = selector("title")
            .and_then(|sel| document.select(&sel).next())
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let text = selector("body")
            .and_then(|sel| document.select(&sel).next())
            .map(|body| {
                body.descendants()
                    .filter_map(|node| match node.value() {
                        Node::Text(text) => Some((node, text)),
                        _ => None,
                    })
                    .filter(|(node, _)| {
                        !node.ancestors().any(|a| {
                            a.value()
                                .as_element()
                                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
                        })
                    })
                    .map(|(_, text)| text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            title,
            text,
        }
    }

    /// The page as it is embedded in a prompt.
    pub fn contents(&self) -> String {
        format!(
            "Webpage Title:\n{}\nWebpage Contents:\n{}\n\n",
            self.title, self.text
        )
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Retrieves a page for prompting.
pub trait ContentFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Website>>;
}

/// Fetches pages over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| QuillError::ContentFetch(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        if !is_url(url) {
            return Err(QuillError::ContentFetch(format!(
                "'{}' is not an http(s) URL",
                url
            )));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuillError::ContentFetch(format!("Failed to fetch '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(QuillError::ContentFetch(format!(
                "HTTP {} fetching '{}'",
                response.status(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            QuillError::ContentFetch(format!("Failed to read response from '{}': {}", url, e))
        })
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Website>> {
        Box::pin(async move {
            let html = self.fetch_html(url).await?;
            let website = Website::from_html(url, &html);
            log::debug!(
                "fetched {}: title {:?}, {} bytes of text",
                url,
                website.title,
                website.text.len()
            );
            Ok(website)
        })
    }
}

/// Check if a source string is a URL (http:// or https://).
fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
