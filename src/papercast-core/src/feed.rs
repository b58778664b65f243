//! Daily papers feed loading.
//!
//! Fetches an RSS document and turns each `item` into a [`PaperItem`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::PodcastError;

/// A research paper announced in the daily feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperItem {
    pub title: String,
    pub link: String,
    pub description: String,
}

impl PaperItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: description.into(),
        }
    }
}

/// Where the day's papers come from.
pub trait FeedSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<PaperItem>, PodcastError>>;
}

/// RSS feed served over HTTP.
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<Vec<PaperItem>, PodcastError> {
        load_feed(&self.client, &self.url).await
    }
}

/// Fetch `url` and parse it as RSS. No retry at this layer.
pub async fn load_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<PaperItem>, PodcastError> {
    let fetch_error = |reason: String| PodcastError::FetchError {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .inspect_err(|e| tracing::error!(error = %e, url, "Failed to fetch feed"))
        .map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP status {}", status)));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let items = parse_feed(&body)?;
    tracing::info!(url, items = items.len(), "Loaded paper feed");
    Ok(items)
}

/// Parse an RSS document. Missing text nodes become empty strings.
pub fn parse_feed(body: &[u8]) -> Result<Vec<PaperItem>, PodcastError> {
    let channel =
        rss::Channel::read_from(body).map_err(|e| PodcastError::ParseError(e.to_string()))?;

    Ok(channel
        .items()
        .iter()
        .map(|item| PaperItem {
            title: item.title().unwrap_or_default().trim().to_string(),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: item.description().unwrap_or_default().trim().to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Daily Papers</title>
    <link>http://papers.takara.ai</link>
    <description>Daily AI papers</description>
    <item>
      <title>
        Sparse Attention at Scale
      </title>
      <link>https://arxiv.org/abs/2501.00001</link>
      <description>We study sparse attention.</description>
    </item>
    <item>
      <title>Tiny Recursive Models</title>
      <link>https://arxiv.org/abs/2501.00002</link>
    </item>
  </channel>
</rss>"#;

    /// Serve a single canned HTTP response and return the URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{}\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/api/feed", addr)
    }

    #[test]
    fn test_parse_feed_items_in_order() {
        let items = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Sparse Attention at Scale");
        assert_eq!(items[0].link, "https://arxiv.org/abs/2501.00001");
        assert_eq!(items[0].description, "We study sparse attention.");
        assert_eq!(items[1].title, "Tiny Recursive Models");
    }

    #[test]
    fn test_parse_feed_missing_description_is_empty() {
        let items = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(items[1].description, "");
    }

    #[test]
    fn test_parse_feed_rejects_malformed_markup() {
        let err = parse_feed(b"<html><body>not a feed").unwrap_err();
        assert!(matches!(err, PodcastError::ParseError(_)));
    }

    #[test]
    fn test_parse_feed_without_items() {
        let empty = r#"<rss version="2.0"><channel><title>t</title><link>l</link><description>d</description></channel></rss>"#;
        assert!(parse_feed(empty.as_bytes()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_feed_over_http() {
        let url = serve_once("HTTP/1.1 200 OK", FEED).await;
        let items = load_feed(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_http_feed_source() {
        let url = serve_once("HTTP/1.1 200 OK", FEED).await;
        let feed = HttpFeed::new(&url);
        assert_eq!(feed.url(), url);
        assert_eq!(feed.fetch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_feed_non_success_status() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "down").await;
        let err = load_feed(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, PodcastError::FetchError { .. }));
    }
}
