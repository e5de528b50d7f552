use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::QUOTE_URL;
use crate::error::FeedError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

/// CSS class of the quote element on the source page.
const PRICE_MARKER: &str = "YMlKec fxKbKc";

/// External currency quote feed. Returns the price exactly as the source
/// formats it; the string is stored verbatim and compared verbatim.
#[async_trait]
pub trait QuoteFetch: Send + Sync {
    async fn fetch(&self) -> Result<String, FeedError>;
}

/// Scrapes the USD/IDR quote from the Google Finance quote page.
pub struct GoogleFinanceClient {
    client: Client,
    url: String,
}

impl GoogleFinanceClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: QUOTE_URL.to_string(),
        }
    }
}

#[async_trait]
impl QuoteFetch for GoogleFinanceClient {
    async fn fetch(&self) -> Result<String, FeedError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::BadStatus(response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::malformed(format!("quote body: {}", e)))?;

        extract_price(&body)
            .ok_or_else(|| FeedError::malformed("price element not found in quote page"))
    }
}

/// Pulls the text content of the first element carrying the price marker
/// class. The page structure beyond that marker is the source's concern.
fn extract_price(html: &str) -> Option<String> {
    let class_pos = html.find(PRICE_MARKER)?;
    let after_class = &html[class_pos..];
    let text_start = after_class.find('>')? + 1;
    let text_end = after_class[text_start..].find('<')?;
    let price = after_class[text_start..text_start + text_end].trim();
    if price.is_empty() {
        None
    } else {
        Some(price.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price() {
        let html = r#"<div class="YMlKec fxKbKc">16.250,00</div>"#;
        assert_eq!(extract_price(html), Some("16.250,00".to_string()));
    }

    #[test]
    fn test_extract_price_with_surrounding_markup() {
        let html = r#"<body><span class="x">noise</span>
            <div class="YMlKec fxKbKc" jsname="ip75Cb">16.312,50</div><div>tail</div></body>"#;
        assert_eq!(extract_price(html), Some("16.312,50".to_string()));
    }

    #[test]
    fn test_extract_price_missing_marker() {
        assert_eq!(extract_price("<html><body>nothing here</body></html>"), None);
    }

    #[test]
    fn test_extract_price_empty_element() {
        let html = r#"<div class="YMlKec fxKbKc"></div>"#;
        assert_eq!(extract_price(html), None);
    }
}
