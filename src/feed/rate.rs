use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::RATE_API_URL;
use crate::error::FeedError;
use crate::feed::gate::RateObservation;

/// External rate feed. The poller only depends on this trait, so tests can
/// drive the pipeline with a scripted fake.
#[async_trait]
pub trait RateFetch: Send + Sync {
    async fn fetch(&self) -> Result<RateObservation, FeedError>;
}

#[derive(Debug, Deserialize)]
struct RateEnvelope {
    data: Option<RatePayload>,
}

#[derive(Debug, Deserialize)]
struct RatePayload {
    #[serde(default)]
    buying_rate: u64,
    #[serde(default)]
    selling_rate: u64,
    updated_at: Option<String>,
}

/// Client for the treasury gold rate API.
pub struct TreasuryClient {
    client: Client,
    url: String,
}

impl TreasuryClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: RATE_API_URL.to_string(),
        }
    }

}

#[async_trait]
impl RateFetch for TreasuryClient {
    async fn fetch(&self) -> Result<RateObservation, FeedError> {
        let response = self.client.post(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::BadStatus(response.status()));
        }

        let envelope: RateEnvelope = response
            .json()
            .await
            .map_err(|e| FeedError::malformed(format!("rate payload: {}", e)))?;

        let payload = envelope
            .data
            .ok_or_else(|| FeedError::malformed("rate payload missing data object"))?;

        let observed_at = payload
            .updated_at
            .ok_or_else(|| FeedError::malformed("rate payload missing updated_at"))?;

        Ok(RateObservation {
            buying_rate: payload.buying_rate,
            selling_rate: payload.selling_rate,
            observed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let json = r#"{"data":{"buying_rate":1850000,"selling_rate":1870000,"updated_at":"2025-01-02 10:00:00"}}"#;
        let envelope: RateEnvelope = serde_json::from_str(json).unwrap();
        let payload = envelope.data.unwrap();
        assert_eq!(payload.buying_rate, 1850000);
        assert_eq!(payload.selling_rate, 1870000);
        assert_eq!(payload.updated_at.as_deref(), Some("2025-01-02 10:00:00"));
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        // Zero rates pass parsing; the gate rejects them downstream.
        let json = r#"{"data":{"updated_at":"2025-01-02 10:00:00"}}"#;
        let envelope: RateEnvelope = serde_json::from_str(json).unwrap();
        let payload = envelope.data.unwrap();
        assert_eq!(payload.buying_rate, 0);
        assert_eq!(payload.selling_rate, 0);
    }

    #[test]
    fn test_empty_envelope() {
        let envelope: RateEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());
    }
}
