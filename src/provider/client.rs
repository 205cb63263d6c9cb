use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::Config;
use crate::gate::RateGate;
use crate::provider::models::{EnhancedTransaction, ErrorEnvelope, ProviderPage};
use crate::provider::{ProviderError, TransactionProvider};

const DEFAULT_BASE_URL: &str = "https://api.helius.xyz";

/// Client for the enhanced-transactions API. Every attempt (including
/// retries) re-enters the shared rate gate so retried calls compete fairly
/// with fresh work.
pub struct HeliusProvider {
    http: Client,
    base_url: String,
    api_key: String,
    gate: Arc<RateGate>,
    retries: AtomicU64,
}

impl HeliusProvider {
    pub fn new(config: &Config, gate: Arc<RateGate>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent("wallet-ledger-service/0.1")
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: config.helius_api_key.clone(),
            gate,
            retries: AtomicU64::new(0),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn retry_policy() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_factor(2.0)
            .with_max_delay(Duration::from_secs(10))
            .with_max_times(5)
            .with_jitter()
    }

    async fn fetch_page_once(
        &self,
        wallet: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EnhancedTransaction>, ProviderError> {
        let _permit = self.gate.acquire().await;

        let url = format!(
            "{}/v0/addresses/{}/transactions",
            self.base_url, wallet
        );
        let mut query: Vec<(&str, String)> = vec![
            ("api-key", self.api_key.clone()),
            ("maxSupportedTransactionVersion", "0".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }

        debug!(wallet, ?before, limit, "fetching transaction page");

        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();

        if status.is_success() {
            let items = response.json::<Vec<EnhancedTransaction>>().await?;
            return Ok(items);
        }

        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        warn!(status = status.as_u16(), body = %snippet, "provider returned an error");

        Err(classify_error(status, &body))
    }
}

fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited;
    }
    if status.is_server_error() {
        return ProviderError::Server(status.as_u16());
    }

    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let message = envelope.message.unwrap_or_else(|| {
        body.chars().take(200).collect()
    });
    let lower = message.to_lowercase();

    if envelope.code.as_deref() == Some("INVALID_BEFORE") || lower.contains("invalid before") {
        return ProviderError::CursorInvalid;
    }
    if lower.contains("unauthorized") || lower.contains("api-key") || lower.contains("api key") {
        return ProviderError::Unauthorized(message);
    }

    ProviderError::Request {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl TransactionProvider for HeliusProvider {
    async fn fetch_page(
        &self,
        wallet: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<ProviderPage, ProviderError> {
        let items = (|| async { self.fetch_page_once(wallet, before, limit).await })
            .retry(Self::retry_policy())
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, dur: Duration| {
                self.retries.fetch_add(1, Ordering::Relaxed);
                warn!("transient provider failure, retrying in {:?}: {}", dur, err);
            })
            .await?;

        let next_before = items.last().map(|tx| tx.signature.clone());
        Ok(ProviderPage { items, next_before })
    }

    fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cursor_poisoning() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": "invalid before signature"}"#,
        );
        assert!(matches!(err, ProviderError::CursorInvalid));

        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": "bad cursor", "code": "INVALID_BEFORE"}"#,
        );
        assert!(matches!(err, ProviderError::CursorInvalid));
    }

    #[test]
    fn classifies_configuration_errors() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": "unauthorized: bad api-key"}"#,
        );
        assert!(matches!(err, ProviderError::Unauthorized(_)));
    }

    #[test]
    fn classifies_transient_errors() {
        assert!(classify_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_error(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_error(StatusCode::NOT_FOUND, "{}").is_transient());
    }
}
