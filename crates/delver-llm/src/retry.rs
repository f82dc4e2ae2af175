use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::{info, warn};

use delver_core::config::{ModelConfig, RetryConfig};
use delver_core::error::{DelverError, Result};
use delver_core::traits::LlmClient;
use delver_core::types::*;

/// An LLM client that retries transient failures and then falls back to
/// alternative models.
pub struct RetryingClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let factor = 1u64 << attempt.min(20);
    let ms = config
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self.primary.chat_stream(&config, messages.clone()).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) if e.is_transient() && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        last_err = Some(e);
                    }
                    Err(e) => {
                        last_err = Some(e);
                        break;
                    }
                }
            }

            if !self.fallbacks.is_empty() {
                info!(model = %config.model_id, "Primary model exhausted, trying fallbacks");
            }
            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client.chat_stream(fb_config, messages.clone()).await {
                    Ok(stream) => {
                        info!(
                            model = %fb_config.model_id,
                            provider = %fb_config.provider,
                            "Fell back to alternative model"
                        );
                        return Ok(stream);
                    }
                    Err(e) => {
                        warn!(model = %fb_config.model_id, error = %e, "Fallback model also failed");
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| DelverError::LlmRequest("All providers failed".into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use futures::StreamExt;

    struct Flaky {
        failures_left: AtomicU32,
        calls: Arc<AtomicU32>,
        error: &'static str,
    }

    impl LlmClient for Flaky {
        fn chat_stream(
            &self,
            _config: &ModelConfig,
            _messages: Vec<ChatMessage>,
        ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.failures_left.load(Ordering::SeqCst) > 0 {
                    self.failures_left.fetch_sub(1, Ordering::SeqCst);
                    return Err(DelverError::LlmRequest(self.error.to_string()));
                }
                let items = vec![Ok(StreamDelta::TextDelta("ok".into()))];
                Ok(Box::pin(futures::stream::iter(items)) as BoxStream<'_, Result<StreamDelta>>)
            })
        }
    }

    fn flaky(failures: u32, error: &'static str) -> (Box<dyn LlmClient>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let client = Flaky {
            failures_left: AtomicU32::new(failures),
            calls: calls.clone(),
            error,
        };
        (Box::new(client), calls)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = RetryConfig::default();
        for attempt in [0, 3, 10, 40] {
            let backoff = calculate_backoff(attempt, &config);
            assert!(backoff <= Duration::from_millis(36_000));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let (primary, calls) = flaky(2, "HTTP 503: unavailable");
        let client = RetryingClient::new(primary, vec![], fast_retry());
        let config = ModelConfig::new("openai", "m");

        let mut stream = client.chat_stream(&config, vec![]).await.unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            StreamDelta::TextDelta("ok".into())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_goes_to_fallback() {
        let (primary, primary_calls) = flaky(10, "HTTP 401: bad key");
        let (fallback, fallback_calls) = flaky(0, "");
        let client = RetryingClient::new(
            primary,
            vec![(ModelConfig::new("groq", "backup"), fallback)],
            fast_retry(),
        );

        let result = client.chat_stream(&ModelConfig::new("openai", "m"), vec![]).await;
        assert!(result.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_primary_error() {
        let (primary, _) = flaky(10, "HTTP 500: boom");
        let client = RetryingClient::new(primary, vec![], fast_retry());

        let err = client
            .chat_stream(&ModelConfig::new("openai", "m"), vec![])
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("500"));
    }
}
