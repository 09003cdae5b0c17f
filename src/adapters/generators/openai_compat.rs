//! OpenAI-compatible chat-completions generator.
//!
//! Works against any server exposing `POST {base_url}/chat/completions`.
//! Calls are throttled client-side with a token bucket and retried with
//! exponential backoff on transport errors, 429 and 5xx responses.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::GeneratorConfig;
use crate::domain::ports::{TurnGenerator, TurnRequest};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints, rate limited and retried.
pub struct OpenAiCompatibleGenerator {
    client: Client,
    config: GeneratorConfig,
    api_key: Option<String>,
    limiter: DirectLimiter,
}

impl OpenAiCompatibleGenerator {
    /// Build the HTTP client and rate limiter. Fails on an invalid rate.
    pub fn new(config: GeneratorConfig) -> DomainResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::Generator(format!("Failed to build HTTP client: {e}")))?;

        let rps = config.requests_per_second;
        if !(rps.is_finite() && rps >= 0.001) {
            return Err(DomainError::ValidationFailed(format!(
                "requests_per_second must be at least 0.001, got {rps}"
            )));
        }
        let period = Duration::from_secs_f64(1.0 / rps);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| DomainError::ValidationFailed("rate limit period must be non-zero".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            client,
            config,
            api_key,
            limiter: RateLimiter::direct(quota),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, request: &TurnRequest) -> Result<String, backoff::Error<DomainError>> {
        self.limiter.until_ready().await;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(DomainError::Generator(format!("request failed: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = DomainError::Generator(format!("HTTP {status}: {}", truncate(&text, 200)));
            return Err(if is_transient(status) {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(DomainError::Generator(format!("invalid response body: {e}")))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                backoff::Error::permanent(DomainError::Generator(
                    "response contained no message content".to_string(),
                ))
            })
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

#[async_trait]
impl TurnGenerator for OpenAiCompatibleGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: &TurnRequest) -> DomainResult<String> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let max_attempts = self.config.max_retries + 1;

        backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                simulation_id = %request.simulation_id,
                role = %request.role,
                attempt,
                "Calling chat completions"
            );
            match self.send_once(request).await {
                Err(backoff::Error::Transient { err, .. }) if attempt >= max_attempts => {
                    Err(backoff::Error::permanent(err))
                }
                Err(backoff::Error::Transient { err, retry_after }) => {
                    warn!(attempt, error = %err, "Transient generator failure, retrying");
                    Err(backoff::Error::Transient { err, retry_after })
                }
                other => other,
            }
        })
        .await
    }
}
