//! Rate-governed GraphQL client.
//!
//! One client instance owns the primary rate-limit budget for the process.
//! Every query (except the status check) passes through a budget gate that
//! blocks while the budget is low, then resets the local tracker to an
//! assumed-full budget rather than spending a round-trip on re-checking.
//!
//! Transport faults are retried on a shared exponential ladder with four
//! terminal behaviours:
//!
//! | fault               | after the ladder is exhausted        |
//! |---------------------|--------------------------------------|
//! | connect/read timeout| fatal                                |
//! | HTTP 5xx            | fatal                                |
//! | unparseable body    | degrade to [`PageFetch::NoData`]     |
//! | other transport     | fatal                                |
//!
//! GraphQL-level errors on a 2xx response are classified separately and are
//! not counted against the ladder: secondary (abuse) markers sleep a fixed
//! cooldown and yield [`PageFetch::RetryLater`]; primary rate-limit markers
//! sleep a longer cooldown and yield the same sentinel; anything else is
//! fatal with the raw payload attached.

use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use super::backoff::{self, retry_delay};
use super::error::GithubError;
use super::gateway::{CrawlGateway, PageFetch};
use super::models::{
    Connection, PullRequestPage, RateLimitEnvelope, RateLimitStatus, RepositoryPage,
};
use super::queries;
use super::rate_limit::RateLimitBudget;
use super::token::PersonalAccessToken;

/// Default GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

/// Cooldown served when GitHub reports a secondary (abuse-detection) limit.
pub const SECONDARY_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(180);

/// Cooldown served when GitHub reports the primary budget as exceeded.
pub const PRIMARY_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(3_600);

/// Tunable knobs for [`GraphqlClient`].
///
/// The defaults are the production constants; tests shrink the delays so
/// cooldown paths run in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// GraphQL endpoint to POST queries to.
    pub endpoint: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Overall per-request timeout.
    pub request_timeout: Duration,
    /// First rung of the retry ladder.
    pub base_retry_delay: Duration,
    /// Ceiling applied to the retry ladder.
    pub retry_delay_cap: Duration,
    /// Attempts before a fault class reaches its terminal behaviour.
    pub max_attempts: u32,
    /// Sleep served for a secondary rate-limit signal.
    pub secondary_cooldown: Duration,
    /// Sleep served for a primary rate-limit signal.
    pub primary_cooldown: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            connect_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(90),
            base_retry_delay: backoff::BASE_DELAY,
            retry_delay_cap: backoff::CAP_DELAY,
            max_attempts: backoff::MAX_ATTEMPTS,
            secondary_cooldown: SECONDARY_RATE_LIMIT_COOLDOWN,
            primary_cooldown: PRIMARY_RATE_LIMIT_COOLDOWN,
        }
    }
}

/// Transport fault classes fed into the retry ladder.
#[derive(Debug)]
enum TransportFault {
    Timeout(String),
    Server(u16),
    Malformed(String),
    Unexpected(String),
}

impl TransportFault {
    const fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "network timeout",
            Self::Server(_) => "server error",
            Self::Malformed(_) => "malformed response",
            Self::Unexpected(_) => "unexpected transport error",
        }
    }

    /// Terminal behaviour once the ladder is exhausted. Malformed payloads
    /// degrade to "no data" instead of raising.
    fn into_terminal(self, attempts: u32) -> Result<Option<Value>, GithubError> {
        match self {
            Self::Timeout(message) => {
                Err(GithubError::TimeoutRetriesExhausted { attempts, message })
            }
            Self::Server(status) => Err(GithubError::ServerRetriesExhausted { status, attempts }),
            Self::Unexpected(message) => {
                Err(GithubError::TransportRetriesExhausted { attempts, message })
            }
            Self::Malformed(message) => {
                tracing::warn!(
                    attempts,
                    %message,
                    "response stayed malformed through every retry; treating as no data"
                );
                Ok(None)
            }
        }
    }
}

/// GraphQL client that owns the primary rate-limit budget.
///
/// Safe for concurrent use from multiple crawl workers: the budget gate's
/// read-modify-write and the post-call overwrite run inside one critical
/// section per client instance.
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: Url,
    token: PersonalAccessToken,
    options: ClientOptions,
    budget: Mutex<RateLimitBudget>,
}

impl GraphqlClient {
    /// Builds a client for the given token and options.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::InvalidEndpoint`] when the configured endpoint
    /// does not parse as a URL and [`GithubError::ClientBuild`] when reqwest
    /// fails to construct the HTTP client.
    pub fn new(token: PersonalAccessToken, options: ClientOptions) -> Result<Self, GithubError> {
        let endpoint: Url = options
            .endpoint
            .parse()
            .map_err(|error: url::ParseError| GithubError::InvalidEndpoint(error.to_string()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.request_timeout)
            .build()
            .map_err(|error| GithubError::ClientBuild {
                message: error.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint,
            token,
            options,
            budget: Mutex::new(RateLimitBudget::assume_full(Utc::now())),
        })
    }

    /// Builds a client with default options.
    ///
    /// # Errors
    ///
    /// Propagates any [`GraphqlClient::new`] failure.
    pub fn for_token(token: PersonalAccessToken) -> Result<Self, GithubError> {
        Self::new(token, ClientOptions::default())
    }

    /// Snapshot of the tracked budget, for logging.
    pub async fn budget_snapshot(&self) -> RateLimitBudget {
        *self.budget.lock().await
    }

    /// Blocks while the tracked budget is at or below the safety threshold,
    /// then resets the tracker to an assumed-full budget.
    ///
    /// Holding the lock across the sleep is deliberate: it is the critical
    /// section that stops a second worker racing past the gate while the
    /// budget is low.
    async fn gate(&self) {
        let mut budget = self.budget.lock().await;
        let Some(wait) = budget.gate_wait(Utc::now()) else {
            return;
        };
        if !wait.is_zero() {
            tracing::warn!(
                remaining = budget.remaining(),
                wait_seconds = wait.as_secs(),
                "rate-limit budget low; sleeping until reset"
            );
            tokio::time::sleep(wait).await;
        }
        budget.reset_after_wait(Utc::now());
    }

    /// Overwrites the budget tracker from a response envelope, if present.
    async fn record_budget(&self, response: &Value) {
        let Some(envelope) = response
            .pointer("/data/rateLimit")
            .and_then(|value| serde_json::from_value::<RateLimitEnvelope>(value.clone()).ok())
        else {
            return;
        };
        let mut budget = self.budget.lock().await;
        budget.record(&envelope);
        tracing::debug!(
            cost = envelope.cost,
            remaining = envelope.remaining,
            "rate-limit envelope recorded"
        );
    }

    /// Issues one request and retries transport faults on the ladder.
    ///
    /// Returns `Ok(None)` when the body stayed unparseable through every
    /// attempt, `Ok(Some(body))` otherwise.
    async fn execute(&self, body: &Value, gated: bool) -> Result<Option<Value>, GithubError> {
        if gated {
            self.gate().await;
        }

        let mut attempt = 1_u32;
        loop {
            match self.send_once(body).await {
                Ok(parsed) => {
                    self.record_budget(&parsed).await;
                    return Ok(Some(parsed));
                }
                Err(fault) => {
                    if attempt >= self.options.max_attempts {
                        return fault.into_terminal(attempt);
                    }
                    let delay = retry_delay(
                        attempt,
                        self.options.base_retry_delay,
                        self.options.retry_delay_cap,
                    );
                    tracing::warn!(
                        attempt,
                        max_attempts = self.options.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        fault = fault.label(),
                        "request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One request/parse cycle classified into a transport fault on failure.
    async fn send_once(&self, body: &Value) -> Result<Value, TransportFault> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(self.token.value())
            .json(body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransportFault::Server(status.as_u16()));
        }

        let text = response.text().await.map_err(classify_reqwest_error)?;
        serde_json::from_str(&text).map_err(|error| TransportFault::Malformed(error.to_string()))
    }

    /// Extracts a typed connection page from `response`, or classifies the
    /// GraphQL-level errors it carries instead.
    async fn page_or_classify<T>(
        &self,
        response: Value,
        envelope: &'static str,
    ) -> Result<PageFetch<Connection<T>>, GithubError>
    where
        T: DeserializeOwned,
    {
        if let Some(data) = response.pointer(envelope).filter(|value| !value.is_null()) {
            let page = serde_json::from_value(data.clone()).map_err(|error| {
                GithubError::MalformedNode {
                    message: error.to_string(),
                }
            })?;
            return Ok(PageFetch::Page(page));
        }
        self.classify_graphql_errors(&response, envelope).await
    }

    /// Classifies a response whose expected data envelope is missing.
    ///
    /// Rate-limit signals sleep their fixed cooldown and yield `RetryLater`;
    /// they are never counted against the retry ladder. Any other `errors`
    /// content is fatal with the payload attached.
    async fn classify_graphql_errors<T>(
        &self,
        response: &Value,
        envelope: &'static str,
    ) -> Result<PageFetch<T>, GithubError> {
        let Some(errors) = response
            .get("errors")
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty())
        else {
            return Err(GithubError::MissingEnvelope { envelope });
        };

        if errors.iter().any(is_secondary_rate_limit) {
            tracing::warn!(
                cooldown_seconds = self.options.secondary_cooldown.as_secs(),
                "secondary rate limit (abuse detection) triggered; cooling down"
            );
            tokio::time::sleep(self.options.secondary_cooldown).await;
            return Ok(PageFetch::RetryLater);
        }

        if errors.iter().any(is_primary_rate_limit) {
            tracing::warn!(
                cooldown_seconds = self.options.primary_cooldown.as_secs(),
                "primary rate limit exceeded; cooling down"
            );
            tokio::time::sleep(self.options.primary_cooldown).await;
            return Ok(PageFetch::RetryLater);
        }

        Err(GithubError::GraphQl {
            payload: Value::Array(errors.clone()).to_string(),
        })
    }
}

#[async_trait::async_trait]
impl CrawlGateway for GraphqlClient {
    async fn organization_repositories_page(
        &self,
        org: &str,
        after: Option<String>,
    ) -> Result<PageFetch<RepositoryPage>, GithubError> {
        let body = queries::repositories_request(org, after.as_deref());
        let Some(response) = self.execute(&body, true).await? else {
            return Ok(PageFetch::NoData);
        };
        self.page_or_classify(response, "/data/organization/repositories")
            .await
    }

    async fn pull_requests_page(
        &self,
        owner: &str,
        repo: &str,
        after: Option<String>,
    ) -> Result<PageFetch<PullRequestPage>, GithubError> {
        let body = queries::pull_requests_request(owner, repo, after.as_deref());
        let Some(response) = self.execute(&body, true).await? else {
            return Ok(PageFetch::NoData);
        };
        self.page_or_classify(response, "/data/repository/pullRequests")
            .await
    }

    async fn rate_limit_status(&self) -> Result<RateLimitStatus, GithubError> {
        let body = queries::rate_limit_request();
        let Some(response) = self.execute(&body, false).await? else {
            return Err(GithubError::MissingEnvelope {
                envelope: "/data/rateLimit",
            });
        };
        response
            .pointer("/data/rateLimit")
            .filter(|value| !value.is_null())
            .map_or(
                Err(GithubError::MissingEnvelope {
                    envelope: "/data/rateLimit",
                }),
                |value| {
                    serde_json::from_value(value.clone()).map_err(|error| {
                        GithubError::MalformedNode {
                            message: error.to_string(),
                        }
                    })
                },
            )
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportFault {
    // Only genuine connect/read timeouts are the timeout class; a refused
    // connection or DNS failure is an unexpected transport fault.
    if error.is_timeout() {
        TransportFault::Timeout(error.to_string())
    } else {
        TransportFault::Unexpected(error.to_string())
    }
}

/// Secondary limits are signalled by message content, not a budget field.
fn is_secondary_rate_limit(error: &Value) -> bool {
    message_of(error).is_some_and(|message| {
        message.contains("abuse") || message.contains("secondary rate limit")
    })
}

fn is_primary_rate_limit(error: &Value) -> bool {
    let typed = error
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind == "RATE_LIMITED");
    typed
        || message_of(error).is_some_and(|message| {
            message.contains("rate limit") || message.contains("API rate limit exceeded")
        })
}

fn message_of(error: &Value) -> Option<&str> {
    error.get("message").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{is_primary_rate_limit, is_secondary_rate_limit};

    #[test]
    fn abuse_marker_is_secondary_not_primary() {
        let error = json!({"message": "You have triggered an abuse detection mechanism"});
        assert!(is_secondary_rate_limit(&error));
    }

    #[test]
    fn secondary_marker_also_matches_the_primary_scan() {
        // Ordering matters in classification: "secondary rate limit" contains
        // "rate limit", so the secondary scan must run first.
        let error = json!({"message": "secondary rate limit reached"});
        assert!(is_secondary_rate_limit(&error));
        assert!(is_primary_rate_limit(&error));
    }

    #[test]
    fn rate_limited_type_is_primary() {
        let error = json!({"type": "RATE_LIMITED", "message": "wait a while"});
        assert!(is_primary_rate_limit(&error));
        assert!(!is_secondary_rate_limit(&error));
    }

    #[test]
    fn unrelated_errors_match_neither_scan() {
        let error = json!({"message": "Could not resolve to an Organization"});
        assert!(!is_secondary_rate_limit(&error));
        assert!(!is_primary_rate_limit(&error));
    }
}
