//! Remote procedure client for the plan backend.
//!
//! The backend exposes one HTTP endpoint per stored procedure at
//! `{url}/rest/v1/rpc/{procedure}`. Every request carries the project API key
//! both as `apikey` and as a bearer token.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::config::BackendConfig;
use crate::error::{BackendError, FitplanError, Result};
use crate::model::{EntityPayload, FullPlan, Level};

use super::api::PlanBackend;

/// Procedure returning a plan with its full nested schedule.
const FETCH_PLAN_PROCEDURE: &str = "get_full_plan";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum number of attempts for transient failures.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds, multiplied by the attempt number.
const RETRY_DELAY_MS: u64 = 1000;

/// Failures a call may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Any transient failure; the procedure is idempotent.
    Transient,
    /// Only failures where the backend never processed the request.
    Undelivered,
}

/// HTTP client for the backend's remote procedures.
#[derive(Debug, Clone)]
pub struct RpcClient {
    /// HTTP client.
    client: Client,
    /// Backend base URL without a trailing slash.
    base_url: String,
    /// Project API key.
    api_key: String,
    /// Maximum attempts per call.
    max_retries: u32,
    /// Base backoff between attempts.
    retry_delay: Duration,
}

impl RpcClient {
    /// Creates a new client with default timeout and retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Self::build(base_url, api_key, DEFAULT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES)
    }

    /// Creates a client from the backend configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &BackendConfig, api_key: &str) -> Result<Self> {
        Self::build(&config.url, api_key, config.timeout_secs, config.max_retries)
    }

    fn build(base_url: &str, api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Overrides the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the base URL of the backend.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Calls a remote procedure, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-retryable error.
    pub async fn call(&self, procedure: &str, params: &Value) -> Result<Value> {
        self.call_with(procedure, params, Replay::Transient).await
    }

    /// Calls a procedure that inserts rows.
    ///
    /// A timeout or dropped connection may come after the row was written, so
    /// only connection failures and rate limiting are retried.
    async fn call_insert(&self, procedure: &str, params: &Value) -> Result<Value> {
        self.call_with(procedure, params, Replay::Undelivered).await
    }

    async fn call_with(&self, procedure: &str, params: &Value, replay: Replay) -> Result<Value> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {} for {procedure}", self.max_retries);
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.call_once(procedure, params).await {
                Ok(value) => return Ok(value),
                Err(e) if replay == Replay::Undelivered && !e.is_undelivered() => return Err(e),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FitplanError::Backend(BackendError::network("Max retries exceeded"))
        }))
    }

    /// Executes a single remote procedure request.
    async fn call_once(&self, procedure: &str, params: &Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{procedure}", self.base_url);
        trace!("POST {url} {params}");

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::ConnectFailed {
                        message: e.to_string(),
                    }
                } else {
                    BackendError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(FitplanError::Backend(BackendError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read response: {e}")))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(FitplanError::Backend(BackendError::AuthenticationFailed {
                message: error_message(&body),
            }));
        }

        if !status.is_success() {
            return Err(BackendError::rpc(procedure, status.as_u16(), error_message(&body)).into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            FitplanError::Backend(BackendError::InvalidResponse {
                message: format!("{procedure} returned invalid JSON: {e}"),
            })
        })
    }
}

/// Extracts the backend's `message` from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Reads the created id from a procedure result.
///
/// Procedures return either the bare id, the inserted row, or a single-row set.
fn returned_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Object(row) => row.get("id").and_then(Value::as_str).map(String::from),
        Value::Array(rows) => rows.first().and_then(returned_id),
        _ => None,
    }
}

/// Maps a 404 procedure failure to a not-found error for the given entity.
fn not_found_as(err: FitplanError, level: &str, id: &str) -> FitplanError {
    match err {
        FitplanError::Backend(BackendError::RpcFailed { status: 404, .. }) => {
            FitplanError::Backend(BackendError::NotFound {
                level: level.to_string(),
                id: id.to_string(),
            })
        }
        other => other,
    }
}

#[async_trait]
impl PlanBackend for RpcClient {
    async fn fetch_plan(&self, plan_id: &str) -> Result<FullPlan> {
        info!("Fetching plan {plan_id}");

        let value = self
            .call(FETCH_PLAN_PROCEDURE, &json!({ "plan_id": plan_id }))
            .await
            .map_err(|e| not_found_as(e, "plan", plan_id))?;

        let value = match value {
            Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            other => other,
        };

        if value.is_null() || value.as_array().is_some_and(Vec::is_empty) {
            return Err(FitplanError::Backend(BackendError::NotFound {
                level: String::from("plan"),
                id: plan_id.to_string(),
            }));
        }

        serde_json::from_value(value).map_err(|e| {
            FitplanError::Backend(BackendError::InvalidResponse {
                message: format!("Malformed plan {plan_id}: {e}"),
            })
        })
    }

    async fn create_entity(&self, payload: &EntityPayload) -> Result<String> {
        let level = payload.level();
        let procedure = level.create_procedure();
        let params = payload.params().map_err(|e| {
            FitplanError::internal(format!("Failed to encode {level} payload: {e}"))
        })?;

        let value = self.call_insert(procedure, &params).await?;
        let id = returned_id(&value).ok_or_else(|| {
            FitplanError::Backend(BackendError::InvalidResponse {
                message: format!("{procedure} did not return an id"),
            })
        })?;

        debug!("Created {level} {} as {id}", payload.id());
        Ok(id)
    }

    async fn delete_entity(&self, level: Level, id: &str) -> Result<()> {
        self.call(level.delete_procedure(), &json!({ "id": id }))
            .await
            .map_err(|e| not_found_as(e, level.name(), id))?;

        debug!("Deleted {level} {id}");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "rpc"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewWeek;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RpcClient {
        RpcClient::new(&server.uri(), "anon-key")
            .expect("client")
            .with_retry_delay(Duration::from_millis(1))
    }

    fn week_payload() -> EntityPayload {
        EntityPayload::Week(NewWeek {
            id: String::from("temp-1"),
            plan_id: String::from("p1"),
            week_number: 3,
            title: None,
        })
    }

    #[test]
    fn test_returned_id_shapes() {
        assert_eq!(returned_id(&json!("abc")), Some(String::from("abc")));
        assert_eq!(returned_id(&json!({ "id": "def" })), Some(String::from("def")));
        assert_eq!(returned_id(&json!([{ "id": "ghi" }])), Some(String::from("ghi")));
        assert_eq!(returned_id(&json!([])), None);
        assert_eq!(returned_id(&json!(42)), None);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[tokio::test]
    async fn test_create_sends_payload_without_temp_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_plan_week"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .and(body_json(json!({ "plan_id": "p1", "week_number": 3, "title": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "w-real" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).create_entity(&week_payload()).await.expect("create");
        assert_eq!(id, "w-real");
    }

    #[tokio::test]
    async fn test_fetch_plan() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_full_plan"))
            .and(body_json(json!({ "plan_id": "p1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "title": "Strength",
                "weeks": [{ "id": "w1", "plan_id": "p1", "week_number": 1, "days": [] }]
            })))
            .mount(&server)
            .await;

        let plan = client(&server).fetch_plan("p1").await.expect("fetch");
        assert_eq!(plan.title, "Strength");
        assert_eq!(plan.weeks[0].id, "w1");
    }

    #[tokio::test]
    async fn test_fetch_null_plan_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_full_plan"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_plan("missing").await.expect_err("not found");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/delete_plan_day"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "no such day" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .delete_entity(Level::Day, "d1")
            .await
            .expect_err("not found");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_backend_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_plan_week"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "message": "week_number must be positive" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .create_entity(&week_payload())
            .await
            .expect_err("rpc failure");
        assert!(err.to_string().contains("week_number must be positive"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "JWT expired" })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_plan("p1").await.expect_err("auth");
        assert!(matches!(
            err,
            FitplanError::Backend(BackendError::AuthenticationFailed { ref message }) if message == "JWT expired"
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .delete_entity(Level::Set, "t1")
            .await
            .expect_err("rate limited");
        assert!(matches!(
            err,
            FitplanError::Backend(BackendError::RateLimited { retry_after_secs: 1 })
        ));
    }

    #[tokio::test]
    async fn test_create_timeout_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_plan_week"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "w-late" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig {
            url: server.uri(),
            timeout_secs: 1,
            max_retries: 3,
        };
        let client = RpcClient::from_config(&config, "anon-key")
            .expect("client")
            .with_retry_delay(Duration::from_millis(1));

        let err = client
            .create_entity(&week_payload())
            .await
            .expect_err("timed out");
        assert!(matches!(err, FitplanError::Backend(BackendError::NetworkError { .. })));
    }

    #[tokio::test]
    async fn test_create_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_plan_week"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/create_plan_week"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "w-real" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server).create_entity(&week_payload()).await.expect("create");
        assert_eq!(id, "w-real");
    }

    #[tokio::test]
    async fn test_connect_failure_is_undelivered() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let client = RpcClient::new(&uri, "anon-key")
            .expect("client")
            .with_retry_delay(Duration::from_millis(1));
        let err = client
            .create_entity(&week_payload())
            .await
            .expect_err("nothing listening");
        assert!(err.is_undelivered());
    }
}
