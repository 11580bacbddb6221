//! `http.request`: perform an HTTP request.

use std::time::Duration;

use serde_json::{Value, json};
use traverse_core::activity::{Activity, ActivityContext, ActivityError, ActivityOutput};
use traverse_types::workflow::VarMap;

use super::{optional_str, optional_u64, required_str};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters: `url` (required), `method` (default GET), `headers` (string
/// map), `body` (string sent raw, any other value sent as JSON),
/// `timeout_ms`. Result: `{status, headers, body}` where `body` is parsed
/// JSON when the response is valid JSON, otherwise the raw text. Non-2xx
/// statuses are returned, not raised.
pub struct HttpRequestActivity {
    client: reqwest::Client,
}

impl HttpRequestActivity {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent("traverse-workflow/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpRequestActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Activity for HttpRequestActivity {
    fn name(&self) -> &str {
        "http.request"
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        let url = required_str(&params, "url")?;
        let method = optional_str(&params, "method").unwrap_or("GET");
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| ActivityError::invalid(format!("invalid HTTP method '{method}'")))?;

        let mut request = self.client.request(method, url);
        if let Some(Value::Object(headers)) = params.get("headers") {
            for (name, value) in headers {
                let value = value.as_str().map(str::to_string).unwrap_or(value.to_string());
                request = request.header(name.as_str(), value);
            }
        }
        match params.get("body") {
            Some(Value::String(body)) => request = request.body(body.clone()),
            Some(body) if !body.is_null() => request = request.json(body),
            _ => {}
        }
        if let Some(timeout_ms) = optional_u64(&params, "timeout_ms") {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }

        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ActivityError::canceled("http request canceled"));
            }
            res = request.send() => res.map_err(classify)?,
        };

        let status = response.status().as_u16();
        let headers: serde_json::Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    json!(String::from_utf8_lossy(value.as_bytes())),
                )
            })
            .collect();
        let text = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ActivityError::canceled("http request canceled"));
            }
            res = response.text() => res.map_err(classify)?,
        };
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(ActivityOutput::value(json!({
            "status": status,
            "headers": headers,
            "body": body,
        })))
    }
}

fn classify(error: reqwest::Error) -> ActivityError {
    if error.is_timeout() {
        ActivityError::timeout(error.to_string())
    } else {
        ActivityError::failed(error.to_string())
    }
}
