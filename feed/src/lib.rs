use log::{debug, info};
use miette::Diagnostic;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Diagnostic)]
pub enum FeedError {
    #[error("error building feed client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("error building feed request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("feed responded with HTTP status {status}")]
    HttpStatus {
        status: u16,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("error executing feed request")]
    Transport(#[source] reqwest::Error),

    #[error("feed body was not valid JSON")]
    JsonParse(#[source] serde_json::Error),

    #[error("feed root must be a JSON array, got {found}")]
    Shape { found: &'static str },
}

impl FeedError {
    /// Stable classification string, used as the persisted `error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::HttpStatus { .. } => "http_error",
            FeedError::Timeout(_) => "timeout",
            FeedError::ClientBuild(_) | FeedError::RequestBuild(_) | FeedError::Transport(_) => {
                "transport_error"
            }
            FeedError::JsonParse(_) => "json_parse_error",
            FeedError::Shape { .. } => "shape_error",
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// HTTP client for meeting-summary feeds. One fetch per source per run; the
/// caller owns any retry or scheduling policy.
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::ClientBuild)?;

        Ok(Self { client })
    }

    /// Fetches the source URL and decodes the body as a JSON array of
    /// records. Every failure mode maps to exactly one `FeedError` variant.
    pub async fn fetch_array(&self, url: &str) -> Result<Vec<Value>, FeedError> {
        debug!("Fetching feed from {url}");

        let request = self
            .client
            .get(url)
            .build()
            .map_err(FeedError::RequestBuild)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(classify_request_error)?;

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(err) => {
                let status = err.status().map(|s| s.as_u16()).unwrap_or_default();
                return Err(FeedError::HttpStatus {
                    status,
                    source: err,
                });
            }
        };

        let body = response.text().await.map_err(classify_request_error)?;

        let value: Value = serde_json::from_str(&body).map_err(FeedError::JsonParse)?;

        match value {
            Value::Array(records) => {
                info!("Fetched {} records from {url}", records.len());
                Ok(records)
            }
            other => Err(FeedError::Shape {
                found: json_type_name(&other),
            }),
        }
    }
}

fn classify_request_error(err: reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Timeout(err)
    } else {
        FeedError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_body(body: &str, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/summaries.json"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn fetches_a_json_array() {
        let server = server_with_body(r#"[{"workgroup":"W"},{"workgroup":"X"}]"#, 200).await;
        let client = FeedClient::new(DEFAULT_TIMEOUT).unwrap();

        let records = client
            .fetch_array(&format!("{}/summaries.json", server.uri()))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["workgroup"], "W");
    }

    #[tokio::test]
    async fn empty_array_is_ok() {
        let server = server_with_body("[]", 200).await;
        let client = FeedClient::new(DEFAULT_TIMEOUT).unwrap();

        let records = client
            .fetch_array(&format!("{}/summaries.json", server.uri()))
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn non_array_root_is_a_shape_error() {
        let server = server_with_body(r#"{"meetings": []}"#, 200).await;
        let client = FeedClient::new(DEFAULT_TIMEOUT).unwrap();

        let err = client
            .fetch_array(&format!("{}/summaries.json", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Shape { found: "object" }));
        assert_eq!(err.kind(), "shape_error");
    }

    #[tokio::test]
    async fn http_status_is_classified_with_the_status_code() {
        let server = server_with_body("gone", 503).await;
        let client = FeedClient::new(DEFAULT_TIMEOUT).unwrap();

        let err = client
            .fetch_array(&format!("{}/summaries.json", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::HttpStatus { status: 503, .. }));
        assert_eq!(err.kind(), "http_error");
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let server = server_with_body("[{not json", 200).await;
        let client = FeedClient::new(DEFAULT_TIMEOUT).unwrap();

        let err = client
            .fetch_array(&format!("{}/summaries.json", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "json_parse_error");
    }
}
