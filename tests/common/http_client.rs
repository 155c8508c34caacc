//! HTTP client helpers for tests.

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_HEADER: &str = "x-sluice-status";

pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

/// Status code, `X-Sluice-Status` value and JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub sluice_status: String,
    pub body: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum TestClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    fn sluice_status(resp: &reqwest::Response) -> String {
        resp.headers()
            .get(STATUS_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string()
    }

    async fn into_test_response(resp: reqwest::Response) -> Result<TestResponse, TestClientError> {
        let status = resp.status().as_u16();
        let sluice_status = Self::sluice_status(&resp);
        let body = resp.json().await?;
        Ok(TestResponse {
            status,
            sluice_status,
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<TestResponse, TestClientError> {
        let resp = self.client.get(self.url(path)).send().await?;
        Self::into_test_response(resp).await
    }

    pub async fn answer(&self, body: serde_json::Value) -> Result<TestResponse, TestClientError> {
        let resp = self
            .client
            .post(self.url("/v1/answer"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        Self::into_test_response(resp).await
    }

    /// Posts a streaming request and returns the status header and the raw SSE text.
    pub async fn answer_stream(
        &self,
        body: serde_json::Value,
    ) -> Result<(String, String), TestClientError> {
        let resp = self
            .client
            .post(self.url("/v1/answer"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let sluice_status = Self::sluice_status(&resp);
        Ok((sluice_status, resp.text().await?))
    }
}

/// Data payloads of every SSE event named `event`.
pub fn sse_data(text: &str, event: &str) -> Vec<String> {
    text.split("\n\n")
        .filter(|block| block.lines().any(|l| l == format!("event: {event}")))
        .map(|block| {
            block
                .lines()
                .filter_map(|l| l.strip_prefix("data: "))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}
