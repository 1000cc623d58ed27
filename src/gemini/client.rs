use anyhow::Context;
use rand::Rng;
use std::time::Duration;

use super::types::{GenerateContentRequest, GenerateContentResponse};
use super::{key, GeminiError};
use crate::config::{Config, GeminiConfig};

const MAX_JITTER_MS: u64 = 5_000;

pub struct Client {
    api_key: String,
    base_url: String,
    http: reqwest::blocking::Client,
    max_retries: u32,
    retry_delay: Duration,
    max_wait: Duration,
}

impl Client {
    pub fn new(api_key: String, settings: &GeminiConfig) -> anyhow::Result<Self> {
        // Long story prompts routinely take more than 30s to answer.
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
            max_retries: settings.max_retries,
            retry_delay: Duration::from_secs(settings.retry_delay_seconds),
            max_wait: Duration::from_secs(settings.timeout_seconds),
        })
    }

    pub fn from_config(config: &Config, interactive: bool) -> anyhow::Result<Self> {
        let api_key = key::resolve(config.gemini.api_key_file.as_deref(), interactive)?;
        Self::new(api_key, &config.gemini)
    }

    fn url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }

    pub fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let body = serde_json::to_string(request).context("serialize request")?;
        let raw = self.send_with_retries(model, body)?;
        let response = GenerateContentResponse::from_response_json(&raw)
            .with_context(|| format!("parse Gemini API response: {raw}"))?;
        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                prompt_tokens = ?usage.prompt_token_count,
                completion_tokens = ?usage.candidates_token_count,
                "gemini request complete"
            );
        }
        Ok(response)
    }

    /// Text of the first candidate; an error when the reply holds none.
    pub fn generate_text(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<String> {
        let response = self.generate_content(model, request)?;
        Ok(response.text().ok_or(GeminiError::EmptyResponse)?)
    }

    fn send_with_retries(&self, model: &str, body: String) -> anyhow::Result<String> {
        let url = self.url(model);
        let mut attempt = 0;

        loop {
            tracing::debug!(model, attempt = attempt + 1, "sending gemini request");
            let result = self
                .http
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .header("content-type", "application/json")
                .body(body.clone())
                .send();

            let response = match result {
                Ok(response) => response,
                Err(err) if err.is_timeout() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt, None);
                    tracing::warn!(?delay, attempt, "gemini request timed out; retrying");
                    std::thread::sleep(delay);
                    continue;
                }
                Err(err) => {
                    // reqwest errors carry the URL, which carries the key.
                    return Err(err.without_url()).context("send request to Gemini API");
                }
            };

            let status = response.status();
            if status.is_success() {
                return response.text().context("read response body");
            }

            let retryable = matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504);
            if retryable && attempt < self.max_retries {
                attempt += 1;
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                let delay = self.backoff(attempt, retry_after);
                tracing::warn!(status = status.as_u16(), ?delay, attempt, "gemini api error; retrying");
                std::thread::sleep(delay);
                continue;
            }

            let body = response.text().unwrap_or_default();
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
    }

    /// Server-requested waits are capped at the request timeout.
    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(delay) = retry_after {
            return delay.min(self.max_wait);
        }
        if self.retry_delay.is_zero() {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
        self.retry_delay * attempt + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{reply, serve, settings};

    #[test]
    fn posts_to_model_endpoint_with_key() {
        let (base, server) = serve(vec![(200, reply("続き"))]);
        let client = Client::new("secret".into(), &settings(base)).unwrap();

        let text = client
            .generate_text("gemini-test", &GenerateContentRequest::from_prompt("hi"))
            .unwrap();
        assert_eq!(text, "続き");

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].request_line,
            "POST /gemini-test:generateContent?key=secret HTTP/1.1"
        );
        assert_eq!(seen[0].prompt(), "hi");
    }

    #[test]
    fn retries_server_errors() {
        let (base, server) = serve(vec![(503, "{}".into()), (200, reply("続き"))]);
        let client = Client::new("k".into(), &settings(base)).unwrap();

        let text = client
            .generate_text("m", &GenerateContentRequest::from_prompt("hi"))
            .unwrap();
        assert_eq!(text, "続き");
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let (base, server) = serve(vec![(400, r#"{"error":"bad"}"#.into())]);
        let client = Client::new("k".into(), &settings(base)).unwrap();

        let err = client
            .generate_text("m", &GenerateContentRequest::from_prompt("hi"))
            .unwrap_err();
        match err.downcast_ref::<GeminiError>() {
            Some(GeminiError::Status { status, .. }) => assert_eq!(*status, 400),
            other => panic!("unexpected error: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn empty_candidates_are_an_error() {
        let (base, server) = serve(vec![(200, r#"{"candidates":[]}"#.into())]);
        let client = Client::new("k".into(), &settings(base)).unwrap();

        let err = client
            .generate_text("m", &GenerateContentRequest::from_prompt("hi"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeminiError>(),
            Some(GeminiError::EmptyResponse)
        ));
        server.join().unwrap();
    }

    #[test]
    fn retry_after_is_capped_at_the_timeout() {
        let client = Client::new("k".into(), &settings("http://127.0.0.1:9".into())).unwrap();

        assert_eq!(
            client.backoff(1, Some(Duration::from_secs(86_400))),
            Duration::from_secs(10)
        );
        assert_eq!(
            client.backoff(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(client.backoff(2, None), Duration::ZERO);
    }
}
