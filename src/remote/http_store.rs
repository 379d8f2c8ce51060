//! HTTP-backed `RemoteStore`, used when `REMOTE_STORE_URL` /
//! `REMOTE_STORE_SERVICE_KEY` are configured. Speaks a small upsert-by-key
//! REST convention rather than any particular vendor's API - whichever
//! managed database backs it, it is expected to expose this shape.

use async_trait::async_trait;

use crate::domain::models::Engine;
use crate::error::{AppError, CoreResult};

use super::RemoteStore;

pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpRemoteStore {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            service_key: service_key.into(),
        }
    }

    fn collection(&self, engine: Engine) -> &'static str {
        match engine {
            Engine::Prospecting => "prospects",
            Engine::Analysis => "analyses",
            Engine::Outreach => "outreach",
            Engine::Reports => "reports",
        }
    }
}

#[derive(serde::Deserialize)]
struct UpsertResponse {
    id: String,
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn upsert(&self, engine: Engine, natural_key: &str, data: &serde_json::Value) -> CoreResult<String> {
        let url = format!("{}/{}/upsert", self.base_url.trim_end_matches('/'), self.collection(engine));
        let body = serde_json::json!({ "natural_key": natural_key, "data": data });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::invalid_input("Invalid API key"));
        }
        if status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::transient(format!("remote store error {status}: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::invalid_input(format!("remote store rejected upsert {status}: {text}")));
        }

        let parsed: UpsertResponse = response.json().await?;
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn maps_401_to_invalid_api_key() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("POST", "/analyses/upsert").with_status(401).create_async().await;

        let store = HttpRemoteStore::new(reqwest::Client::new(), server.url(), "bad-key");
        let err = store.upsert(Engine::Analysis, "https://example.com", &json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn maps_5xx_to_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("POST", "/analyses/upsert").with_status(503).create_async().await;

        let store = HttpRemoteStore::new(reqwest::Client::new(), server.url(), "key");
        let err = store.upsert(Engine::Analysis, "https://example.com", &json!({})).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn parses_id_from_successful_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/analyses/upsert")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "row-42"}"#)
            .create_async()
            .await;

        let store = HttpRemoteStore::new(reqwest::Client::new(), server.url(), "key");
        let id = store.upsert(Engine::Analysis, "https://example.com", &json!({})).await.unwrap();
        assert_eq!(id, "row-42");
    }
}
