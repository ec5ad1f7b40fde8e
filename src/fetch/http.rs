use crate::config::ApiConfig;
use crate::fetch::{build_http_client, classify_error, FetchError, FetchOutcome, RecordFetcher};
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Application-level success code inside a 200 response
const API_OK: i64 = 200;

/// Fetches records from the per-ID "fetch info" endpoint
///
/// A `200` whose JSON body is `{"code": 200, "data": {...}}` is a record; the
/// requested ID is written into `data.id`. Any other `200` is a miss. Other
/// statuses and transport errors are transient failures.
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    id_param: String,
    connections: Arc<Semaphore>,
}

impl HttpFetcher {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            id_param: config.id_param.clone(),
            connections: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    /// Builds the client and the fetcher from `[api]`
    pub fn from_config(config: &ApiConfig) -> crate::Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self::new(client, config)?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The request URL for one ID
    pub fn url_for(&self, id: u64) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.id_param, &id.to_string());
        url
    }
}

#[async_trait]
impl RecordFetcher for HttpFetcher {
    async fn fetch(&self, id: u64) -> FetchOutcome {
        let _permit = match self.connections.acquire().await {
            Ok(permit) => permit,
            Err(_) => return FetchOutcome::Failed(FetchError::Other("connection pool closed".into())),
        };

        let response = match self.client.get(self.url_for(id)).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = classify_error(&e);
                tracing::trace!("Fetch {} failed: {}", id, error);
                return FetchOutcome::Failed(error);
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            tracing::trace!("Fetch {} returned {}", id, status);
            return FetchOutcome::Failed(FetchError::Status(status.as_u16()));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_decode() => return FetchOutcome::Missing,
            Err(e) => return FetchOutcome::Failed(classify_error(&e)),
        };

        extract_record(id, body)
    }
}

fn extract_record(id: u64, body: Value) -> FetchOutcome {
    if body.get("code").and_then(Value::as_i64) != Some(API_OK) {
        return FetchOutcome::Missing;
    }
    match body {
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Object(mut data)) => {
                data.insert("id".to_string(), Value::from(id));
                FetchOutcome::Found(Value::Object(data))
            }
            _ => FetchOutcome::Missing,
        },
        _ => FetchOutcome::Missing,
    }
}
