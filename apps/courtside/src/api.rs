//! Bulk-fetch client for the match server's REST API.

use courtside_sync::Match;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} detail={detail}")]
    UnexpectedStatus { status: StatusCode, detail: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

#[derive(Clone)]
pub struct MatchesClient {
    http: Client,
    base_url: String,
}

impl MatchesClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Matches currently in play, optionally narrowed to one chat.
    pub async fn list_live(&self, chat_id: Option<i64>) -> Result<Vec<Match>, ApiError> {
        let url = format!("{}/matches/live", self.base_url);
        let mut request = self.http.get(url);
        if let Some(chat_id) = chat_id {
            request = request.query(&[("chat_id", chat_id)]);
        }
        read_json(request.send().await?).await
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Match, ApiError> {
        let url = format!("{}/matches/{}", self.base_url, match_id);
        read_json(self.http.get(url).send().await?).await
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ApiError> {
    if res.status().is_success() {
        return Ok(res.json::<T>().await?);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::UnexpectedStatus {
        status,
        detail: error_detail(&body),
    })
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body).ok().and_then(|b| b.detail) {
        Some(Value::String(detail)) => detail,
        Some(Value::Null) | None => "Unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}
