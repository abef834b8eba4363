//! Audiobookshelf listening-session endpoint
//!
//! `GET {base}/api/users/{user}/listening-sessions?page=N&itemsPerPage=M`
//! with a bearer token; the body is `{ "sessions": [...] }`.

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::SessionSource;
use crate::config::ApiSettings;
use crate::error::SourceError;

pub struct AbsSessionSource {
    client: Client,
    sessions_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SessionListing {
    #[serde(default)]
    sessions: Vec<Value>,
}

impl AbsSessionSource {
    pub fn new(settings: &ApiSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(SourceError::Client)?;

        Ok(Self {
            client,
            sessions_url: sessions_url(&settings.base_url, &settings.user_id)?,
            token: settings.token.clone(),
        })
    }
}

/// Append the endpoint path to the base URL. The user id is one
/// percent-encoded segment, so `/`, `?` or `#` in it stay inside it.
fn sessions_url(base_url: &str, user_id: &str) -> Result<Url, SourceError> {
    let invalid = |reason: String| SourceError::BaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base URL".to_string()))?
        .pop_if_empty()
        .extend(["api", "users", user_id, "listening-sessions"]);
    Ok(url)
}

impl SessionSource for AbsSessionSource {
    fn fetch_page(&mut self, page: u32, page_size: u32) -> Result<Vec<Value>, SourceError> {
        let response = self
            .client
            .get(self.sessions_url.clone())
            .query(&[("page", page), ("itemsPerPage", page_size)])
            .bearer_auth(&self.token)
            .send()
            .map_err(|source| SourceError::Transport { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                page,
                status: status.as_u16(),
            });
        }

        let listing: SessionListing = response
            .json()
            .map_err(|source| SourceError::Body { page, source })?;

        debug!(page, count = listing.sessions.len(), "fetched session page");
        Ok(listing.sessions)
    }
}
