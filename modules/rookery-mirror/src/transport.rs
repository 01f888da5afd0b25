//! reqwest transport against the platform's unofficial GraphQL endpoints.
//!
//! This is the only place that knows how to spell a platform request. It
//! translates the engine's semantic parameters into the GraphQL persisted
//! query, attaches the opaque session credentials, and hands back the raw
//! response untouched — classification is the engine's job.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use rookery_common::Config;
use rookery_engine::{PageRequest, PageTransport, RawResponse, TimelineKind, TransportError};

const DEFAULT_BASE_URL: &str = "https://x.com/i/api/graphql";

// Persisted-query ids rotate when the platform redeploys its web client.
// When pages start coming back as JsonError with "query not found", these
// need to be re-captured from the web client's network traffic.
const FOLLOWING_OP: (&str, &str) = ("iSicc7LrzWGBgDPL0tM_TQ", "Following");
const MUTUALS_OP: (&str, &str) = ("fJSopkDA3UP9priyce4RgQ", "FollowersYouKnow");

pub struct GraphqlTransport {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
    cookie: String,
    csrf_token: String,
}

impl GraphqlTransport {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: config.bearer_token.clone(),
            cookie: config.cookie.clone(),
            csrf_token: config.csrf_token.clone(),
        }
    }

    /// Point the transport at a different host (local capture replays).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl PageTransport for GraphqlTransport {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawResponse, TransportError> {
        let (query_id, operation) = match request.timeline {
            TimelineKind::Following => FOLLOWING_OP,
            TimelineKind::MutualFollowers => MUTUALS_OP,
        };

        let mut variables = serde_json::json!({
            "userId": request.entity_id,
            "count": request.page_size,
            "includePromotedContent": request.include_promoted,
        });
        if let Some(cursor) = &request.cursor {
            variables["cursor"] = serde_json::json!(cursor);
        }

        // The web client sends a feature-flag envelope; the server rejects
        // requests missing the flags it currently expects.
        let features = serde_json::json!({
            "responsive_web_graphql_timeline_navigation_enabled": true,
            "responsive_web_graphql_exclude_directive_enabled": true,
            "verified_phone_label_enabled": false,
            "creator_subscriptions_tweet_preview_api_enabled": true,
            "longform_notetweets_consumption_enabled": true,
        });

        let url = format!("{}/{}/{}", self.base_url, query_id, operation);
        debug!(operation, cursor = ?request.cursor, "Fetching timeline page");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("variables", variables.to_string()),
                ("features", features.to_string()),
            ])
            .header("authorization", format!("Bearer {}", self.bearer_token))
            .header("cookie", &self.cookie)
            .header("x-csrf-token", &self.csrf_token)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(map_reqwest_error)?
            .to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::Request(e.to_string())
    } else {
        TransportError::Connection(e.to_string())
    }
}
