//! HotPepper gourmet search: look up shops near a coordinate and map them to display columns.
//!
//! The API is queried with `format=json&key=..&lat=..&lng=..`. Each returned shop becomes a
//! [`DisplayColumn`] whose description is the address cut to [`MAX_DESCRIPTION_CHARS`] chars.

use crate::config::SearchConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Label of the button on every column.
pub const COLUMN_ACTION_LABEL: &str = "ホットペッパーで開く";

/// Carousel column text limit, counted in chars (Unicode scalar values).
pub const MAX_DESCRIPTION_CHARS: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Network(String),
    #[error("search response could not be decoded: {0}")]
    Decode(String),
    #[error("search response carried no shop list: {0}")]
    EmptyResult(String),
}

/// One carousel entry built from a shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayColumn {
    pub image_url: String,
    pub title: String,
    pub description: String,
    pub action: LinkAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAction {
    pub label: String,
    pub target_url: String,
}

/// Restaurant lookup by coordinates. Coordinates are passed already formatted.
#[async_trait]
pub trait ShopSearch: Send + Sync {
    async fn lookup(&self, lat: &str, lng: &str) -> Result<Vec<DisplayColumn>, SearchError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    shop: Option<Vec<Shop>>,
    #[serde(default)]
    error: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct Shop {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    photo: Photo,
    #[serde(default)]
    urls: Urls,
}

#[derive(Debug, Default, Deserialize)]
struct Photo {
    #[serde(default)]
    mobile: MobilePhoto,
}

#[derive(Debug, Default, Deserialize)]
struct MobilePhoto {
    #[serde(default)]
    l: String,
}

#[derive(Debug, Default, Deserialize)]
struct Urls {
    #[serde(default)]
    pc: String,
}

impl From<Shop> for DisplayColumn {
    fn from(shop: Shop) -> Self {
        DisplayColumn {
            image_url: shop.photo.mobile.l,
            title: shop.name,
            description: truncate_chars(&shop.address, MAX_DESCRIPTION_CHARS),
            action: LinkAction {
                label: COLUMN_ACTION_LABEL.to_string(),
                target_url: shop.urls.pc,
            },
        }
    }
}

/// First `max` chars of `s`; `s` unchanged when it is not longer. Never splits a char.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => s[..i].to_string(),
        None => s.to_string(),
    }
}

/// Coordinate with exactly two fractional digits. Rounds the exact binary value; ties go to even.
pub fn format_coordinate(v: f64) -> String {
    format!("{:.2}", v)
}

/// Decode a search response body into display columns. An empty shop list is not an error.
pub fn parse_search_body(body: &str) -> Result<Vec<DisplayColumn>, SearchError> {
    let data: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Decode(e.to_string()))?;
    match data.results.shop {
        Some(shops) => Ok(shops.into_iter().map(DisplayColumn::from).collect()),
        None => {
            let reason = data
                .results
                .error
                .into_iter()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            Err(SearchError::EmptyResult(if reason.is_empty() {
                "no shop field in results".to_string()
            } else {
                reason
            }))
        }
    }
}

/// HTTP client for the HotPepper gourmet API.
#[derive(Clone)]
pub struct HotPepperClient {
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HotPepperClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            timeout: config.timeout(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ShopSearch for HotPepperClient {
    async fn lookup(&self, lat: &str, lng: &str) -> Result<Vec<DisplayColumn>, SearchError> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("key", self.api_key.as_str()),
                ("lat", lat),
                ("lng", lng),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SearchError::Network(format!("{} {}", status, body)));
        }
        let body = res
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        parse_search_body(&body)
    }
}
