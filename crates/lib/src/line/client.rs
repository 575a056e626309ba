//! Reply API client: POST /v2/bot/message/reply with the channel access token.

use crate::line::message::ReplyMessage;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("reply api error: {0} {1}")]
    Api(reqwest::StatusCode, String),
}

/// Sends replies correlated by reply token. One call per event.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, messages: Vec<ReplyMessage>)
        -> Result<(), ReplyError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<ReplyMessage>,
}

/// Messaging API client for replies.
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(api_base: &str, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(
        &self,
        reply_token: &str,
        messages: Vec<ReplyMessage>,
    ) -> Result<(), ReplyError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token,
            messages,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ReplyError::Api(status, body));
        }
        Ok(())
    }
}
