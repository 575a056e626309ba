//! Webhook request parsing: verify `x-line-signature` against the body, then decode events.

use crate::line::event::{InboundEvent, MessagePayload};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Header carrying base64(HMAC-SHA256(channel secret, body)).
pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid or missing request signature")]
    InvalidSignature,
    #[error("malformed webhook body: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawMessage {
    Text {
        text: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    #[serde(other)]
    Unsupported,
}

/// Check the signature header value against the body. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Verify and parse a webhook POST. Events without a reply token are dropped;
/// non-message events and unsupported message types become [`MessagePayload::Other`].
pub fn parse_request(
    secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Vec<InboundEvent>, WebhookError> {
    let signature = signature.ok_or(WebhookError::InvalidSignature)?;
    if !verify_signature(secret, body, signature) {
        return Err(WebhookError::InvalidSignature);
    }
    let body: WebhookBody = serde_json::from_slice(body)?;
    let events = body
        .events
        .into_iter()
        .filter_map(|e| {
            let reply_token = e.reply_token.filter(|t| !t.is_empty())?;
            let payload = match (e.typ.as_str(), e.message) {
                ("message", Some(RawMessage::Text { text })) => MessagePayload::Text { text },
                ("message", Some(RawMessage::Location { latitude, longitude })) => {
                    MessagePayload::Location {
                        latitude,
                        longitude,
                    }
                }
                _ => MessagePayload::Other,
            };
            Some(InboundEvent {
                reply_token,
                payload,
            })
        })
        .collect();
    Ok(events)
}
