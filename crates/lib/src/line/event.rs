//! Inbound event from the LINE platform: delivered to the dispatcher for a reply.

/// One webhook event that can be answered with its reply token.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Single-use token required by the reply API.
    pub reply_token: String,
    pub payload: MessagePayload,
}

/// What the user sent. Anything the bot does not answer is `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Text { text: String },
    Location { latitude: f64, longitude: f64 },
    Other,
}
