//! LINE Messaging API: webhook parsing, reply payloads, and the reply client.
//!
//! Inbound requests are verified and parsed into [`InboundEvent`]s; replies are
//! composed as [`ReplyMessage`]s and delivered through a [`ReplySender`].

mod client;
mod event;
mod message;
mod webhook;

pub use client::{LineClient, ReplyError, ReplySender};
pub use event::{InboundEvent, MessagePayload};
pub use message::{
    CarouselColumn, CarouselTemplate, ReplyMessage, Template, UriAction, MAX_CAROUSEL_COLUMNS,
};
pub use webhook::{parse_request, verify_signature, WebhookError, SIGNATURE_HEADER};
