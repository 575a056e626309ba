//! Event dispatch: answer each inbound event in arrival order.
//!
//! Text is echoed back verbatim. A location triggers a restaurant search and a carousel reply;
//! when the search fails or finds nothing, a short fallback text is sent instead. Other
//! payloads are ignored. A failure on one event never stops the rest of the batch.

use crate::line::{CarouselColumn, InboundEvent, MessagePayload, ReplyMessage, ReplySender, UriAction};
use crate::search::{format_coordinate, DisplayColumn, SearchError, ShopSearch};
use std::sync::Arc;
use std::time::Duration;

/// Alt text of the restaurant carousel.
pub const CAROUSEL_ALT_TEXT: &str = "レストラン一覧";

/// Sent when a location search fails or returns no shops.
pub const NO_RESULTS_TEXT: &str = "お店が見つかりませんでした";

/// Outcome counts for one batch of events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Replies accepted by the reply API.
    pub sent: usize,
    /// Replies the reply API rejected or that could not be delivered.
    pub failed: usize,
    /// Events with nothing to answer.
    pub ignored: usize,
    /// Location events answered with the fallback text because the search failed.
    pub search_failures: usize,
}

pub struct Dispatcher {
    replies: Arc<dyn ReplySender>,
    search: Arc<dyn ShopSearch>,
    search_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        replies: Arc<dyn ReplySender>,
        search: Arc<dyn ShopSearch>,
        search_deadline: Duration,
    ) -> Self {
        Self {
            replies,
            search,
            search_deadline,
        }
    }

    /// Handle a batch sequentially; at most one reply per event.
    pub async fn handle(&self, events: Vec<InboundEvent>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            let message = match event.payload {
                MessagePayload::Text { text } => ReplyMessage::text(text),
                MessagePayload::Location {
                    latitude,
                    longitude,
                } => match self.restaurant_carousel(latitude, longitude).await {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        log::info!("no shops near {},{}", latitude, longitude);
                        ReplyMessage::text(NO_RESULTS_TEXT)
                    }
                    Err(e) => {
                        log::warn!("restaurant search failed: {}", e);
                        report.search_failures += 1;
                        ReplyMessage::text(NO_RESULTS_TEXT)
                    }
                },
                MessagePayload::Other => {
                    report.ignored += 1;
                    continue;
                }
            };
            match self.replies.reply(&event.reply_token, vec![message]).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::error!("reply failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Search near the coordinate under the deadline. `None` when there are no shops.
    async fn restaurant_carousel(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReplyMessage>, SearchError> {
        let lat = format_coordinate(latitude);
        let lng = format_coordinate(longitude);
        let columns = tokio::time::timeout(self.search_deadline, self.search.lookup(&lat, &lng))
            .await
            .map_err(|_| {
                SearchError::Network(format!(
                    "timed out after {}s",
                    self.search_deadline.as_secs_f32()
                ))
            })??;
        if columns.is_empty() {
            return Ok(None);
        }
        let columns = columns.into_iter().map(carousel_column).collect();
        Ok(Some(ReplyMessage::carousel(CAROUSEL_ALT_TEXT, columns)))
    }
}

fn carousel_column(col: DisplayColumn) -> CarouselColumn {
    CarouselColumn::new(
        col.image_url,
        col.title,
        col.description,
        UriAction::new(col.action.label, col.action.target_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{ReplyError, Template};
    use crate::search::{LinkAction, COLUMN_ACTION_LABEL};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, Vec<ReplyMessage>)>>,
        fail_tokens: Vec<String>,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn reply(
            &self,
            reply_token: &str,
            messages: Vec<ReplyMessage>,
        ) -> Result<(), ReplyError> {
            if self.fail_tokens.iter().any(|t| t == reply_token) {
                return Err(ReplyError::Api(
                    reqwest::StatusCode::BAD_REQUEST,
                    r#"{"message":"Invalid reply token"}"#.to_string(),
                ));
            }
            self.sent
                .lock()
                .unwrap()
                .push((reply_token.to_string(), messages));
            Ok(())
        }
    }

    enum Canned {
        Columns(Vec<DisplayColumn>),
        Decode,
        Hang,
    }

    struct FakeSearch {
        canned: Canned,
        queries: Mutex<Vec<(String, String)>>,
    }

    impl FakeSearch {
        fn new(canned: Canned) -> Self {
            Self {
                canned,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ShopSearch for FakeSearch {
        async fn lookup(&self, lat: &str, lng: &str) -> Result<Vec<DisplayColumn>, SearchError> {
            self.queries
                .lock()
                .unwrap()
                .push((lat.to_string(), lng.to_string()));
            match &self.canned {
                Canned::Columns(c) => Ok(c.clone()),
                Canned::Decode => Err(SearchError::Decode("expected value".to_string())),
                Canned::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn cafe_x() -> DisplayColumn {
        DisplayColumn {
            image_url: "http://img".to_string(),
            title: "Cafe X".to_string(),
            description: "1234567890".repeat(6),
            action: LinkAction {
                label: COLUMN_ACTION_LABEL.to_string(),
                target_url: "http://link".to_string(),
            },
        }
    }

    fn setup(
        canned: Canned,
        fail_tokens: &[&str],
    ) -> (Dispatcher, Arc<RecordingSender>, Arc<FakeSearch>) {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            fail_tokens: fail_tokens.iter().map(|s| s.to_string()).collect(),
        });
        let search = Arc::new(FakeSearch::new(canned));
        let d = Dispatcher::new(sender.clone(), search.clone(), Duration::from_millis(200));
        (d, sender, search)
    }

    fn text(token: &str, t: &str) -> InboundEvent {
        InboundEvent {
            reply_token: token.to_string(),
            payload: MessagePayload::Text {
                text: t.to_string(),
            },
        }
    }

    fn location(token: &str) -> InboundEvent {
        InboundEvent {
            reply_token: token.to_string(),
            payload: MessagePayload::Location {
                latitude: 35.6895,
                longitude: 139.6917,
            },
        }
    }

    #[tokio::test]
    async fn text_is_echoed_verbatim() {
        let (d, sender, _) = setup(Canned::Columns(Vec::new()), &[]);
        let report = d.handle(vec![text("t1", "  hello <b>world</b> ")]).await;
        assert_eq!(report.sent, 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].0, "t1");
        assert_eq!(sent[0].1, vec![ReplyMessage::text("  hello <b>world</b> ")]);
    }

    #[tokio::test]
    async fn location_sends_carousel() {
        let (d, sender, search) = setup(Canned::Columns(vec![cafe_x()]), &[]);
        let report = d.handle(vec![location("t1")]).await;
        assert_eq!(report.sent, 1);
        assert_eq!(
            search.queries.lock().unwrap()[0],
            ("35.69".to_string(), "139.69".to_string())
        );
        let sent = sender.sent.lock().unwrap();
        let ReplyMessage::Template {
            alt_text,
            template: Template::Carousel(t),
        } = &sent[0].1[0]
        else {
            panic!("expected carousel, got {:?}", sent[0].1);
        };
        assert_eq!(alt_text, CAROUSEL_ALT_TEXT);
        assert_eq!(t.image_aspect_ratio, "rectangle");
        assert_eq!(t.image_size, "cover");
        assert_eq!(t.columns.len(), 1);
        let col = &t.columns[0];
        assert_eq!(col.title, "Cafe X");
        assert_eq!(col.thumbnail_image_url, "http://img");
        assert_eq!(col.text, "1234567890".repeat(6));
        assert_eq!(col.actions[0].uri, "http://link");
        assert_eq!(col.actions[0].label, COLUMN_ACTION_LABEL);
    }

    #[tokio::test]
    async fn unsupported_payload_sends_nothing() {
        let (d, sender, _) = setup(Canned::Columns(Vec::new()), &[]);
        let report = d
            .handle(vec![InboundEvent {
                reply_token: "t1".to_string(),
                payload: MessagePayload::Other,
            }])
            .await;
        assert_eq!(
            report,
            DispatchReport {
                ignored: 1,
                ..Default::default()
            }
        );
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_search_sends_fallback() {
        let (d, sender, _) = setup(Canned::Columns(Vec::new()), &[]);
        let report = d.handle(vec![location("t1")]).await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.search_failures, 0);
        assert_eq!(
            sender.sent.lock().unwrap()[0].1,
            vec![ReplyMessage::text(NO_RESULTS_TEXT)]
        );
    }

    #[tokio::test]
    async fn search_error_sends_fallback_and_continues() {
        let (d, sender, _) = setup(Canned::Decode, &[]);
        let report = d.handle(vec![location("t1"), text("t2", "after")]).await;
        assert_eq!(report.sent, 2);
        assert_eq!(report.search_failures, 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].1, vec![ReplyMessage::text(NO_RESULTS_TEXT)]);
        assert_eq!(sent[1].1, vec![ReplyMessage::text("after")]);
    }

    #[tokio::test]
    async fn slow_search_hits_deadline() {
        let (d, sender, _) = setup(Canned::Hang, &[]);
        let report = d.handle(vec![location("t1")]).await;
        assert_eq!(report.search_failures, 1);
        assert_eq!(
            sender.sent.lock().unwrap()[0].1,
            vec![ReplyMessage::text(NO_RESULTS_TEXT)]
        );
    }

    #[tokio::test]
    async fn reply_failure_does_not_stop_batch() {
        let (d, sender, _) = setup(Canned::Columns(Vec::new()), &["bad"]);
        let report = d
            .handle(vec![text("bad", "one"), text("t2", "two"), text("t3", "three")])
            .await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 2);
        let sent = sender.sent.lock().unwrap();
        let tokens: Vec<&str> = sent.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(tokens, vec!["t2", "t3"]);
    }
}
