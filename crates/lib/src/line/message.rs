//! Reply message payloads in the Messaging API JSON shape.

use serde::Serialize;

/// The platform rejects carousels with more columns than this.
pub const MAX_CAROUSEL_COLUMNS: usize = 10;

const IMAGE_ASPECT_RATIO: &str = "rectangle";
const IMAGE_SIZE: &str = "cover";
const IMAGE_BACKGROUND_COLOR: &str = "#FFFFFF";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Template { alt_text: String, template: Template },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Template {
    Carousel(CarouselTemplate),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselTemplate {
    pub columns: Vec<CarouselColumn>,
    pub image_aspect_ratio: String,
    pub image_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselColumn {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thumbnail_image_url: String,
    pub image_background_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub text: String,
    pub actions: Vec<UriAction>,
}

/// Button that opens a URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UriAction {
    #[serde(rename = "type")]
    typ: &'static str,
    pub label: String,
    pub uri: String,
}

impl UriAction {
    pub fn new(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            typ: "uri",
            label: label.into(),
            uri: uri.into(),
        }
    }
}

impl CarouselColumn {
    /// Column with one action and the white image background.
    pub fn new(
        thumbnail_image_url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        action: UriAction,
    ) -> Self {
        Self {
            thumbnail_image_url: thumbnail_image_url.into(),
            image_background_color: IMAGE_BACKGROUND_COLOR.to_string(),
            title: title.into(),
            text: text.into(),
            actions: vec![action],
        }
    }
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        ReplyMessage::Text { text: text.into() }
    }

    /// Carousel template with rectangle/cover images. Columns past [`MAX_CAROUSEL_COLUMNS`] are dropped.
    /// All columns must agree on having an image, so one column without an image clears them all.
    pub fn carousel(alt_text: impl Into<String>, mut columns: Vec<CarouselColumn>) -> Self {
        columns.truncate(MAX_CAROUSEL_COLUMNS);
        if columns.iter().any(|c| c.thumbnail_image_url.is_empty()) {
            for c in &mut columns {
                c.thumbnail_image_url.clear();
            }
        }
        ReplyMessage::Template {
            alt_text: alt_text.into(),
            template: Template::Carousel(CarouselTemplate {
                columns,
                image_aspect_ratio: IMAGE_ASPECT_RATIO.to_string(),
                image_size: IMAGE_SIZE.to_string(),
            }),
        }
    }
}
