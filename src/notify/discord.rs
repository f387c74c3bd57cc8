//! Discord webhook message layout.
//!
//! Field caps follow Discord's documented embed limits; text is cut on
//! character boundaries before sending so the API never rejects a message
//! for length.

use crate::models::{truncate_with_ellipsis, Listing};
use chrono::Utc;
use serde::Serialize;

pub const USERNAME_LIMIT: usize = 80;
pub const CONTENT_LIMIT: usize = 2000;
pub const TITLE_LIMIT: usize = 256;
pub const DESCRIPTION_LIMIT: usize = 4096;
pub const FIELD_VALUE_LIMIT: usize = 1024;
pub const FOOTER_LIMIT: usize = 2048;

/// Embed accent colour for new listings (green)
const NEW_LISTING_COLOR: u32 = 3_066_993;

const ACTION_ROW: u8 = 1;
const BUTTON: u8 = 2;
const LINK_STYLE: u8 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub content: String,
    pub embeds: Vec<Embed>,
    pub components: Vec<ActionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: u8,
    pub components: Vec<LinkButton>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    pub kind: u8,
    pub style: u8,
    pub label: String,
    pub url: String,
}

/// Build the message for `listing`. `thumbnail` must already be validated.
pub fn build_payload(listing: &Listing, username: &str, thumbnail: Option<&str>) -> WebhookPayload {
    let description = format!(
        "📌 {}\n💰 Price: {}\n📍 Location: {}",
        listing.title, listing.price, listing.location
    );

    let field = |name: &str, value: &str| EmbedField {
        name: name.to_string(),
        value: truncate_with_ellipsis(value, FIELD_VALUE_LIMIT),
        inline: true,
    };

    let embed = Embed {
        title: truncate_with_ellipsis(&listing.title, TITLE_LIMIT),
        url: listing.url.clone(),
        description: truncate_with_ellipsis(&description, DESCRIPTION_LIMIT),
        color: NEW_LISTING_COLOR,
        timestamp: Utc::now().to_rfc3339(),
        fields: vec![
            field("💰 Price", &listing.price),
            field("📍 Location", &listing.location),
            field("ID", &listing.id),
        ],
        footer: EmbedFooter {
            text: truncate_with_ellipsis(&format!("{username} • click the title to open"), FOOTER_LIMIT),
        },
        thumbnail: thumbnail.map(|url| EmbedImage {
            url: url.to_string(),
        }),
    };

    WebhookPayload {
        username: truncate_with_ellipsis(username, USERNAME_LIMIT),
        content: truncate_with_ellipsis("🚀 **New listing found on OLX!**", CONTENT_LIMIT),
        embeds: vec![embed],
        components: vec![ActionRow {
            kind: ACTION_ROW,
            components: vec![LinkButton {
                kind: BUTTON,
                style: LINK_STYLE,
                label: "Open listing".to_string(),
                url: listing.url.clone(),
            }],
        }],
    }
}
