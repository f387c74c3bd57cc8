//! In-memory stand-ins for the network seams, shared by unit tests.

use crate::error::FetchError;
use crate::models::Listing;
use crate::notify::{PostOutcome, WebhookTransport};
use crate::scrapers::PageSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

pub fn sample_listing(id: &str) -> Listing {
    Listing {
        id: id.to_string(),
        title: format!("iPhone {id}"),
        url: format!("https://www.olx.pl/d/oferta/iphone-CID99-ID{id}.html"),
        price: "1000 zł".to_string(),
        location: "Warszawa".to_string(),
        image_url: None,
    }
}

/// Search page with one card per id, in order
pub fn listing_page(ids: &[&str]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="card"><a href="/d/oferta/iphone-CID99-ID{id}.html"><h6>iPhone {id}</h6><p class="price">1000 zł</p></a></div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"grid\">{cards}</div></body></html>")
}

/// Serves the same markup on every fetch, or a fixed error status
pub struct StaticPage {
    html: Mutex<Result<String, u16>>,
    fetches: Mutex<usize>,
}

impl StaticPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: Mutex::new(Ok(html.into())),
            fetches: Mutex::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            html: Mutex::new(Err(status)),
            fetches: Mutex::new(0),
        }
    }

    pub fn set_html(&self, html: impl Into<String>) {
        *self.html.lock().unwrap() = Ok(html.into());
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl PageSource for StaticPage {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        *self.fetches.lock().unwrap() += 1;
        self.html
            .lock()
            .unwrap()
            .clone()
            .map_err(|status| FetchError::Status {
                status,
                url: url.to_string(),
            })
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub payload: serde_json::Value,
    pub at: Instant,
}

/// Answers webhook posts from a script of statuses (`Err` = no response).
/// Once the script runs out every post succeeds with 204.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<u16, &'static str>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<u16, &'static str>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Listing ids of every posted message, in order
    pub fn notified_ids(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| call.payload["embeds"][0]["fields"][2]["value"].as_str())
            .map(str::to_owned)
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<PostOutcome> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            payload: payload.clone(),
            at: Instant::now(),
        });

        match self.script.lock().unwrap().pop_front().unwrap_or(Ok(204)) {
            Ok(status) => Ok(PostOutcome {
                status,
                body: String::new(),
            }),
            Err(reason) => Err(anyhow::anyhow!(reason)),
        }
    }
}
