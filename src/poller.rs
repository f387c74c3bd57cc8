//! The fetch, extract, notify, remember loop.

use crate::error::FetchError;
use crate::models::Listing;
use crate::notify::Notifier;
use crate::scrapers::{OlxExtractor, PageSource};
use crate::seen::SeenStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub search_url: String,
    /// Base time between cycles, before jitter
    pub interval: Duration,
    /// Pause between consecutive notifications in one cycle
    pub notify_pause: Duration,
    /// Extra wait after a cycle that could not fetch the page
    pub failure_cooldown: Duration,
    pub seen_max: usize,
}

/// What one cycle did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub notified: usize,
    pub failed: usize,
    pub seeded: usize,
    pub pruned: usize,
}

pub struct Poller {
    source: Arc<dyn PageSource>,
    extractor: OlxExtractor,
    notifier: Notifier,
    store: SeenStore,
    settings: PollerSettings,
    first_run: bool,
}

impl Poller {
    /// A store that starts empty makes the first non-empty cycle a seeding
    /// pass: everything on the page is remembered and nothing is sent.
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: OlxExtractor,
        notifier: Notifier,
        store: SeenStore,
        settings: PollerSettings,
    ) -> Self {
        let first_run = store.is_empty();
        Self {
            source,
            extractor,
            notifier,
            store,
            settings,
            first_run,
        }
    }

    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Poll forever. A failed cycle is followed by the cooldown instead of
    /// the jittered interval.
    pub async fn run(mut self) {
        info!(
            "🚀 Watching {} every ~{}s",
            self.settings.search_url,
            self.settings.interval.as_secs()
        );

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    info!(
                        fetched = report.fetched,
                        new = report.new,
                        notified = report.notified,
                        failed = report.failed,
                        seeded = report.seeded,
                        pruned = report.pruned,
                        "Cycle finished"
                    );
                }
                Err(e) => {
                    error!(
                        "❌ Cycle failed: {}. Cooling down for {}s",
                        e,
                        self.settings.failure_cooldown.as_secs()
                    );
                    tokio::time::sleep(self.settings.failure_cooldown).await;
                    continue;
                }
            }

            let delay = next_delay(self.settings.interval);
            info!("⏳ Next check in {}s", delay.as_secs());
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, FetchError> {
        info!("🔍 Checking {} for new listings...", self.source.source_name());

        let html = self.source.fetch_page(&self.settings.search_url).await?;
        let listings = self.extractor.extract(&html);

        let mut report = CycleReport {
            fetched: listings.len(),
            ..CycleReport::default()
        };

        if listings.is_empty() {
            warn!("No listings found on the search page");
            return Ok(report);
        }

        if self.first_run {
            report.seeded = self.store.seed_all(listings.iter().map(|l| l.id.as_str()));
            self.first_run = false;
            self.persist().await;
            info!(
                "🌱 First run: remembered {} listings without notifying",
                report.seeded
            );
            return Ok(report);
        }

        let fresh: Vec<&Listing> = listings
            .iter()
            .filter(|listing| !self.store.contains(&listing.id))
            .collect();
        report.new = fresh.len();

        if fresh.is_empty() {
            info!("No new listings");
        } else {
            info!("🆕 Found {} new listings", fresh.len());
        }

        for (index, listing) in fresh.into_iter().enumerate() {
            if index > 0 && !self.settings.notify_pause.is_zero() {
                tokio::time::sleep(self.settings.notify_pause).await;
            }

            match self.notifier.notify(listing).await {
                Ok(delivered) => {
                    debug!(listing_id = %listing.id, attempts = delivered.attempts, "delivered");
                    self.store.insert_listing(listing);
                    self.persist().await;
                    report.notified += 1;
                }
                Err(e) => {
                    warn!(listing_id = %listing.id, "Notification failed, will retry next cycle: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.pruned = self.store.prune(self.settings.seen_max);
        if report.pruned > 0 {
            info!("🧹 Pruned {} old ids from the seen store", report.pruned);
            self.persist().await;
        }

        Ok(report)
    }

    async fn persist(&self) {
        if let Err(e) = self.store.persist().await {
            error!("Failed to save seen store: {}", e);
        }
    }
}

/// Interval with jitter: `interval + rand(0..=interval/5) - interval/10`,
/// never under one second.
pub fn next_delay(interval: Duration) -> Duration {
    let secs = interval.as_secs();
    let jitter = rand::rng().random_range(0..=(secs / 5).max(1));
    Duration::from_secs((secs + jitter).saturating_sub(secs / 10).max(1))
}
