//! Poll-dedup-dispatch cycle.
//!
//! One cycle fetches the shelf feed, drops items the dedup store already
//! knows, and asks the book downloader for each new one. An item is recorded
//! only after its download was queued, so anything that fails is simply seen
//! again next cycle.
//!
//! # Architecture
//!
//! ```text
//! run()
//!   ├─► store.initialize()                (once)
//!   └─► loop
//!         ├─► run_cycle()
//!         │     ├─► acquisition.new_session()
//!         │     ├─► feed.fetch()           (failure ends the cycle)
//!         │     └─► for each item, in feed order
//!         │           ├─► store.is_processed()
//!         │           ├─► acquisition.search()   → first candidate
//!         │           ├─► acquisition.enqueue()
//!         │           └─► store.mark_processed()
//!         └─► sleep(poll_interval)
//! ```
//!
//! Everything runs sequentially on one task. Failures below the feed fetch
//! are contained to the item that caused them.

use chrono::Utc;
use std::sync::Arc;

use crate::acquisition::DOWNLOAD_PRIORITY;
use crate::config::Config;
use crate::error::Result;
use crate::traits::{BaseAcquisitionService, BaseDedupStore, BaseFeedSource, BaseLogger};
use crate::types::FeedItem;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// No feed configured; nothing was contacted.
    Disabled,
    /// The downloader session could not be constructed.
    SessionUnavailable,
    /// The feed could not be fetched or parsed; no items were attempted.
    FeedUnavailable,
    /// Every item in the snapshot was attempted.
    Completed,
}

/// Tally of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Items in the feed snapshot.
    pub fetched: usize,
    /// Already processed, or without an identity.
    pub skipped: usize,
    /// Queued and recorded.
    pub queued: usize,
    /// Search found nothing usable.
    pub unmatched: usize,
    /// Store lookup, search, or enqueue failed.
    pub failed: usize,
    /// Queued, but the store write failed afterwards.
    pub unrecorded: usize,
}

impl CycleReport {
    fn new(status: CycleStatus) -> Self {
        Self {
            status,
            fetched: 0,
            skipped: 0,
            queued: 0,
            unmatched: 0,
            failed: 0,
            unrecorded: 0,
        }
    }

    fn tally(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Queued => self.queued += 1,
            ItemOutcome::Unmatched => self.unmatched += 1,
            ItemOutcome::Failed => self.failed += 1,
            ItemOutcome::Unrecorded => self.unrecorded += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Skipped,
    Queued,
    Unmatched,
    Failed,
    Unrecorded,
}

/// Drives the cycle over its collaborators.
pub struct Watcher<F, S, A> {
    config: Config,
    feed: Option<F>,
    store: S,
    acquisition: A,
    log: Arc<dyn BaseLogger>,
}

impl<F, S, A> Watcher<F, S, A>
where
    F: BaseFeedSource,
    S: BaseDedupStore,
    A: BaseAcquisitionService,
{
    /// `feed` is `None` when no feed URL is configured; cycles are then no-ops.
    pub fn new(
        config: Config,
        feed: Option<F>,
        store: S,
        acquisition: A,
        log: Arc<dyn BaseLogger>,
    ) -> Self {
        Self {
            config,
            feed,
            store,
            acquisition,
            log,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }

    /// Initialise the store, then cycle forever. Returns only on a startup error.
    pub async fn run(&self) -> Result<()> {
        self.store.initialize().await?;
        self.log.info(&format!(
            "Watcher started, polling every {}s",
            self.config.poll_interval.as_secs()
        ));

        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Run one fetch-filter-dispatch pass.
    pub async fn run_cycle(&self) -> CycleReport {
        let Some(feed) = &self.feed else {
            self.log.warn("GOODREADS_RSS_URL not set");
            return CycleReport::new(CycleStatus::Disabled);
        };

        self.log.info("Checking Goodreads RSS feed...");

        let session = match self.acquisition.new_session(self.log.as_ref()).await {
            Ok(session) => session,
            Err(e) => {
                self.log.error(&format!("Failed to open CWA session: {}", e));
                return CycleReport::new(CycleStatus::SessionUnavailable);
            }
        };

        let items = match feed.fetch().await {
            Ok(items) => items,
            Err(e) => {
                self.log.error(&format!("Failed to fetch RSS: {}", e));
                return CycleReport::new(CycleStatus::FeedUnavailable);
            }
        };

        let mut report = CycleReport::new(CycleStatus::Completed);
        report.fetched = items.len();

        for item in &items {
            let outcome = self.process_item(&session, item).await;
            report.tally(outcome);
        }

        self.log.info(&format!(
            "Cycle complete: {} items, {} skipped, {} queued, {} unmatched, {} failed, {} unrecorded",
            report.fetched,
            report.skipped,
            report.queued,
            report.unmatched,
            report.failed,
            report.unrecorded
        ));

        report
    }

    async fn process_item(&self, session: &A::Session, item: &FeedItem) -> ItemOutcome {
        if !item.is_processable() {
            return ItemOutcome::Skipped;
        }

        match self.store.is_processed(&item.identity).await {
            Ok(true) => return ItemOutcome::Skipped,
            Ok(false) => {}
            Err(e) => {
                self.log.error(&format!(
                    "Failed to check whether '{}' was processed: {}",
                    item.title, e
                ));
                return ItemOutcome::Failed;
            }
        }

        self.log.info(&format!("New book found: {}", item.title));

        let outcome = match self.acquisition.search(session, &item.title).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.log.error(&format!(
                    "Error interacting with CWA for '{}': {}",
                    item.title, e
                ));
                return ItemOutcome::Failed;
            }
        };

        // First candidate wins; no similarity check against the title.
        let Some(best) = outcome.top() else {
            self.log
                .warn(&format!("No results found in CWA for: {}", item.title));
            return ItemOutcome::Unmatched;
        };

        if let Err(e) = self
            .acquisition
            .enqueue(session, &best.id, DOWNLOAD_PRIORITY)
            .await
        {
            self.log.error(&format!(
                "Error interacting with CWA for '{}': {}",
                item.title, e
            ));
            return ItemOutcome::Failed;
        }

        self.log
            .info(&format!("Successfully queued: {}", best.display_title()));

        // A failure here leaves a queued download unrecorded; the next cycle requests it again.
        match self
            .store
            .mark_processed(&item.identity, &item.title, Utc::now())
            .await
        {
            Ok(()) => ItemOutcome::Queued,
            Err(e) => {
                self.log.error(&format!(
                    "Queued '{}' but failed to record it, it will be requested again next cycle: {}",
                    item.title, e
                ));
                ItemOutcome::Unrecorded
            }
        }
    }
}
