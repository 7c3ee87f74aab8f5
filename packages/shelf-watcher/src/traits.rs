// Trait definitions for dependency injection
//
// These are the seams the cycle controller is written against. Production
// implementations live next to each trait's concern (feed, store,
// acquisition, logging); doubles live in `testing`.
//
// Naming convention: Base* for trait names (e.g., BaseFeedSource, BaseDedupStore)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwa_client::{QueueAck, SearchOutcome};

use crate::error::{AcquisitionResult, FeedResult, StoreResult};
use crate::types::{FeedItem, ProcessedRecord};

// =============================================================================
// Logger Trait (Infrastructure)
// =============================================================================

pub trait BaseLogger: Send + Sync {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

// =============================================================================
// Feed Source Trait
// =============================================================================

#[async_trait]
pub trait BaseFeedSource: Send + Sync {
    /// Fetch one snapshot of the feed. Items come back in feed order.
    async fn fetch(&self) -> FeedResult<Vec<FeedItem>>;
}

// =============================================================================
// Dedup Store Trait
// =============================================================================

#[async_trait]
pub trait BaseDedupStore: Send + Sync {
    /// Create the schema if it is missing. Safe to call on every start.
    async fn initialize(&self) -> StoreResult<()>;

    /// Point lookup. Unknown identities are not processed.
    async fn is_processed(&self, identity: &str) -> StoreResult<bool>;

    /// Insert or overwrite the record for `identity`. Durable on return.
    async fn mark_processed(
        &self,
        identity: &str,
        title: &str,
        processed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Fetch the stored record, if any.
    async fn get(&self, identity: &str) -> StoreResult<Option<ProcessedRecord>>;

    /// Number of processed identities.
    async fn count(&self) -> StoreResult<usize>;
}

// =============================================================================
// Acquisition Service Trait
// =============================================================================

#[async_trait]
pub trait BaseAcquisitionService: Send + Sync {
    /// Per-cycle session state (cookies, auth).
    type Session: Send + Sync;

    /// Open a session, logging in when credentials are configured.
    ///
    /// A rejected login is logged and an unauthenticated session is returned,
    /// so individual calls fail per item instead. Errors only when the
    /// session itself can't be constructed.
    async fn new_session(&self, log: &dyn BaseLogger) -> AcquisitionResult<Self::Session>;

    /// Search by title. Candidates keep the service's order.
    async fn search(&self, session: &Self::Session, title: &str) -> AcquisitionResult<SearchOutcome>;

    /// Queue a download of `candidate_id`.
    async fn enqueue(
        &self,
        session: &Self::Session,
        candidate_id: &str,
        priority: u32,
    ) -> AcquisitionResult<QueueAck>;
}
