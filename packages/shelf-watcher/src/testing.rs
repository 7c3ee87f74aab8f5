//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the watcher cycle without a real feed,
//! book downloader, or log subscriber.

use async_trait::async_trait;
use cwa_client::{QueueAck, SearchOutcome, SearchResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{AcquisitionError, AcquisitionResult, FeedError, FeedResult};
use crate::traits::{BaseAcquisitionService, BaseFeedSource, BaseLogger};
use crate::types::FeedItem;

// =============================================================================
// Mock Feed Source
// =============================================================================

/// A feed that returns a fixed snapshot, or fails.
#[derive(Default)]
pub struct MockFeedSource {
    items: Arc<RwLock<Vec<FeedItem>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the snapshot.
    pub fn with_item(self, identity: &str, title: &str) -> Self {
        self.items.write().unwrap().push(FeedItem::new(identity, title));
        self
    }

    /// Make every fetch fail with a parse error.
    pub fn failing(self, reason: &str) -> Self {
        *self.failure.write().unwrap() = Some(reason.to_string());
        self
    }
}

#[async_trait]
impl BaseFeedSource for MockFeedSource {
    async fn fetch(&self) -> FeedResult<Vec<FeedItem>> {
        if let Some(reason) = self.failure.read().unwrap().clone() {
            return Err(FeedError::Parse(reason));
        }
        Ok(self.items.read().unwrap().clone())
    }
}

// =============================================================================
// Mock Acquisition Service
// =============================================================================

/// Record of a call made to the mock acquisition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionCall {
    NewSession,
    Search { title: String },
    Enqueue { candidate_id: String, priority: u32 },
}

#[derive(Debug, Clone)]
enum SearchBehavior {
    Candidates(Vec<String>),
    NoMatch,
    Fail(String),
}

/// An acquisition service with scripted search results.
///
/// Titles with no scripted behaviour return no match.
#[derive(Default)]
pub struct MockAcquisition {
    searches: Arc<RwLock<HashMap<String, SearchBehavior>>>,
    failing_enqueues: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<AcquisitionCall>>>,
}

impl MockAcquisition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Searching `title` returns these candidate ids, in order.
    pub fn with_candidates(self, title: &str, ids: &[&str]) -> Self {
        self.searches.write().unwrap().insert(
            title.to_string(),
            SearchBehavior::Candidates(ids.iter().map(|s| s.to_string()).collect()),
        );
        self
    }

    /// Searching `title` answers with the service's `error` object.
    pub fn with_no_match(self, title: &str) -> Self {
        self.searches
            .write()
            .unwrap()
            .insert(title.to_string(), SearchBehavior::NoMatch);
        self
    }

    /// Searching `title` fails outright.
    pub fn with_search_failure(self, title: &str, reason: &str) -> Self {
        self.searches
            .write()
            .unwrap()
            .insert(title.to_string(), SearchBehavior::Fail(reason.to_string()));
        self
    }

    /// Enqueueing `candidate_id` fails.
    pub fn with_enqueue_failure(self, candidate_id: &str) -> Self {
        self.failing_enqueues
            .write()
            .unwrap()
            .insert(candidate_id.to_string());
        self
    }

    /// Script the next cycle to succeed where it previously failed.
    pub fn clear_failures(&self) {
        self.failing_enqueues.write().unwrap().clear();
        self.searches
            .write()
            .unwrap()
            .retain(|_, b| !matches!(b, SearchBehavior::Fail(_)));
    }

    pub fn calls(&self) -> Vec<AcquisitionCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn searched_titles(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AcquisitionCall::Search { title } => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn enqueued_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AcquisitionCall::Enqueue { candidate_id, .. } => Some(candidate_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: AcquisitionCall) {
        self.calls.write().unwrap().push(call);
    }
}

#[async_trait]
impl BaseAcquisitionService for MockAcquisition {
    type Session = ();

    async fn new_session(&self, _log: &dyn BaseLogger) -> AcquisitionResult<()> {
        self.record(AcquisitionCall::NewSession);
        Ok(())
    }

    async fn search(&self, _session: &(), title: &str) -> AcquisitionResult<SearchOutcome> {
        self.record(AcquisitionCall::Search {
            title: title.to_string(),
        });

        let behavior = self.searches.read().unwrap().get(title).cloned();
        match behavior {
            Some(SearchBehavior::Candidates(ids)) => Ok(SearchOutcome::Matches(
                ids.into_iter()
                    .map(|id| SearchResult {
                        title: Some(format!("{} [{}]", title, id)),
                        id,
                        author: None,
                        publisher: None,
                        year: None,
                        language: None,
                        format: None,
                        size: None,
                    })
                    .collect(),
            )),
            Some(SearchBehavior::NoMatch) => Ok(SearchOutcome::NoMatch {
                reason: Some("No books found".to_string()),
            }),
            Some(SearchBehavior::Fail(reason)) => Err(AcquisitionError::Rejected(reason)),
            None => Ok(SearchOutcome::NoMatch { reason: None }),
        }
    }

    async fn enqueue(
        &self,
        _session: &(),
        candidate_id: &str,
        priority: u32,
    ) -> AcquisitionResult<QueueAck> {
        self.record(AcquisitionCall::Enqueue {
            candidate_id: candidate_id.to_string(),
            priority,
        });

        if self.failing_enqueues.read().unwrap().contains(candidate_id) {
            return Err(AcquisitionError::Rejected(format!(
                "enqueue of {} timed out",
                candidate_id
            )));
        }
        Ok(QueueAck {
            status: Some("queued".to_string()),
        })
    }
}

// =============================================================================
// Recording Logger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Captures log lines instead of emitting them.
#[derive(Default, Clone)]
pub struct RecordingLogger {
    lines: Arc<RwLock<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.read().unwrap().clone()
    }

    /// Messages logged at `level`.
    pub fn at(&self, level: LogLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// True when any line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.at(level).iter().any(|m| m.contains(needle))
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.lines.write().unwrap().push((level, message.to_string()));
    }
}

impl BaseLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
