// Shelf Watcher
//
// Polls a Goodreads shelf RSS feed and asks a Calibre-Web-Automated book
// downloader to fetch every book that newly appears, never asking twice for
// the same feed item.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod store;
pub mod testing;
pub mod traits;
pub mod types;
pub mod watcher;

pub use acquisition::{CwaAcquisition, DOWNLOAD_PRIORITY};
pub use config::{Config, Credentials};
pub use error::{AcquisitionError, FeedError, Result, StoreError, WatcherError};
pub use feed::{parse_feed, strip_cdata_wrapper, HttpFeedSource};
pub use logging::TracingLogger;
pub use store::{MemoryDedupStore, SqliteDedupStore};
pub use traits::{BaseAcquisitionService, BaseDedupStore, BaseFeedSource, BaseLogger};
pub use types::{FeedItem, ProcessedRecord};
pub use watcher::{CycleReport, CycleStatus, Watcher};

pub use cwa_client::Timeouts;
