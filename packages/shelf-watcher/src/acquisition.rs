//! Book downloader as the acquisition service.

use async_trait::async_trait;
use cwa_client::{CwaClient, QueueAck, SearchOutcome, Timeouts};

use crate::config::Credentials;
use crate::error::AcquisitionResult;
use crate::traits::{BaseAcquisitionService, BaseLogger};

/// Priority attached to every queued download.
pub const DOWNLOAD_PRIORITY: u32 = 10;

/// Opens a fresh `CwaClient` session per cycle.
pub struct CwaAcquisition {
    base_url: String,
    credentials: Option<Credentials>,
    timeouts: Timeouts,
}

impl CwaAcquisition {
    pub fn new(base_url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

#[async_trait]
impl BaseAcquisitionService for CwaAcquisition {
    type Session = CwaClient;

    async fn new_session(&self, log: &dyn BaseLogger) -> AcquisitionResult<CwaClient> {
        let client = CwaClient::new(self.base_url.as_str())?.with_timeouts(self.timeouts);

        if let Some(creds) = &self.credentials {
            if let Err(e) = client.login(&creds.username, &creds.password).await {
                log.error(&format!("Failed to login to CWA: {}", e));
            }
        }

        Ok(client)
    }

    async fn search(&self, session: &CwaClient, title: &str) -> AcquisitionResult<SearchOutcome> {
        Ok(session.search(title).await?)
    }

    async fn enqueue(
        &self,
        session: &CwaClient,
        candidate_id: &str,
        priority: u32,
    ) -> AcquisitionResult<QueueAck> {
        Ok(session.enqueue(candidate_id, priority).await?)
    }
}
