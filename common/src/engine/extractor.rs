// Extractor - bridges a pushed query event stream into one awaitable result

use crate::errors::ExtractionError;
use crate::models::Record;
use crate::store::{QueryEvent, SourceConnection};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Extractor streams the records of one query into memory
#[derive(Debug, Clone)]
pub struct Extractor {
    max_wait: Duration,
}

impl Extractor {
    /// `max_wait` bounds how long the stream may stay silent between events
    pub fn new(max_wait: Duration) -> Self {
        Self { max_wait }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Run `query` against `source` and collect every record in delivery order.
    ///
    /// Resolves once on `End` or fails once on `Error`; records received
    /// before an error are dropped. The idle limit restarts on every event,
    /// so a long stream that keeps delivering is never cut short.
    #[instrument(skip(self, query, source))]
    pub async fn extract(
        &self,
        query: &str,
        source: &dyn SourceConnection,
    ) -> Result<Vec<Record>, ExtractionError> {
        let mut events = source.bulk_query(query);
        let mut records = Vec::new();

        loop {
            let event = match timeout(self.max_wait, events.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(ExtractionError::StreamClosed),
                Err(_) => {
                    warn!(
                        max_wait_ms = self.max_wait.as_millis() as u64,
                        received = records.len(),
                        "Query stream went idle"
                    );
                    return Err(ExtractionError::Timeout(self.max_wait));
                }
            };

            match event {
                QueryEvent::Record(record) => records.push(record),
                QueryEvent::Error(e) => {
                    debug!(discarded = records.len(), error = %e, "Query stream failed");
                    return Err(ExtractionError::Query(e));
                }
                QueryEvent::End => {
                    debug!(records = records.len(), "Query stream ended");
                    return Ok(records);
                }
            }
        }
    }
}
