// Bulk API client for a remote record store
// Query and ingest jobs are created, polled until settled, then their results fetched.

use crate::config::{BulkConfig, ConnectionConfig};
use crate::errors::StoreError;
use crate::models::{ConcurrencyMode, LoadOptions, LoadOutcome, Operation, Record};
use crate::store::{PollSettings, QueryEvent, QueryEvents, SourceConnection, TargetConnection};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

/// Buffered query events between the polling task and the extractor
const QUERY_EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy)]
enum JobKind {
    Query,
    Ingest,
}

impl JobKind {
    fn segment(&self) -> &'static str {
        match self {
            JobKind::Query => "query",
            JobKind::Ingest => "ingest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
enum JobState {
    #[default]
    Open,
    UploadComplete,
    InProgress,
    JobComplete,
    Failed,
    Aborted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobInfo {
    id: String,
    #[serde(default)]
    state: JobState,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct QueryJobRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestJobRequest<'a> {
    object: &'a str,
    operation: Operation,
    concurrency_mode: ConcurrencyMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_id_field_name: Option<&'a str>,
    records: &'a [Record],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultPage {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    next_locator: Option<String>,
}

/// BulkApiClient talks to one store instance with an already-issued access token
#[derive(Clone)]
pub struct BulkApiClient {
    client: Client,
    base_url: String,
    access_token: String,
    poll: PollSettings,
}

impl BulkApiClient {
    /// Create a client for a configured connection
    pub fn new(connection: &ConnectionConfig, bulk: &BulkConfig) -> Result<Self, StoreError> {
        let base_url = format!(
            "{}/services/data/v{}",
            connection.instance_url.trim_end_matches('/'),
            connection.api_version
        );

        Self::with_base_url(
            base_url,
            connection.access_token.clone(),
            bulk.poll_settings(),
            Duration::from_secs(bulk.request_timeout_seconds),
        )
    }

    /// Create a client against an explicit API base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        poll: PollSettings,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            poll,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    fn job_url(&self, kind: JobKind, job_id: Option<&str>, suffix: Option<&str>) -> String {
        let mut url = format!("{}/jobs/{}", self.base_url, kind.segment());
        if let Some(id) = job_id {
            url.push('/');
            url.push_str(id);
        }
        if let Some(suffix) = suffix {
            url.push('/');
            url.push_str(suffix);
        }
        url
    }

    /// Send an authenticated request and decode its JSON body
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request.bearer_auth(&self.access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    #[tracing::instrument(skip(self, kind, body), fields(kind = kind.segment()))]
    async fn create_job<B: Serialize + ?Sized>(
        &self,
        kind: JobKind,
        body: &B,
    ) -> Result<JobInfo, StoreError> {
        let job: JobInfo = self
            .send_json(self.client.post(self.job_url(kind, None, None)).json(body))
            .await?;
        tracing::debug!(job_id = %job.id, state = ?job.state, "Bulk job created");
        Ok(job)
    }

    /// Poll a job until it completes, fails, or the poll timeout elapses
    #[tracing::instrument(skip(self, kind), fields(kind = kind.segment()))]
    async fn wait_for_completion(&self, kind: JobKind, job_id: &str) -> Result<(), StoreError> {
        let started = Instant::now();
        let url = self.job_url(kind, Some(job_id), None);

        loop {
            let job: JobInfo = self.send_json(self.client.get(&url)).await?;
            match job.state {
                JobState::JobComplete => {
                    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Bulk job complete");
                    return Ok(());
                }
                JobState::Failed | JobState::Aborted => {
                    return Err(StoreError::JobFailed {
                        job_id: job_id.to_string(),
                        state: format!("{:?}", job.state),
                        message: job.error_message.unwrap_or_default(),
                    });
                }
                state => tracing::trace!(?state, "Bulk job still running"),
            }

            if started.elapsed() + self.poll.interval > self.poll.timeout {
                return Err(StoreError::PollTimeout {
                    job_id: job_id.to_string(),
                    timeout_ms: self.poll.timeout.as_millis() as u64,
                });
            }
            sleep(self.poll.interval).await;
        }
    }

    /// Run a query job and push every result record to `events`
    #[tracing::instrument(skip(self, query, events))]
    async fn run_query(
        &self,
        query: &str,
        events: &mpsc::Sender<QueryEvent>,
    ) -> Result<(), StoreError> {
        let job = self.create_job(JobKind::Query, &QueryJobRequest { query }).await?;
        self.wait_for_completion(JobKind::Query, &job.id).await?;

        let results_url = self.job_url(JobKind::Query, Some(&job.id), Some("results"));
        let mut locator: Option<String> = None;
        loop {
            let mut request = self.client.get(&results_url);
            if let Some(locator) = &locator {
                request = request.query(&[("locator", locator)]);
            }
            let page: QueryResultPage = self.send_json(request).await?;
            tracing::debug!(records = page.records.len(), "Fetched query result page");

            for record in page.records {
                if events.send(QueryEvent::Record(record)).await.is_err() {
                    tracing::warn!(job_id = %job.id, "Query consumer went away, stopping");
                    return Ok(());
                }
            }

            match page.next_locator {
                Some(next) if !next.is_empty() => locator = Some(next),
                _ => return Ok(()),
            }
        }
    }
}

impl SourceConnection for BulkApiClient {
    fn bulk_query(&self, query: &str) -> QueryEvents {
        let (tx, rx) = mpsc::channel(QUERY_EVENT_BUFFER);
        let client = self.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let terminal = match client.run_query(&query, &tx).await {
                Ok(()) => QueryEvent::End,
                Err(e) => {
                    tracing::error!(error = %e, "Bulk query failed");
                    QueryEvent::Error(e)
                }
            };
            let _ = tx.send(terminal).await;
        });

        rx
    }
}

#[async_trait]
impl TargetConnection for BulkApiClient {
    #[tracing::instrument(skip(self, options, records), fields(record_count = records.len()))]
    async fn bulk_load(
        &self,
        object: &str,
        operation: Operation,
        options: &LoadOptions,
        records: Vec<Record>,
    ) -> Result<Vec<LoadOutcome>, StoreError> {
        let request = IngestJobRequest {
            object,
            operation,
            concurrency_mode: options.concurrency_mode,
            external_id_field_name: options.external_id_field.as_deref(),
            records: &records,
        };
        let job = self.create_job(JobKind::Ingest, &request).await?;
        self.wait_for_completion(JobKind::Ingest, &job.id).await?;

        let outcomes: Vec<LoadOutcome> = self
            .send_json(
                self.client
                    .get(self.job_url(JobKind::Ingest, Some(&job.id), Some("results"))),
            )
            .await?;

        tracing::info!(job_id = %job.id, outcomes = outcomes.len(), "Bulk load settled");
        Ok(outcomes)
    }
}
