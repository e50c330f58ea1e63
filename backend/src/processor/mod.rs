//! Blob processor: the ingestion pipeline controller.
//!
//! ```text
//! stream ──▶ decode ──▶ aggregate ──▶ enrich ──▶ serialize ──▶ insert
//!               │           │            │           │
//!               └───────────┴────────────┴───────────┴──▶ PipelineError (no insert)
//! ```
//!
//! The repository insert happens at most once per call, and only after
//! aggregation and enrichment both succeeded.
//!
//! A timeout or cancellation that lands while the insert is in flight is
//! reported as a failure, but the repository may still have stored the
//! record. Each attempt gets a fresh record id, so a caller retrying after
//! `PersistenceFailed(Timeout)` or `Cancelled` should expect a possible
//! duplicate for the same `file_name` and `sequence`.

mod context;

pub use context::{Interrupted, ProcessContext};

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use crate::aggregate::ResultsAggregator;
use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::descriptor::parse_or_unknown;
use crate::enrich::{CandidateEnricher, ElectionConfigurationSource};
use crate::error::{DecodeError, PersistenceError, PipelineError, PipelineResult};
use crate::models::{ElectionResultsData, ElectionStatistics, RoutingInfo};
use crate::parser::decode_bytes;
use crate::storage::ResultsRepository;
use crate::validation::validate_results_record;

/// Runs one blob through the pipeline. Cheap to clone and share across tasks.
#[derive(Clone)]
pub struct BlobProcessor {
    repository: Arc<dyn ResultsRepository>,
    enricher: CandidateEnricher,
    aggregator: Arc<dyn ResultsAggregator>,
}

impl BlobProcessor {
    pub fn new(
        repository: Arc<dyn ResultsRepository>,
        configuration_source: Arc<dyn ElectionConfigurationSource>,
        aggregator: Arc<dyn ResultsAggregator>,
    ) -> Self {
        Self {
            repository,
            enricher: CandidateEnricher::new(configuration_source),
            aggregator,
        }
    }

    /// Process a blob with no timeout and no cancellation.
    pub async fn process_stream<R>(&self, stream: R, file_name: &str) -> PipelineResult<ElectionStatistics>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.process_stream_with(stream, file_name, &ProcessContext::default())
            .await
    }

    /// Process a blob under the caller's timeout and cancellation.
    ///
    /// Returns the record that was persisted.
    pub async fn process_stream_with<R>(
        &self,
        stream: R,
        file_name: &str,
        ctx: &ProcessContext,
    ) -> PipelineResult<ElectionStatistics>
    where
        R: AsyncRead + Unpin + Send,
    {
        log_info(format!("Processing blob '{}'", file_name));

        let content = read_csv_as_string(stream).await.map_err(|e| {
            log_error(format!("Cannot decode '{}': {}", file_name, e));
            PipelineError::Decode(e)
        })?;
        log_success(format!("Decoded {} bytes of text", content.len()));

        let (routing, descriptor_error) = parse_or_unknown(file_name);
        if let Some(err) = descriptor_error {
            log_warning(format!("{}; continuing with unknown routing", err));
        }

        let data = self
            .aggregator
            .retrieve_election_data(&content)
            .map_err(|e| {
                log_error(format!("Aggregation failed: {}", e));
                PipelineError::AggregationFailed(e)
            })?;
        drop(content);

        let data = self.enricher.enrich(data, ctx).await.map_err(|e| {
            log_error(format!("Enrichment failed: {}", e));
            PipelineError::EnrichmentFailed(e)
        })?;

        let record = build_record(&data, &routing, file_name)?;

        if ctx.is_cancelled() {
            log_warning("Cancelled before insert; nothing persisted");
            return Err(PipelineError::Cancelled);
        }

        match ctx.run(self.repository.insert_results(record.clone())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log_error(format!("Insert failed: {}", e));
                return Err(PipelineError::PersistenceFailed(e));
            }
            Err(Interrupted::TimedOut) => {
                log_error("Insert timed out");
                return Err(PipelineError::PersistenceFailed(PersistenceError::Timeout));
            }
            Err(Interrupted::Cancelled) => return Err(PipelineError::Cancelled),
        }

        log_success(format!(
            "Stored record {} ({} / {} / {})",
            record.id, record.results_type, record.location, record.sequence
        ));
        Ok(record)
    }
}

/// Read the whole stream and decode it to text.
pub async fn read_csv_as_string<R>(mut stream: R) -> Result<String, DecodeError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    decode_bytes(&bytes)
}

/// Serialize and validate the finalized record, then wrap it for storage.
fn build_record(
    data: &ElectionResultsData,
    routing: &RoutingInfo,
    file_name: &str,
) -> PipelineResult<ElectionStatistics> {
    let value = serde_json::to_value(data)?;
    validate_results_record(&value).map_err(|errors| {
        log_error(format!("Record failed schema validation: {}", errors.join(", ")));
        PipelineError::InvalidRecord { errors }
    })?;

    Ok(ElectionStatistics {
        id: Uuid::new_v4().to_string(),
        results_type: routing.results_type.clone(),
        location: routing.location.clone(),
        sequence: routing.sequence,
        file_name: file_name.to_string(),
        processed_at: chrono::Utc::now().to_rfc3339(),
        statistics_json: serde_json::to_string(data)?,
    })
}
