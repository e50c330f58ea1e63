//! REST API types.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{PersistenceError, PipelineError};
use crate::models::{ElectionResultsData, ElectionStatistics};

/// Response sent after a blob was processed and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    /// Id of the persisted record
    pub record_id: String,

    /// Always "stored"; failures use [`error_response`]
    pub status: String,

    pub results_type: String,
    pub location: String,
    pub sequence: u64,
    pub file_name: String,
    pub processed_at: String,

    /// Section keys present in the record
    pub sections: Vec<String>,

    /// Number of candidates after enrichment
    pub candidate_count: usize,
}

impl From<ElectionStatistics> for ProcessResponse {
    fn from(record: ElectionStatistics) -> Self {
        // The record was built from valid JSON; an unreadable payload only loses the summary.
        let data: ElectionResultsData =
            serde_json::from_str(&record.statistics_json).unwrap_or_default();

        Self {
            record_id: record.id,
            status: "stored".to_string(),
            results_type: record.results_type,
            location: record.location,
            sequence: record.sequence,
            file_name: record.file_name,
            processed_at: record.processed_at,
            sections: data.sections.keys().cloned().collect(),
            candidate_count: data.candidates.len(),
        }
    }
}

/// Stored record with its results payload expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub id: String,
    pub results_type: String,
    pub location: String,
    pub sequence: u64,
    pub file_name: String,
    pub processed_at: String,
    pub statistics: Value,
}

impl From<ElectionStatistics> for RecordResponse {
    fn from(record: ElectionStatistics) -> Self {
        let statistics =
            serde_json::from_str(&record.statistics_json).unwrap_or(Value::Null);
        Self {
            id: record.id,
            results_type: record.results_type,
            location: record.location,
            sequence: record.sequence,
            file_name: record.file_name,
            processed_at: record.processed_at,
            statistics,
        }
    }
}

/// Build an error response body
pub fn error_response(message: &str) -> Value {
    json!({
        "status": "error",
        "error": message,
    })
}

/// HTTP status for a failed pipeline run.
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Decode(_)
        | PipelineError::AggregationFailed(_)
        | PipelineError::InvalidRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::EnrichmentFailed(_) => StatusCode::BAD_GATEWAY,
        PipelineError::PersistenceFailed(PersistenceError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::PersistenceFailed(_) | PipelineError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AggregationError, DecodeError, EnrichmentError};

    fn record(json: &str) -> ElectionStatistics {
        ElectionStatistics {
            id: "rec-1".into(),
            results_type: "president".into(),
            location: "cluj".into(),
            sequence: 4,
            file_name: "president_cluj_4.csv".into(),
            processed_at: "2026-10-18T10:00:00+00:00".into(),
            statistics_json: json.into(),
        }
    }

    #[test]
    fn test_process_response_summarizes_record() {
        let response = ProcessResponse::from(record(
            r#"{"sections":{"turnout":{"rows":1,"values":{}}},"candidates":[{"id":"g1","name":"g1","votes":0,"percentage":0.0}]}"#,
        ));
        assert_eq!(response.record_id, "rec-1");
        assert_eq!(response.status, "stored");
        assert_eq!(response.sections, vec!["turnout".to_string()]);
        assert_eq!(response.candidate_count, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["resultsType"], "president");
        assert_eq!(json["candidateCount"], 1);
    }

    #[test]
    fn test_record_response_expands_statistics() {
        let response = RecordResponse::from(record(r#"{"sections":{},"candidates":[]}"#));
        assert_eq!(response.statistics["candidates"], json!([]));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PipelineError::Decode(DecodeError::InvalidEncoding("x".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PipelineError::AggregationFailed(AggregationError::NoMatchingParser)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PipelineError::EnrichmentFailed(EnrichmentError::Timeout)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&PipelineError::PersistenceFailed(PersistenceError::Timeout)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(status_for(&PipelineError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("boom");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "boom");
    }
}
