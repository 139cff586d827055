//! Offline scoring of ride events stored as JSON lines.
//!
//! Each input line is one `{"ride": {...}, "ride_id": ...}` event. Each output
//! line is either the prediction envelope or an error object naming the line.

use crate::errors::{PredictError, PredictResult};
use crate::model_cache::ModelBundle;
use crate::prediction_service::predict_trip;
use crate::trip_record::TripRecord;
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub scored: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct ScoreError<'a> {
    line: usize,
    #[serde(rename = "errorType")]
    error_type: &'a str,
    #[serde(rename = "errorMessage")]
    error_message: String,
}

pub fn score_jsonl<R: BufRead, W: Write>(
    bundle: &ModelBundle,
    input: R,
    mut output: W,
) -> PredictResult<ScoreSummary> {
    let mut summary = ScoreSummary::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line.map_err(|e| PredictError::io("reading scoring input", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let rendered = match TripRecord::from_json_slice(line.as_bytes())
            .and_then(|trip| predict_trip(bundle, &trip))
        {
            Ok(envelope) => {
                summary.scored += 1;
                serde_json::to_string(&envelope)?
            }
            Err(e) => {
                summary.failed += 1;
                debug!(line = line_no, error = %e, "scoring failed");
                serde_json::to_string(&ScoreError {
                    line: line_no,
                    error_type: e.kind().as_str(),
                    error_message: e.to_string(),
                })?
            }
        };

        writeln!(output, "{rendered}").map_err(|e| PredictError::io("writing scores", e))?;
    }

    output
        .flush()
        .map_err(|e| PredictError::io("flushing scores", e))?;
    info!(scored = summary.scored, failed = summary.failed, run_id = %bundle.run_id, "scoring complete");
    Ok(summary)
}
