//! Fixtures shared by the integration tests
#![allow(dead_code)]

use ride_predict::config::ServiceConfig;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

pub const BUCKET: &str = "mlflow-models-rll";
pub const RUN_ID: &str = "e1efc53e9bd149078b0c12aeaa6365df";

/// Artifact root plus scratch space for sink output
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };
        ws.write_artifact(
            "dict_vectorizer.json",
            &json!({"feature_names": ["PU_DO=130_205", "PU_DO=161_236", "trip_distance"]}),
        );
        ws.write_artifact(
            "model/model.json",
            &json!({"kind": "linear_regression", "intercept": 5.0, "coef": [2.0, 3.0, 4.0]}),
        );
        ws
    }

    pub fn artifact_root(&self) -> std::path::PathBuf {
        self.dir.path().join("artifacts")
    }

    pub fn write_artifact(&self, file: &str, content: &Value) {
        let path = self
            .artifact_root()
            .join(BUCKET)
            .join("1")
            .join(RUN_ID)
            .join("artifacts")
            .join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content.to_string()).unwrap();
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    /// Local-mode configuration publishing to `predictions.jsonl`
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig {
            run_id: RUN_ID.to_string(),
            artifact_root: Some(self.artifact_root()),
            predictions_file: Some(self.path("predictions.jsonl")),
            ..ServiceConfig::default()
        }
    }

    pub fn published(&self) -> Vec<Value> {
        read_jsonl(&self.path("predictions.jsonl"))
    }
}

pub fn ride_event(pickup: u32, dropoff: u32, distance: f64, ride_id: Value) -> Value {
    json!({
        "ride": {"PULocationID": pickup, "DOLocationID": dropoff, "trip_distance": distance},
        "ride_id": ride_id
    })
}

pub fn read_jsonl(path: &Path) -> Vec<Value> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
