use crate::config::ServiceConfig;
use crate::errors::PredictResult;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "ride_predict.toml";

/// Deployment variables read without a prefix, as the function is configured.
const DEPLOYMENT_ENV: [&str; 9] = [
    "MODEL_BUCKET",
    "RUN_ID",
    "MLFLOW_EXPERIMENT_ID",
    "PREDICTIONS_STREAM_NAME",
    "INPUT_STREAM_NAME",
    "TEST_RUN",
    "KINESIS_ENDPOINT_URL",
    "MLFLOW_S3_ENDPOINT_URL",
    "AWS_REGION",
];

fn deployment_key(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "mlflow_experiment_id" => "experiment_id".to_string(),
        "mlflow_s3_endpoint_url" => "artifact_endpoint_url".to_string(),
        "aws_region" => "region".to_string(),
        other => other.to_string(),
    }
}

/// defaults -> TOML file -> deployment env -> `RIDE_*` env
pub fn config_figment(path: Option<&Path>) -> Figment {
    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());

    Figment::from(Serialized::defaults(ServiceConfig::default()))
        .merge(Toml::file(file))
        .merge(
            Env::raw()
                .only(&DEPLOYMENT_ENV)
                .map(|key| deployment_key(key.as_str()).into()),
        )
        .merge(Env::prefixed("RIDE_"))
}

pub fn load_config(path: Option<&Path>) -> PredictResult<ServiceConfig> {
    let config: ServiceConfig = config_figment(path).extract()?;
    config.validate()?;
    debug!(
        bucket = %config.model_bucket,
        run_id = %config.run_id,
        experiment_id = %config.experiment_id,
        test_run = config.test_run,
        "configuration loaded"
    );
    Ok(config)
}
