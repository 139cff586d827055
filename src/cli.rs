use crate::app_state::AppState;
use crate::config::ServiceConfig;
use crate::consumer::{KinesisShardSource, StreamConsumer};
use crate::kinesis::{KinesisClient, ShardIteratorType};
use crate::prediction_service::predict_trip;
use crate::scoring::score_jsonl;
use crate::transport::StreamEvent;
use crate::trip_record::{RideId, TripRecord};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Top-level CLI interface for the ride duration predictor
#[derive(Parser)]
#[command(
    name = "ride_predict",
    version,
    about = "Stream-triggered ride duration prediction"
)]
pub struct Cli {
    /// TOML configuration file (defaults to ./ride_predict.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one stream event file through the handler and print the response
    Invoke {
        #[arg(short, long)]
        event: PathBuf,
    },

    /// Predict the duration of a single trip
    Predict {
        #[arg(long)]
        pickup: u32,
        #[arg(long)]
        dropoff: u32,
        #[arg(long)]
        distance: f64,
        /// Numeric ids stay numeric in the output
        #[arg(long, default_value = "cli")]
        ride_id: String,
    },

    /// Score a JSON-lines file of ride events
    Score {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Serve the local invocation endpoint
    Serve {
        /// Host/IP to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Poll the input stream and predict every record
    Consume {
        #[arg(long)]
        shard_id: Option<String>,
        /// Start at the oldest record instead of new ones only
        #[arg(long)]
        from_start: bool,
        #[arg(long)]
        max_polls: Option<u64>,
    },
}

fn parse_ride_id(raw: &str) -> RideId {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Number(n)) => RideId::Number(n),
        _ => RideId::Text(raw.to_string()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn dispatch(cli: Cli, config: ServiceConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config).context("initializing predictor")?;

    match cli.command {
        Commands::Invoke { event } => {
            let bytes = std::fs::read(&event)
                .with_context(|| format!("reading event file {}", event.display()))?;
            let event = StreamEvent::from_slice(&bytes)?;
            let response = state.invoker.invoke(&event)?;
            print_json(&response)?;
        }
        Commands::Predict {
            pickup,
            dropoff,
            distance,
            ride_id,
        } => {
            let bundle = state.invoker.warm()?;
            let trip = TripRecord::new(pickup, dropoff, distance, parse_ride_id(&ride_id))?;
            print_json(&predict_trip(&bundle, &trip)?)?;
        }
        Commands::Score { input, output } => {
            let bundle = state.invoker.warm()?;
            let reader = BufReader::new(
                File::open(&input).with_context(|| format!("opening {}", input.display()))?,
            );
            let writer = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );
            let summary = score_jsonl(&bundle, reader, writer)?;
            print_json(&summary)?;
        }
        Commands::Serve { host, port } => {
            // the invoker is built and finally dropped outside the runtime
            let invoker = state.invoker.clone();
            let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
            runtime.block_on(crate::web::serve(invoker, &host, port))?;
        }
        Commands::Consume {
            shard_id,
            from_start,
            max_polls,
        } => {
            let config = &state.config;
            let client = KinesisClient::new(&config.kinesis_endpoint())?;
            let start = if from_start {
                ShardIteratorType::TrimHorizon
            } else {
                ShardIteratorType::Latest
            };
            let mut source = KinesisShardSource::new(
                client,
                config.input_stream_name.clone(),
                shard_id.unwrap_or_else(|| config.shard_id.clone()),
                start,
                config.poll_limit,
            );
            let stats = StreamConsumer::new(state.invoker.clone())
                .with_idle_backoff(config.idle_backoff())
                .with_max_polls(max_polls)
                .run(&mut source)?;
            print_json(&stats)?;
        }
    }

    Ok(())
}
