use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use kafka_message_filter::{
    configuration::RuntimeConfig,
    filter::UsernameFilter,
    kafka::{self, KafkaConsumer},
    local_state::LocalState,
    pipeline::{Pipeline, PipelineState, Processor},
    shutdown,
    sink::LogSink,
    telemetry,
};
use tracing::{debug, error, info};

async fn run() -> anyhow::Result<PipelineState> {
    info!("Configuring Kafka consumer properties");
    let config = RuntimeConfig::from_env().context("failed to resolve configuration")?;
    let connection = kafka::build_config(&config);
    debug!(properties = ?connection.redacted_properties(), "Resolved client properties");

    let consumer = KafkaConsumer::new(&connection.client_config())
        .context("failed to build Kafka consumer")?;
    let processor = Processor::new(
        UsernameFilter::from_config(&config),
        Arc::new(LogSink),
        connection.decode_error_policy,
    );

    info!(topic = %config.topic, "Setting up message filter pipeline");
    let mut pipeline = Pipeline::new(
        config.topic.clone(),
        consumer,
        processor,
        LocalState::new(&config.state_dir, &config.application_id),
    );

    pipeline.clean_up().context("failed to clean up local state")?;
    pipeline.start().context("failed to start pipeline")?;

    Ok(pipeline.run_until(shutdown::signal()).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    match run().await {
        Ok(PipelineState::Closed) => ExitCode::SUCCESS,
        Ok(state) => {
            error!(%state, "Pipeline stopped, restart the process to resume");
            ExitCode::FAILURE
        }
        Err(error) => {
            error!(error = ?error, "Failed to start");
            ExitCode::FAILURE
        }
    }
}
