//! Campaign Pipeline: generates, QA-gates and distributes short-form video
//! ads for a product catalog.
//!
//! Reads a batch request (asset bundle, template, generation config) as JSON,
//! runs it through the workflow and prints the result.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::types::{AssetBundle, GenerationConfig, Template};
use campaign_generation::{GenerationBackend, HttpGenerationBackend};
use campaign_workflow::WorkflowOrchestrator;
use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-pipeline")]
#[command(about = "Generate, quality-gate and distribute campaign videos")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, env = "CAMPAIGN_PIPELINE_CONFIG")]
    config: Option<String>,

    /// Batch request JSON file
    #[arg(long, env = "CAMPAIGN_PIPELINE_REQUEST")]
    request: PathBuf,

    /// Concurrent generation calls (overrides config)
    #[arg(long, env = "CAMPAIGN_PIPELINE__PIPELINE__GENERATION_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Prometheus exporter port; enables the exporter
    #[arg(long, env = "CAMPAIGN_PIPELINE__METRICS__PORT")]
    metrics_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct BatchRequest {
    asset_bundle: AssetBundle,
    template: Template,
    #[serde(default)]
    generation_config: GenerationConfig,
}

fn start_metrics(config: &AppConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::new(config.metrics.host.parse()?, config.metrics.port);
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!(port = config.metrics.port, "Metrics exporter started");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_pipeline=info,campaign_workflow=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.generation_concurrency = concurrency;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
        config.metrics.enabled = true;
    }

    info!(
        generation_concurrency = config.pipeline.generation_concurrency,
        channels = config.channels.len(),
        max_retries = config.generation.max_retries,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        if let Err(e) = start_metrics(&config) {
            warn!(error = %e, "Failed to start metrics exporter");
        }
    }

    let raw = tokio::fs::read_to_string(&cli.request)
        .await
        .with_context(|| format!("reading {}", cli.request.display()))?;
    let request: BatchRequest = serde_json::from_str(&raw).context("parsing batch request")?;

    let backend = HttpGenerationBackend::new(&config.generation)?;
    if !backend.is_configured() {
        warn!("No generation API token configured; every generation call will fail");
    }
    let orchestrator = WorkflowOrchestrator::from_app_config(&config, Arc::new(backend));

    let batch = orchestrator.create_batch(
        request.asset_bundle,
        request.template,
        request.generation_config,
    )?;
    let batch_id = batch.batch_id;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling batch");
            on_interrupt.cancel();
        }
    });

    let result = orchestrator
        .execute_with_cancellation(batch_id, token)
        .await?;
    let batch = orchestrator.get_batch(&batch_id)?;
    let contents = orchestrator.batch_contents(&batch_id)?;

    let output = serde_json::json!({
        "result": result,
        "batch": batch,
        "contents": contents,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !result.success {
        anyhow::bail!("batch {} failed: {}", batch_id, result.errors.join("; "));
    }
    Ok(())
}
