//! docai-extract - Invoice field reconciliation
//!
//! Replays captured OCR / VLM / detector output for a batch of documents,
//! reconciles the six invoice fields per document and writes one JSON
//! result per document, plus an optional batch summary. With ground truth
//! the summary also reports accuracy.

use anyhow::{Context, Result};
use clap::Parser;
use docai_common::config::ConfigResolver;
use docai_extract::extractors::CaptureStore;
use docai_extract::fusion::ReferenceStore;
use docai_extract::types::DocumentStatus;
use docai_extract::workflow::{
    run_batch, BatchSummary, Collaborators, ErrorCategory, GroundTruth, Pipeline, WorkflowEvent,
};
use docai_extract::{output, ReconcileConfig, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Command-line arguments for docai-extract
#[derive(Parser, Debug)]
#[command(name = "docai-extract")]
#[command(about = "Reconcile invoice fields from captured extraction output")]
#[command(version)]
struct Args {
    /// Capture file or directory of capture files
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (*.json) or directory for per-document results
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Config file (TOML)
    #[arg(short, long, env = "DOCAI_CONFIG")]
    config: Option<PathBuf>,

    /// Dealer master list, overrides the config file
    #[arg(long, env = "DOCAI_DEALERS")]
    dealers: Option<PathBuf>,

    /// Model master list, overrides the config file
    #[arg(long, env = "DOCAI_MODELS")]
    models: Option<PathBuf>,

    /// Documents processed concurrently, overrides the config file
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write a batch summary to this file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Labelled field values (JSON) to score the run against
    #[arg(long)]
    ground_truth: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Bootstrap config and logging
    let loaded = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load config")?;
    docai_common::logging::init(&loaded.config.logging).context("Failed to initialize logging")?;

    info!("Starting docai-extract v{}", docai_extract::ENGINE_VERSION);
    loaded.source.log();
    let toml_config = loaded.config;

    // Step 2: Engine config; invalid settings abort before any document
    let config = Arc::new(
        ReconcileConfig::from_table(&toml_config.reconcile)
            .context("Invalid [reconcile] configuration")?,
    );

    // Step 3: Reference lists, loaded once and shared read-only
    let dealers = args.dealers.unwrap_or(toml_config.dealer_master_path);
    let models = args.models.unwrap_or(toml_config.asset_master_path);
    let references = Arc::new(
        ReferenceStore::load(&dealers, &models).context("Failed to load reference lists")?,
    );

    let reconciler = Reconciler::new(config, references)?;

    // Step 4: Captured collaborator output
    let store = Arc::new(
        CaptureStore::load(&args.input)
            .with_context(|| format!("Failed to load captures from {}", args.input.display()))?,
    );
    let images = store.images();

    let ground_truth = args
        .ground_truth
        .as_deref()
        .map(|path| {
            GroundTruth::load(path)
                .with_context(|| format!("Failed to load ground truth from {}", path.display()))
        })
        .transpose()?;

    // Progress events are logged as they arrive
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let progress = tokio::spawn(async move {
        let mut done = 0usize;
        while let Some(event) = event_rx.recv().await {
            match event {
                WorkflowEvent::DocumentStarted { document_id } => {
                    debug!(document_id = %document_id, "Document started");
                }
                WorkflowEvent::DocumentCompleted {
                    document_id,
                    status,
                    latency_ms,
                } => {
                    done += 1;
                    debug!(document_id = %document_id, %status, latency_ms, done, "Document completed");
                }
            }
        }
    });

    let pipeline = Pipeline::with_events(Collaborators::from_capture(store), reconciler, event_tx);

    // Step 5: Run the batch
    let workers = args.workers.unwrap_or(toml_config.workers);
    let results = run_batch(&pipeline, images, workers).await?;
    drop(pipeline);
    progress.await.context("Progress task failed")?;

    // Step 6: Write results
    let single_file = args.output.extension().map_or(false, |ext| ext == "json");
    match (single_file, results.as_slice()) {
        (true, [only]) => output::write_document(&args.output, only)?,
        (true, _) => output::write_combined(&args.output, &results)?,
        (false, _) => {
            output::write_documents(&args.output, &results)?;
        }
    }

    let mut summary = BatchSummary::from_results(&results);
    if let Some(truth) = &ground_truth {
        summary = summary.with_ground_truth(&results, truth);
    }
    if let Some(path) = &args.summary {
        output::write_summary(path, &summary)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    info!(
        run_id = %summary.run_id,
        documents = summary.total_documents,
        pass = summary.count(DocumentStatus::Pass),
        review = summary.count(DocumentStatus::Review),
        fail = summary.count(DocumentStatus::Fail),
        flagged_fields = summary.flagged.len(),
        extraction_errors = summary.error_count(ErrorCategory::Extraction),
        detection_errors = summary.error_count(ErrorCategory::Detection),
        "Run complete"
    );

    if let Some(evaluation) = &summary.evaluation {
        info!(
            evaluated = evaluation.documents_evaluated,
            correct = evaluation.documents_correct,
            document_accuracy = evaluation.document_accuracy,
            matching_errors = evaluation.mismatches.len(),
            unlabelled = evaluation.unlabelled_documents.len(),
            "Ground truth evaluation"
        );
    }

    Ok(())
}
