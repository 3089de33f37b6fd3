use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::BandConfig;
use crate::core::HealthBand;
use crate::engine::SummaryEngine;
use crate::store::{AuditStore, ResultSource, SummaryStore};

/// Ask for an audit's summary to be (re)generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub audit_id: String,
}

/// Messages from the pipeline to whoever is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput {
    Completed {
        audit_id: String,
        overall_score: u8,
        band: HealthBand,
    },
    Failed {
        audit_id: String,
        not_found: bool,
        error: String,
    },
}

/// Run the pipeline: receive requests and summarize them one at a time, so
/// every commit goes through this single writer. Each summary runs on the
/// blocking pool and is awaited before the next request is taken.
pub async fn run_pipeline<S>(
    mut rx: mpsc::UnboundedReceiver<SummaryRequest>,
    out_tx: mpsc::UnboundedSender<PipelineOutput>,
    engine: SummaryEngine<S>,
    bands: BandConfig,
) where
    S: ResultSource + AuditStore + SummaryStore + Send + Sync + 'static,
{
    let engine = Arc::new(engine);
    let mut completed: u64 = 0;
    let mut failed: u64 = 0;

    info!("Summary pipeline started");

    while let Some(request) = rx.recv().await {
        let worker = Arc::clone(&engine);
        let audit_id = request.audit_id.clone();
        let result = tokio::task::spawn_blocking(move || worker.summarize(&audit_id)).await;

        let output = match result {
            Ok(Ok(outcome)) => {
                completed += 1;
                PipelineOutput::Completed {
                    audit_id: request.audit_id,
                    overall_score: outcome.summary.overall_score,
                    band: HealthBand::from_score(outcome.summary.overall_score, &bands),
                }
            }
            Ok(Err(e)) => {
                failed += 1;
                warn!(audit_id = %request.audit_id, "Summary request failed: {e}");
                PipelineOutput::Failed {
                    audit_id: request.audit_id,
                    not_found: e.is_not_found(),
                    error: e.to_string(),
                }
            }
            Err(join_err) => {
                failed += 1;
                error!(audit_id = %request.audit_id, "Summary task panicked: {join_err}");
                PipelineOutput::Failed {
                    audit_id: request.audit_id,
                    not_found: false,
                    error: join_err.to_string(),
                }
            }
        };

        if out_tx.send(output).is_err() {
            info!("Output channel closed, stopping pipeline");
            break;
        }
    }

    info!("Summary pipeline shutting down after {completed} completed, {failed} failed");
}
