// src/jobs/worker.rs
// Job handlers. Watermarks advance here, after clean success, never in the
// coordinator - a failed job leaves the window to be retried on the next
// turn.

use std::sync::Arc;
use tracing::info;

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::graph::KnowledgeGraphClient;
use crate::jobs::{ExtractionJob, Job, SummaryJob};
use crate::llm::Embedder;
use crate::memory::{Consolidator, FactExtractor};
use crate::pipeline::Summarizer;
use crate::session::SessionStore;

/// Everything a worker needs, wired once at process start.
pub struct WorkerContext {
    pub sessions: Arc<SessionStore>,
    pub embedder: Arc<dyn Embedder>,
    pub extractor: FactExtractor,
    pub consolidator: Consolidator,
    pub summarizer: Summarizer,
    pub graph: Option<KnowledgeGraphClient>,
    pub memory: MemoryConfig,
}

pub async fn handle(ctx: &WorkerContext, job: &Job) -> Result<()> {
    match job {
        Job::Extraction(job) => run_extraction(ctx, job).await,
        Job::Summary(job) => run_summary(ctx, job).await,
    }
}

/// Extract facts from the window, consolidate them into the store and
/// advance the memory watermark. Replays are harmless: consolidation drops
/// duplicates and the watermark advance is a monotonic max.
pub async fn run_extraction(ctx: &WorkerContext, job: &ExtractionJob) -> Result<()> {
    info!(
        user_id = %job.user_id,
        session_id = %job.session_id,
        window = job.window.len(),
        "processing extraction job"
    );

    let facts = ctx.extractor.extract(&job.window).await?;
    if facts.is_empty() {
        info!(session_id = %job.session_id, "no facts extracted");
    } else {
        ctx.consolidator.process(&job.user_id, facts).await?;
    }

    ctx.sessions
        .advance_memory_watermark(&job.session_id, job.target_watermark)
        .await?;

    // Sidecar save is best-effort; the client logs and swallows failures.
    if let Some(ref graph) = ctx.graph {
        graph
            .save_personal_memory(&job.window, &job.user_id, &job.session_id)
            .await;
    }

    Ok(())
}

/// Generate a replacement summary over the recent window, embed it and store
/// it atomically with the watermark advance.
pub async fn run_summary(ctx: &WorkerContext, job: &SummaryJob) -> Result<()> {
    info!(session_id = %job.session_id, "processing summary job");

    let session = ctx.sessions.get(&job.session_id).await?;
    let recent = ctx
        .sessions
        .recent_messages(&job.session_id, ctx.memory.message_limit)
        .await?;

    let summary = ctx
        .summarizer
        .generate(session.summary.as_deref(), &recent)
        .await?;
    let vector = ctx.embedder.embed(&summary).await?;

    ctx.sessions
        .advance_summary_watermark(&job.session_id, job.target_watermark, &summary, &vector)
        .await?;

    Ok(())
}
