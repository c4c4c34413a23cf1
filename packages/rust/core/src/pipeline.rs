//! Batch enrichment: homepage → summary → sales opportunity → outreach email.
//!
//! For every record not yet attempted, the pipeline fetches the homepage and,
//! when that succeeds, drives the three chained completions. Each record's
//! outcome is computed in full and only then written back to the record, by
//! index, so an aborted run never leaves a half-written row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use prospector_crawler::{ContentFetcher, FetchFailure, FetchOutcome};
use prospector_shared::{
    ExhaustedPolicy, Field, PipelineOptions, ProspectorError, RecordState, Result, Stage,
    TargetRecord,
};

use crate::completion::{Completer, CompletionError};
use crate::prompts::{render_email_prompt, render_opportunity_prompt, render_summary_prompt};

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for pipeline runs.
pub trait PipelineProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a record's outcome has been written back.
    fn record_done(&self, current: usize, total: usize, url: &str, state: RecordState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_done(&self, _current: usize, _total: usize, _url: &str, _state: RecordState) {}
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Counts for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Records in the batch.
    pub total: usize,
    /// Records left alone because they were already attempted.
    pub skipped: usize,
    /// Records that reached the final stage.
    pub enriched: usize,
    /// Records whose homepage could not be fetched.
    pub unresolved: usize,
    /// Records that stopped at an exhausted stage (isolate policy).
    pub partial: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            total,
            skipped: 0,
            enriched: 0,
            unresolved: 0,
            partial: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Records processed (not skipped) in this run.
    pub fn processed(&self) -> usize {
        self.enriched + self.unresolved + self.partial
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

// ---------------------------------------------------------------------------
// Per-record outcome
// ---------------------------------------------------------------------------

/// Everything one record's pass produced, before it is written back.
#[derive(Debug)]
enum RecordOutcome {
    /// The homepage could not be used.
    Unresolved(FetchFailure),
    /// All three stages completed.
    Enriched {
        content: String,
        summary: String,
        opportunity: String,
        email: String,
    },
    /// `stage` exhausted its retries; `completed` holds the earlier stage outputs.
    Exhausted {
        content: String,
        completed: Vec<String>,
        stage: Stage,
        error: CompletionError,
    },
}

/// Fetch and run the prompt chain for a single URL.
#[instrument(skip(fetcher, completer))]
async fn enrich_record(
    fetcher: &dyn ContentFetcher,
    completer: &dyn Completer,
    url: &str,
) -> RecordOutcome {
    let content = match fetcher.fetch(url).await {
        FetchOutcome::Content(text) => text,
        FetchOutcome::Failed(failure) => return RecordOutcome::Unresolved(failure),
    };

    let summary = match completer.complete(&render_summary_prompt(&content)).await {
        Ok(text) => text,
        Err(error) => {
            return RecordOutcome::Exhausted {
                content,
                completed: Vec::new(),
                stage: Stage::Summary,
                error,
            };
        }
    };

    let opportunity = match completer.complete(&render_opportunity_prompt(&summary)).await {
        Ok(text) => text,
        Err(error) => {
            return RecordOutcome::Exhausted {
                content,
                completed: vec![summary],
                stage: Stage::Opportunity,
                error,
            };
        }
    };

    let email = match completer
        .complete(&render_email_prompt(&summary, &opportunity))
        .await
    {
        Ok(text) => text,
        Err(error) => {
            return RecordOutcome::Exhausted {
                content,
                completed: vec![summary, opportunity],
                stage: Stage::Email,
                error,
            };
        }
    };

    RecordOutcome::Enriched {
        content,
        summary,
        opportunity,
        email,
    }
}

// ---------------------------------------------------------------------------
// EnrichmentPipeline
// ---------------------------------------------------------------------------

/// Orchestrates fetching and the three-stage prompt chain over a batch.
pub struct EnrichmentPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    completer: Arc<dyn Completer>,
    options: PipelineOptions,
}

impl EnrichmentPipeline {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        completer: Arc<dyn Completer>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            completer,
            options,
        }
    }

    /// Enrich every record whose content has not been attempted yet.
    ///
    /// Records are mutated in place. With the abort policy, an exhausted
    /// stage stops the run and returns [`ProspectorError::RetriesExhausted`];
    /// records finished before that point keep their results.
    #[instrument(skip_all, fields(records = records.len(), concurrency = self.options.concurrency))]
    pub async fn run(
        &self,
        records: &mut [TargetRecord],
        progress: &dyn PipelineProgress,
    ) -> Result<RunReport> {
        let mut report = RunReport::new(records.len());

        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_attempted())
            .map(|(index, _)| index)
            .collect();
        report.skipped = records.len() - pending.len();

        if report.skipped > 0 {
            info!(skipped = report.skipped, "skipping records that were already attempted");
        }

        progress.phase("Enriching records");
        if self.options.concurrency <= 1 {
            self.run_sequential(records, &pending, &mut report, progress)
                .await?;
        } else {
            self.run_concurrent(records, &pending, &mut report, progress)
                .await?;
        }

        report.finished_at = Utc::now();
        info!(
            total = report.total,
            skipped = report.skipped,
            enriched = report.enriched,
            unresolved = report.unresolved,
            partial = report.partial,
            elapsed_ms = report.elapsed().num_milliseconds(),
            "enrichment run complete"
        );

        Ok(report)
    }

    async fn run_sequential(
        &self,
        records: &mut [TargetRecord],
        pending: &[usize],
        report: &mut RunReport,
        progress: &dyn PipelineProgress,
    ) -> Result<()> {
        for (done, &index) in pending.iter().enumerate() {
            let url = records[index].website_url.clone();
            let outcome =
                enrich_record(self.fetcher.as_ref(), self.completer.as_ref(), &url).await;

            let record = &mut records[index];
            self.apply(record, outcome, report)?;
            progress.record_done(done + 1, pending.len(), &url, record.state());
        }
        Ok(())
    }

    async fn run_concurrent(
        &self,
        records: &mut [TargetRecord],
        pending: &[usize],
        report: &mut RunReport,
        progress: &dyn PipelineProgress,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut tasks = JoinSet::new();

        for &index in pending {
            let url = records[index].website_url.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let completer = Arc::clone(&self.completer);
            let sem = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore closed");
                let outcome = enrich_record(fetcher.as_ref(), completer.as_ref(), &url).await;
                (index, outcome)
            });
        }

        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    // The record stays untried and is picked up by the next run.
                    warn!(error = %e, "record task failed");
                    continue;
                }
            };

            let record = &mut records[index];
            if let Err(e) = self.apply(record, outcome, report) {
                tasks.abort_all();
                return Err(e);
            }

            done += 1;
            progress.record_done(done, pending.len(), &record.website_url, record.state());
        }
        Ok(())
    }

    /// Write one record's outcome back, honouring the exhausted-retries policy.
    fn apply(
        &self,
        record: &mut TargetRecord,
        outcome: RecordOutcome,
        report: &mut RunReport,
    ) -> Result<()> {
        match outcome {
            RecordOutcome::Unresolved(failure) => {
                debug!(url = %record.website_url, reason = %failure, "marking record unresolved");
                record.mark_unresolved();
                report.unresolved += 1;
            }
            RecordOutcome::Enriched {
                content,
                summary,
                opportunity,
                email,
            } => {
                record.raw_content = Field::Text(content);
                record.summary = Field::Text(summary);
                record.sales_opportunity = Field::Text(opportunity);
                record.outreach_email = Field::Text(email);
                report.enriched += 1;
            }
            RecordOutcome::Exhausted {
                content,
                completed,
                stage,
                error,
            } => match self.options.on_exhausted {
                ExhaustedPolicy::Abort => {
                    warn!(url = %record.website_url, %stage, error = %error, "aborting run");
                    return Err(ProspectorError::RetriesExhausted {
                        url: record.website_url.clone(),
                        stage: stage.column().to_string(),
                        attempts: error.attempts(),
                    });
                }
                ExhaustedPolicy::Isolate => {
                    warn!(
                        url = %record.website_url,
                        %stage,
                        error = %error,
                        "stage exhausted its retries, keeping earlier stages"
                    );
                    record.raw_content = Field::Text(content);
                    let mut completed = completed.into_iter();
                    for stage in Stage::ALL {
                        *record.stage_field_mut(stage) = match completed.next() {
                            Some(text) => Field::Text(text),
                            None => Field::Unresolved,
                        };
                    }
                    report.partial += 1;
                }
            },
        }
        Ok(())
    }
}
