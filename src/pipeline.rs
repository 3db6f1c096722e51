//! Full-refresh export: clear the graph, then load films, artists and credits
//! page by page.
//!
//! Each phase alternates strictly between fetching one page from the source and
//! writing it with one bulk call (one per relationship type for credits). A
//! failed bulk call is recorded as a [`BatchFailure`] and the phase carries on
//! with the next page; source and connection errors abort the run.

use crate::config::BATCH_SIZE;
use crate::graph::GraphSink;
use crate::models::{NodeKey, NodeLabel, SourceRow};
use crate::progress::{make_spinner, ProgressReporter};
use crate::source::{PageReader, RelationalSource};
use crate::stats::{BatchFailure, Phase, PhaseReport, RunReport};
use crate::transform::{self, NodeBatch};
use anyhow::{Context, Result};
use std::io::{self, Write};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub page_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_size: BATCH_SIZE,
        }
    }
}

pub struct Pipeline<S, G, W = io::Stdout> {
    source: S,
    sink: G,
    options: PipelineOptions,
    out: W,
}

impl<S, G> Pipeline<S, G>
where
    S: RelationalSource,
    G: GraphSink,
{
    /// Progress lines go to stdout.
    pub fn new(source: S, sink: G, options: PipelineOptions) -> Self {
        Self::with_output(source, sink, options, io::stdout())
    }
}

impl<S, G, W> Pipeline<S, G, W>
where
    S: RelationalSource,
    G: GraphSink,
    W: Write,
{
    pub fn with_output(source: S, sink: G, options: PipelineOptions, out: W) -> Self {
        Self {
            source,
            sink,
            options,
            out,
        }
    }

    pub fn sink(&self) -> &G {
        &self.sink
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_parts(self) -> (S, G, W) {
        (self.source, self.sink, self.out)
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let pb = make_spinner("Deleting existing nodes and relationships ...");
        self.sink
            .clear()
            .await
            .context("Failed to delete existing nodes and relationships")?;
        pb.finish_with_message("Existing nodes and relationships deleted.");

        self.ensure_indexes().await;

        let mut report = RunReport::default();
        report.phases.push(
            self.load_nodes(Phase::Films, NodeLabel::Film, transform::film_nodes)
                .await?,
        );
        report.phases.push(
            self.load_nodes(Phase::Artists, NodeLabel::Artist, transform::artist_nodes)
                .await?,
        );
        report.phases.push(self.load_relationships().await?);

        Ok(report)
    }

    /// Index failures only slow down endpoint matching, so they are not fatal.
    async fn ensure_indexes(&mut self) {
        let pb = make_spinner("Creating key indexes ...");
        for label in [NodeLabel::Film, NodeLabel::Artist] {
            if let Err(e) = self.sink.ensure_key_index(label).await {
                warn!(%label, error = %format!("{e:#}"), "Failed to create key index");
            }
        }
        pb.finish_with_message("Key indexes ready.");
    }

    async fn load_nodes(
        &mut self,
        phase: Phase,
        label: NodeLabel,
        to_nodes: fn(&[SourceRow]) -> NodeBatch,
    ) -> Result<PhaseReport> {
        let table = phase.table();
        let total = self
            .source
            .count(table)
            .await
            .with_context(|| format!("Failed to count rows of {table}"))?;
        info!(%phase, total, "Starting phase");

        let mut report = PhaseReport::new(phase, total);
        let mut progress = ProgressReporter::new(&mut self.out, phase.progress_label(), total);
        let mut pages = self
            .source
            .open(table, self.options.page_size)
            .await
            .with_context(|| format!("Failed to read {table}"))?;

        while let Some(rows) = pages.next_page().await? {
            report.batches += 1;
            let page_rows = rows.len() as u64;
            report.rows_read += page_rows;

            let batch = to_nodes(&rows);
            report.skipped += batch.skipped;

            match self.sink.create_nodes(label, &batch.records).await {
                Ok(()) => {
                    report.exported += page_rows;
                    report.written += batch.records.len() as u64;
                    progress.record(page_rows);
                }
                Err(e) => {
                    record_failure(&mut report, page_rows, e);
                    progress.report();
                }
            }
        }
        progress.finish();

        info!(
            %phase,
            exported = report.exported,
            skipped = report.skipped,
            failed = report.failed_batches(),
            "Phase complete"
        );
        Ok(report)
    }

    async fn load_relationships(&mut self) -> Result<PhaseReport> {
        let phase = Phase::Relationships;
        let table = phase.table();
        let start = NodeKey::of(NodeLabel::Artist);
        let end = NodeKey::of(NodeLabel::Film);

        let total = self
            .source
            .count(table)
            .await
            .with_context(|| format!("Failed to count rows of {table}"))?;
        info!(%phase, total, "Starting phase");

        let mut report = PhaseReport::new(phase, total);
        let mut progress = ProgressReporter::new(&mut self.out, phase.progress_label(), total);
        let mut pages = self
            .source
            .open(table, self.options.page_size)
            .await
            .with_context(|| format!("Failed to read {table}"))?;

        while let Some(rows) = pages.next_page().await? {
            report.batches += 1;
            let page_rows = rows.len() as u64;
            report.rows_read += page_rows;

            let grouped = transform::group_credits(&rows);
            report.dropped += grouped.dropped;
            report.skipped += grouped.skipped;

            // Every type is attempted even after one fails.
            let mut page_failed = false;
            for (kind, rels) in grouped.non_empty() {
                match self
                    .sink
                    .create_relationships(kind.rel_type(), start, end, rels)
                    .await
                {
                    Ok(()) => report.written += rels.len() as u64,
                    Err(e) => {
                        page_failed = true;
                        record_failure(&mut report, rels.len() as u64, e);
                    }
                }
            }

            if page_failed {
                progress.report();
            } else {
                report.exported += page_rows;
                progress.record(page_rows);
            }
        }
        progress.finish();

        info!(
            %phase,
            exported = report.exported,
            relationships = report.written,
            dropped = report.dropped,
            failed = report.failed_batches(),
            "Phase complete"
        );
        Ok(report)
    }
}

fn record_failure(report: &mut PhaseReport, rows: u64, error: anyhow::Error) {
    let failure = BatchFailure {
        phase: report.phase,
        batch: report.batches,
        rows,
        error,
    };
    error!(
        phase = %failure.phase,
        batch = failure.batch,
        rows = failure.rows,
        error = %format!("{:#}", failure.error),
        "Bulk write failed, continuing with next batch"
    );
    eprintln!("    FAILED: {failure}");
    report.failures.push(failure);
}
