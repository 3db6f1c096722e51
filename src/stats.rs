use crate::source::Table;
use std::fmt;

/// The three load phases, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Films,
    Artists,
    Relationships,
}

impl Phase {
    pub fn table(self) -> Table {
        match self {
            Phase::Films => Table::Films,
            Phase::Artists => Table::Artists,
            Phase::Relationships => Table::Credits,
        }
    }

    pub fn progress_label(self) -> &'static str {
        match self {
            Phase::Films => "film records",
            Phase::Artists => "artist records",
            Phase::Relationships => "relationships",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Films => "films",
            Phase::Artists => "artists",
            Phase::Relationships => "relationships",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bulk call that failed; the phase moved on to the next batch.
#[derive(Debug)]
pub struct BatchFailure {
    pub phase: Phase,
    /// 1-based batch number within the phase
    pub batch: u64,
    pub rows: u64,
    pub error: anyhow::Error,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batch {} ({} rows): {:#}",
            self.phase, self.batch, self.rows, self.error
        )
    }
}

/// Counters for one phase.
#[derive(Debug)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Source row count taken at phase start
    pub total: u64,
    pub rows_read: u64,
    /// Rows in batches whose bulk calls all succeeded
    pub exported: u64,
    /// Nodes or relationships submitted in successful bulk calls
    pub written: u64,
    /// Credit rows with a category outside the vocabulary
    pub dropped: u64,
    /// Rows that could not be decoded
    pub skipped: u64,
    pub batches: u64,
    pub failures: Vec<BatchFailure>,
}

impl PhaseReport {
    pub fn new(phase: Phase, total: u64) -> Self {
        Self {
            phase,
            total,
            rows_read: 0,
            exported: 0,
            written: 0,
            dropped: 0,
            skipped: 0,
            batches: 0,
            failures: Vec::new(),
        }
    }

    pub fn failed_batches(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
}

impl RunReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.phases.iter().flat_map(|p| p.failures.iter())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn rows_read(&self) -> u64 {
        self.phases.iter().map(|p| p.rows_read).sum()
    }
}
