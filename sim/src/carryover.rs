use shared::{EpochRecord, LayoutError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("carryover store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed carryover record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("carryover record has an unusable layout: {0}")]
    InvalidLayout(#[from] LayoutError),
}

/// The newest stored winner and how many epochs in a row its lineage has won
#[derive(Debug, Clone, PartialEq)]
pub struct CarryoverState {
    pub record: EpochRecord,
    pub consecutive_wins: u32,
}

/// Append-only history of epoch winners.
///
/// The engine only ever reads the newest entry (once, at startup) and appends
/// one entry per concluded epoch. Errors are reported, never fatal: the
/// controller treats a failed read as "no prior winner".
pub trait CarryoverStore: Send + Sync {
    fn latest(&self) -> Result<Option<CarryoverState>, RecordError>;

    fn append(&mut self, record: &EpochRecord) -> Result<(), RecordError>;
}

/// Number of records at the end of `history` sharing the last record's lineage
pub fn trailing_wins(history: &[EpochRecord]) -> u32 {
    let Some(last) = history.last() else {
        return 0;
    };
    let run = history
        .iter()
        .rev()
        .take_while(|record| record.lineage == last.lineage)
        .count();
    u32::try_from(run).unwrap_or(u32::MAX)
}

/// Build the carryover state from a full history, newest last
pub fn state_from_history(history: &[EpochRecord]) -> Result<Option<CarryoverState>, RecordError> {
    let Some(last) = history.last() else {
        return Ok(None);
    };
    last.layout.validate()?;
    Ok(Some(CarryoverState {
        record: last.clone(),
        consecutive_wins: trailing_wins(history),
    }))
}

/// Keeps records in memory only; history is lost with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<EpochRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<EpochRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }
}

impl CarryoverStore for MemoryStore {
    fn latest(&self) -> Result<Option<CarryoverState>, RecordError> {
        state_from_history(&self.records)
    }

    fn append(&mut self, record: &EpochRecord) -> Result<(), RecordError> {
        self.records.push(record.clone());
        Ok(())
    }
}
