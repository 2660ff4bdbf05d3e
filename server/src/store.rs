use shared::EpochRecord;
use sim::carryover::{state_from_history, CarryoverState, CarryoverStore, RecordError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Carryover history kept as one JSON object per line, oldest first
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the file. A missing file is an empty history.
    pub fn load_all(&self) -> Result<Vec<EpochRecord>, RecordError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|err| RecordError::Malformed {
                line: i + 1,
                reason: err.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl CarryoverStore for JsonLinesStore {
    fn latest(&self) -> Result<Option<CarryoverState>, RecordError> {
        state_from_history(&self.load_all()?)
    }

    fn append(&mut self, record: &EpochRecord) -> Result<(), RecordError> {
        let line = serde_json::to_string(record).map_err(io::Error::from)?;
        // A record after an unterminated last line would be glued onto it
        let separator = if ends_mid_line(&self.path)? { "\n" } else { "" };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}{}", separator, line)?;
        tracing::info!(
            "Recorded lineage {} winner in {}",
            record.lineage,
            self.path.display()
        );
        Ok(())
    }
}

/// Whether the file is non-empty and its last byte is not a newline
fn ends_mid_line(path: &Path) -> io::Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
