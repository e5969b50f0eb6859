//! Check-in history persistence seam.

use crate::error::{Result, ValidationError};
use crate::record::CheckInRecord;

/// Append-only check-in log, newest first.
pub trait HistoryStore {
    /// All records, newest first.
    fn load(&self) -> Result<Vec<CheckInRecord>>;

    /// Prepend a record. Ids must be unique.
    fn append(&mut self, record: CheckInRecord) -> Result<()>;

    /// Remove one record. Returns whether it existed.
    fn delete_by_id(&mut self, id: &str) -> Result<bool>;

    /// Remove everything. Returns how many records were removed.
    fn clear(&mut self) -> Result<usize>;
}

/// Volatile store for tests and embedders that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: Vec<CheckInRecord>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing newest-first log.
    pub fn from_records(records: Vec<CheckInRecord>) -> Self {
        Self { records }
    }
}

impl HistoryStore for MemoryHistory {
    fn load(&self) -> Result<Vec<CheckInRecord>> {
        Ok(self.records.clone())
    }

    fn append(&mut self, record: CheckInRecord) -> Result<()> {
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(duplicate_id(&record.id).into());
        }
        self.records.insert(0, record);
        Ok(())
    }

    fn delete_by_id(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        Ok(self.records.len() != before)
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self.records.len();
        self.records.clear();
        Ok(removed)
    }
}

pub(crate) fn duplicate_id(id: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: "id".to_string(),
        message: format!("a check-in with id {id} already exists"),
    }
}
