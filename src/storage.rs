//! Storage collaborator boundary.
//!
//! The kernel produces verdicts; recording them is somebody else's job.
//! This module pins down that somebody's interface — the record shape, the
//! four workflow tables, the query filters — without implementing a real
//! database. Detection never blocks on this collaborator: a `DbError` is
//! logged and the inspection proceeds.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::classify::Verdict;

/// The four inspection workflow tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordTable {
    Image,
    BulkImage,
    Capture,
    Live,
}

impl RecordTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTable::Image => "data_image",
            RecordTable::BulkImage => "data_bulk_image",
            RecordTable::Capture => "data_capture",
            RecordTable::Live => "data_live",
        }
    }
}

/// One historical inspection record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub record_type: String,
    pub vin: String,
    pub sequence: String,
    pub colour: String,
    pub bracket_state: String,
    pub washer_state: String,
    pub status: String,
    pub timestamp_s: u64,
}

impl InspectionRecord {
    /// Record skeleton for a fresh verdict; identity fields are filled in
    /// by the caller.
    pub fn for_verdict(verdict: Verdict) -> Self {
        let timestamp_s = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            record_type: String::new(),
            vin: String::new(),
            sequence: String::new(),
            colour: String::new(),
            bracket_state: String::new(),
            washer_state: String::new(),
            status: verdict.as_str().to_string(),
            timestamp_s,
        }
    }
}

/// Query filter; `None` fields match everything.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub record_type: Option<String>,
    pub vin: Option<String>,
    pub sequence: Option<String>,
    pub colour: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &InspectionRecord) -> bool {
        let field = |filter: &Option<String>, value: &str| {
            filter.as_deref().map(|f| f == value).unwrap_or(true)
        };
        field(&self.record_type, &record.record_type)
            && field(&self.vin, &record.vin)
            && field(&self.sequence, &record.sequence)
            && field(&self.colour, &record.colour)
    }
}

/// Recoverable storage failure. Surfaced, never fatal to detection.
#[derive(Debug)]
pub struct DbError {
    reason: String,
}

impl DbError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.reason)
    }
}

impl std::error::Error for DbError {}

/// The collaborator interface the kernel consumes.
pub trait InspectionStore: Send {
    fn insert(&mut self, table: RecordTable, record: InspectionRecord) -> Result<(), DbError>;

    /// Records matching the filter, in insertion order.
    fn query(
        &self,
        table: RecordTable,
        filter: &RecordFilter,
    ) -> Result<Vec<InspectionRecord>, DbError>;
}

/// In-memory store for tests and wiring.
#[derive(Default)]
pub struct InMemoryStore {
    tables: HashMap<RecordTable, Vec<InspectionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InspectionStore for InMemoryStore {
    fn insert(&mut self, table: RecordTable, record: InspectionRecord) -> Result<(), DbError> {
        self.tables.entry(table).or_default().push(record);
        Ok(())
    }

    fn query(
        &self,
        table: RecordTable,
        filter: &RecordFilter,
    ) -> Result<Vec<InspectionRecord>, DbError> {
        Ok(self
            .tables
            .get(&table)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
