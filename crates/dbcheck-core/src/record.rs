//! Record model: one (sketch, board) compilation outcome.
//!
//! The same type represents both the actual compilation reports and the
//! expected-results database. A [`RecordSet`] enforces key uniqueness within
//! one loaded source.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, RecordError, Result};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Whether a sketch compiled for a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Skip => "skip",
        }
    }

    /// Map the report's `compilation_success` flag onto a status.
    pub fn from_success(success: bool) -> Self {
        if success {
            Status::Pass
        } else {
            Status::Fail
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = RecordError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(Status::Pass),
            "fail" => Ok(Status::Fail),
            "skip" => Ok(Status::Skip),
            _ => Err(RecordError::UnknownStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Join key for reconciliation. Orders by sketch first, then board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub sketch_id: String,
    pub board_id: String,
}

impl RecordKey {
    pub fn new(sketch_id: impl Into<String>, board_id: impl Into<String>) -> Self {
        Self {
            sketch_id: sketch_id.into(),
            board_id: board_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.sketch_id, self.board_id)
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Memory usage figures for one named size (e.g. `flash`).
///
/// Reports use `"N/A"` when a figure is unavailable; that becomes `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMetric {
    pub absolute: Option<u64>,
    pub maximum: Option<u64>,
}

/// Size metrics keyed by size name. Carried through for reporting only.
pub type Metadata = BTreeMap<String, SizeMetric>;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One compilation data point. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    sketch_id: String,
    board_id: String,
    status: Status,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: Metadata,
}

impl Record {
    /// Build a record, rejecting blank identifiers.
    ///
    /// Identifiers are stored trimmed so that padded ids join with their
    /// unpadded counterparts.
    pub fn new(
        sketch_id: impl Into<String>,
        board_id: impl Into<String>,
        status: Status,
        metadata: Metadata,
    ) -> std::result::Result<Self, RecordError> {
        let sketch_id = sketch_id.into();
        let board_id = board_id.into();
        let sketch_id = sketch_id.trim();
        let board_id = board_id.trim();

        if sketch_id.is_empty() {
            return Err(RecordError::EmptySketchId);
        }
        if board_id.is_empty() {
            return Err(RecordError::EmptyBoardId);
        }

        Ok(Self {
            sketch_id: sketch_id.to_string(),
            board_id: board_id.to_string(),
            status,
            metadata,
        })
    }

    /// Build a record from a textual status such as `"pass"`.
    pub fn parse(
        sketch_id: impl Into<String>,
        board_id: impl Into<String>,
        status: &str,
        metadata: Metadata,
    ) -> std::result::Result<Self, RecordError> {
        let status = status.parse::<Status>()?;
        Self::new(sketch_id, board_id, status, metadata)
    }

    pub fn sketch_id(&self) -> &str {
        &self.sketch_id
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.sketch_id.clone(), self.board_id.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordSet
// ---------------------------------------------------------------------------

/// A loaded collection of records with unique keys.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: BTreeMap<RecordKey, Record>,
    origins: BTreeMap<RecordKey, PathBuf>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record read from `origin`.
    ///
    /// Returns `CheckError::DuplicateKey` when the key is already present.
    pub fn insert(&mut self, record: Record, origin: &Path) -> Result<()> {
        let key = record.key();
        if let Some(first) = self.origins.get(&key) {
            return Err(CheckError::DuplicateKey {
                key,
                first: first.clone(),
                second: origin.to_path_buf(),
            });
        }
        self.origins.insert(key.clone(), origin.to_path_buf());
        self.records.insert(key, record);
        Ok(())
    }

    /// Build a set from in-memory records, e.g. for tests or embedding.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut set = Self::new();
        for record in records {
            set.insert(record, Path::new("<memory>"))?;
        }
        Ok(set)
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn origin(&self, key: &RecordKey) -> Option<&Path> {
        self.origins.get(key).map(PathBuf::as_path)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    /// Keys in ascending (sketch, board) order.
    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
