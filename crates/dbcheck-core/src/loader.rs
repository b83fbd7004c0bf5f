//! Report and database loaders.
//!
//! Both sources share the sketch compilation report format. A source is a
//! single JSON file or a directory walked recursively in sorted order. Any
//! malformed entry aborts the whole load.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CheckError, Result};
use crate::obs;
use crate::record::{Metadata, Record, RecordSet, SizeMetric, Status};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReportDocument {
    boards: Option<Vec<BoardReport>>,
}

#[derive(Debug, Deserialize)]
struct BoardReport {
    #[serde(default)]
    board: String,
    #[serde(default)]
    sketches: Vec<SketchReport>,
}

#[derive(Debug, Deserialize)]
struct SketchReport {
    #[serde(default)]
    name: String,
    status: Option<String>,
    compilation_success: Option<SuccessFlag>,
    #[serde(default)]
    sizes: Vec<SizeReport>,
}

/// Reports write a JSON boolean; hand-authored databases often use `"true"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuccessFlag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct SizeReport {
    name: Option<String>,
    maximum: Option<Value>,
    current: Option<SizeValue>,
}

#[derive(Debug, Deserialize)]
struct SizeValue {
    absolute: Option<Value>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Which side of the reconciliation a source feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Actual compilation reports from the current run.
    Reports,
    /// Expected-results database.
    Database,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Reports => f.write_str("reports"),
            SourceKind::Database => f.write_str("database"),
        }
    }
}

/// Loads one record source from the filesystem. Read-only.
#[derive(Debug, Clone)]
pub struct SourceLoader {
    kind: SourceKind,
    path: PathBuf,
}

impl SourceLoader {
    /// Loader for the actual compilation reports.
    pub fn reports(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::Reports,
            path: path.into(),
        }
    }

    /// Loader for the expected-results database.
    pub fn database(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::Database,
            path: path.into(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record in the source.
    ///
    /// Fails with `SourceNotFound` when the path is missing, `MalformedRecord`
    /// on the first unparseable entry and `DuplicateKey` when two entries
    /// share a (sketch, board) key.
    pub fn load(&self) -> Result<RecordSet> {
        let label = self.kind.to_string();
        obs::emit_load_started(&label, &self.path);

        if !self.path.exists() {
            return Err(CheckError::SourceNotFound {
                path: self.path.clone(),
            });
        }

        let files = if self.path.is_dir() {
            let mut files = Vec::new();
            collect_json_files(&self.path, &mut files)?;
            files
        } else {
            vec![self.path.clone()]
        };

        let mut set = RecordSet::new();
        for file in &files {
            load_file(file, &mut set)?;
        }

        if set.is_empty() {
            warn!(source = %label, path = %self.path.display(), "no compilation records found");
        }
        obs::emit_load_completed(&label, &self.path, files.len(), set.len());
        Ok(set)
    }
}

/// Load the actual compilation reports at `path`.
pub fn load_reports(path: &Path) -> Result<RecordSet> {
    SourceLoader::reports(path).load()
}

/// Load the expected-results database at `path`.
pub fn load_database(path: &Path) -> Result<RecordSet> {
    SourceLoader::database(path).load()
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| CheckError::io(dir, e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| CheckError::io(dir, e))?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| CheckError::io(&path, e))?;

        // Symlinked directories are not followed; a link cycle would never end.
        if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "ignoring symlinked directory");
        } else if file_type.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        } else {
            debug!(path = %path.display(), "ignoring non-JSON file");
        }
    }
    Ok(())
}

fn load_file(path: &Path, set: &mut RecordSet) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| CheckError::io(path, e))?;
    let records = parse_report(&content).map_err(|reason| CheckError::malformed(path, reason))?;

    debug!(path = %path.display(), records = records.len(), "parsed report file");
    for record in records {
        set.insert(record, path)?;
    }
    Ok(())
}

/// Parse the content of one report file into records.
///
/// Returns a human-readable reason on failure; the caller attaches the path.
pub fn parse_report(content: &str) -> std::result::Result<Vec<Record>, String> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| format!("invalid report JSON: {e}"))?;
    let documents = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value::<ReportDocument>)
            .collect::<std::result::Result<Vec<_>, _>>(),
        other => serde_json::from_value::<ReportDocument>(other).map(|d| vec![d]),
    }
    .map_err(|e| format!("unexpected report structure: {e}"))?;

    let mut records = Vec::new();
    for document in documents {
        let boards = document
            .boards
            .ok_or_else(|| "report has no `boards` array (legacy report format)".to_string())?;

        for board in boards {
            for sketch in board.sketches {
                let status = sketch_status(&sketch)
                    .map_err(|reason| format!("sketch {:?}: {reason}", sketch.name))?;
                let metadata = sketch_metadata(&sketch.sizes);
                let record = Record::new(sketch.name.clone(), board.board.clone(), status, metadata)
                    .map_err(|e| format!("sketch {:?} on board {:?}: {e}", sketch.name, board.board))?;
                records.push(record);
            }
        }
    }
    Ok(records)
}

fn sketch_status(sketch: &SketchReport) -> std::result::Result<Status, String> {
    let explicit = sketch
        .status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()
        .map_err(|e| e.to_string())?;

    let flagged = match &sketch.compilation_success {
        None => None,
        Some(SuccessFlag::Bool(success)) => Some(Status::from_success(*success)),
        Some(SuccessFlag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Status::Pass),
            "false" => Some(Status::Fail),
            _ => return Err(format!("unrecognized compilation_success value {text:?}")),
        },
    };

    match (explicit, flagged) {
        (Some(status), None) | (None, Some(status)) => Ok(status),
        (Some(status), Some(flag)) if status == flag => Ok(status),
        (Some(status), Some(flag)) => Err(format!(
            "status {status} contradicts compilation_success ({flag})"
        )),
        (None, None) => Err("missing status and compilation_success".to_string()),
    }
}

fn sketch_metadata(sizes: &[SizeReport]) -> Metadata {
    sizes
        .iter()
        .filter_map(|size| {
            let name = size.name.clone()?;
            let metric = SizeMetric {
                absolute: size
                    .current
                    .as_ref()
                    .and_then(|c| c.absolute.as_ref())
                    .and_then(Value::as_u64),
                maximum: size.maximum.as_ref().and_then(Value::as_u64),
            };
            Some((name, metric))
        })
        .collect()
}
