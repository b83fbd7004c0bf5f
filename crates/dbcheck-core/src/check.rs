//! Load-then-reconcile pipeline.
//!
//! The two sources load concurrently on the blocking pool and share no state.
//! Reconciliation starts only after both loads succeed; the first load error
//! aborts the run.

use std::path::PathBuf;

use tracing::debug;

use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::loader::SourceLoader;
use crate::reconcile::{Outcome, Reconciler};
use crate::record::RecordSet;

/// Both loaded sources, ready for reconciliation.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub expected: RecordSet,
    pub actual: RecordSet,
}

async fn load_blocking(loader: SourceLoader) -> Result<RecordSet> {
    let kind = loader.kind();
    tokio::task::spawn_blocking(move || loader.load())
        .await
        .map_err(|e| CheckError::InternalInconsistency(format!("{kind} load task failed: {e}")))?
}

/// Load the database and the reports named by `config`.
pub async fn load_sources(config: &CheckConfig) -> Result<LoadedSources> {
    let database: PathBuf = config.database_reports_path();
    let reports: PathBuf = config.sketches_reports_path();
    debug!(database = %database.display(), reports = %reports.display(), "loading sources");

    let (expected, actual) = tokio::try_join!(
        load_blocking(SourceLoader::database(database)),
        load_blocking(SourceLoader::reports(reports)),
    )?;

    Ok(LoadedSources { expected, actual })
}

/// Run the full check: load both sources, then reconcile them.
pub async fn run_check(config: &CheckConfig) -> Result<Outcome> {
    let sources = load_sources(config).await?;
    Reconciler::new(config.policy).reconcile(&sources.expected, &sources.actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_report(path: &std::path::Path, sketch: &str, success: bool) {
        let body = format!(
            r#"{{ "boards": [{{ "board": "arduino:avr:uno", "sketches": [{{ "name": "{sketch}", "compilation_success": {success} }}] }}] }}"#
        );
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_run_check_detects_regression() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir(workspace.path().join("sketches-reports")).unwrap();
        fs::create_dir(workspace.path().join("database-reports")).unwrap();
        write_report(
            &workspace.path().join("database-reports/uno.json"),
            "Blink",
            true,
        );
        write_report(
            &workspace.path().join("sketches-reports/uno.json"),
            "Blink",
            false,
        );

        let outcome = run_check(&CheckConfig::new(workspace.path())).await.unwrap();
        assert!(outcome.ci_should_fail);
        assert_eq!(outcome.counts.regression, 1);
    }

    #[tokio::test]
    async fn test_missing_database_aborts_before_reconcile() {
        let workspace = tempfile::tempdir().unwrap();
        fs::create_dir(workspace.path().join("sketches-reports")).unwrap();

        let err = run_check(&CheckConfig::new(workspace.path()))
            .await
            .unwrap_err();
        match err {
            CheckError::SourceNotFound { path } => {
                assert!(path.ends_with("database-reports"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
