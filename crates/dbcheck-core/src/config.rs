//! Immutable configuration for one database check invocation.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::reconcile::ClassificationPolicy;
use crate::telemetry;

/// Default location of the extracted sketch reports artifact.
pub const DEFAULT_SKETCHES_REPORTS_SOURCE: &str = "sketches-reports";

/// Default location of the expected-results database.
pub const DEFAULT_DATABASE_REPORTS_SOURCE: &str = "database-reports";

/// An opaque credential handed to collaborators. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    /// Reveal the secret to the collaborator that needs it.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Configuration shared by the loaders, the reconciler and the reporter.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Controls log detail only; classification is unaffected.
    pub verbose: bool,
    /// Base directory for relative source paths.
    pub workspace: PathBuf,
    pub sketches_reports_source: PathBuf,
    pub database_reports_source: PathBuf,
    pub policy: ClassificationPolicy,
    /// Where to write the machine-readable summary, if anywhere.
    pub summary_json: Option<PathBuf>,
    pub github_token: Option<Credential>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            workspace: PathBuf::from("."),
            sketches_reports_source: PathBuf::from(DEFAULT_SKETCHES_REPORTS_SOURCE),
            database_reports_source: PathBuf::from(DEFAULT_DATABASE_REPORTS_SOURCE),
            policy: ClassificationPolicy::default(),
            summary_json: None,
            github_token: None,
        }
    }
}

impl CheckConfig {
    /// Create a config rooted at `workspace` with default source names.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    pub fn with_sketches_reports_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sketches_reports_source = path.into();
        self
    }

    pub fn with_database_reports_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_reports_source = path.into();
        self
    }

    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_summary_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_json = Some(path.into());
        self
    }

    pub fn with_github_token(mut self, token: Credential) -> Self {
        self.github_token = Some(token);
        self
    }

    /// Default log level: `DEBUG` when verbose, `WARN` otherwise.
    pub fn log_level(&self) -> tracing::Level {
        telemetry::level_for(self.verbose)
    }

    /// Sketch reports path, resolved against the workspace.
    pub fn sketches_reports_path(&self) -> PathBuf {
        resolve(&self.workspace, &self.sketches_reports_source)
    }

    /// Database path, resolved against the workspace.
    pub fn database_reports_path(&self) -> PathBuf {
        resolve(&self.workspace, &self.database_reports_source)
    }
}

fn resolve(workspace: &Path, source: &Path) -> PathBuf {
    if source.is_absolute() {
        source.to_path_buf()
    } else {
        workspace.join(source)
    }
}
