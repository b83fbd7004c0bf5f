//! dbcheck - Compilation results database check
//!
//! The `dbcheck` command compares the sketch compilation reports of the
//! current CI run against a database of expected results and fails the job
//! only when a sketch that is expected to compile no longer does.
//!
//! Every option can also be set through the environment variables that
//! GitHub Actions provides to a step (`INPUT_*`, `GITHUB_*`).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{debug, warn};

use dbcheck_core::{
    init_tracing, run_check, write_summary_json, CheckConfig, CheckSpan, ClassificationPolicy,
    Credential, Reporter, SkipPolicy, DEFAULT_DATABASE_REPORTS_SOURCE,
    DEFAULT_SKETCHES_REPORTS_SOURCE, VERSION,
};
use dbcheck_github::{pull_request_from_event_file, GithubClient, GithubConfig, DEFAULT_API_URL};

#[derive(Parser, Debug)]
#[command(name = "dbcheck")]
#[command(author = "Stevedores Org")]
#[command(version = VERSION)]
#[command(
    about = "Check sketch compilation results against the expected results database",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    ///
    /// From the environment, anything but an empty value, `false`, `no`,
    /// `off`, `n`, `f` or `0` enables it.
    #[arg(
        short,
        long,
        env = "INPUT_VERBOSE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Report file or folder produced by the current run
    /// [default: sketches-reports]
    #[arg(long, env = "INPUT_SKETCHES-REPORTS-SOURCE")]
    sketches_reports_source: Option<String>,

    /// Report file or folder holding the expected results
    /// [default: database-reports]
    #[arg(long, env = "INPUT_DATABASE-REPORTS-SOURCE")]
    database_reports_source: Option<String>,

    /// Token used to comment on the pull request
    #[arg(long, env = "INPUT_GITHUB-TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Base directory for relative source paths
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Repository in owner/name form
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Workflow event payload, used to find the pull request number
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Pull request to comment on (overrides the event payload)
    #[arg(long)]
    pull_request: Option<u64>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,

    /// How a skipped build is judged when the database expects it to pass
    #[arg(long, value_enum, default_value_t = SkipPolicyArg::Regression)]
    skip_policy: SkipPolicyArg,

    /// Write the machine-readable summary to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SkipPolicyArg {
    /// A skipped build fails CI
    Regression,
    /// A skipped build is reported as unknown
    Unknown,
}

impl From<SkipPolicyArg> for SkipPolicy {
    fn from(arg: SkipPolicyArg) -> Self {
        match arg {
            SkipPolicyArg::Regression => SkipPolicy::Regression,
            SkipPolicyArg::Unknown => SkipPolicy::Unknown,
        }
    }
}

/// How the check ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckExit {
    /// No regressions
    Success,
    /// At least one sketch expected to compile did not
    Regression,
}

impl From<CheckExit> for ExitCode {
    fn from(exit: CheckExit) -> Self {
        match exit {
            CheckExit::Success => ExitCode::SUCCESS,
            CheckExit::Regression => ExitCode::FAILURE,
        }
    }
}

impl Cli {
    fn check_config(&self) -> CheckConfig {
        let mut config = CheckConfig::new(&self.workspace)
            .with_verbose(self.verbose)
            .with_sketches_reports_source(source_or_default(
                self.sketches_reports_source.as_deref(),
                DEFAULT_SKETCHES_REPORTS_SOURCE,
            ))
            .with_database_reports_source(source_or_default(
                self.database_reports_source.as_deref(),
                DEFAULT_DATABASE_REPORTS_SOURCE,
            ))
            .with_policy(ClassificationPolicy::default().with_skip_policy(self.skip_policy.into()));

        if let Some(path) = &self.summary_json {
            config = config.with_summary_json(path);
        }
        if let Some(token) = self.github_token.as_deref().filter(|t| !t.is_empty()) {
            config = config.with_github_token(Credential::new(token));
        }
        config
    }

    fn pull_request(&self) -> Option<u64> {
        if self.pull_request.is_some() {
            return self.pull_request;
        }
        let path = self.event_path.as_ref()?;
        match pull_request_from_event_file(path) {
            Ok(number) => number,
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// Actions passes an empty string for an input declared without a default.
fn source_or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Build the reporter, attaching a GitHub poster when a token is available.
fn build_reporter(cli: &Cli, config: &CheckConfig) -> Reporter {
    let Some(token) = config.github_token.clone() else {
        debug!("no GitHub token configured, summary will not be posted");
        return Reporter::new();
    };
    let Some(repository) = cli.repository.as_deref() else {
        warn!("GITHUB_REPOSITORY is not set, summary will not be posted");
        return Reporter::new();
    };

    let mut github = GithubConfig::new(repository)
        .with_api_url(&cli.github_api_url)
        .with_token(token);
    if let Some(number) = cli.pull_request() {
        github = github.with_pull_request(number);
    }

    match GithubClient::new(github) {
        Ok(client) => Reporter::with_poster(Arc::new(client)),
        Err(e) => {
            warn!("cannot create GitHub client: {e}");
            Reporter::new()
        }
    }
}

async fn run<W: Write>(cli: &Cli, config: &CheckConfig, out: &mut W) -> Result<CheckExit> {
    let _span = CheckSpan::enter(cli.repository.as_deref().unwrap_or("local"));

    let outcome = run_check(config)
        .await
        .context("Compilation results database check aborted")?;

    let reporter = build_reporter(cli, config);
    let status = reporter
        .report(&outcome, out)
        .await
        .context("Failed to write summary")?;

    if let Some(path) = &config.summary_json {
        write_summary_json(path, &status.summary)?;
    }

    if status.ci_should_fail {
        writeln!(out, "::error::One or more compilations failed")?;
        Ok(CheckExit::Regression)
    } else {
        Ok(CheckExit::Success)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.check_config();
    init_tracing(cli.json, config.log_level());

    let mut stdout = std::io::stdout();
    match run(&cli, &config, &mut stdout).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            println!("::error::{e:#}");
            ExitCode::FAILURE
        }
    }
}
