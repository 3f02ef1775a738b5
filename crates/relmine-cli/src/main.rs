//! relmine - release history miner
//!
//! The `relmine` command checks out every published release of a GitHub
//! project in chronological order, builds it, runs the static-analysis
//! toolchain against it and writes per-release and aggregate reports.
//!
//! ```text
//! relmine jhy/jsoup --limit 20
//! relmine jhy/jsoup --list-only --format csv
//! ```

mod listing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relmine_core::store::HISTORY_OUTPUT_FILE;
use relmine_core::{parse_repo_slug, FsResultStore, GitHubReleaseSource, MinerConfig, ReleaseSource};
use relmine_pipeline::{
    release_analyzers, GitWorkspace, HistoryAnalyzer, PipelineOrchestrator, ProjectBuildSystem,
    RepositoryWorkspace,
};
use tracing::{info, warn, Level};

use listing::ListFormat;

#[derive(Parser, Debug)]
#[command(name = "relmine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Analyze every published release of a GitHub project", long_about = None)]
struct Cli {
    /// Repository as owner/repo (e.g. jhy/jsoup)
    repository: String,

    /// Analyze only the first N releases (oldest first)
    #[arg(short, long)]
    limit: Option<usize>,

    /// TOML configuration file
    #[arg(short, long, env = "RELMINE_CONFIG")]
    config: Option<PathBuf>,

    /// Root holding projects/ and results/ (overrides the configuration)
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Results directory (overrides <workspace-root>/results/<repo>)
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Print the release list and exit without analyzing
    #[arg(long)]
    list_only: bool,

    /// Output format for --list-only
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    format: ListFormat,

    /// Warn when fewer releases than this are found
    #[arg(long, default_value_t = 20)]
    min_releases: usize,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<MinerConfig> {
        let mut config = match &self.config {
            Some(path) => MinerConfig::load(path)?,
            None => MinerConfig::default(),
        };
        if let Some(root) = &self.workspace_root {
            config.workspace_root = root.clone();
        }
        if let Some(root) = &self.output_root {
            config.output_root = Some(root.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    relmine_core::init_tracing(cli.json, level);

    let (owner, repo) = parse_repo_slug(&cli.repository)?;

    let source = GitHubReleaseSource::new(cli.github_token.clone())?;
    let mut releases = source
        .fetch_releases(&owner, &repo)
        .await
        .with_context(|| format!("Failed to fetch releases for {owner}/{repo}"))?;
    info!(count = releases.len(), "Fetched releases");

    if releases.len() < cli.min_releases {
        warn!(
            found = releases.len(),
            expected = cli.min_releases,
            "Fewer releases than expected"
        );
    }

    if let Some(limit) = cli.limit {
        releases.truncate(limit);
    }

    if cli.list_only {
        println!("{}", listing::render(&releases, cli.format)?);
        return Ok(());
    }

    let config = cli.load_config()?;
    config.preflight()?;

    let results_dir = config.results_dir(&repo);
    let store = Arc::new(FsResultStore::new(&results_dir)?);

    let mut workspace = GitWorkspace::from_config(&config, &repo);
    let remote_url = format!("https://github.com/{owner}/{repo}.git");
    workspace
        .prepare(&remote_url)
        .await
        .with_context(|| format!("Failed to prepare clone of {remote_url}"))?;

    let history = HistoryAnalyzer::from_config(&config)
        .with_report_path(results_dir.join(HISTORY_OUTPUT_FILE));

    let mut orchestrator = PipelineOrchestrator::new(
        format!("{owner}/{repo}"),
        Box::new(workspace),
        Box::new(ProjectBuildSystem::from_config(&config)),
        store,
    )
    .with_analyzers(release_analyzers(&config))
    .with_history(Box::new(history))
    .with_config_fingerprint(config.fingerprint());

    let aggregate = orchestrator.run(&releases).await?;

    println!("Analyzed {} releases of {owner}/{repo}", aggregate.total());
    for (id, count) in &aggregate.per_analyzer_success_count {
        println!("  {:<20}{}/{}", format!("{id}:"), count, aggregate.total());
    }
    println!("Results: {}", results_dir.display());
    Ok(())
}
