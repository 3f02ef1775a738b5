//! Bytecode bug and security scan (SpotBugs with the find-sec-bugs plugin).
//!
//! Needs compiled artifacts, so it only runs after a successful build. The
//! archives are discovered under `target`/`build` output directories;
//! source, javadoc, example and test archives are ignored.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use relmine_core::{AnalysisResult, MinerConfig};
use walkdir::WalkDir;

use super::{finish, prepare_output, skip, AnalysisContext, Analyzer, AnalyzerKind};
use crate::classify::{
    classify, non_empty_file, xml_has_bug_instances, MissingArtifact, OutcomeEvidence,
};
use crate::runner::{execute, ToolInvocation};

pub const REPORT_FILE: &str = "spotbugs-report.xml";

const OUTPUT_DIRS: [&str; 2] = ["target", "build"];

fn excluded_archive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(sources|javadoc|examples|tests?)").expect("Invalid regex"))
}

/// Compiled archives under build output directories, sorted by path.
pub fn discover_archives(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.ends_with(".jar") && !excluded_archive().is_match(&name)
        })
        .filter(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .and_then(Path::parent)
                .is_some_and(|dir| {
                    dir.components()
                        .any(|c| OUTPUT_DIRS.iter().any(|d| c.as_os_str() == *d))
                })
        })
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// Bytecode analyzer.
#[derive(Debug, Clone)]
pub struct BytecodeAnalyzer {
    program: String,
    plugin: Option<PathBuf>,
    artifact_limit: usize,
    timeout: Duration,
}

impl BytecodeAnalyzer {
    pub const ID: &'static str = "spotbugs";

    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            plugin: None,
            artifact_limit: 3,
            timeout,
        }
    }

    pub fn from_config(config: &MinerConfig) -> Self {
        Self::new(config.tools.spotbugs.path.clone(), config.tools.spotbugs.timeout())
            .with_plugin(config.tools.findsecbugs_plugin.clone())
            .with_artifact_limit(config.bytecode_artifact_limit)
    }

    pub fn with_plugin(mut self, plugin: Option<PathBuf>) -> Self {
        self.plugin = plugin;
        self
    }

    pub fn with_artifact_limit(mut self, limit: usize) -> Self {
        self.artifact_limit = limit.max(1);
        self
    }

    fn invocation(&self, archives: &[PathBuf], report: &Path) -> ToolInvocation {
        let mut inv = ToolInvocation::new(Self::ID, &self.program).args(["-textui", "-effort:max"]);
        if let Some(plugin) = &self.plugin {
            inv = inv.arg("-pluginList").arg(plugin);
        }
        inv.args(["-xml:withMessages", "-output"])
            .arg(report)
            .args(archives)
            .timeout(self.timeout)
    }
}

#[async_trait]
impl Analyzer for BytecodeAnalyzer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Bytecode
    }

    async fn run(&self, ctx: &AnalysisContext<'_>) -> AnalysisResult {
        if !ctx.build_succeeded() {
            return skip(Self::ID, ctx.output_dir, "build did not succeed");
        }

        let mut archives = discover_archives(ctx.tree);
        if archives.is_empty() {
            return skip(Self::ID, ctx.output_dir, "no compiled artifacts found");
        }
        archives.truncate(self.artifact_limit);

        let report = ctx.output_dir.join(REPORT_FILE);
        if let Err(e) = prepare_output(ctx.output_dir, std::slice::from_ref(&report)) {
            return skip(Self::ID, ctx.output_dir, &format!("cannot prepare output dir: {e}"));
        }
        let outcome = execute(&self.invocation(&archives, &report)).await;

        let present = non_empty_file(&report);
        let status = classify(
            &OutcomeEvidence {
                termination: outcome.termination.clone(),
                artifacts_present: present,
                findings: present && xml_has_bug_instances(&report),
            },
            MissingArtifact::SuccessOnCleanExit,
        );
        let artifacts = if present { vec![report] } else { Vec::new() };

        finish(Self::ID, &outcome, ctx.output_dir, status, artifacts)
    }
}
