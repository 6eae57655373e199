use std::{
    ffi::OsString,
    fmt,
    io::Read,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{results::write_results, throughput::parse_throughput, util::*};

/// Which of the two binaries produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum System {
    /// The unmodified baseline.
    Original,
    /// The candidate with the fix applied.
    Fixed,
}

impl System {
    pub fn name(&self) -> &'static str {
        match self {
            System::Original => "original",
            System::Fixed => "fixed",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One successful benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub system: System,
    pub threads: usize,
    pub trial_num: usize,
    pub num_keys: usize,
    /// Load-phase throughput in operations per second.
    pub throughput: f64,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Baseline binary.
    pub clean_path: PathBuf,
    /// Candidate binary.
    pub fixed_path: PathBuf,
    pub threads: Vec<usize>,
    pub ntrials: usize,
    pub nkeys: usize,
    /// Where the results table is written.
    pub output: PathBuf,
    /// Persistent-memory pool wiped before every trial.
    pub pool_path: PathBuf,
    /// NUMA node both CPU and memory are bound to.
    pub numa_node: usize,
}

impl RunConfig {
    pub const DEFAULT_NTRIALS: usize = 10;
    pub const DEFAULT_NKEYS: usize = 10_000_000;
    pub const DEFAULT_POOL_PATH: &'static str = "/mnt/pmem/pool";
    pub const DEFAULT_NUMA_NODE: usize = 1;

    /// The binaries in the order they are run.
    pub fn binaries(&self) -> [(System, &Path); 2] {
        [
            (System::Original, &self.clean_path),
            (System::Fixed, &self.fixed_path),
        ]
    }

    /// Total number of invocations a full run performs.
    pub fn invocations(&self) -> usize {
        2 * self.threads.len() * self.ntrials
    }

    /// Check everything that must hold before the first process is spawned.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.threads.is_empty() {
            return Err(ExperimentError::InvalidConfig(
                "at least one thread count is required".into(),
            ));
        }
        if let Some(&t) = self.threads.iter().find(|&&t| t == 0) {
            return Err(ExperimentError::InvalidConfig(format!(
                "thread counts must be positive, got {t}"
            )));
        }
        if self.ntrials == 0 {
            return Err(ExperimentError::InvalidConfig(
                "ntrials must be positive".into(),
            ));
        }
        if self.nkeys == 0 {
            return Err(ExperimentError::InvalidConfig(
                "nkeys must be positive".into(),
            ));
        }
        for (_, binary) in self.binaries() {
            if !binary.exists() {
                return Err(ExperimentError::MissingExecutable(binary.to_path_buf()));
            }
        }
        Ok(())
    }
}

/// A single run of a benchmark binary, pinned to one NUMA node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub binary: PathBuf,
    pub nkeys: usize,
    pub threads: usize,
    pub numa_node: usize,
}

impl Invocation {
    pub const LAUNCHER: &'static str = "numactl";

    /// Arguments passed to the launcher.
    pub fn args(&self) -> Vec<OsString> {
        let node = self.numa_node.to_string();
        vec![
            "-N".into(),
            node.clone().into(),
            "-m".into(),
            node.into(),
            self.binary.clone().into_os_string(),
            self.nkeys.to_string().into(),
            self.threads.to_string().into(),
        ]
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(Self::LAUNCHER);
        cmd.args(self.args());
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            Self::LAUNCHER,
            self.args().iter().map(|a| a.to_string_lossy()).join(" ")
        )
    }
}

/// Exit code and merged stdout/stderr of a finished process.
#[derive(Debug, Clone)]
pub struct Execution {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub output: String,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The machine the experiment runs on.
pub trait Harness {
    /// Wipe the storage the binary under test persists into.
    fn reset_storage(&mut self) -> Result<()>;

    /// Run to completion. A non-zero exit is reported in the result, not as an error.
    fn execute(&mut self, invocation: &Invocation) -> Result<Execution>;
}

/// Runs invocations through `numactl` and wipes a pool file on a pmem mount.
pub struct NumaHarness {
    pool_path: PathBuf,
}

impl NumaHarness {
    pub fn new(pool_path: impl Into<PathBuf>) -> Self {
        Self {
            pool_path: pool_path.into(),
        }
    }
}

impl Harness for NumaHarness {
    fn reset_storage(&mut self) -> Result<()> {
        remove_path(&self.pool_path)
            .with_context(|| format!("failed to reset {}", self.pool_path.display()))
    }

    fn execute(&mut self, invocation: &Invocation) -> Result<Execution> {
        let (mut reader, writer) = std::io::pipe().context("failed to create output pipe")?;
        // The command and its copies of the write end are dropped at the end
        // of this statement, so the read below sees EOF once the child exits.
        let mut child = invocation
            .command()
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .spawn()
            .with_context(|| format!("failed to spawn `{invocation}`"))?;

        let mut bytes = vec![];
        reader
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read output of `{invocation}`"))?;
        let status = child.wait()?;

        Ok(Execution {
            code: status.code(),
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("{} does not exist!", .0.display())]
    MissingExecutable(PathBuf),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("`{command}` {}\n{output}", exit_description(.code))]
    ProcessFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

/// Run every (binary, thread count, trial) combination in order.
///
/// Invocations whose output has no throughput line are printed and skipped.
/// The first failing invocation aborts the whole run.
pub fn run_experiment(config: &RunConfig, harness: &mut impl Harness) -> Result<Vec<ResultRow>> {
    config.validate()?;
    info!(
        "Running {} invocations ({} thread counts, {} trials, {} keys)",
        config.invocations(),
        config.threads.len(),
        config.ntrials,
        config.nkeys
    );

    let mut rows = vec![];
    for (system, binary) in config.binaries() {
        for &threads in &config.threads {
            for trial in 0..config.ntrials {
                harness.reset_storage()?;

                let invocation = Invocation {
                    binary: binary.to_path_buf(),
                    nkeys: config.nkeys,
                    threads,
                    numa_node: config.numa_node,
                };
                debug!("{invocation}");
                let execution = time(
                    &format!("{system} threads={threads} trial={trial}"),
                    || harness.execute(&invocation),
                )?;

                if !execution.success() {
                    return Err(ExperimentError::ProcessFailed {
                        command: invocation.to_string(),
                        code: execution.code,
                        output: execution.output,
                    }
                    .into());
                }

                match parse_throughput(&execution.output) {
                    Some(throughput) => {
                        let row = ResultRow {
                            system,
                            threads,
                            trial_num: trial,
                            num_keys: config.nkeys,
                            throughput,
                        };
                        info!("{}", serde_json::to_string(&row)?);
                        rows.push(row);
                    }
                    None => eprintln!("Does not comply: {}", execution.output),
                }
            }
        }
    }
    Ok(rows)
}

/// Run the experiment and write the table to `config.output`.
pub fn run_and_save(config: &RunConfig, harness: &mut impl Harness) -> Result<Vec<ResultRow>> {
    let rows = run_experiment(config, harness)?;
    write_results(&config.output, &rows)?;
    info!("Wrote {} rows to {}", rows.len(), config.output.display());
    Ok(rows)
}
