use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recipe_experiment::{
    experiments::run_and_save,
    graph::graph,
    util::{example_binary, init_trace},
    GraphConfig, NumaHarness, RunConfig,
};

/// Run and graph the RECIPE perf experiment.
#[derive(Parser)]
#[command(name = "recipe")]
struct Args {
    /// Directory the RECIPE checkouts live in. Defaults to the current directory.
    #[clap(long, global = true)]
    base_dir: Option<PathBuf>,

    /// More log output; repeat for more.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// No log output. Benchmark output without a throughput line is still printed.
    #[clap(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Benchmark both binaries and write the results table.
    Run(RunArgs),
    /// Plot a results table.
    Graph(GraphArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Thread counts to run with.
    #[clap(required = true, num_args = 1.., value_parser = clap::value_parser!(u64).range(1..))]
    threads: Vec<u64>,
    /// Baseline binary [default: <base>/RECIPE-clean/P-CLHT/build/example]
    #[clap(short, long)]
    clean_path: Option<PathBuf>,
    /// Candidate binary [default: <base>/RECIPE/P-CLHT/build/example]
    #[clap(short, long)]
    fixed_path: Option<PathBuf>,
    #[clap(short = 't', long, default_value_t = RunConfig::DEFAULT_NTRIALS as u64, value_parser = clap::value_parser!(u64).range(1..))]
    ntrials: u64,
    #[clap(short = 'k', long, default_value_t = RunConfig::DEFAULT_NKEYS as u64, value_parser = clap::value_parser!(u64).range(1..))]
    nkeys: u64,
    #[clap(short, long, default_value = "recipe.csv")]
    output: PathBuf,
    /// Persistent-memory pool removed before every trial.
    #[clap(long, default_value = RunConfig::DEFAULT_POOL_PATH)]
    pool_path: PathBuf,
    /// NUMA node to bind CPU and memory to.
    #[clap(long, default_value_t = RunConfig::DEFAULT_NUMA_NODE)]
    numa_node: usize,
}

impl RunArgs {
    fn resolve(self, base: &Path) -> RunConfig {
        RunConfig {
            clean_path: self
                .clean_path
                .unwrap_or_else(|| example_binary(base, "RECIPE-clean")),
            fixed_path: self
                .fixed_path
                .unwrap_or_else(|| example_binary(base, "RECIPE")),
            threads: self.threads.into_iter().map(|t| t as usize).collect(),
            ntrials: self.ntrials as usize,
            nkeys: self.nkeys as usize,
            output: self.output,
            pool_path: self.pool_path,
            numa_node: self.numa_node,
        }
    }
}

#[derive(clap::Args)]
struct GraphArgs {
    #[clap(short, long, default_value = "recipe.csv")]
    input: PathBuf,
    #[clap(short, long, default_value = "recipe.svg")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_trace(2 + args.verbose as usize, args.quiet)?;

    match args.cmd {
        Cmd::Run(run) => {
            let base = match args.base_dir {
                Some(dir) => dir,
                None => std::env::current_dir().context("failed to read the current directory")?,
            };
            let config = run.resolve(&base);
            let mut harness = NumaHarness::new(&config.pool_path);
            run_and_save(&config, &mut harness)?;
        }
        Cmd::Graph(g) => graph(&GraphConfig {
            input: g.input,
            output: g.output,
        })?,
    }
    Ok(())
}
