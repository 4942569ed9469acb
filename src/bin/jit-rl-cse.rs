//! CLI front-end for the training core (§2's data flow, out of scope per §1
//! except as the thing that exercises the in-scope components from a
//! terminal — the same relationship the repo's own `cijobs`/`jit-diff`
//! binaries have to their cores).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jit_rl_cse::config::{McmcConfig, ReplayHostConfig, SelectorOptions, TrainerConfig};
use jit_rl_cse::model::TrainingContext;
use jit_rl_cse::replay_host::{ProcessReplayHost, ProcessTable};
use jit_rl_cse::{cache, evaluator, mcmc, progress, selector, trainer};

#[derive(Parser)]
#[command(name = "jit-rl-cse")]
#[command(about = "RL training core that discovers CSE heuristics for a JIT compiler")]
struct Cli {
    /// Corpus file the Replay Host replays methods from.
    #[arg(long, global = true)]
    corpus: PathBuf,

    /// Directory the Replay Host binary is invoked from.
    #[arg(long, global = true)]
    host_root: PathBuf,

    /// Path to the Replay Host executable.
    #[arg(long, global = true, default_value = "replay-host")]
    host_binary: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build (or load) the collection cache for a corpus (§4.3).
    Cache,

    /// Select and print the training subset (§4.4).
    Select {
        #[arg(long)]
        num_methods: Option<usize>,
        #[arg(long, default_value_t = 0)]
        min_candidates: u32,
        #[arg(long, default_value_t = u32::MAX)]
        max_candidates: u32,
        #[arg(long)]
        random_sample: bool,
        #[arg(long, default_value_t = 0)]
        random_sample_seed: u64,
    },

    /// Run the MCMC Explorer over the selected methods (§4.6).
    Mcmc {
        #[arg(long)]
        num_methods: Option<usize>,
        #[arg(long, default_value_t = 10)]
        min_cand_for_random_trials: u32,
        #[arg(long, default_value_t = 64)]
        num_random_trials: u32,
    },

    /// Run the Policy-Gradient Trainer (§4.7).
    Train {
        #[arg(long)]
        num_methods: Option<usize>,
        #[arg(long, default_value_t = 10_000)]
        rounds: u64,
        #[arg(long, default_value_t = 25)]
        minibatch_size: usize,
        #[arg(long, default_value_t = 0.02)]
        alpha: f64,
        #[arg(long, default_value_t = 0)]
        salt: i64,
        #[arg(long, default_value_t = 100)]
        summary_interval: u64,
        #[arg(long)]
        sequential: bool,
        #[arg(long, default_value_t = 50)]
        stop_on_stable: u64,
        /// Print the final report as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },

    /// Run the Greedy Evaluator over the whole corpus (§4.8).
    Eval {
        /// Comma-separated θ vector; defaults to all-zero (the baseline heuristic).
        #[arg(long)]
        theta: Option<String>,
        /// Print the report as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let host_config = ReplayHostConfig::new(cli.host_root.clone(), cli.host_binary.clone());
    let table = ProcessTable::new();
    let host = ProcessReplayHost::new(host_config, Arc::clone(&table));

    let ctrl_c_table = Arc::clone(&table);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_table.interrupt_all().await;
        }
    });

    let ctx = TrainingContext::new();
    let methods = cache::build_method_list(&cli.corpus, &cli.host_root, &host, &ctx).await?;
    println!("collection cache: {} methods retained", methods.len());

    match cli.command {
        Command::Cache => {}
        Command::Select { num_methods, min_candidates, max_candidates, random_sample, random_sample_seed } => {
            let mut opts = SelectorOptions::new().min_candidates(min_candidates).max_candidates(max_candidates);
            if let Some(n) = num_methods {
                opts = opts.num_methods(n);
            }
            opts = opts.random_sample(random_sample).random_sample_seed(random_sample_seed);
            let selected = selector::select(&methods, &opts, &ctx);
            for m in &selected {
                println!("{m}");
            }
        }
        Command::Mcmc { num_methods, min_cand_for_random_trials, num_random_trials } => {
            let mut sel_opts = SelectorOptions::new();
            if let Some(n) = num_methods {
                sel_opts = sel_opts.num_methods(n);
            }
            let selected = selector::select(&methods, &sel_opts, &ctx);
            let mcmc_cfg = McmcConfig::new()
                .min_cand_for_random_trials(min_cand_for_random_trials)
                .num_random_trials(num_random_trials);
            let summaries = mcmc::mcmc(&host, &ctx, &selected, &mcmc_cfg).await;
            let nocse_scores: Vec<f64> = selected.iter().map(|m| ctx.baseline_score(m)).collect();
            let aggregate = mcmc::aggregate(&summaries, &nocse_scores);
            progress::print_mcmc_table(&summaries, &aggregate);
        }
        Command::Train { num_methods, rounds, minibatch_size, alpha, salt, summary_interval, sequential, stop_on_stable, json } => {
            let mut sel_opts = SelectorOptions::new();
            if let Some(n) = num_methods {
                sel_opts = sel_opts.num_methods(n);
            }
            let selected = selector::select(&methods, &sel_opts, &ctx);
            let cfg = TrainerConfig::new()
                .rounds(rounds)
                .minibatch_size(minibatch_size)
                .alpha(alpha)
                .salt(salt)
                .summary_interval(summary_interval)
                .sequential(sequential)
                .stop_on_stable(stop_on_stable);
            let report = trainer::train(&host, &ctx, &selected, &cfg).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "training finished after {} round(s), converged={}, final theta={:?}",
                    report.rounds_run, report.converged, report.theta
                );
            }
        }
        Command::Eval { theta, json } => {
            let theta: Vec<f64> = match theta {
                Some(csv) => jit_rl_cse::metrics::parse_float_csv(&csv),
                None => vec![0.0; jit_rl_cse::config::FEATURE_DIM],
            };
            let report = evaluator::evaluate_greedy(&host, &ctx, &methods, &theta, 0).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "greedy eval: geomean={:.4} better={} same={} worse={}",
                    report.geomean, report.better, report.same, report.worse
                );
            }
        }
    }

    Ok(())
}
