//! Policy-Gradient Trainer (§4.7) — the algorithmic centerpiece. The
//! trainer never computes a gradient itself: it orchestrates a compiler
//! that, given θ, either rolls out a stochastic softmax policy or performs
//! one REINFORCE-with-baseline update step and hands back an updated θ. This
//! module owns the round/minibatch/method state machine described in §4.7
//! ("Idle → Rollout(parallel) → Update(parallel) → Aggregate → Commit-θ →
//! Idle") and the reward shaping in [`reward`].

pub mod reward;

use futures::future::join_all;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::TrainerConfig;
use crate::error::{JitRlCseError, Result};
use crate::evaluator::{self, GreedyReport};
use crate::metrics::{self, MISSING_PERF_SCORE};
use crate::model::{Method, Sequence, TrainingContext};
use crate::progress;
use crate::replay_host::{ReplayHost, RolloutOutcome};
use crate::wire::TuningOption;

/// One minibatch slot's salt, derived deterministically from the trainer's
/// base salt, round index, and slot index (§4.7 round algorithm step 1.1).
fn iter_salt(cfg: &TrainerConfig, round: u64, slot: usize) -> i64 {
    cfg.salt * cfg.minibatch_size as i64 * cfg.rounds as i64
        + round as i64 * cfg.minibatch_size as i64
        + slot as i64
}

/// Outcome of one method's minibatch: the averaged perf score across every
/// invocation that produced one (gacked slots excluded), plus how many of
/// the `minibatch_size` slots were gacked (§6.4's round table).
struct MethodRoundOutcome {
    avg_perf_score: f64,
    gacked: u32,
}

/// Run a single rollout+update slot (§4.7 round algorithm step 1). Returns
/// `Err(Interrupted)` only on a process-wide cancellation, which aborts the
/// whole training loop; every other failure mode collapses to a
/// [`RolloutOutcome`] per §7's "errors inside a single parallel task are
/// caught and reduced to a per-task outcome" propagation policy.
async fn run_slot(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    method: &Method,
    theta: &[f64],
    alpha: f64,
    salt: i64,
) -> Result<(RolloutOutcome<Vec<f64>>, Option<f64>)> {
    let rollout_stdout = match host
        .run(Some(&method.index), &[TuningOption::Rl(theta.to_vec()), TuningOption::RlAlpha(alpha), TuningOption::RandomCse(salt)])
        .await
    {
        Ok(s) => s,
        Err(JitRlCseError::Interrupted) => return Err(JitRlCseError::Interrupted),
        Err(err) => {
            debug!(method = %method, error = %err, "rollout invocation failed at the transport level");
            return Ok((RolloutOutcome::Gacked, None));
        }
    };

    let rollout = metrics::parse(&rollout_stdout);
    if rollout.perf_score == MISSING_PERF_SCORE || rollout.sequence == crate::metrics::MISSING_SEQUENCE {
        return Ok((RolloutOutcome::Gacked, None));
    }
    let sequence = Sequence::parse(&rollout.sequence);
    if sequence.validate().is_err() {
        warn!(method = %method, sequence = %rollout.sequence, "rollout produced an invalid sequence, discarding slot");
        return Ok((RolloutOutcome::Gacked, None));
    }

    let baseline_score = ctx.baseline_score(method);
    let values = ctx.sequence_to_values(method, &sequence);
    let rewards = reward::compute_rewards(&values, baseline_score);

    let update_stdout = match host
        .run(
            Some(&method.index),
            &[
                TuningOption::Rl(theta.to_vec()),
                TuningOption::RlAlpha(alpha),
                TuningOption::RandomCse(salt),
                TuningOption::ReplayCse(sequence.to_string()),
                TuningOption::ReplayCseReward(rewards),
            ],
        )
        .await
    {
        Ok(s) => s,
        Err(JitRlCseError::Interrupted) => return Err(JitRlCseError::Interrupted),
        Err(err) => {
            debug!(method = %method, error = %err, "update invocation failed at the transport level");
            return Ok((RolloutOutcome::Gacked, None));
        }
    };

    let update = metrics::parse(&update_stdout);
    if update.perf_score == MISSING_PERF_SCORE {
        return Ok((RolloutOutcome::Gacked, None));
    }
    if update.perf_score != rollout.perf_score {
        warn!(
            method = %method,
            rollout_perf = rollout.perf_score,
            update_perf = update.perf_score,
            "rollout and update invocations diverged for identical inputs"
        );
        return Ok((
            RolloutOutcome::Diverged {
                rollout_perf: rollout.perf_score,
                update_perf: update.perf_score,
            },
            None,
        ));
    }

    let Some(updated_params) = update.updated_params else {
        return Ok((RolloutOutcome::Gacked, None));
    };
    let theta_prime = metrics::parse_float_csv(&updated_params);

    let _ = ctx.qv_update(method, &sequence, rollout.perf_score, false)?;

    Ok((RolloutOutcome::Success(theta_prime), Some(rollout.perf_score)))
}

/// Run one method's full minibatch for the current round and commit the
/// averaged θ in place. Per §4.7's "Parameter-vector averaging rationale", a
/// minibatch with zero valid runs leaves θ unchanged.
async fn run_method_round(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    method: &Method,
    theta: &mut Vec<f64>,
    cfg: &TrainerConfig,
    round: u64,
) -> Result<MethodRoundOutcome> {
    let slots = 0..cfg.minibatch_size;
    let outcomes = if cfg.sequential {
        let mut out = Vec::with_capacity(cfg.minibatch_size);
        for i in slots {
            out.push(run_slot(host, ctx, method, theta, cfg.alpha, iter_salt(cfg, round, i)).await?);
        }
        out
    } else {
        let futures: Vec<_> = slots
            .map(|i| run_slot(host, ctx, method, theta, cfg.alpha, iter_salt(cfg, round, i)))
            .collect();
        let mut out = Vec::with_capacity(cfg.minibatch_size);
        for r in join_all(futures).await {
            out.push(r?);
        }
        out
    };

    let mut successful_params = Vec::new();
    let mut perf_scores = Vec::new();
    let mut gacked = 0u32;
    for (outcome, perf) in outcomes {
        match outcome {
            RolloutOutcome::Success(params) => {
                successful_params.push(params);
                if let Some(p) = perf {
                    perf_scores.push(p);
                }
            }
            RolloutOutcome::Gacked | RolloutOutcome::Diverged { .. } => gacked += 1,
        }
    }

    if let Some(avg) = reward::average_parameters(&successful_params) {
        *theta = avg;
    }

    let avg_perf_score = if perf_scores.is_empty() {
        f64::NAN
    } else {
        perf_scores.iter().sum::<f64>() / perf_scores.len() as f64
    };

    Ok(MethodRoundOutcome { avg_perf_score, gacked })
}

/// Final report handed back by [`train`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainReport {
    pub run_id: String,
    pub theta: Vec<f64>,
    pub rounds_run: u64,
    pub converged: bool,
    pub greedy_reports: Vec<GreedyReport>,
}

/// Run the full training loop (§4.7 "Training loop"). Processes methods
/// sequentially within each round so θ flows in the well-defined order
/// required by §5's ordering guarantees; each method's minibatch runs in
/// parallel (or serially, if `cfg.sequential`) internally.
///
/// Every invocation gets a fresh correlation id (`run_id`) carried on the
/// `tracing` span for the whole loop, the way `auto::engine` tags a run's
/// log lines so concurrent invocations in the same process don't interleave
/// unattributably.
pub async fn train(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    methods: &[Method],
    cfg: &TrainerConfig,
) -> Result<TrainReport> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("train", run_id = %run_id, started_at = %chrono::Utc::now());
    train_inner(host, ctx, methods, cfg, run_id).instrument(span).await
}

async fn train_inner(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    methods: &[Method],
    cfg: &TrainerConfig,
    run_id: String,
) -> Result<TrainReport> {
    let mut theta = cfg.initial_parameters.clone();
    let mut prev_theta = theta.clone();
    let mut stable_rounds = 0u64;
    let mut greedy_reports = Vec::new();
    let mut rounds_run = 0u64;
    let mut converged = false;

    for round in 0..cfg.rounds {
        rounds_run = round + 1;
        let mut rows = Vec::with_capacity(methods.len());

        for method in methods {
            let outcome = run_method_round(host, ctx, method, &mut theta, cfg, round).await?;
            rows.push((method.clone(), outcome.avg_perf_score, outcome.gacked));
        }

        progress::print_round_table(round, &rows);

        if theta == prev_theta {
            stable_rounds += 1;
        } else {
            stable_rounds = 0;
        }
        prev_theta = theta.clone();

        if (round + 1) % cfg.summary_interval == 0 {
            let report = evaluator::evaluate_greedy(host, ctx, methods, &theta, round).await?;
            let best_scores: Vec<(Method, f64)> =
                methods.iter().map(|m| (m.clone(), ctx.best_known(m).1)).collect();
            progress::print_summary_table(&report, &best_scores);
            info!(round, geomean = report.geomean, "periodic greedy evaluation");
            greedy_reports.push(report);
        }

        if stable_rounds >= cfg.stop_on_stable {
            info!(round, stable_rounds, "theta stable, stopping early");
            converged = true;
            break;
        }
    }

    Ok(TrainReport { run_id, theta, rounds_run, converged, greedy_reports })
}
