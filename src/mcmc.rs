//! MCMC Explorer (§4.6). Enumerates or samples CSE sequences for a selected
//! method set, feeds results into the Q/V store, and aggregates per-method
//! and corpus-wide summary statistics.

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::McmcConfig;
use crate::metrics::{self, MISSING_PERF_SCORE};
use crate::model::{Method, Sequence, TrainingContext};
use crate::replay_host::ReplayHost;
use crate::wire::TuningOption;

/// Per-method MCMC summary (§4.6 "After all invocations for a method").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodMcmcSummary {
    pub method: Method,
    pub base_perf_score: f64,
    pub best_perf_score: f64,
    pub worst_perf_score: f64,
    /// `num_cse` of the trial that won the best-perf-score tie-break
    /// (fewest CSEs among ties).
    pub best_num_cse: u32,
    pub num_trials: u32,
    pub num_gacked: u32,
    pub num_beating_base: u32,
}

/// Corpus-wide geometric-mean ratios (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct McmcAggregate {
    pub baseline_over_best_geomean: f64,
    pub best_over_nocse_geomean: f64,
    pub baseline_over_nocse_geomean: f64,
}

pub(crate) fn geometric_mean(ratios: &[f64]) -> f64 {
    let logs: Vec<f64> = ratios.iter().copied().filter(|r| r.is_finite() && *r > 0.0).map(|r| r.ln()).collect();
    if logs.is_empty() {
        return 1.0;
    }
    (logs.iter().sum::<f64>() / logs.len() as f64).exp()
}

/// Bitmask → sequence: candidate indices are 1-based and appear in
/// ascending order, terminated by stop. Used as the expected sequence when
/// the Replay Host's own `seq` field is missing (gacked runs).
fn sequence_from_mask(mask: u64, num_cand: u32) -> Sequence {
    let mut actions = Vec::new();
    for i in 1..=num_cand {
        if mask & (1u64 << (i - 1)) != 0 {
            actions.push(crate::model::Action(i.to_string()));
        }
    }
    actions.push(crate::model::Action::stop());
    Sequence(actions)
}

struct Invocation {
    sequence: Sequence,
    perf_score: f64,
    num_cse: u32,
    gacked: bool,
}

async fn run_one(
    host: &dyn ReplayHost,
    method: &Method,
    option: TuningOption,
    fallback_sequence: Sequence,
    baseline_score: f64,
) -> Invocation {
    let outcome = host
        .run(Some(&method.index), &[TuningOption::CseHashDisabled, option])
        .await;

    let stdout = match outcome {
        Ok(s) => s,
        Err(err) => {
            debug!(method = %method, error = %err, "mcmc invocation failed at the transport level");
            return Invocation {
                sequence: fallback_sequence,
                perf_score: baseline_score,
                num_cse: 0,
                gacked: true,
            };
        }
    };

    let parsed = metrics::parse(&stdout);
    if parsed.perf_score == MISSING_PERF_SCORE {
        Invocation {
            sequence: fallback_sequence,
            perf_score: baseline_score,
            num_cse: 0,
            gacked: true,
        }
    } else {
        let sequence = if parsed.sequence == crate::metrics::MISSING_SEQUENCE {
            fallback_sequence
        } else {
            Sequence::parse(&parsed.sequence)
        };
        Invocation {
            sequence,
            perf_score: parsed.perf_score,
            num_cse: parsed.num_cse.unwrap_or(0),
            gacked: false,
        }
    }
}

/// Run MCMC for one method: enumerate all bitmasks if `num_cand` is below
/// the sampling threshold, otherwise sample `num_random_trials` random
/// salts (§4.6).
async fn mcmc_one_method(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    method: &Method,
    opts: &McmcConfig,
    base_perf_score: f64,
    num_cand: u32,
) -> MethodMcmcSummary {
    let futures: Vec<_> = if num_cand < opts.min_cand_for_random_trials {
        (0u64..(1u64 << num_cand))
            .map(|mask| {
                let fallback = sequence_from_mask(mask, num_cand);
                run_one(host, method, TuningOption::CseMask(mask), fallback, base_perf_score)
            })
            .collect()
    } else {
        (0..opts.num_random_trials as i64)
            .map(|salt| {
                let fallback = ctx.baseline_state(method).sequence;
                run_one(host, method, TuningOption::RandomCse(salt), fallback, base_perf_score)
            })
            .collect()
    };

    let invocations = join_all(futures).await;

    let mut best_perf_score = f64::INFINITY;
    let mut worst_perf_score = f64::NEG_INFINITY;
    let mut best_num_cse = 0u32;
    let mut num_gacked = 0u32;
    let mut num_beating_base = 0u32;

    for inv in &invocations {
        if inv.gacked {
            num_gacked += 1;
        }
        if inv.perf_score < base_perf_score {
            num_beating_base += 1;
        }
        if inv.perf_score < best_perf_score
            || (inv.perf_score == best_perf_score && inv.num_cse < best_num_cse)
        {
            best_perf_score = inv.perf_score;
            best_num_cse = inv.num_cse;
        }
        worst_perf_score = worst_perf_score.max(inv.perf_score);

        let _ = ctx.qv_update(method, &inv.sequence, inv.perf_score, false);
    }

    MethodMcmcSummary {
        method: method.clone(),
        base_perf_score,
        best_perf_score,
        worst_perf_score,
        best_num_cse,
        num_trials: invocations.len() as u32,
        num_gacked,
        num_beating_base,
    }
}

/// Run MCMC across `methods`, returning one summary per method. Q/V updates
/// are serialized by the store's own lock even though invocations within a
/// method run concurrently.
pub async fn mcmc(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    methods: &[Method],
    opts: &McmcConfig,
) -> Vec<MethodMcmcSummary> {
    let mut summaries = Vec::with_capacity(methods.len());
    for method in methods {
        let baseline = ctx.baseline_state(method);
        let data = ctx.get(&baseline);
        let (base_perf_score, num_cand) = match data {
            Some(d) => (d.base_perf_score, d.num_cand),
            None => (f64::INFINITY, 0),
        };
        info!(method = %method, num_cand, "running mcmc for method");
        summaries.push(mcmc_one_method(host, ctx, method, opts, base_perf_score, num_cand).await);
    }
    summaries
}

/// Aggregate geometric-mean ratios across every method's summary (§4.6).
/// `nocse_scores` supplies, per method in the same order as `summaries`,
/// the best observed perf score among trials with zero CSEs performed
/// (falling back to the baseline score when no such trial was observed).
pub fn aggregate(summaries: &[MethodMcmcSummary], nocse_scores: &[f64]) -> McmcAggregate {
    let baseline_over_best: Vec<f64> = summaries
        .iter()
        .map(|s| s.base_perf_score / s.best_perf_score)
        .collect();
    let best_over_nocse: Vec<f64> = summaries
        .iter()
        .zip(nocse_scores)
        .map(|(s, nocse)| nocse / s.best_perf_score)
        .collect();
    let baseline_over_nocse: Vec<f64> = summaries
        .iter()
        .zip(nocse_scores)
        .map(|(s, nocse)| s.base_perf_score / nocse)
        .collect();

    McmcAggregate {
        baseline_over_best_geomean: geometric_mean(&baseline_over_best),
        best_over_nocse_geomean: geometric_mean(&best_over_nocse),
        baseline_over_nocse_geomean: geometric_mean(&baseline_over_nocse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_host::ScriptedReplayHost;

    fn method() -> Method {
        Method::new("corpus.mc", "1")
    }

    fn metric_line(perf: f64, num_cse: u32, seq: &str) -> String {
        format!(
            "; Total bytes of code 100, PerfScore {perf}, num cse {num_cse}, num cand 2, seq {seq}, spmi index 1"
        )
    }

    #[tokio::test]
    async fn enumerates_all_masks_for_small_candidate_counts() {
        let ctx = TrainingContext::new();
        ctx.seed_baseline(method(), Sequence::parse("0"), 73.15, 0, 2);

        // 4 masks for 2 candidates: 0 -> "0", 1 -> "1,0", 2 -> "2,0", 3 -> "1,2,0".
        let host = ScriptedReplayHost::new(vec![
            Ok(metric_line(73.15, 0, "0")),
            Ok(metric_line(72.91, 1, "1,0")),
            Ok(metric_line(72.90, 1, "2,0")),
            Ok(metric_line(72.66, 2, "1,2,0")),
        ]);

        let opts = McmcConfig::default();
        let summary = mcmc_one_method(&host, &ctx, &method(), &opts, 73.15, 2).await;

        assert_eq!(summary.num_trials, 4);
        assert_eq!(summary.num_gacked, 0);
        assert!((summary.best_perf_score - 72.66).abs() < 1e-9);
        assert_eq!(summary.worst_perf_score, 73.15);
    }

    #[tokio::test]
    async fn gacked_runs_substitute_baseline_and_are_counted() {
        let ctx = TrainingContext::new();
        ctx.seed_baseline(method(), Sequence::parse("0"), 73.15, 0, 2);

        let host = ScriptedReplayHost::new(vec![
            Ok("no recognizable metrics here".to_string()),
            Ok(metric_line(72.91, 1, "1,0")),
            Ok(metric_line(72.90, 1, "2,0")),
            Ok(metric_line(72.66, 2, "1,2,0")),
        ]);

        let opts = McmcConfig::default();
        let summary = mcmc_one_method(&host, &ctx, &method(), &opts, 73.15, 2).await;

        assert_eq!(summary.num_gacked, 1);
        assert_eq!(summary.num_trials, 4);
    }

    #[test]
    fn geometric_mean_of_uniform_ratios_is_that_ratio() {
        let g = geometric_mean(&[2.0, 2.0, 2.0]);
        assert!((g - 2.0).abs() < 1e-9);
    }

    #[test]
    fn geometric_mean_ignores_non_finite_entries() {
        let g = geometric_mean(&[2.0, f64::NAN, 2.0]);
        assert!((g - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sequence_from_mask_orders_candidates_ascending() {
        let seq = sequence_from_mask(0b101, 3);
        assert_eq!(seq, Sequence::parse("1,3,0"));
    }
}
