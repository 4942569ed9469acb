//! Greedy Evaluator (§4.8). Runs the greedy policy (deterministic argmax,
//! current θ) across the whole corpus and computes aggregate geometric-mean
//! ratios versus baseline.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::mcmc::geometric_mean;
use crate::metrics;
use crate::model::{Method, TrainingContext};
use crate::replay_host::ReplayHost;
use crate::wire::TuningOption;

/// Ties/equal-within-epsilon classification boundary (§8 S6, §9).
pub const GREEDY_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodGreedyResult {
    pub method: Method,
    pub baseline_perf_score: f64,
    pub greedy_perf_score: f64,
    pub ratio: f64,
}

/// Serializable for optional `--json` CLI output (§D); the UI tables in
/// [`crate::progress`] render this same data for interactive use.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreedyReport {
    pub round_index: u64,
    pub geomean: f64,
    pub better: u32,
    pub same: u32,
    pub worse: u32,
    pub best_method: Option<Method>,
    pub worst_method: Option<Method>,
    pub results: Vec<MethodGreedyResult>,
}

/// Run one batch greedy-policy invocation and classify every method's
/// result against its seeded baseline (§4.8).
pub async fn evaluate_greedy(
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
    methods: &[Method],
    theta: &[f64],
    round_index: u64,
) -> Result<GreedyReport> {
    let stdout = host.run(None, &[TuningOption::Rl(theta.to_vec()), TuningOption::RlGreedy]).await?;

    let mut results = Vec::new();
    let mut ratios = Vec::new();
    let mut better = 0u32;
    let mut same = 0u32;
    let mut worse = 0u32;
    let mut best: Option<(Method, f64)> = None;
    let mut worst: Option<(Method, f64)> = None;

    for line in stdout.lines() {
        if !line.contains("; Total bytes of code") {
            continue;
        }
        let parsed = metrics::parse(line);
        let (Some(idx), Some(num_cand)) = (parsed.method_index.clone(), parsed.num_cand) else {
            continue;
        };
        if num_cand == 0 {
            continue;
        }
        let Some(method) = methods.iter().find(|m| m.index == idx).cloned() else {
            continue;
        };

        let baseline_perf_score = ctx.baseline_score(&method);
        let greedy_perf_score = parsed.perf_score;
        if !greedy_perf_score.is_finite() || greedy_perf_score == 0.0 {
            continue;
        }
        let ratio = baseline_perf_score / greedy_perf_score;
        if !ratio.is_finite() {
            continue;
        }

        if (ratio - 1.0).abs() <= GREEDY_EPSILON {
            same += 1;
        } else if ratio > 1.0 {
            better += 1;
        } else {
            worse += 1;
        }

        if best.as_ref().map_or(true, |(_, b)| ratio > *b) {
            best = Some((method.clone(), ratio));
        }
        if worst.as_ref().map_or(true, |(_, w)| ratio < *w) {
            worst = Some((method.clone(), ratio));
        }

        ratios.push(ratio);
        results.push(MethodGreedyResult {
            method,
            baseline_perf_score,
            greedy_perf_score,
            ratio,
        });
    }

    let geomean = geometric_mean(&ratios);
    info!(round_index, geomean, better, same, worse, "greedy evaluation complete");

    Ok(GreedyReport {
        round_index,
        geomean,
        better,
        same,
        worse,
        best_method: best.map(|(m, _)| m),
        worst_method: worst.map(|(m, _)| m),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sequence;
    use crate::replay_host::ScriptedReplayHost;

    #[tokio::test]
    async fn unchanged_zero_theta_reports_geomean_of_one() {
        let ctx = TrainingContext::new();
        let m1 = Method::new("corpus.mc", "1");
        let m2 = Method::new("corpus.mc", "2");
        ctx.seed_baseline(m1.clone(), Sequence::parse("0"), 50.0, 0, 2);
        ctx.seed_baseline(m2.clone(), Sequence::parse("0"), 80.0, 0, 3);

        let stdout = "\
; Total bytes of code 100, PerfScore 50.0, num cse 0, num cand 2, seq 0, spmi index 1
; Total bytes of code 100, PerfScore 80.0, num cse 0, num cand 3, seq 0, spmi index 2"
            .to_string();
        let host = ScriptedReplayHost::new(vec![Ok(stdout)]);

        let report = evaluate_greedy(&host, &ctx, &[m1, m2], &vec![0.0; 25], 0).await.unwrap();
        assert!((report.geomean - 1.0).abs() < 1e-9);
        assert_eq!(report.better, 0);
        assert_eq!(report.worse, 0);
        assert_eq!(report.same, 2);
    }

    #[tokio::test]
    async fn improved_greedy_score_is_classified_as_better() {
        let ctx = TrainingContext::new();
        let m1 = Method::new("corpus.mc", "1");
        ctx.seed_baseline(m1.clone(), Sequence::parse("0"), 100.0, 0, 2);

        let stdout = "; Total bytes of code 90, PerfScore 80.0, num cse 1, num cand 2, seq 1,0, spmi index 1".to_string();
        let host = ScriptedReplayHost::new(vec![Ok(stdout)]);

        let report = evaluate_greedy(&host, &ctx, &[m1], &vec![0.0; 25], 1).await.unwrap();
        assert_eq!(report.better, 1);
        assert!(report.geomean > 1.0);
    }
}
