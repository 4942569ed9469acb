//! Progress/diagnostic output (§6.4). Purely observational — printed to
//! stdout as user-facing UX, independent of the `tracing` log stream (§C).

use tabled::{Table, Tabled};

use crate::evaluator::GreedyReport;
use crate::mcmc::{McmcAggregate, MethodMcmcSummary};
use crate::model::Method;

#[derive(Tabled)]
struct RoundRow {
    #[tabled(rename = "method")]
    method: String,
    #[tabled(rename = "avg perf score")]
    avg_perf_score: f64,
    #[tabled(rename = "gacked")]
    gacked: u32,
}

/// One row per method: the mini-batch-averaged perf score observed this
/// round (§6.4 "Per round: one tabular line per method").
pub fn print_round_table(round: u64, rows: &[(Method, f64, u32)]) {
    let data: Vec<RoundRow> = rows
        .iter()
        .map(|(m, avg, gacked)| RoundRow {
            method: m.to_string(),
            avg_perf_score: *avg,
            gacked: *gacked,
        })
        .collect();
    println!("round {round}");
    println!("{}", Table::new(data));
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "method")]
    method: String,
    #[tabled(rename = "baseline")]
    baseline: f64,
    #[tabled(rename = "best")]
    best: f64,
    #[tabled(rename = "greedy")]
    greedy: f64,
}

/// Baseline/best/greedy comparison table, printed every `summary_interval`
/// rounds alongside a Greedy Evaluator run (§6.4).
pub fn print_summary_table(report: &GreedyReport, best_scores: &[(Method, f64)]) {
    let data: Vec<SummaryRow> = report
        .results
        .iter()
        .map(|r| {
            let best = best_scores
                .iter()
                .find(|(m, _)| *m == r.method)
                .map(|(_, s)| *s)
                .unwrap_or(r.baseline_perf_score);
            SummaryRow {
                method: r.method.to_string(),
                baseline: r.baseline_perf_score,
                best,
                greedy: r.greedy_perf_score,
            }
        })
        .collect();

    println!(
        "summary @ round {}: geomean={:.4} better={} same={} worse={}",
        report.round_index, report.geomean, report.better, report.same, report.worse
    );
    println!("{}", Table::new(data));
}

#[derive(Tabled)]
struct McmcRow {
    #[tabled(rename = "method")]
    method: String,
    #[tabled(rename = "base")]
    base: f64,
    #[tabled(rename = "best")]
    best: f64,
    #[tabled(rename = "worst")]
    worst: f64,
    #[tabled(rename = "trials")]
    trials: u32,
    #[tabled(rename = "gacked")]
    gacked: u32,
}

/// Per-method MCMC result table plus the corpus-wide aggregate ratios.
pub fn print_mcmc_table(summaries: &[MethodMcmcSummary], aggregate: &McmcAggregate) {
    let data: Vec<McmcRow> = summaries
        .iter()
        .map(|s| McmcRow {
            method: s.method.to_string(),
            base: s.base_perf_score,
            best: s.best_perf_score,
            worst: s.worst_perf_score,
            trials: s.num_trials,
            gacked: s.num_gacked,
        })
        .collect();
    println!("{}", Table::new(data));
    println!(
        "baseline/best geomean={:.5} best/nocse geomean={:.5} baseline/nocse geomean={:.5}",
        aggregate.baseline_over_best_geomean, aggregate.best_over_nocse_geomean, aggregate.baseline_over_nocse_geomean
    );
}
