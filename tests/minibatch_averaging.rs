//! Policy-Gradient Trainer minibatch scenarios (§8 S4, S5, P5, P6): partial
//! gacking within a minibatch, divergence handling, and the "zero valid
//! runs leaves theta unchanged" guarantee, driven through `trainer::train`
//! end-to-end rather than the crate's own unit-level `run_method_round`.

use jit_rl_cse::config::TrainerConfig;
use jit_rl_cse::model::{Method, Sequence, TrainingContext};
use jit_rl_cse::replay_host::ScriptedReplayHost;
use jit_rl_cse::trainer;

fn method() -> Method {
    Method::new("corpus.mc", "1")
}

fn rollout_line(perf: f64, seq: &str) -> String {
    format!("; Total bytes of code 100, PerfScore {perf}, num cse 1, num cand 2, seq {seq}, spmi index 1")
}

fn update_line(perf: f64, params: &str) -> String {
    format!("; Total bytes of code 100, PerfScore {perf}, num cse 1, num cand 2, seq 1,0, spmi index 1\nupdatedparams {params}")
}

#[tokio::test]
async fn s4_partial_gacking_within_a_minibatch_averages_only_successes() {
    let ctx = TrainingContext::new();
    ctx.seed_baseline(method(), Sequence::parse("0"), 100.0, 0, 2);

    // Slot 1 succeeds cleanly; slot 2 gets a missing-context rollout.
    let host = ScriptedReplayHost::new(vec![
        Ok(rollout_line(80.0, "1,0")),
        Ok(update_line(80.0, "1.0,2.0,3.0")),
        Ok("no recognizable metrics in this invocation".to_string()),
    ]);

    let cfg = TrainerConfig::new()
        .rounds(1)
        .minibatch_size(2)
        .sequential(true)
        .initial_parameters(vec![0.0, 0.0, 0.0])
        .summary_interval(1_000_000);

    let report = trainer::train(&host, &ctx, &[method()], &cfg).await.unwrap();

    // Exactly one slot produced usable params, so the "average" is just
    // that slot's own theta-prime.
    assert_eq!(report.theta, vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn s5_a_diverging_replay_is_discarded_like_a_gacked_slot() {
    let ctx = TrainingContext::new();
    ctx.seed_baseline(method(), Sequence::parse("0"), 100.0, 0, 2);

    // Rollout and update report different perf scores for identical inputs.
    let host = ScriptedReplayHost::new(vec![
        Ok(rollout_line(72.66, "1,2,0")),
        Ok(update_line(50.0, "9.0,9.0,9.0")),
    ]);

    let cfg = TrainerConfig::new()
        .rounds(1)
        .minibatch_size(1)
        .initial_parameters(vec![0.0, 0.0, 0.0])
        .summary_interval(1_000_000);

    let report = trainer::train(&host, &ctx, &[method()], &cfg).await.unwrap();
    assert_eq!(report.theta, vec![0.0; jit_rl_cse::config::FEATURE_DIM]);
}

#[tokio::test]
async fn p5_a_fully_gacked_minibatch_leaves_theta_exactly_unchanged() {
    let ctx = TrainingContext::new();
    ctx.seed_baseline(method(), Sequence::parse("0"), 100.0, 0, 2);

    let host = ScriptedReplayHost::new(vec![
        Ok("nothing parseable".to_string()),
        Ok("still nothing parseable".to_string()),
        Ok("and again nothing".to_string()),
    ]);

    // `initial_parameters` zero-pads shorter vectors up to `FEATURE_DIM`,
    // so the unchanged theta we compare against must be the padded form.
    let mut initial = vec![3.0, 1.0, 4.0];
    let cfg = TrainerConfig::new()
        .rounds(1)
        .minibatch_size(3)
        .sequential(true)
        .initial_parameters(initial.clone())
        .summary_interval(1_000_000);
    initial.resize(jit_rl_cse::config::FEATURE_DIM, 0.0);

    let report = trainer::train(&host, &ctx, &[method()], &cfg).await.unwrap();
    assert_eq!(report.theta, initial);
}

#[tokio::test]
async fn p6_minibatch_average_is_the_elementwise_mean_of_every_successful_theta() {
    let ctx = TrainingContext::new();
    ctx.seed_baseline(method(), Sequence::parse("0"), 100.0, 0, 2);

    let host = ScriptedReplayHost::new(vec![
        Ok(rollout_line(80.0, "1,0")),
        Ok(update_line(80.0, "2.0,4.0,6.0")),
        Ok(rollout_line(80.0, "1,0")),
        Ok(update_line(80.0, "4.0,8.0,12.0")),
    ]);

    let cfg = TrainerConfig::new()
        .rounds(1)
        .minibatch_size(2)
        .sequential(true)
        .initial_parameters(vec![0.0, 0.0, 0.0])
        .summary_interval(1_000_000);

    let report = trainer::train(&host, &ctx, &[method()], &cfg).await.unwrap();
    for (actual, expected) in report.theta.iter().zip([3.0, 6.0, 9.0]) {
        assert!((actual - expected).abs() < 1e-9);
    }
}
