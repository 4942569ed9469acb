//! Reward shaping (§4.7 "Reward shaping"). Turns a rollout's per-prefix
//! best-known values into a per-step advantage-flavored reward vector fed
//! to the compiler's REINFORCE-with-baseline update call.

/// Given `values[i] = V[S_i].bestPerfScore` for `i = 0..=T` (length `T+1`,
/// as returned by [`crate::model::TrainingContext::sequence_to_values`]),
/// compute `r_i = (V_i - V_{i+1}) / baseline_score` for `i = 0..T` (length
/// `T`). Positive entries reward transitions that improved the best-known
/// score; negative entries discourage ones that worsened it.
pub fn compute_rewards(values: &[f64], baseline_score: f64) -> Vec<f64> {
    values.windows(2).map(|w| (w[0] - w[1]) / baseline_score).collect()
}

/// Element-wise mean of a set of equal-length parameter vectors. Returns
/// `None` if `vectors` is empty (§"Parameter-vector averaging rationale":
/// a minibatch with zero valid runs leaves θ unchanged).
pub fn average_parameters(vectors: &[Vec<f64>]) -> Option<Vec<f64>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f64;
    Some(sum.into_iter().map(|s| s / n).collect())
}
