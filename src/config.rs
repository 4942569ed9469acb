//! Explicit, builder-style configuration structs — one per component (§D).
//! No ambient globals: the CLI layer constructs these from parsed arguments
//! and threads them through.

use std::path::PathBuf;
use std::time::Duration;

/// Replay Host Driver configuration (§4.2).
#[derive(Debug, Clone)]
pub struct ReplayHostConfig {
    pub host_root: PathBuf,
    pub binary: PathBuf,
    pub timeout: Option<Duration>,
    pub streaming: bool,
}

impl ReplayHostConfig {
    pub fn new(host_root: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        ReplayHostConfig {
            host_root: host_root.into(),
            binary: binary.into(),
            timeout: None,
            streaming: false,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }
}

/// Method Selector options (§4.4).
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    pub num_methods: Option<usize>,
    pub min_candidates: u32,
    pub max_candidates: u32,
    pub random_sample: bool,
    pub random_sample_seed: u64,
    pub use_specific: Vec<String>,
    pub use_additional: Vec<String>,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        SelectorOptions {
            num_methods: None,
            min_candidates: 0,
            max_candidates: u32::MAX,
            random_sample: false,
            random_sample_seed: 0,
            use_specific: Vec::new(),
            use_additional: Vec::new(),
        }
    }
}

impl SelectorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_methods(mut self, n: usize) -> Self {
        self.num_methods = Some(n);
        self
    }

    pub fn min_candidates(mut self, n: u32) -> Self {
        self.min_candidates = n;
        self
    }

    pub fn max_candidates(mut self, n: u32) -> Self {
        self.max_candidates = n;
        self
    }

    pub fn random_sample(mut self, enabled: bool) -> Self {
        self.random_sample = enabled;
        self
    }

    pub fn random_sample_seed(mut self, seed: u64) -> Self {
        self.random_sample_seed = seed;
        self
    }

    pub fn use_specific(mut self, indices: Vec<String>) -> Self {
        self.use_specific = indices;
        self
    }

    pub fn use_additional(mut self, indices: Vec<String>) -> Self {
        self.use_additional = indices;
        self
    }
}

/// MCMC Explorer options (§4.6).
#[derive(Debug, Clone)]
pub struct McmcConfig {
    /// Below this candidate count, enumerate every bitmask; at or above,
    /// sample `num_random_trials` random salts instead.
    pub min_cand_for_random_trials: u32,
    pub num_random_trials: u32,
}

impl Default for McmcConfig {
    fn default() -> Self {
        McmcConfig {
            min_cand_for_random_trials: 10,
            num_random_trials: 64,
        }
    }
}

impl McmcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_cand_for_random_trials(mut self, n: u32) -> Self {
        self.min_cand_for_random_trials = n;
        self
    }

    pub fn num_random_trials(mut self, n: u32) -> Self {
        self.num_random_trials = n;
        self
    }
}

/// Policy-Gradient Trainer configuration (§4.7's option table).
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub rounds: u64,
    pub minibatch_size: usize,
    pub alpha: f64,
    pub salt: i64,
    pub summary_interval: u64,
    pub initial_parameters: Vec<f64>,
    pub sequential: bool,
    pub stop_on_stable: u64,
}

/// Feature vector width the policy's linear preference model uses (§4.7).
pub const FEATURE_DIM: usize = 25;

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            rounds: 10_000,
            minibatch_size: 25,
            alpha: 0.02,
            salt: 0,
            summary_interval: 100,
            initial_parameters: vec![0.0; FEATURE_DIM],
            sequential: false,
            stop_on_stable: 50,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rounds(mut self, n: u64) -> Self {
        self.rounds = n;
        self
    }

    pub fn minibatch_size(mut self, n: usize) -> Self {
        self.minibatch_size = n;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn salt(mut self, salt: i64) -> Self {
        self.salt = salt;
        self
    }

    pub fn summary_interval(mut self, n: u64) -> Self {
        self.summary_interval = n;
        self
    }

    /// Set the initial parameter vector, zero-padding to `FEATURE_DIM` if
    /// shorter.
    pub fn initial_parameters(mut self, mut theta: Vec<f64>) -> Self {
        if theta.len() < FEATURE_DIM {
            theta.resize(FEATURE_DIM, 0.0);
        }
        self.initial_parameters = theta;
        self
    }

    pub fn sequential(mut self, enabled: bool) -> Self {
        self.sequential = enabled;
        self
    }

    pub fn stop_on_stable(mut self, rounds: u64) -> Self {
        self.stop_on_stable = rounds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_config_defaults_match_spec_table() {
        let cfg = TrainerConfig::default();
        assert_eq!(cfg.rounds, 10_000);
        assert_eq!(cfg.minibatch_size, 25);
        assert_eq!(cfg.alpha, 0.02);
        assert_eq!(cfg.stop_on_stable, 50);
        assert_eq!(cfg.initial_parameters.len(), FEATURE_DIM);
    }

    #[test]
    fn initial_parameters_zero_pads_short_vectors() {
        let cfg = TrainerConfig::new().initial_parameters(vec![1.0, 2.0]);
        assert_eq!(cfg.initial_parameters.len(), FEATURE_DIM);
        assert_eq!(cfg.initial_parameters[0], 1.0);
        assert_eq!(cfg.initial_parameters[2], 0.0);
    }

    #[test]
    fn mcmc_config_default_threshold_is_ten() {
        assert_eq!(McmcConfig::default().min_cand_for_random_trials, 10);
    }

    #[test]
    fn selector_options_default_has_unbounded_candidates() {
        let opts = SelectorOptions::default();
        assert_eq!(opts.min_candidates, 0);
        assert_eq!(opts.max_candidates, u32::MAX);
    }
}
