//! Centralized catalog of the compiler's `<KEY>=<VALUE>` tuning-option wire
//! format (§6.1, §9: "Keep the option-key catalog centralized and
//! versioned"). [`crate::metrics`] and this module are the only parts of the
//! crate that know the wire format; everything else deals in [`TuningOption`]
//! values.

use std::fmt;

/// Version tag for the option/metrics wire protocol. Bump if the compiler's
/// textual protocol changes shape.
pub const WIRE_VERSION: u32 = 1;

/// One `<KEY>=<VALUE>` tuning option forwarded to the Replay Host.
#[derive(Debug, Clone, PartialEq)]
pub enum TuningOption {
    /// `Metrics=1` — emit per-method metrics lines.
    Metrics,
    /// `CSEHash=0` — disable hashing-based CSE filtering.
    CseHashDisabled,
    /// `CSEMask=<hex>` — MCMC: perform exactly the CSEs in this bitmask.
    CseMask(u64),
    /// `RandomCSE=<salt>` — MCMC/stochastic: random CSE selection seed.
    RandomCse(i64),
    /// `RL=<csv floats>` — policy parameter vector θ.
    Rl(Vec<f64>),
    /// `RLAlpha=<float>` — learning rate α.
    RlAlpha(f64),
    /// `RLGreedy=1` — deterministic argmax policy.
    RlGreedy,
    /// `RLVerbose=1` — emit internal preferences/likelihoods.
    RlVerbose,
    /// `ReplayCSE=<csv ints>` — replay this exact CSE sequence.
    ReplayCse(String),
    /// `ReplayCSEReward=<csv floats>` — per-step rewards for the update call.
    ReplayCseReward(Vec<f64>),
    /// `RLCandidateFeatures=1` — emit candidate feature lines.
    RlCandidateFeatures,
}

impl fmt::Display for TuningOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metrics => write!(f, "Metrics=1"),
            Self::CseHashDisabled => write!(f, "CSEHash=0"),
            Self::CseMask(mask) => write!(f, "CSEMask={:x}", mask),
            Self::RandomCse(salt) => write!(f, "RandomCSE={}", salt),
            Self::Rl(theta) => write!(f, "RL={}", join_floats(theta)),
            Self::RlAlpha(alpha) => write!(f, "RLAlpha={}", alpha),
            Self::RlGreedy => write!(f, "RLGreedy=1"),
            Self::RlVerbose => write!(f, "RLVerbose=1"),
            Self::ReplayCse(seq) => write!(f, "ReplayCSE={}", seq),
            Self::ReplayCseReward(rewards) => write!(f, "ReplayCSEReward={}", join_floats(rewards)),
            Self::RlCandidateFeatures => write!(f, "RLCandidateFeatures=1"),
        }
    }
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a full option list the way the Replay Host Driver forwards it.
pub fn render_options(options: &[TuningOption]) -> Vec<String> {
    options.iter().map(|o| o.to_string()).collect()
}
