//! Core training harness that discovers better CSE (Common Subexpression
//! Elimination) heuristics for a JIT compiler, by treating CSE selection in
//! a method as a finite-horizon MDP and training a linear softmax policy
//! with REINFORCE-with-baseline against a compiler that is driven as an
//! external child process (the Replay Host).
//!
//! Data flow (§2): [`cache`] → [`selector`] → ([`mcmc`] | [`trainer`]) ↔
//! [`model`] ↔ [`replay_host`] → [`metrics`]. [`evaluator`] is invoked
//! periodically by the trainer.

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod mcmc;
pub mod metrics;
pub mod model;
pub mod progress;
pub mod replay_host;
pub mod selector;
pub mod trainer;
pub mod wire;

pub use error::{JitRlCseError, Result};
