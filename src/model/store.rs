//! The Q/V Store (§4.5) — spec calls this the process-wide Q/V tables plus
//! Best/Baseline maps. Per §9 ("Global mutable singletons... Model them as
//! an explicit 'Training Context' value passed to all operations; a single
//! mutex guards it") this is one `TrainingContext` value behind one
//! `parking_lot::Mutex`, not a set of statics.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::state::{Action, Method, Sequence, State, StateAndAction, StateAndActionData, StateData};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
struct Tables {
    v: HashMap<State, StateData>,
    q: HashMap<StateAndAction, StateAndActionData>,
    baseline: HashMap<Method, State>,
    best: HashMap<Method, State>,
}

/// Process-wide Q/V store. All mutating operations are serialized by one
/// lock; reads during training never race with writes (§4.5).
pub struct TrainingContext {
    tables: Mutex<Tables>,
    /// Snapshot taken right after Collection Cache seeding — `forget()`
    /// restores exactly this (P4: byte-equal to seed-time contents).
    seed_snapshot: Mutex<Tables>,
}

impl Default for TrainingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingContext {
    pub fn new() -> Self {
        TrainingContext {
            tables: Mutex::new(Tables::default()),
            seed_snapshot: Mutex::new(Tables::default()),
        }
    }

    /// Seed a method's baseline terminal state (§4.3: called once per
    /// method by the Collection Cache at startup). `sequence` is the
    /// compiler heuristic's own terminal sequence (commonly `"0"`).
    pub fn seed_baseline(
        &self,
        method: Method,
        sequence: Sequence,
        perf_score: f64,
        num_cses: u32,
        num_cand: u32,
    ) {
        let state = State { method: method.clone(), sequence };
        let data = StateData::seeded_baseline(perf_score, num_cses, num_cand);

        let mut tables = self.tables.lock();
        tables.v.insert(state.clone(), data.clone());
        tables.baseline.insert(method, state);
        drop(tables);

        let mut snap = self.seed_snapshot.lock();
        // Re-derive from the live tables so concurrent seeding calls agree
        // on a single consistent snapshot.
        let live = self.tables.lock();
        *snap = live.clone();
    }

    /// Lazily fetch (or, if missing, bootstrap) the baseline state for a
    /// method (§4.5). A missing baseline indicates `seed_baseline` was never
    /// called for this method; we fall back to an "unknown baseline" marker
    /// at the bare-stop terminal sequence with `+inf` score so downstream
    /// comparisons always lose to a real seeded baseline once one arrives.
    pub fn baseline_state(&self, method: &Method) -> State {
        let mut tables = self.tables.lock();
        if let Some(s) = tables.baseline.get(method) {
            return s.clone();
        }
        let state = State {
            method: method.clone(),
            sequence: Sequence::empty().extended(Action::stop()),
        };
        tables.v.entry(state.clone()).or_insert_with(|| StateData {
            best_perf_score: f64::INFINITY,
            average_perf_score: f64::INFINITY,
            base_perf_score: f64::INFINITY,
            num_visits: 0,
            num_cses: 0,
            num_cand: 0,
            is_baseline: true,
            children: Default::default(),
        });
        tables.baseline.insert(method.clone(), state.clone());
        state
    }

    /// Lazily fetch (or initialize to the baseline) the current best-known
    /// terminal state for a method (§4.5).
    pub fn best_state(&self, method: &Method) -> State {
        {
            let tables = self.tables.lock();
            if let Some(s) = tables.best.get(method) {
                return s.clone();
            }
        }
        let baseline = self.baseline_state(method);
        let mut tables = self.tables.lock();
        tables.best.entry(method.clone()).or_insert_with(|| baseline.clone());
        tables.best.get(method).cloned().unwrap_or(baseline)
    }

    /// The baseline terminal state's recorded perf score for `method`, or
    /// `+inf` if no baseline has been seeded yet. Used by the trainer to
    /// scale reward shaping (§4.7).
    pub fn baseline_score(&self, method: &Method) -> f64 {
        Self::baseline_score_locked(&self.tables.lock(), method)
    }

    fn baseline_score_locked(tables: &Tables, method: &Method) -> f64 {
        tables
            .baseline
            .get(method)
            .and_then(|s| tables.v.get(s))
            .map(|d| d.base_perf_score)
            .unwrap_or(f64::INFINITY)
    }

    /// Core update operation (§4.5). Walks `sequence` from the initial
    /// state, creating states/edges lazily, updating Q/V bookkeeping per
    /// state (§I1, §I2), and returns `true` iff `perf_score` strictly
    /// improves the method's current best, in which case `Best[method]` is
    /// replaced by `sequence`'s terminal state.
    pub fn qv_update(
        &self,
        method: &Method,
        sequence: &Sequence,
        perf_score: f64,
        is_baseline: bool,
    ) -> Result<bool> {
        sequence.validate()?;
        // Ensure a baseline exists before mutating (I3); lazily bootstraps
        // if the caller skipped Collection Cache seeding.
        let _ = self.baseline_state(method);

        let mut tables = self.tables.lock();
        let baseline_fallback = Self::baseline_score_locked(&tables, method);
        let prefixes = sequence.prefixes();
        let n = sequence.0.len();

        for i in 0..=n {
            let state_i = State {
                method: method.clone(),
                sequence: prefixes[i].clone(),
            };
            tables.v.entry(state_i.clone()).or_insert_with(|| StateData {
                best_perf_score: baseline_fallback,
                average_perf_score: baseline_fallback,
                base_perf_score: baseline_fallback,
                num_visits: 0,
                num_cses: 0,
                num_cand: 0,
                is_baseline: false,
                children: Default::default(),
            });

            if i < n {
                let action = sequence.0[i].clone();
                let state_next = State {
                    method: method.clone(),
                    sequence: prefixes[i + 1].clone(),
                };
                let edge = StateAndAction {
                    state: state_i.clone(),
                    action: action.clone(),
                };
                tables
                    .q
                    .entry(edge)
                    .and_modify(|d| {
                        d.best_perf_score = d.best_perf_score.min(perf_score);
                        d.num_visits += 1;
                        d.is_baseline = d.is_baseline || is_baseline;
                    })
                    .or_insert(StateAndActionData {
                        best_perf_score: perf_score,
                        num_visits: 1,
                        is_baseline,
                    });

                let data = tables.v.get_mut(&state_i).expect("just inserted");
                data.children.insert(action, state_next.sequence.clone());
            }

            // Record the visit (average + visit count) for every prefix
            // state along the path, terminal included.
            let data = tables.v.get_mut(&state_i).expect("just inserted");
            data.record_visit(perf_score);

            if i == n {
                // Terminal: best is min(existing, perf) directly (I2).
                data.best_perf_score = data.best_perf_score.min(perf_score);
                if is_baseline {
                    data.is_baseline = true;
                    tables.baseline.insert(method.clone(), state_i.clone());
                }
            } else {
                // Non-terminal: recompute as min over all known children's
                // Q-edge best scores (I1).
                let children: Vec<(Action, Sequence)> = tables.v[&state_i].children.clone().into_iter().collect();
                let mut best = f64::INFINITY;
                for (action, _child_seq) in &children {
                    let edge = StateAndAction {
                        state: state_i.clone(),
                        action: action.clone(),
                    };
                    if let Some(edge_data) = tables.q.get(&edge) {
                        best = best.min(edge_data.best_perf_score);
                    }
                }
                if best.is_finite() {
                    tables.v.get_mut(&state_i).expect("just inserted").best_perf_score = best;
                }
            }
        }

        let terminal_state = State {
            method: method.clone(),
            sequence: sequence.clone(),
        };
        let current_best_score = Self::current_best_score_locked(&tables, method);
        let improved = perf_score < current_best_score;
        if improved {
            tables.best.insert(method.clone(), terminal_state);
        }

        Ok(improved)
    }

    fn current_best_score_locked(tables: &Tables, method: &Method) -> f64 {
        match tables.best.get(method) {
            Some(s) => tables.v.get(s).map(|d| d.best_perf_score).unwrap_or(f64::INFINITY),
            None => Self::baseline_score_locked(tables, method),
        }
    }

    /// §4.5: for each prefix state of `sequence`, the known best perf score
    /// or the method's baseline fallback. Atomic w.r.t. concurrent updates
    /// (held under the single lock for the whole read).
    pub fn sequence_to_values(&self, method: &Method, sequence: &Sequence) -> Vec<f64> {
        let tables = self.tables.lock();
        let fallback = Self::baseline_score_locked(&tables, method);
        sequence
            .prefixes()
            .iter()
            .map(|seq| {
                let state = State {
                    method: method.clone(),
                    sequence: seq.clone(),
                };
                tables.v.get(&state).map(|d| d.best_perf_score).unwrap_or(fallback)
            })
            .collect()
    }

    /// Best-known bookkeeping for a method: `(state, V[state].best_perf_score)`.
    pub fn best_known(&self, method: &Method) -> (State, f64) {
        let tables = self.tables.lock();
        match tables.best.get(method) {
            Some(s) => {
                let score = tables.v.get(s).map(|d| d.best_perf_score).unwrap_or(f64::INFINITY);
                (s.clone(), score)
            }
            None => {
                let fallback_score = Self::baseline_score_locked(&tables, method);
                drop(tables);
                (self.baseline_state(method), fallback_score)
            }
        }
    }

    /// Fetch a state's recorded data, if any.
    pub fn get(&self, state: &State) -> Option<StateData> {
        self.tables.lock().v.get(state).cloned()
    }

    /// §4.5 `forget()`: reset visit counts/averages/Q/V-best back to the
    /// post-seeding snapshot and clear Best, retaining the state graph's
    /// keys (contents become byte-equal to the seed snapshot, P4).
    pub fn forget(&self) {
        let snapshot = self.seed_snapshot.lock().clone();
        let mut tables = self.tables.lock();
        *tables = snapshot;
    }
}
