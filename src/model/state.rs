//! Core MDP data model (§3): `Method`, `Action`, `Sequence`, `State`, and the
//! per-state/per-edge value records. States are kept by value (method id +
//! canonical sequence string) in the store's maps rather than as linked
//! nodes — per §9 there are no cycles by construction, since sequences only
//! grow, so a plain keyed map is sufficient and avoids any shared-ownership
//! graph machinery.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{JitRlCseError, Result};

/// A method identified by corpus id + numeric index. Both fields
/// participate in equality/hashing (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Method {
    pub corpus: String,
    pub index: String,
}

impl Method {
    pub fn new(corpus: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            corpus: corpus.into(),
            index: index.into(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.corpus, self.index)
    }
}

/// A single action token. `"0"` is *stop*; anything else is a candidate
/// index. Stored as the raw string (§3 calls actions "string-valued
/// tokens") rather than parsed to an integer, so wire round-tripping never
/// loses formatting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Action(pub String);

pub const STOP: &str = "0";

impl Action {
    pub fn stop() -> Self {
        Action(STOP.to_string())
    }

    pub fn is_stop(&self) -> bool {
        self.0 == STOP
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered list of actions. Sequences are order-sensitive states per the
/// open question in §9 — `"1,2,0"` and `"2,1,0"` are distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(pub Vec<Action>);

impl Sequence {
    pub fn empty() -> Self {
        Sequence(Vec::new())
    }

    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Sequence::empty();
        }
        Sequence(s.split(',').map(|t| Action(t.trim().to_string())).collect())
    }

    /// `true` iff the sequence ends in stop (or equals `"0"`, i.e. the
    /// single-element stop sequence).
    pub fn is_terminal(&self) -> bool {
        matches!(self.0.last(), Some(a) if a.is_stop())
    }

    /// Validate I5/I6: no action repeats, and `0` appears only as the last
    /// element. Called before a sequence is admitted into the store.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for (i, action) in self.0.iter().enumerate() {
            if action.is_stop() && i != self.0.len() - 1 {
                return Err(JitRlCseError::InvariantViolation(format!(
                    "stop action `0` may only appear as the last action of a sequence: {}",
                    self
                )));
            }
            if !action.is_stop() && !seen.insert(&action.0) {
                return Err(JitRlCseError::InvariantViolation(format!(
                    "action `{}` appears twice in sequence {}",
                    action, self
                )));
            }
        }
        Ok(())
    }

    /// Append one action, returning the extended sequence.
    pub fn extended(&self, action: Action) -> Sequence {
        let mut actions = self.0.clone();
        actions.push(action);
        Sequence(actions)
    }

    /// Every prefix state along this sequence, starting with the empty
    /// (initial) sequence and ending with `self` itself.
    pub fn prefixes(&self) -> Vec<Sequence> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        out.push(Sequence::empty());
        for i in 1..=self.0.len() {
            out.push(Sequence(self.0[..i].to_vec()));
        }
        out
    }

    /// Pretty form: strips a trailing `,0` (or collapses a bare `"0"` to the
    /// empty string). `pretty(seq + ",0") == pretty(seq)`; `pretty("0") == ""`.
    pub fn pretty(&self) -> String {
        let mut actions = self.0.clone();
        if matches!(actions.last(), Some(a) if a.is_stop()) {
            actions.pop();
        }
        actions
            .iter()
            .map(|a| a.0.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.iter().map(|a| a.0.as_str()).collect::<Vec<_>>().join(",")
        )
    }
}

/// A (Method, Sequence) pair. The initial state for a method has an empty
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct State {
    pub method: Method,
    pub sequence: Sequence,
}

impl State {
    pub fn initial(method: Method) -> Self {
        State {
            method,
            sequence: Sequence::empty(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.sequence.is_terminal()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.method, self.sequence)
    }
}

/// (State, Action) edge key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateAndAction {
    pub state: State,
    pub action: Action,
}

/// Value record per [`State`] (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct StateData {
    pub best_perf_score: f64,
    pub average_perf_score: f64,
    pub base_perf_score: f64,
    pub num_visits: u64,
    pub num_cses: u32,
    pub num_cand: u32,
    pub is_baseline: bool,
    /// Action → child sequence, keyed in lexicographic action order (a
    /// `BTreeMap`, not insertion order). Best-state ties still resolve to
    /// the first-observed action per §4.5, since `Best[method]` only ever
    /// replaces on strict improvement (see `TrainingContext::qv_update`) —
    /// this map's own iteration order plays no part in that choice.
    pub children: BTreeMap<Action, Sequence>,
}

impl StateData {
    pub fn seeded_baseline(perf_score: f64, num_cses: u32, num_cand: u32) -> Self {
        StateData {
            best_perf_score: perf_score,
            average_perf_score: perf_score,
            base_perf_score: perf_score,
            num_visits: 1,
            num_cses,
            num_cand,
            is_baseline: true,
            children: BTreeMap::new(),
        }
    }

    pub fn record_visit(&mut self, perf_score: f64) {
        self.num_visits += 1;
        self.average_perf_score = (self.average_perf_score * (self.num_visits - 1) as f64
            + perf_score)
            / self.num_visits as f64;
    }
}

/// Value record per [`StateAndAction`] edge (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct StateAndActionData {
    pub best_perf_score: f64,
    pub num_visits: u64,
    pub is_baseline: bool,
}
