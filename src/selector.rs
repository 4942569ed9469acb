//! Method Selector (§4.4). Chooses the training subset from the cached
//! corpus using candidate-count filters, optional seeded random sampling,
//! and/or explicit index lists.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::SelectorOptions;
use crate::model::{Method, TrainingContext};

/// Select the training subset from `methods` (the Collection Cache's
/// output) according to `opts`. `ctx` must already be seeded for every
/// method in `methods` (§I3).
pub fn select(methods: &[Method], opts: &SelectorOptions, ctx: &TrainingContext) -> Vec<Method> {
    let mut selected = if !opts.use_specific.is_empty() {
        methods
            .iter()
            .filter(|m| opts.use_specific.contains(&m.index))
            .cloned()
            .collect::<Vec<_>>()
    } else {
        let mut filtered: Vec<Method> = methods
            .iter()
            .filter(|m| {
                let baseline = ctx.baseline_state(m);
                match ctx.get(&baseline) {
                    Some(data) => {
                        data.num_cses > 0 && data.num_cand >= opts.min_candidates && data.num_cand <= opts.max_candidates
                    }
                    None => false,
                }
            })
            .cloned()
            .collect();

        if opts.random_sample {
            let mut rng = StdRng::seed_from_u64(opts.random_sample_seed);
            filtered.shuffle(&mut rng);
        }

        if let Some(n) = opts.num_methods {
            filtered.truncate(n);
        }
        filtered
    };

    if !opts.use_additional.is_empty() {
        let mut seen: std::collections::HashSet<String> = selected.iter().map(|m| m.index.clone()).collect();
        for m in methods.iter().filter(|m| opts.use_additional.contains(&m.index)) {
            if seen.insert(m.index.clone()) {
                selected.push(m.clone());
            }
        }
    }

    selected
}
