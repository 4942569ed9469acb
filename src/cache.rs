//! Collection Cache (§4.3). On first use, runs the Replay Host over every
//! method in a corpus and persists per-method baseline metrics to a sidecar
//! file; subsequent runs load from the sidecar instead of re-invoking the
//! host.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{JitRlCseError, Result};
use crate::model::{Method, Sequence, TrainingContext};
use crate::replay_host::ReplayHost;
use crate::wire::TuningOption;

const BASELINE_MARKER: &str = "; Total bytes of code";

fn sidecar_path(corpus: &Path) -> PathBuf {
    let mut os = corpus.as_os_str().to_os_string();
    os.push(".cse");
    PathBuf::from(os)
}

fn corpus_id(corpus: &Path) -> String {
    corpus
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| corpus.display().to_string())
}

/// Header line written atop the sidecar file (§G: an additive integrity
/// check, not a format change — the rest of the file remains the literal
/// batch-run stdout).
fn header_line(corpus: &Path) -> Result<String> {
    let bytes = std::fs::read(corpus)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("# jit-rl-cse-cache sha256={} corpus={}", hex::encode(digest), corpus.display()))
}

/// On first use, run the Replay Host in batch mode over `corpus` and
/// persist its stdout to the sidecar; on subsequent calls, read the
/// sidecar. Either way, scan baseline metric lines, seed `ctx`, and return
/// the retained method list.
pub async fn build_method_list(
    corpus: &Path,
    host_root: &Path,
    host: &dyn ReplayHost,
    ctx: &TrainingContext,
) -> Result<Vec<Method>> {
    if !host_root.is_dir() {
        return Err(JitRlCseError::Configuration(format!(
            "replay host root does not exist: {}",
            host_root.display()
        )));
    }
    if !corpus.is_file() {
        return Err(JitRlCseError::Configuration(format!("corpus file does not exist: {}", corpus.display())));
    }

    let sidecar = sidecar_path(corpus);
    let stdout = if sidecar.is_file() {
        info!(sidecar = %sidecar.display(), "loading collection cache sidecar");
        let raw = std::fs::read_to_string(&sidecar)?;
        check_integrity(&raw, corpus);
        strip_header(&raw)
    } else {
        info!(corpus = %corpus.display(), "collection cache miss, invoking replay host in batch mode");
        let raw = host.run(None, &[TuningOption::Metrics]).await?;
        let mut persisted = header_line(corpus)?;
        persisted.push('\n');
        persisted.push('\n');
        persisted.push_str(&raw);
        std::fs::write(&sidecar, &persisted)?;
        raw
    };

    Ok(seed_from_stdout(&stdout, corpus, ctx))
}

fn strip_header(raw: &str) -> String {
    match raw.strip_prefix("# jit-rl-cse-cache") {
        Some(rest) => rest.splitn(2, '\n').nth(1).unwrap_or("").trim_start_matches('\n').to_string(),
        None => raw.to_string(),
    }
}

fn check_integrity(raw: &str, corpus: &Path) {
    let Some(header) = raw.lines().next() else { return };
    let Some(expected_hex) = header.strip_prefix("# jit-rl-cse-cache sha256=").and_then(|rest| rest.split_whitespace().next())
    else {
        return;
    };
    let Ok(bytes) = std::fs::read(corpus) else { return };
    let actual_hex = hex::encode(Sha256::digest(&bytes));
    if actual_hex != expected_hex {
        warn!(
            corpus = %corpus.display(),
            "collection cache sidecar predates the current corpus file contents; re-run with the sidecar removed to refresh it"
        );
    }
}

/// Scan every baseline metric line, discard methods with `num_cand == 0`,
/// and seed `ctx` for each retained method (§4.3).
fn seed_from_stdout(stdout: &str, corpus: &Path, ctx: &TrainingContext) -> Vec<Method> {
    let corpus_id = corpus_id(corpus);
    let mut methods = Vec::new();

    for line in stdout.lines() {
        if !line.contains(BASELINE_MARKER) {
            continue;
        }
        let parsed = crate::metrics::parse(line);
        let (Some(index), Some(num_cand)) = (parsed.method_index.clone(), parsed.num_cand) else {
            continue;
        };
        if num_cand == 0 {
            continue;
        }
        let num_cses = parsed.num_cse.unwrap_or(0);
        let method = Method::new(corpus_id.clone(), index);
        let sequence = Sequence::parse(&parsed.sequence);
        ctx.seed_baseline(method.clone(), sequence, parsed.perf_score, num_cses, num_cand);
        methods.push(method);
    }

    methods
}
