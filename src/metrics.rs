//! Metrics Parser (§4.1). Pure, side-effect free, thread-safe: extracts
//! fields from the compiler's line-oriented textual protocol. Every field
//! has a documented sentinel for "not found" — this module never returns an
//! error for a missing field, only for truly malformed call sites (there are
//! none; parsing is total over `&str`).

use regex::Regex;
use std::sync::LazyLock;

/// Sentinel perf score used when no `PerfScore`/`perf score` field is found.
pub const MISSING_PERF_SCORE: f64 = -1.0;
/// Sentinel sequence used when no `seq` field is found.
pub const MISSING_SEQUENCE: &str = "-1";

/// One parsed metrics record. Every field that can be "missing" carries its
/// documented sentinel rather than `Option`, matching the wire contract in
/// §4.1.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub method_index: Option<String>,
    pub perf_score: f64,
    pub num_cse: Option<u32>,
    pub num_cand: Option<u32>,
    pub sequence: String,
    pub updated_params: Option<String>,
    pub likelihoods: Option<String>,
    pub base_likelihoods: Option<String>,
    /// Accumulated over every `features,<...>` line seen, in order.
    pub features: Vec<String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            method_index: None,
            perf_score: MISSING_PERF_SCORE,
            num_cse: None,
            num_cand: None,
            sequence: MISSING_SEQUENCE.to_string(),
            updated_params: None,
            likelihoods: None,
            base_likelihoods: None,
            features: Vec::new(),
        }
    }
}

static RE_SPMI_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)spmi index (-?\d+)").unwrap());
static RE_PERF_SCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:PerfScore|perf score)\s+(-?\d+\.\d+)").unwrap());
static RE_NUM_CSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)num cse (\d+)").unwrap());
static RE_NUM_CAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)num cand (\d+)").unwrap());
static RE_SEQ: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)seq (-?\d+(?:,\d+)*)").unwrap());
static RE_UPDATED_PARAMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)updatedparams ([0-9.,eE+-]+)").unwrap());
static RE_LIKELIHOODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blikelihoods ([0-9.,eE+-]+)").unwrap());
static RE_BASE_LIKELIHOODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)baseLikelihoods ([0-9.,eE+-]+)").unwrap());
static RE_FEATURES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)features,(.+)").unwrap());

/// Parse every recognized field out of `output`, tolerating arbitrary
/// interleaved unrelated lines. Fields not found keep their sentinel/`None`.
pub fn parse(output: &str) -> Metrics {
    let mut m = Metrics::default();

    if let Some(c) = RE_SPMI_INDEX.captures(output) {
        m.method_index = Some(c[1].to_string());
    }
    if let Some(c) = RE_PERF_SCORE.captures(output) {
        if let Ok(v) = c[1].parse::<f64>() {
            m.perf_score = v;
        }
    }
    if let Some(c) = RE_NUM_CSE.captures(output) {
        m.num_cse = c[1].parse::<u32>().ok();
    }
    if let Some(c) = RE_NUM_CAND.captures(output) {
        m.num_cand = c[1].parse::<u32>().ok();
    }
    if let Some(c) = RE_SEQ.captures(output) {
        m.sequence = c[1].to_string();
    }
    if let Some(c) = RE_UPDATED_PARAMS.captures(output) {
        m.updated_params = Some(c[1].to_string());
    }
    if let Some(c) = RE_LIKELIHOODS.captures(output) {
        m.likelihoods = Some(c[1].to_string());
    }
    if let Some(c) = RE_BASE_LIKELIHOODS.captures(output) {
        m.base_likelihoods = Some(c[1].to_string());
    }
    for line in output.lines() {
        if let Some(c) = RE_FEATURES.captures(line) {
            m.features.push(c[1].to_string());
        }
    }

    m
}

/// Parse a comma-separated float list, as emitted for `updatedparams`,
/// `likelihoods`, and `ReplayCSEReward`. Unparsable entries are dropped
/// silently — callers treat a short/empty result the same as a parse miss.
pub fn parse_float_csv(csv: &str) -> Vec<f64> {
    csv.split(',')
        .filter_map(|tok| tok.trim().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_baseline_metric_line() {
        let line = "; Total bytes of code 205, PerfScore 73.15, num cse 0, num cand 2, seq 0, spmi index 96689";
        let m = parse(line);
        assert_eq!(m.method_index, Some("96689".to_string()));
        assert_eq!(m.perf_score, 73.15);
        assert_eq!(m.num_cse, Some(0));
        assert_eq!(m.num_cand, Some(2));
        assert_eq!(m.sequence, "0");
    }

    #[test]
    fn seq_field_stops_at_the_delimiting_comma_before_a_trailing_field() {
        // `seq` is documented as appearing before other fields on the same
        // line (§4.1), never last — the capture must not swallow the comma
        // that separates it from whatever follows.
        let m = parse("; Total bytes of code 90, PerfScore 72.66, num cse 2, num cand 3, seq 1,2,0, spmi index 7");
        assert_eq!(m.sequence, "1,2,0");
    }

    #[test]
    fn missing_fields_yield_sentinels_not_errors() {
        let m = parse("totally unrelated compiler chatter\nmore noise\n");
        assert_eq!(m.perf_score, MISSING_PERF_SCORE);
        assert_eq!(m.sequence, MISSING_SEQUENCE);
        assert!(m.method_index.is_none());
        assert!(m.num_cse.is_none());
    }

    #[test]
    fn tolerates_interleaved_unrelated_output() {
        let output = "\
some startup banner
; Total bytes of code 300, PerfScore 50.00, num cse 2, num cand 5, seq 1,2,0, spmi index 42
more unrelated lines
updatedparams 0.1,0.2,0.3
likelihoods 0.5,0.5
baseLikelihoods 0.4,0.6
features,0,CSE #1,1.0,2.0,3.0
features,1,CSE #2,4.0,5.0,6.0
trailing noise";
        let m = parse(output);
        assert_eq!(m.perf_score, 50.0);
        assert_eq!(m.sequence, "1,2,0");
        assert_eq!(m.updated_params.as_deref(), Some("0.1,0.2,0.3"));
        assert_eq!(m.likelihoods.as_deref(), Some("0.5,0.5"));
        assert_eq!(m.base_likelihoods.as_deref(), Some("0.4,0.6"));
        assert_eq!(m.features.len(), 2);
    }

    #[test]
    fn accumulates_all_feature_lines() {
        let output = "features,0,CSE #1,1.0\nfeatures,1,CSE #2,2.0\nfeatures,2,CSE #3,3.0\n";
        let m = parse(output);
        assert_eq!(m.features.len(), 3);
        assert_eq!(m.features[2], "2,CSE #3,3.0");
    }

    #[test]
    fn parse_float_csv_drops_unparsable_tokens() {
        let v = parse_float_csv("0.1,garbage,0.3");
        assert_eq!(v, vec![0.1, 0.3]);
    }

    #[test]
    fn case_insensitive_perfscore_variants() {
        let a = parse("PerfScore 1.50");
        let b = parse("perf score 1.50");
        assert_eq!(a.perf_score, 1.5);
        assert_eq!(b.perf_score, 1.5);
    }
}
