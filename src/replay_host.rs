//! Replay Host Driver (§4.2). Launches the external Replay Host (the
//! harness that actually executes the compiler) as a child process,
//! captures its stdout, and returns it. The compiler itself, and the Replay
//! Host binary, are black boxes per §1 — this module only knows how to
//! spawn them, feed them tuning options, and collect output.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::config::ReplayHostConfig;
use crate::error::{JitRlCseError, Result};
use crate::wire::{render_options, TuningOption};

/// Exit code the Replay Host uses for "partial failure" (e.g. some methods
/// in a batch run hit SPMI-missing-context). Treated as success per §4.2/§9.
pub const PARTIAL_FAILURE_EXIT_CODE: i32 = 3;

/// Registry of outstanding child processes, drained by the process-wide
/// interrupt handler (§5). Guarded by its own lock, independent of the Q/V
/// store's.
#[derive(Default)]
pub struct ProcessTable {
    children: Mutex<HashMap<u64, Child>>,
    next_id: AtomicU64,
    interrupted: AtomicBool,
}

impl ProcessTable {
    pub fn new() -> Arc<Self> {
        Arc::new(ProcessTable::default())
    }

    /// Register an outstanding child, returning a stable id for later
    /// lookup/release. Unlike a `Vec` index, this id never shifts when other
    /// slots are released concurrently — required since many minibatch
    /// slots register/release in parallel (§5).
    fn register(&self, child: Child) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.children.lock().insert(id, child);
        id
    }

    fn release(&self, id: u64) {
        self.children.lock().remove(&id);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Mark the process-wide interrupt and kill every outstanding child
    /// (and, transitively, its process tree via `kill_on_drop`/explicit
    /// `start_kill`).
    pub async fn interrupt_all(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        let mut children = self.children.lock();
        for child in children.values_mut() {
            let _ = child.start_kill();
        }
        children.clear();
    }
}

/// Outcome of one rollout/update invocation, distinct from `JitRlCseError`
/// (§7): `MissingContextFailure` and `DivergingReplayFailure` are expected,
/// non-fatal per-invocation results, not hard errors. Callers (the MCMC
/// Explorer, the trainer) match on this instead of propagating `?`.
#[derive(Debug, Clone)]
pub enum RolloutOutcome<T> {
    /// The invocation produced a usable result.
    Success(T),
    /// The compiler reported the missing-value sentinel for perf score
    /// (§7 `MissingContextFailure`). Discard the slot; leave Q/V and θ
    /// unchanged for it.
    Gacked,
    /// Rollout and update invocations with identical inputs produced
    /// different perf scores (§7 `DivergingReplayFailure`).
    Diverged { rollout_perf: f64, update_perf: f64 },
}

impl<T> RolloutOutcome<T> {
    pub fn success(self) -> Option<T> {
        match self {
            RolloutOutcome::Success(v) => Some(v),
            _ => None,
        }
    }
}

/// One invocation's outcome as seen by the driver — distinct from
/// `JitRlCseError`: an `ExternalHostError` return *is* an error (§7), but
/// the caller decides whether a missing-context marker inside otherwise
/// successful stdout is fatal (that's the Metrics Parser's / trainer's job,
/// not this module's).
#[async_trait]
pub trait ReplayHost: Send + Sync {
    /// `method_index = None` requests a batch run over the full corpus;
    /// `Some(idx)` requests a single-method run. `options` are forwarded
    /// verbatim, in order.
    async fn run(&self, method_index: Option<&str>, options: &[TuningOption]) -> Result<String>;
}

/// The real driver: spawns the Replay Host binary as a child process per
/// invocation.
pub struct ProcessReplayHost {
    config: ReplayHostConfig,
    table: Arc<ProcessTable>,
}

impl ProcessReplayHost {
    pub fn new(config: ReplayHostConfig, table: Arc<ProcessTable>) -> Self {
        ProcessReplayHost { config, table }
    }
}

#[async_trait]
impl ReplayHost for ProcessReplayHost {
    async fn run(&self, method_index: Option<&str>, options: &[TuningOption]) -> Result<String> {
        if self.table.is_interrupted() {
            return Err(JitRlCseError::Interrupted);
        }

        let mut cmd = Command::new(&self.config.binary);
        cmd.current_dir(&self.config.host_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(idx) = method_index {
            cmd.arg("--method").arg(idx);
        } else {
            cmd.arg("--batch");
        }
        for opt in render_options(options) {
            cmd.arg("--option").arg(opt);
        }

        let mut child = cmd.spawn().map_err(JitRlCseError::Io)?;
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let id = self.table.register(child);

        let run_fut = async {
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();
            if let Some(mut out) = stdout_pipe.take() {
                out.read_to_string(&mut stdout_buf).await?;
            }
            if let Some(mut err) = stderr_pipe.take() {
                err.read_to_string(&mut stderr_buf).await?;
            }
            Ok::<(String, String), std::io::Error>((stdout_buf, stderr_buf))
        };

        let wait_result = match self.config.timeout {
            Some(d) => tokio::time::timeout(d, run_fut).await.map_err(|_| JitRlCseError::Timeout(d))?,
            None => run_fut.await,
        };
        let (stdout_buf, stderr_buf) = wait_result.map_err(JitRlCseError::Io)?;

        // The child has finished producing output by now; reap its status.
        // Take ownership out of the table before awaiting `wait()` — holding
        // the (non-`Send`) `parking_lot` guard across an `.await` would make
        // this future non-`Send` and risks deadlocking `interrupt_all`,
        // which needs the same lock.
        let mut child = match self.table.children.lock().remove(&id) {
            Some(child) => child,
            // Interrupted mid-flight and already reaped by `interrupt_all`.
            None => return Err(JitRlCseError::Interrupted),
        };
        let status = child.wait().await.map_err(JitRlCseError::Io)?;

        match status.code() {
            Some(0) | Some(PARTIAL_FAILURE_EXIT_CODE) => Ok(stdout_buf),
            Some(code) => Err(JitRlCseError::ExternalHost { code, stderr: stderr_buf }),
            None => Err(JitRlCseError::ExternalHost { code: -1, stderr: stderr_buf }),
        }
    }
}

/// A scripted, in-process stand-in for the Replay Host used by tests. Each
/// call pops the next pre-recorded response, so test authors can simulate
/// exact metrics-line sequences without touching a real child process.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedReplayHost {
    responses: Mutex<std::collections::VecDeque<Result<String>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedReplayHost {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        ScriptedReplayHost {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ReplayHost for ScriptedReplayHost {
    async fn run(&self, _method_index: Option<&str>, _options: &[TuningOption]) -> Result<String> {
        let mut queue = self.responses.lock();
        queue
            .pop_front()
            .unwrap_or_else(|| Err(JitRlCseError::Cache("scripted replay host exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_host_replays_in_order() {
        let host = ScriptedReplayHost::new(vec![Ok("first".to_string()), Ok("second".to_string())]);
        assert_eq!(host.run(None, &[]).await.unwrap(), "first");
        assert_eq!(host.run(None, &[]).await.unwrap(), "second");
        assert!(host.run(None, &[]).await.is_err());
    }

    #[test]
    fn process_table_starts_uninterrupted() {
        let table = ProcessTable::new();
        assert!(!table.is_interrupted());
    }

    #[tokio::test]
    async fn releasing_one_slot_does_not_invalidate_other_outstanding_slots() {
        let table = ProcessTable::default();
        let spawn = || Command::new("sleep").arg("5").kill_on_drop(true).spawn().unwrap();

        let id_a = table.register(spawn());
        let id_b = table.register(spawn());
        let id_c = table.register(spawn());

        // Releasing the middle slot must not shift `id_c`'s lookup the way a
        // `Vec::remove`-based scheme would.
        table.release(id_b);
        assert!(table.children.lock().contains_key(&id_a));
        assert!(!table.children.lock().contains_key(&id_b));
        assert!(table.children.lock().contains_key(&id_c));

        table.interrupt_all().await;
        assert!(table.children.lock().is_empty());
    }
}
