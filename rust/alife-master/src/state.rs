// alife-master: Simulation state, step pipeline, and snapshots

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alife_proto::CellComputeBatch;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};

use crate::buckets::{BucketKey, Buckets};
use crate::error::{MasterError, MasterResult};

/// Directory snapshots are published into.
pub const STATES_DIR: &str = "states";

/// The persisted heart of the simulation. Pipeline bookkeeping is rebuilt
/// empty on load and never written to disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SimulationState {
    pub cell_buckets: Buckets,
    pub time_step: u64,
}

impl SimulationState {
    /// Serialize to `states/SAVING_<stamp>` and rename to `STATE_<stamp>` on
    /// success, so a crashed save never looks like a valid snapshot.
    pub fn save_state(&self) -> MasterResult<String> {
        self.save_state_to(Path::new(STATES_DIR))
    }

    pub fn save_state_to(&self, dir: &Path) -> MasterResult<String> {
        fs::create_dir_all(dir)?;

        let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let state_name = format!("STATE_{stamp}");
        let temporary_path = dir.join(format!("SAVING_{stamp}"));
        let final_path = dir.join(&state_name);

        let encoded = bincode::serialize(self)
            .map_err(|e| MasterError::Snapshot(format!("failed to encode state: {e}")))?;
        fs::write(&temporary_path, encoded)?;
        fs::rename(&temporary_path, &final_path)?;

        Ok(state_name)
    }

    pub fn load_state(state_name: &str) -> MasterResult<Self> {
        Self::load_state_from(Path::new(STATES_DIR), state_name)
    }

    pub fn load_state_from(dir: &Path, state_name: &str) -> MasterResult<Self> {
        let bytes = fs::read(dir.join(state_name))?;
        bincode::deserialize(&bytes)
            .map_err(|e| MasterError::Snapshot(format!("state {state_name} is corrupt: {e}")))
    }

    pub fn load_latest_state() -> MasterResult<Self> {
        Self::load_latest_state_from(Path::new(STATES_DIR))
    }

    pub fn load_latest_state_from(dir: &Path) -> MasterResult<Self> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }

        let latest = name_of_latest_state(&names).ok_or_else(|| {
            MasterError::Snapshot(format!("no valid state file under {}", dir.display()))
        })?;
        Self::load_state_from(dir, &latest)
    }
}

/// The valid-named file with the numerically greatest timestamp suffix.
pub fn name_of_latest_state(names: &[String]) -> Option<String> {
    let mut latest: Option<(i64, &str)> = None;
    for name in names {
        if !state_name_valid(name) {
            continue;
        }
        let Some(stamp) = state_name_to_int(name) else {
            continue;
        };
        if latest.map_or(true, |(best, _)| stamp > best) {
            latest = Some((stamp, name));
        }
    }
    latest.map(|(_, name)| name.to_string())
}

fn state_name_valid(name: &str) -> bool {
    // Anchored on purpose, tighter than a substring match: the whole name
    // must be STATE_ followed by digits only.
    name.strip_prefix("STATE_")
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

fn state_name_to_int(name: &str) -> Option<i64> {
    name.strip_prefix("STATE_")?.parse().ok()
}

/// Counts dispatched-but-unacknowledged requests for one pipeline phase.
#[derive(Clone, Default)]
pub struct TaskBarrier {
    count: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl TaskBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: usize) {
        self.count.fetch_add(n, Ordering::AcqRel);
    }

    pub fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Wait until every added task has reported done.
    pub async fn wait(&self) {
        let mut notified = pin!(self.notify.notified());
        loop {
            // Register before checking so a done() between the check and the
            // await cannot be missed.
            notified.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.as_mut().await;
            notified.set(self.notify.notified());
        }
    }
}

/// Bookkeeping for one pipeline phase (the running step or the next one).
///
/// The sender is dropped once the phase's barrier has drained; that is what
/// closes the returned-batch channel under the consumer.
pub struct StepPhase {
    pub inflight: HashSet<BucketKey>,
    pub returned_tx: Option<mpsc::UnboundedSender<CellComputeBatch>>,
    pub returned_rx: Option<mpsc::UnboundedReceiver<CellComputeBatch>>,
    pub barrier: TaskBarrier,
}

impl StepPhase {
    fn new() -> Self {
        let (returned_tx, returned_rx) = mpsc::unbounded_channel();
        Self {
            inflight: HashSet::new(),
            returned_tx: Some(returned_tx),
            returned_rx: Some(returned_rx),
            barrier: TaskBarrier::new(),
        }
    }
}

/// Double-buffered scheduling state for the pipelined step loop.
pub struct StepPipeline {
    pub current: StepPhase,
    pub next: StepPhase,
}

impl Default for StepPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl StepPipeline {
    pub fn new() -> Self {
        Self {
            current: StepPhase::new(),
            next: StepPhase::new(),
        }
    }

    /// Promote next to current once the running step has committed.
    ///
    /// `next_inflight` is the look-ahead record produced by the finished
    /// consumer; it becomes the record of buckets already dispatched for the
    /// step about to run.
    pub fn cycle(&mut self, next_inflight: HashSet<BucketKey>) {
        let mut promoted = std::mem::replace(&mut self.next, StepPhase::new());
        promoted.inflight = next_inflight;
        self.current = promoted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alife_proto::Cell;

    #[test]
    fn latest_state_wins_by_numeric_suffix() {
        let names = vec![
            "STATE_20190222194317".to_string(),
            "STATE_20190222194284".to_string(),
            "STAT_201902A22194284".to_string(),
        ];
        assert_eq!(
            name_of_latest_state(&names),
            Some("STATE_20190222194317".to_string())
        );
    }

    #[test]
    fn no_valid_names_yields_none() {
        let names = vec!["SAVING_20190222194317".to_string(), "STATE_".to_string()];
        assert_eq!(name_of_latest_state(&names), None);
    }

    #[test]
    fn state_names_are_validated() {
        assert!(state_name_valid("STATE_20190222194317"));
        assert!(!state_name_valid("STTE_2019022a2194241"));
        assert!(!state_name_valid("STATE_2019022a2194241"));
    }

    #[test]
    fn state_names_parse_to_their_timestamp() {
        assert_eq!(state_name_to_int("STATE_20190222194241"), Some(20190222194241));
        assert_eq!(state_name_to_int("STTE_2019022a2194241"), None);
    }

    #[test]
    fn snapshots_round_trip_and_latest_selection_finds_them() {
        let dir = tempfile::tempdir().unwrap();

        let state = SimulationState {
            cell_buckets: Buckets::create(
                vec![Cell::at("1", 1.0, 2.0, 3.0), Cell::at("2", -700.0, 0.0, 0.0)],
                500,
            ),
            time_step: 42,
        };

        let name = state.save_state_to(dir.path()).unwrap();
        assert!(name.starts_with("STATE_"));
        assert!(dir.path().join(&name).exists());

        let loaded = SimulationState::load_latest_state_from(dir.path()).unwrap();
        assert_eq!(loaded.time_step, 42);
        assert_eq!(loaded.cell_buckets.all_cells().len(), 2);
    }

    #[test]
    fn loading_a_corrupt_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("STATE_20190222194317"), b"not a snapshot").unwrap();

        let result = SimulationState::load_latest_state_from(dir.path());
        assert!(matches!(result, Err(MasterError::Snapshot(_))));
    }

    #[tokio::test]
    async fn barrier_waits_for_all_tasks() {
        let barrier = TaskBarrier::new();
        barrier.add(2);

        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        barrier.done();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        barrier.done();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn barrier_with_no_tasks_does_not_wait() {
        TaskBarrier::new().wait().await;
    }

    #[test]
    fn cycle_promotes_the_next_phase() {
        let mut pipeline = StepPipeline::new();
        pipeline.next.returned_tx = None;

        let mut inflight = HashSet::new();
        inflight.insert(BucketKey::new(1, 2, 3));
        pipeline.cycle(inflight);

        assert!(pipeline.current.returned_tx.is_none());
        assert!(pipeline.current.inflight.contains(&BucketKey::new(1, 2, 3)));
        assert!(pipeline.next.returned_tx.is_some());
        assert!(pipeline.next.inflight.is_empty());
    }
}
