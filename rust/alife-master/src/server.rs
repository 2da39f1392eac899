// alife-master: Step scheduler and simulation server
//
// One step: dispatch every non-empty bucket (plus its 3x3x3 neighbourhood)
// to the CIS fleet, fold returned batches into the next bucket map, and as
// soon as a bucket's whole neighbourhood has committed, eagerly dispatch its
// next-step work. The barrier wait at the end of the step is the only
// synchronization between consecutive steps.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alife_proto::{BigBangRequest, Cell, CellComputeBatch};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::big_bang::BigBangConfig;
use crate::bucket_metrics::update_bucket_metrics;
use crate::buckets::{BucketKey, Buckets};
use crate::config::MasterConfig;
use crate::error::{MasterError, MasterResult};
use crate::metrics::MasterMetrics;
use crate::pool::{CisClient, CisClientPool};
use crate::state::{SimulationState, StepPipeline, TaskBarrier};
use crate::websocket::ViewerHub;

/// Per-attempt deadline for a single CIS call.
const CIS_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// A bucket's next-step input is final once the bucket itself and its 26
/// neighbours have all committed.
const NEIGHBOURHOOD_SIZE: u32 = 27;

pub struct Server {
    config: MasterConfig,
    state: SimulationState,
    pipeline: StepPipeline,
    pool: Arc<CisClientPool>,
    hub: Arc<ViewerHub>,
    metrics: Arc<MasterMetrics>,
}

impl Server {
    pub fn new(
        config: MasterConfig,
        pool: Arc<CisClientPool>,
        hub: Arc<ViewerHub>,
        metrics: Arc<MasterMetrics>,
    ) -> Self {
        Self {
            config,
            state: SimulationState::default(),
            pipeline: StepPipeline::new(),
            pool,
            hub,
            metrics,
        }
    }

    pub fn time_step(&self) -> u64 {
        self.state.time_step
    }

    pub fn cells(&self) -> Vec<Cell> {
        self.state.cell_buckets.all_cells()
    }

    pub fn save_state(&self) -> MasterResult<String> {
        self.state.save_state()
    }

    /// Replace the population wholesale; used at startup.
    pub fn seed_universe(&mut self, cells: Vec<Cell>) {
        self.state.cell_buckets = Buckets::create(cells, self.config.bucket_width);
    }

    /// Load a snapshot if one was requested, otherwise ask a CIS to spawn a
    /// fresh universe. Load failures are fatal; the caller aborts on them.
    pub async fn init_universe(&mut self) -> MasterResult<()> {
        if let Some(state_name) = self.config.state_file_name.clone() {
            self.state = SimulationState::load_state(&state_name)?;
            info!(time_step = self.state.time_step, state = %state_name, "loaded simulation state");
            return Ok(());
        }
        if self.config.load_latest_state {
            self.state = SimulationState::load_latest_state()?;
            info!(time_step = self.state.time_step, "loaded latest simulation state");
            return Ok(());
        }
        self.fetch_big_bang().await
    }

    async fn fetch_big_bang(&mut self) -> MasterResult<()> {
        let request = match &self.config.big_bang_config_path {
            Some(path) => BigBangConfig::from_path(path)?.to_request(),
            None => BigBangRequest::default(),
        };

        info!("waiting for a cell interaction service to seed the universe");
        let mut client = self.pool.get().await;
        let streamed = stream_big_bang(&mut client, request).await;
        self.pool.add(client).await;

        let cells = streamed?;
        info!(cells = cells.len(), "big bang complete");
        self.seed_universe(cells);
        Ok(())
    }

    /// Advance the simulation by one committed step.
    pub async fn run_step(&mut self) -> MasterResult<()> {
        update_bucket_metrics(&self.state.cell_buckets, &self.metrics);

        let consumer = self.spawn_consumer();

        let returned_tx = self
            .pipeline
            .current
            .returned_tx
            .clone()
            .ok_or_else(|| MasterError::Internal("current step channel already closed".to_string()))?;

        let width = self.config.bucket_width;
        let time_step = self.state.time_step;
        for (key, cells) in self.state.cell_buckets.iter() {
            if cells.is_empty() || self.pipeline.current.inflight.contains(key) {
                continue;
            }

            let batch = CellComputeBatch {
                cells_to_compute: cells.clone(),
                cells_in_proximity: self.state.cell_buckets.cells_surrounding(key, width),
                time_step,
                batch_key: Some((*key).into()),
            };
            self.pipeline.current.barrier.add(1);
            spawn_dispatcher(
                batch,
                returned_tx.clone(),
                self.pipeline.current.barrier.clone(),
                Arc::clone(&self.pool),
                Arc::clone(&self.metrics),
            );
        }
        drop(returned_tx);

        self.pipeline.current.barrier.wait().await;
        // Every dispatcher for this step has sent its batch; dropping the
        // sender lets the consumer drain out and finish.
        self.pipeline.current.returned_tx = None;

        let (next_buckets, next_inflight) = consumer
            .await
            .map_err(|e| MasterError::Internal(format!("step consumer failed: {e}")))?;

        self.state.cell_buckets = next_buckets;
        self.pipeline.cycle(next_inflight);
        self.state.time_step += 1;
        info!(
            time_step = self.state.time_step,
            buckets = self.state.cell_buckets.len(),
            "step committed"
        );

        self.hub
            .broadcast_cells(&self.state.cell_buckets.all_cells())
            .await;
        Ok(())
    }

    fn spawn_consumer(&mut self) -> JoinHandle<(Buckets, HashSet<BucketKey>)> {
        let returned_rx = self.pipeline.current.returned_rx.take();
        let next_tx = self.pipeline.next.returned_tx.clone();
        let next_barrier = self.pipeline.next.barrier.clone();
        let pool = Arc::clone(&self.pool);
        let metrics = Arc::clone(&self.metrics);
        let width = self.config.bucket_width;
        let next_time_step = self.state.time_step + 1;

        tokio::spawn(consume_returned_batches(
            returned_rx,
            next_tx,
            next_barrier,
            pool,
            metrics,
            width,
            next_time_step,
        ))
    }
}

async fn stream_big_bang(
    client: &mut CisClient,
    request: BigBangRequest,
) -> MasterResult<Vec<Cell>> {
    let mut stream = client.big_bang(request).await?.into_inner();
    let mut cells = Vec::new();
    while let Some(cell) = stream.message().await? {
        cells.push(cell);
    }
    Ok(cells)
}

/// Drain one step's returned batches, building the next bucket map and
/// eagerly dispatching next-step work for every bucket whose 27-bucket
/// neighbourhood has fully committed.
async fn consume_returned_batches(
    returned_rx: Option<mpsc::UnboundedReceiver<CellComputeBatch>>,
    next_tx: Option<mpsc::UnboundedSender<CellComputeBatch>>,
    next_barrier: TaskBarrier,
    pool: Arc<CisClientPool>,
    metrics: Arc<MasterMetrics>,
    width: u32,
    next_time_step: u64,
) -> (Buckets, HashSet<BucketKey>) {
    let mut next_buckets = Buckets::new();
    let mut done_neighbours: HashMap<BucketKey, u32> = HashMap::new();
    let mut next_inflight: HashSet<BucketKey> = HashSet::new();

    let Some(mut returned_rx) = returned_rx else {
        return (next_buckets, next_inflight);
    };

    while let Some(batch) = returned_rx.recv().await {
        let Some(batch_key) = batch.batch_key.map(BucketKey::from) else {
            warn!("dropping returned batch without a bucket key");
            continue;
        };

        // Cells may have moved; their new positions decide the bucket.
        next_buckets.merge(Buckets::create(batch.cells_to_compute, width));

        let mut neighbourhood = batch_key.surrounding(width);
        neighbourhood.push(batch_key);
        for key in neighbourhood {
            let done = done_neighbours.entry(key).or_insert(0);
            *done += 1;

            let ready = *done == NEIGHBOURHOOD_SIZE
                && next_buckets.get(&key).is_some_and(|cells| !cells.is_empty())
                && !next_inflight.contains(&key);
            if !ready {
                continue;
            }
            let Some(next_tx) = next_tx.as_ref() else {
                continue;
            };

            next_inflight.insert(key);
            next_barrier.add(1);
            let batch = CellComputeBatch {
                cells_to_compute: next_buckets.get(&key).cloned().unwrap_or_default(),
                cells_in_proximity: next_buckets.cells_surrounding(&key, width),
                time_step: next_time_step,
                batch_key: Some(key.into()),
            };
            spawn_dispatcher(
                batch,
                next_tx.clone(),
                next_barrier.clone(),
                Arc::clone(&pool),
                Arc::clone(&metrics),
            );
        }
    }

    (next_buckets, next_inflight)
}

/// Dispatch one batch, retrying with fresh clients until a CIS succeeds.
/// Failed clients are dropped on the floor; the pool never sees them again.
fn spawn_dispatcher(
    batch: CellComputeBatch,
    returned_tx: mpsc::UnboundedSender<CellComputeBatch>,
    barrier: TaskBarrier,
    pool: Arc<CisClientPool>,
    metrics: Arc<MasterMetrics>,
) {
    tokio::spawn(async move {
        let bucket = batch
            .batch_key
            .clone()
            .map(|key| key.to_string())
            .unwrap_or_default();

        let returned = loop {
            let mut client = pool.get().await;

            metrics.cis_call_count.inc();
            let started = Instant::now();
            let attempt = tokio::time::timeout(
                CIS_CALL_TIMEOUT,
                client.compute_cell_interactions(batch.clone()),
            )
            .await;
            metrics
                .cis_call_duration_seconds
                .observe(started.elapsed().as_secs_f64());

            match attempt {
                Ok(Ok(response)) => {
                    pool.add(client).await;
                    break response.into_inner();
                }
                Ok(Err(status)) => {
                    metrics.cis_client_count.dec();
                    warn!(bucket = %bucket, error = %status, "CIS call failed, dropping client and retrying");
                }
                Err(_) => {
                    metrics.cis_client_count.dec();
                    warn!(bucket = %bucket, "CIS call timed out, dropping client and retrying");
                }
            }
        };

        if returned_tx.send(returned).is_err() {
            warn!(bucket = %bucket, "returned channel closed before the batch was delivered");
        }
        barrier.done();
    });
}
