use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::IngestionPipeline;
use crate::error::TrackingError;
use crate::models::PositionSample;

/// Runs the ingestion pipeline on a fixed pool of shard workers.
///
/// Each worker owns a bounded queue and processes its samples one at a time,
/// so samples for the same object (always routed to the same shard) keep their
/// arrival order while different objects proceed in parallel.
pub struct Dispatcher {
    handle: DispatchHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Cloneable producer side of a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatchHandle {
    shards: Arc<Vec<mpsc::Sender<PositionSample>>>,
}

impl Dispatcher {
    /// Start `workers` shard workers, each with a queue of `queue_depth` samples.
    pub fn spawn(pipeline: Arc<IngestionPipeline>, workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        let queue_depth = queue_depth.max(1);

        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for shard in 0..workers {
            let (tx, rx) = mpsc::channel(queue_depth);
            shards.push(tx);
            handles.push(tokio::spawn(run_shard(shard, Arc::clone(&pipeline), rx)));
        }

        tracing::info!(workers, queue_depth, "Ingestion dispatcher started");

        Self {
            handle: DispatchHandle {
                shards: Arc::new(shards),
            },
            workers: handles,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Drain the queues and stop the workers.
    ///
    /// Workers exit once every [`DispatchHandle`] has been dropped, so callers
    /// must stop their producers first.
    pub async fn shutdown(self) {
        let Self { handle, workers } = self;
        drop(handle);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Ingestion worker panicked: {}", e);
            }
        }

        tracing::info!("Ingestion dispatcher stopped");
    }
}

impl DispatchHandle {
    /// Queue a sample, waiting for room on its shard.
    pub async fn submit(&self, sample: PositionSample) -> Result<(), TrackingError> {
        let shard = &self.shards[self.shard_for(&sample.object_id)];
        shard
            .send(sample)
            .await
            .map_err(|_| TrackingError::PipelineClosed)
    }

    /// Queue a sample without waiting.
    pub fn try_submit(&self, sample: PositionSample) -> Result<(), TrackingError> {
        let shard = &self.shards[self.shard_for(&sample.object_id)];
        shard.try_send(sample).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TrackingError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TrackingError::PipelineClosed,
        })
    }

    /// The shard an object's samples are routed to.
    pub fn shard_for(&self, object_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        object_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

async fn run_shard(
    shard: usize,
    pipeline: Arc<IngestionPipeline>,
    mut rx: mpsc::Receiver<PositionSample>,
) {
    tracing::debug!(shard, "Ingestion worker started");

    while let Some(sample) = rx.recv().await {
        let pipeline = Arc::clone(&pipeline);
        // Store writes are synchronous; keep them off the async workers.
        match tokio::task::spawn_blocking(move || pipeline.process(&sample)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!(shard, "Sample dropped: {}", e),
            Err(e) => tracing::error!(shard, "Sample processing panicked: {}", e),
        }
    }

    tracing::debug!(shard, "Ingestion worker stopped");
}
