use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::Orchestrator;

pub struct WorkerPool {
    job_sender: mpsc::Sender<String>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` tasks that pull job IDs off a shared queue.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(orchestrator: Arc<Orchestrator>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = mpsc::channel::<String>(worker_count * 2);
        let job_receiver = Arc::new(Mutex::new(job_receiver));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let receiver = Arc::clone(&job_receiver);
            let orchestrator = Arc::clone(&orchestrator);
            workers.push(tokio::spawn(run_worker(worker_id, receiver, orchestrator)));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            workers,
        }
    }

    /// Queues a job for processing. Backpressures when the queue is full.
    pub async fn submit(&self, job_id: String) -> Result<(), WorkerError> {
        self.job_sender
            .send(job_id)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Closes the queue and waits for in-flight jobs to finish.
    pub async fn shutdown(self) {
        info!("Shutting down worker pool...");
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    job_receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    orchestrator: Arc<Orchestrator>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        // Hold the lock only long enough to pull one ID, so other
        // workers can receive while this one processes.
        let job_id = job_receiver.lock().await.recv().await;
        match job_id {
            Some(job_id) => {
                debug!("Worker {} processing job {}", worker_id, job_id);
                orchestrator.execute(&job_id).await;
            }
            None => {
                debug!("Worker {} job channel closed", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
