//! Fixed-size pool of onboarding loops
//!
//! Each loop claims one item at a time and processes it to completion before
//! checking for shutdown again. Claims are atomic in the queue, so loops never
//! share an item.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::onboarding::{ItemOutcome, OnboardingState, OnboardingWorker};
use crate::services::OnboardingServices;

pub struct OnboardingPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl OnboardingPool {
    /// Spawn `services.config.worker_count` loops.
    pub fn start(services: Arc<OnboardingServices>) -> Self {
        let worker_count = services.config.worker_count.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            worker_count,
            empty_queue_backoff_ms = services.config.empty_queue_backoff.as_millis() as u64,
            "Onboarding worker pool started"
        );

        let handles = (0..worker_count)
            .map(|index| {
                let worker = OnboardingWorker::new(index, Arc::clone(&services));
                tokio::spawn(worker_loop(worker, shutdown_rx.clone()))
            })
            .collect();

        Self {
            shutdown_tx,
            handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Ask every loop to stop after its current item. Does not wait.
    pub fn shutdown(&self) {
        tracing::info!("Onboarding worker pool shutting down");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for every loop to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Onboarding worker task panicked");
            }
        }
        tracing::info!("Onboarding worker pool stopped");
    }

    pub async fn shutdown_and_join(self) {
        self.shutdown();
        self.join().await;
    }
}

async fn worker_loop(worker: OnboardingWorker, mut shutdown_rx: watch::Receiver<bool>) {
    let backoff = worker.services().config.empty_queue_backoff;
    tracing::debug!(worker = worker.index(), "Onboarding worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match worker.run_once().await {
            Ok(Some((item, outcome))) => {
                let state = outcome.terminal_state();
                match outcome {
                    ItemOutcome::Completed => tracing::debug!(
                        worker = worker.index(),
                        track_id = %item.id,
                        state = %state,
                        "Item finished"
                    ),
                    ItemOutcome::Cancelled(kind) => tracing::warn!(
                        worker = worker.index(),
                        track_id = %item.id,
                        state = %state,
                        kind = %kind,
                        "Item finished"
                    ),
                }
                // Straight back to Idle and the next claim, no delay.
                continue;
            }
            Ok(None) => {
                tracing::trace!(
                    worker = worker.index(),
                    state = %OnboardingState::Idle,
                    backoff_ms = backoff.as_millis() as u64,
                    "Queue empty"
                );
            }
            Err(e) => {
                tracing::error!(
                    worker = worker.index(),
                    state = %OnboardingState::Idle,
                    error = %e,
                    "Failed to claim work item"
                );
            }
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = sleep(backoff) => {}
        }
    }

    tracing::debug!(worker = worker.index(), "Onboarding worker stopped");
}

