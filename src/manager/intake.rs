//! Job intake.
//!
//! Two producers feed one unbounded channel: a set of one-shot backlog
//! fetchers for jobs queued while the connector was away, and a permanent
//! loop over the push transport. The same job can arrive from both sources;
//! the processor's in-flight set deduplicates.

use super::Shared;
use crate::cloud::{CloudConnection, Job};
use crate::spooler::Spooler;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Spawns the backlog fetchers and the push loop.
///
/// Backlog fetchers are one-shot and exit on their own. The push loop runs
/// until shutdown is signalled or the intake channel closes; the returned
/// handle lets the manager join it during shutdown.
pub(crate) fn spawn_producers<C: CloudConnection, S: Spooler>(
    shared: &Arc<Shared<C, S>>,
    queued_jobs: HashMap<String, usize>,
    intake: &mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    for (cloud_printer_id, _count) in queued_jobs {
        let cloud = Arc::clone(&shared.cloud);
        let intake = intake.clone();
        tokio::spawn(async move {
            let jobs = match cloud.fetch_queue(&cloud_printer_id).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(
                        printer = %cloud_printer_id,
                        error = %e,
                        "Failed to fetch queued jobs"
                    );
                    return;
                }
            };
            if !jobs.is_empty() {
                info!(
                    printer = %cloud_printer_id,
                    count = jobs.len(),
                    "Fetched waiting jobs"
                );
            }
            for job in jobs {
                if intake.send(job).is_err() {
                    return;
                }
            }
        });
    }

    let cloud = Arc::clone(&shared.cloud);
    let intake = intake.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Job push loop stopping");
                    return;
                }

                batch = cloud.next_job_batch() => {
                    match batch {
                        Ok(jobs) => {
                            for job in jobs {
                                if intake.send(job).is_err() {
                                    return;
                                }
                            }
                        }
                        // The adapter owns backoff; retry immediately.
                        Err(e) => error!(error = %e, "Failed to fetch job batch"),
                    }
                    // A send never happens on an empty or failed batch, so
                    // check for a closed channel here rather than relying
                    // on a failed send that may never come.
                    if intake.is_closed() {
                        return;
                    }
                }
            }
        }
    })
}

/// Consumes the intake channel, spawning one processor per job, until
/// shutdown.
pub(crate) async fn dispatch<C: CloudConnection, S: Spooler>(
    shared: Arc<Shared<C, S>>,
    mut intake: mpsc::UnboundedReceiver<Job>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Job intake stopping");
                return;
            }

            Some(job) = intake.recv() => {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    shared.process_job(job).await;
                });
            }
        }
    }
}
