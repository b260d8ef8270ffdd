//! The connector core.
//!
//! [`PrinterManager`] composes five concurrent activities over one shared
//! printer table:
//!
//! - the reconciliation loop ([`sync`]), which periodically brings the
//!   cloud printer set in line with the local one;
//! - the heartbeat-update listener, which forwards server-side interval
//!   changes into the reconciliation loop;
//! - job intake ([`intake`]), fanning the startup backlog and the push
//!   stream into one channel;
//! - per-job processors ([`job`]), which download, submit, and follow each
//!   job to a terminal state;
//! - stats and shutdown, exposed on the manager itself.
//!
//! # Example
//!
//! ```ignore
//! let manager = PrinterManager::start(cloud, spooler, &config).await?;
//! let stats = manager.job_stats();
//! manager.quit().await;
//! ```

mod intake;
mod job;
mod sync;

use crate::cloud::{CloudConnection, CloudError};
use crate::config::{parse_duration, ConnectorConfig, DurationParseError};
use crate::limit::Limiter;
use crate::printer::{Printer, PrinterTable};
use crate::spooler::{Spooler, SpoolerError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use thiserror::Error;
use tracing::info;

/// Fatal bootstrap failures.
///
/// Once the constructor returns, nothing is fatal anymore: runtime failures
/// are logged and retried or folded into per-job terminal states.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Spooler(#[from] SpoolerError),

    #[error("invalid interval: {0}")]
    Interval(#[from] DurationParseError),
}

/// Counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStats {
    /// Jobs that reached the done state.
    pub done: u64,
    /// Jobs that ended aborted, including assembly and submit failures.
    pub errored: u64,
    /// Jobs currently holding a submit slot on some printer.
    pub processing: u64,
}

#[derive(Default)]
struct JobTotals {
    done: u64,
    errored: u64,
}

/// State shared between the manager's tasks.
pub(crate) struct Shared<C, S> {
    pub(crate) cloud: Arc<C>,
    pub(crate) spooler: Arc<S>,
    pub(crate) printers: PrinterTable,
    pub(crate) download_slots: Limiter,
    in_flight: Mutex<HashSet<String>>,
    totals: Mutex<JobTotals>,
    pub(crate) queue_size: usize,
    pub(crate) full_username: bool,
    pub(crate) ignore_raw_printers: bool,
    pub(crate) share_scope: String,
    pub(crate) follow_timeout: Option<Duration>,
}

impl<C: CloudConnection, S: Spooler> Shared<C, S> {
    /// Claims a job for processing. Returns false if another processor
    /// already holds it.
    pub(crate) fn claim_job(&self, cloud_job_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight set lock poisoned")
            .insert(cloud_job_id.to_string())
    }

    /// Releases a claimed job once its processor exits.
    pub(crate) fn release_job(&self, cloud_job_id: &str) {
        self.in_flight
            .lock()
            .expect("in-flight set lock poisoned")
            .remove(cloud_job_id);
    }

    pub(crate) fn record_done(&self) {
        self.totals.lock().expect("job totals lock poisoned").done += 1;
    }

    pub(crate) fn record_error(&self) {
        self.totals
            .lock()
            .expect("job totals lock poisoned")
            .errored += 1;
    }
}

/// Manages all interactions between the local spooler and the cloud print
/// service.
pub struct PrinterManager<C: CloudConnection, S: Spooler> {
    shared: Arc<Shared<C, S>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: CloudConnection, S: Spooler> PrinterManager<C, S> {
    /// Starts the connector.
    ///
    /// Fetches the cloud printer inventory, applies pending heartbeat
    /// changes, runs one reconcile round synchronously so a broken setup
    /// fails here rather than silently in the background, then launches
    /// the reconciliation loop, the heartbeat listener, and job intake.
    pub async fn start(
        cloud: Arc<C>,
        spooler: Arc<S>,
        config: &ConnectorConfig,
    ) -> Result<Self, ManagerError> {
        let poll_interval = parse_duration(&config.printer_poll_interval)?;
        let follow_timeout = config
            .job_follow_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()?;

        let inventory = cloud.list().await?;

        let mut printers = inventory.printers;
        for printer in &mut printers {
            printer.submit_slots = Some(Arc::new(Limiter::new(config.queue_size)));
        }
        let table = PrinterTable::new(printers);

        for cloud_id in &inventory.ping_interval_changes {
            // A missing printer resolves itself as initialization continues.
            let Some(printer) = table.get(cloud_id) else {
                continue;
            };
            cloud.set_printer_ping_interval(&printer).await?;
            info!(
                printer = %printer.display_name,
                interval = ?printer.ping_interval,
                "Printer ping interval changed"
            );
        }

        let shared = Arc::new(Shared {
            cloud: Arc::clone(&cloud),
            spooler,
            printers: table,
            download_slots: Limiter::new(config.max_concurrent_download),
            in_flight: Mutex::new(HashSet::new()),
            totals: Mutex::new(JobTotals::default()),
            queue_size: config.queue_size,
            full_username: config.full_username,
            ignore_raw_printers: config.ignore_raw_printers,
            share_scope: config.share_scope.clone(),
            follow_timeout,
        });

        shared.advertise_min_ping_interval();

        // Sync once before returning, to make sure things are working.
        shared.sync_printers().await?;

        let shutdown = CancellationToken::new();

        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let push_loop = intake::spawn_producers(
            &shared,
            inventory.queued_jobs,
            &intake_tx,
            shutdown.clone(),
        );
        let dispatcher = tokio::spawn(intake::dispatch(
            Arc::clone(&shared),
            intake_rx,
            shutdown.clone(),
        ));

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let update_cloud = Arc::clone(&cloud);
        let update_shutdown = shutdown.clone();
        let update_listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = update_shutdown.cancelled() => return,

                    update = update_cloud.next_printer_update() => {
                        let Some(cloud_id) = update else { return };
                        if update_tx.send(cloud_id).is_err() {
                            return;
                        }
                    }
                }
            }
        });
        let reconciler = tokio::spawn(sync::run(
            Arc::clone(&shared),
            poll_interval,
            update_rx,
            shutdown.clone(),
        ));

        Ok(Self {
            shared,
            shutdown,
            tasks: Mutex::new(vec![reconciler, dispatcher, push_loop, update_listener]),
        })
    }

    /// Returns counters for monitoring.
    ///
    /// `processing` is derived at read time from the submit slots held
    /// across the current printer snapshot.
    pub fn job_stats(&self) -> JobStats {
        let processing = self
            .shared
            .printers
            .get_all()
            .iter()
            .filter_map(|p| p.submit_slots.as_ref())
            .map(|slots| slots.in_flight() as u64)
            .sum();

        let totals = self
            .shared
            .totals
            .lock()
            .expect("job totals lock poisoned");
        JobStats {
            done: totals.done,
            errored: totals.errored,
            processing,
        }
    }

    /// Returns the current printer snapshot.
    pub fn printers(&self) -> Vec<Printer> {
        self.shared.printers.get_all()
    }

    /// Stops the reconciliation loop, job intake, the push loop, and the
    /// heartbeat-update listener, joining each before returning.
    ///
    /// Job processors already running are left to finish on their own;
    /// nothing is forcibly cancelled.
    pub async fn quit(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task list lock poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}
