//! Printer reconciliation.
//!
//! One long-running task multiplexes three events: the periodic sync tick,
//! heartbeat-interval updates pushed by the cloud service, and shutdown.
//! The tick timer restarts only after a round completes, so a slow round
//! never overlaps the next one.

use super::Shared;
use crate::cloud::{CloudConnection, LazyPpd};
use crate::limit::Limiter;
use crate::printer::{diff_printers, DiffOperation, Printer, PrinterDiff};
use crate::spooler::{split_raw_printers, Spooler, SpoolerError};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs the reconciliation loop until shutdown.
pub(crate) async fn run<C: CloudConnection, S: Spooler>(
    shared: Arc<Shared<C, S>>,
    interval: Duration,
    mut updates: mpsc::UnboundedReceiver<String>,
    shutdown: CancellationToken,
) {
    let timer = tokio::time::sleep(interval);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Printer reconciliation stopping");
                return;
            }

            () = timer.as_mut() => {
                if let Err(e) = shared.sync_printers().await {
                    error!(error = %e, "Printer sync failed");
                }
                timer.as_mut().reset(tokio::time::Instant::now() + interval);
            }

            Some(cloud_id) = updates.recv() => {
                shared.apply_ping_interval_update(&cloud_id).await;
            }
        }
    }
}

impl<C: CloudConnection, S: Spooler> Shared<C, S> {
    /// Brings the cloud printer set in line with the local one.
    ///
    /// Diffs are applied in parallel, one task per printer. A printer whose
    /// diff fails is skipped for this round and retried on the next tick;
    /// the round itself only fails if the local spooler cannot be
    /// enumerated.
    pub(crate) async fn sync_printers(self: &Arc<Self>) -> Result<(), SpoolerError> {
        info!("Synchronizing printers");

        let mut local = self.spooler.printers().await?;
        if self.ignore_raw_printers {
            local = split_raw_printers(local).0;
        }

        let Some(diffs) = diff_printers(&local, &self.printers.get_all()) else {
            info!(count = local.len(), "Printers already in sync");
            return Ok(());
        };

        let mut tasks = Vec::with_capacity(diffs.len());
        for diff in diffs {
            let shared = Arc::clone(self);
            tasks.push(tokio::spawn(async move { shared.apply_diff(diff).await }));
        }

        let mut current = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Ok(Some(printer)) = task.await {
                current.push(printer);
            }
        }

        let count = current.len();
        self.printers.refresh(current);
        self.advertise_min_ping_interval();
        info!(count, "Finished synchronizing printers");

        Ok(())
    }

    /// Applies one diff and returns the printer that should appear in the
    /// next table snapshot, or `None` to drop it.
    async fn apply_diff(&self, diff: PrinterDiff) -> Option<Printer> {
        match diff.op {
            DiffOperation::Register => self.register_printer(diff.printer).await,

            DiffOperation::Update => {
                let updated = {
                    let ppd: LazyPpd<'_> = Box::pin(self.spooler.ppd(&diff.printer.local_name));
                    self.cloud.update(&diff, ppd).await
                };
                match updated {
                    Ok(()) => {
                        info!(printer = %diff.printer.local_name, "Updated printer");
                        Some(diff.printer)
                    }
                    Err(e) => {
                        error!(
                            printer = %diff.printer.local_name,
                            error = %e,
                            "Failed to update printer"
                        );
                        None
                    }
                }
            }

            DiffOperation::Delete => {
                self.spooler.remove_cached_ppd(&diff.printer.local_name);
                match self.cloud.delete(&diff.printer.cloud_id).await {
                    Ok(()) => info!(printer = %diff.printer.local_name, "Deleted printer"),
                    Err(e) => error!(
                        cloud_id = %diff.printer.cloud_id,
                        error = %e,
                        "Failed to delete printer"
                    ),
                }
                None
            }

            DiffOperation::NoChange => {
                debug!(printer = %diff.printer.local_name, "No change to printer");
                Some(diff.printer)
            }
        }
    }

    async fn register_printer(&self, mut printer: Printer) -> Option<Printer> {
        let ppd = match self.spooler.ppd(&printer.local_name).await {
            Ok(ppd) => ppd,
            Err(e) => {
                error!(
                    printer = %printer.local_name,
                    error = %e,
                    "Capability read failed while registering printer"
                );
                return None;
            }
        };

        let registered = self.cloud.register(&printer, &ppd).await;
        printer.cloud_id = match registered {
            Ok(cloud_id) => cloud_id,
            Err(e) => {
                error!(printer = %printer.local_name, error = %e, "Failed to register printer");
                return None;
            }
        };
        printer.registered = Some(Utc::now());
        info!(
            printer = %printer.local_name,
            cloud_id = %printer.cloud_id,
            "Registered printer"
        );

        if !self.share_scope.is_empty() && self.cloud.can_share() {
            match self.cloud.share(&printer.cloud_id, &self.share_scope).await {
                Ok(()) => {
                    info!(printer = %printer.local_name, scope = %self.share_scope, "Shared printer");
                }
                Err(e) => {
                    // Sharing is best-effort; the registration stands.
                    error!(printer = %printer.local_name, error = %e, "Failed to share printer");
                }
            }
        }

        printer.submit_slots = Some(Arc::new(Limiter::new(self.queue_size)));
        Some(printer)
    }

    /// Re-fetches one printer's metadata and re-applies its heartbeat
    /// interval to the push session.
    async fn apply_ping_interval_update(&self, cloud_id: &str) {
        let printer = match self.cloud.printer(cloud_id).await {
            Ok(printer) => printer,
            Err(e) => {
                error!(cloud_id = %cloud_id, error = %e, "Failed to fetch printer for ping update");
                return;
            }
        };
        if let Err(e) = self.cloud.set_printer_ping_interval(&printer).await {
            error!(
                printer = %printer.display_name,
                error = %e,
                "Failed to apply printer ping interval"
            );
            return;
        }
        info!(
            printer = %printer.display_name,
            interval = ?printer.ping_interval,
            "Printer ping interval changed"
        );
    }

    /// Advertises the smallest heartbeat interval across known printers.
    ///
    /// With no printers there is nothing to keep alive, so the advertised
    /// interval is left alone.
    pub(crate) fn advertise_min_ping_interval(&self) {
        let min = self
            .printers
            .get_all()
            .iter()
            .map(|p| p.ping_interval)
            .min();
        if let Some(interval) = min {
            self.cloud.set_connector_ping_interval(interval);
            debug!(interval = ?interval, "Advertised connector ping interval");
        }
    }
}
