//! Cloud print service boundary.
//!
//! The connector core never talks to the network itself; everything it
//! needs from the cloud service goes through [`CloudConnection`]. The trait
//! is written against futures rather than transports so tests can drive the
//! core with in-memory fakes.

mod job;

pub use job::{AbortReason, CloudJobState, Job, Ticket};

use crate::printer::{Printer, PrinterDiff};
use crate::spooler::SpoolerError;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a cloud adapter.
#[derive(Debug, Error)]
pub enum CloudError {
    /// A request reached the service and was rejected, or never got there.
    #[error("cloud request failed: {0}")]
    Request(String),

    /// The service does not know the referenced printer.
    #[error("printer {0} is not registered with the cloud service")]
    UnknownPrinter(String),

    /// The service does not know the referenced job.
    #[error("job {0} is not known to the cloud service")]
    UnknownJob(String),

    /// A document download failed.
    #[error("download from {url} failed: {message}")]
    Download { url: String, message: String },

    /// The on-demand capability read failed during a printer update.
    #[error("capability read failed: {0}")]
    Capabilities(#[from] SpoolerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Everything the cloud service reports when the connector starts.
#[derive(Debug, Default)]
pub struct CloudInventory {
    /// Printers currently registered to this connector.
    pub printers: Vec<Printer>,
    /// Per-printer count of jobs queued while the connector was away.
    pub queued_jobs: HashMap<String, usize>,
    /// Printers whose heartbeat interval changed and must be re-applied.
    pub ping_interval_changes: HashSet<String>,
}

/// A capability document supplied lazily.
///
/// Printer updates only sometimes need the capability document, so the
/// reconciler hands the adapter an un-polled future; adapters that don't
/// need the document simply never await it.
pub type LazyPpd<'a> = BoxFuture<'a, Result<String, SpoolerError>>;

/// Interface to the remote print service.
///
/// `next_job_batch` and `next_printer_update` block until the push
/// transport delivers something; the adapter owns reconnection and backoff.
pub trait CloudConnection: Send + Sync + 'static {
    /// Fetches the connector's registered printers, queued-job counts, and
    /// pending heartbeat changes.
    fn list(&self) -> impl Future<Output = Result<CloudInventory, CloudError>> + Send;

    /// Re-applies one printer's heartbeat interval to the push session.
    fn set_printer_ping_interval(
        &self,
        printer: &Printer,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// Advertises the connector-wide heartbeat interval.
    fn set_connector_ping_interval(&self, interval: Duration);

    /// Registers a local printer and returns the cloud id issued for it.
    fn register(
        &self,
        printer: &Printer,
        ppd: &str,
    ) -> impl Future<Output = Result<String, CloudError>> + Send;

    /// Pushes changed printer attributes to the service. The capability
    /// document is fetched through `ppd` only if the update needs it.
    fn update(
        &self,
        diff: &PrinterDiff,
        ppd: LazyPpd<'_>,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// Removes a printer registration.
    fn delete(&self, cloud_id: &str) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// Shares a printer with the given scope.
    fn share(
        &self,
        cloud_id: &str,
        scope: &str,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// True when the adapter's credentials permit sharing.
    fn can_share(&self) -> bool;

    /// Fetches fresh metadata for one printer.
    fn printer(&self, cloud_id: &str) -> impl Future<Output = Result<Printer, CloudError>> + Send;

    /// Fetches the jobs queued for one printer.
    fn fetch_queue(
        &self,
        cloud_printer_id: &str,
    ) -> impl Future<Output = Result<Vec<Job>, CloudError>> + Send;

    /// Waits for the push transport to deliver the next batch of jobs.
    fn next_job_batch(&self) -> impl Future<Output = Result<Vec<Job>, CloudError>> + Send;

    /// Waits for the next printer whose settings changed server-side.
    /// Returns `None` when the update stream has closed for good.
    fn next_printer_update(&self) -> impl Future<Output = Option<String>> + Send;

    /// Fetches a job's ticket (options map).
    fn ticket(&self, cloud_job_id: &str) -> impl Future<Output = Result<Ticket, CloudError>> + Send;

    /// Downloads a job document into the given file.
    fn download(
        &self,
        target: &Path,
        url: &str,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;

    /// Reports a job's state to the cloud service.
    fn control(
        &self,
        cloud_job_id: &str,
        state: CloudJobState,
        pages: u32,
    ) -> impl Future<Output = Result<(), CloudError>> + Send;
}
