//! Local print spooler boundary.
//!
//! Mirror of the cloud boundary for the host side: printer enumeration,
//! capability documents, job submission, and job-state polling all go
//! through [`Spooler`].

use crate::cloud::{AbortReason, CloudJobState, Ticket};
use crate::printer::Printer;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by a spooler adapter.
#[derive(Debug, Error)]
pub enum SpoolerError {
    /// The spooler could not be reached or rejected the request.
    #[error("spooler unavailable: {0}")]
    Unavailable(String),

    /// The spooler does not know the referenced queue.
    #[error("printer {0} is not known to the spooler")]
    UnknownPrinter(String),

    /// The spooler does not know the referenced job.
    #[error("local job {0} is not known to the spooler")]
    UnknownJob(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Job state as reported by the local spooler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalJobState {
    Pending,
    Held,
    Processing,
    Stopped,
    Canceled,
    Aborted,
    Completed,
}

impl LocalJobState {
    /// Maps the local state onto the state reported to the cloud service.
    ///
    /// Local failure modes collapse into terminal abort causes; everything
    /// before the terminal state reads as in progress.
    pub fn cloud_state(&self) -> CloudJobState {
        match self {
            Self::Pending | Self::Held | Self::Processing => CloudJobState::InProgress,
            Self::Completed => CloudJobState::Done,
            Self::Canceled => CloudJobState::Aborted(AbortReason::Cancelled),
            Self::Stopped | Self::Aborted => CloudJobState::Aborted(AbortReason::PrintFailure),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Processing => "processing",
            Self::Stopped => "stopped",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for LocalJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interface to the host print subsystem.
pub trait Spooler: Send + Sync + 'static {
    /// Enumerates the queues the spooler currently exposes.
    fn printers(&self) -> impl Future<Output = Result<Vec<Printer>, SpoolerError>> + Send;

    /// Reads a printer's capability document.
    fn ppd(&self, local_name: &str) -> impl Future<Output = Result<String, SpoolerError>> + Send;

    /// Drops any cached capability document for a removed printer.
    fn remove_cached_ppd(&self, local_name: &str);

    /// Creates an empty spool file for an incoming job document.
    ///
    /// The caller owns the file and removes it when the job is finished.
    fn create_temp_file(&self) -> Result<PathBuf, SpoolerError>;

    /// Submits a document to a queue and returns the local job id.
    fn print(
        &self,
        local_name: &str,
        path: &Path,
        title: &str,
        owner: &str,
        options: &Ticket,
    ) -> impl Future<Output = Result<u32, SpoolerError>> + Send;

    /// Reads a job's current state and printed page count.
    fn job_state(
        &self,
        local_job_id: u32,
    ) -> impl Future<Output = Result<(LocalJobState, u32), SpoolerError>> + Send;
}

/// Splits printers into (usable, raw) sets.
///
/// Raw queues have no capability document and cannot be registered with
/// the cloud service in a useful form.
pub fn split_raw_printers(printers: Vec<Printer>) -> (Vec<Printer>, Vec<Printer>) {
    printers.into_iter().partition(|p| !p.is_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_states_map_to_in_progress() {
        for state in [
            LocalJobState::Pending,
            LocalJobState::Held,
            LocalJobState::Processing,
        ] {
            assert_eq!(state.cloud_state(), CloudJobState::InProgress);
        }
    }

    #[test]
    fn terminal_states_map_to_terminal_cloud_states() {
        assert_eq!(LocalJobState::Completed.cloud_state(), CloudJobState::Done);
        assert_eq!(
            LocalJobState::Canceled.cloud_state(),
            CloudJobState::Aborted(AbortReason::Cancelled)
        );
        assert_eq!(
            LocalJobState::Aborted.cloud_state(),
            CloudJobState::Aborted(AbortReason::PrintFailure)
        );
        assert_eq!(
            LocalJobState::Stopped.cloud_state(),
            CloudJobState::Aborted(AbortReason::PrintFailure)
        );
    }

    #[test]
    fn split_raw_partitions_by_flag() {
        let mut raw = Printer::new("label-writer");
        raw.is_raw = true;
        let plain = Printer::new("office-laser");

        let (kept, dropped) = split_raw_printers(vec![raw, plain]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].local_name, "office-laser");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].local_name, "label-writer");
    }
}
