//! Print jobs and their cloud-side states.

use std::collections::HashMap;
use std::fmt;

/// Per-job options map returned by the cloud service.
pub type Ticket = HashMap<String, String>;

/// A print job delivered by the cloud service.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique identifier assigned by the cloud service.
    pub cloud_job_id: String,
    /// Cloud id of the printer the job targets.
    pub cloud_printer_id: String,
    /// Title chosen by the submitting user.
    pub title: String,
    /// Identity of the submitting user.
    pub owner_id: String,
    /// Where to download the job document from.
    pub file_url: String,
}

/// Why a job ended in the aborted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The job ticket could not be fetched or understood.
    InvalidTicket,
    /// The document could not be downloaded or printed.
    PrintFailure,
    /// The job was cancelled on the local side.
    Cancelled,
    /// Anything else, including unknown printers and spooler failures.
    Other,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTicket => "invalid_ticket",
            Self::PrintFailure => "print_failure",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job state as reported to the cloud service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudJobState {
    /// The job is queued or printing locally.
    InProgress,
    /// The job printed successfully.
    Done,
    /// The job ended without printing, for the given reason.
    Aborted(AbortReason),
}

impl CloudJobState {
    /// True once the job will receive no further state reports.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Aborted(_) => "aborted",
        }
    }
}

impl fmt::Display for CloudJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "aborted/{reason}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!CloudJobState::InProgress.is_terminal());
        assert!(CloudJobState::Done.is_terminal());
        assert!(CloudJobState::Aborted(AbortReason::Other).is_terminal());
    }

    #[test]
    fn display_includes_abort_reason() {
        assert_eq!(
            CloudJobState::Aborted(AbortReason::PrintFailure).to_string(),
            "aborted/print_failure"
        );
        assert_eq!(CloudJobState::Done.to_string(), "done");
    }
}
