//! Per-job processing.
//!
//! Each job runs in its own task: claim, assemble, submit, follow, clean
//! up. Every failure collapses into a single terminal state report to the
//! cloud service; nothing propagates as an error return.

use super::Shared;
use crate::cloud::{AbortReason, CloudConnection, CloudJobState, Job, Ticket};
use crate::printer::Printer;
use crate::spooler::{LocalJobState, Spooler};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Submitted titles are capped at what the local spooler accepts.
const MAX_TITLE_BYTES: usize = 255;

/// How often a submitted job's local state is polled.
const FOLLOW_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// A spool file that removes itself when the job is finished with it.
struct SpoolFile(PathBuf);

impl SpoolFile {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %self.0.display(),
                    error = %e,
                    "Failed to remove job spool file"
                );
            }
        }
    }
}

/// Why a job could not be assembled or submitted.
struct JobFailure {
    reason: AbortReason,
    message: String,
}

impl JobFailure {
    fn new(reason: AbortReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl<C: CloudConnection, S: Spooler> Shared<C, S> {
    /// Processes one job from intake to a terminal state.
    ///
    /// Duplicate deliveries return immediately: the cloud re-sends a job
    /// until it leaves the queued state, so a second arrival just means the
    /// first processor hasn't reported progress yet.
    pub(crate) async fn process_job(&self, job: Job) {
        if !self.claim_job(&job.cloud_job_id) {
            return;
        }
        info!(job = %job.cloud_job_id, "Received job");
        self.run_job(&job).await;
        self.release_job(&job.cloud_job_id);
    }

    async fn run_job(&self, job: &Job) {
        let (printer, options, spool) = match self.assemble_job(job).await {
            Ok(parts) => parts,
            Err(failure) => {
                self.record_error();
                error!(job = %job.cloud_job_id, "{}", failure.message);
                self.report(job, CloudJobState::Aborted(failure.reason), 0)
                    .await;
                return;
            }
        };

        let owner = normalize_owner(&job.owner_id, self.full_username);

        let Some(submit_slots) = printer.submit_slots.clone() else {
            self.record_error();
            error!(
                job = %job.cloud_job_id,
                printer = %printer.local_name,
                "Printer record has no submit slots"
            );
            self.report(job, CloudJobState::Aborted(AbortReason::Other), 0)
                .await;
            return;
        };
        let _slot = submit_slots.acquire().await;

        let title = job_title(&job.cloud_job_id, &job.title);
        let local_job_id = match self
            .spooler
            .print(&printer.local_name, spool.path(), &title, &owner, &options)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.record_error();
                error!(
                    job = %job.cloud_job_id,
                    error = %e,
                    "Failed to submit job to the local spooler"
                );
                self.report(job, CloudJobState::Aborted(AbortReason::PrintFailure), 0)
                    .await;
                return;
            }
        };
        info!(
            job = %job.cloud_job_id,
            local_job = local_job_id,
            "Submitted job to the local spooler"
        );

        self.follow_job(job, local_job_id).await;
    }

    /// Gathers everything needed to print: the printer record, the ticket,
    /// and the downloaded document.
    ///
    /// The returned [`SpoolFile`] removes the document once dropped, on
    /// every exit path of the caller.
    async fn assemble_job(&self, job: &Job) -> Result<(Printer, Ticket, SpoolFile), JobFailure> {
        let Some(printer) = self.printers.get(&job.cloud_printer_id) else {
            return Err(JobFailure::new(
                AbortReason::Other,
                format!(
                    "Failed to find printer {} for job {}",
                    job.cloud_printer_id, job.cloud_job_id
                ),
            ));
        };

        let options = self.cloud.ticket(&job.cloud_job_id).await.map_err(|e| {
            JobFailure::new(
                AbortReason::InvalidTicket,
                format!("Failed to get ticket for job {}: {}", job.cloud_job_id, e),
            )
        })?;

        let spool = SpoolFile(self.spooler.create_temp_file().map_err(|e| {
            JobFailure::new(
                AbortReason::Other,
                format!(
                    "Failed to create spool file for job {}: {}",
                    job.cloud_job_id, e
                ),
            )
        })?);

        let download_slot = self.download_slots.acquire().await;
        let started = Instant::now();
        let downloaded = self.cloud.download(spool.path(), &job.file_url).await;
        let elapsed = started.elapsed();
        drop(download_slot);

        // The spool file guard removes the partial download on the error
        // return here.
        downloaded.map_err(|e| {
            JobFailure::new(
                AbortReason::PrintFailure,
                format!(
                    "Failed to download document for job {}: {}",
                    job.cloud_job_id, e
                ),
            )
        })?;

        info!(
            job = %job.cloud_job_id,
            duration_ms = elapsed.as_millis() as u64,
            "Downloaded job document"
        );

        Ok((printer, options, spool))
    }

    /// Polls the local job state and mirrors it to the cloud until the job
    /// reaches a terminal state.
    async fn follow_job(&self, job: &Job, local_job_id: u32) {
        let mut poll = tokio::time::interval(FOLLOW_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate first tick so polls start one interval in.
        poll.tick().await;

        let deadline = self
            .follow_timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        let mut last_state: Option<LocalJobState> = None;
        let mut cloud_state = CloudJobState::InProgress;
        let mut pages: u32 = 0;

        loop {
            poll.tick().await;

            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    warn!(
                        job = %job.cloud_job_id,
                        local_job = local_job_id,
                        "Job exceeded the follow deadline"
                    );
                    self.report(job, CloudJobState::Aborted(AbortReason::Other), pages)
                        .await;
                    self.record_error();
                    return;
                }
            }

            let (state, latest_pages) = match self.spooler.job_state(local_job_id).await {
                Ok(polled) => polled,
                Err(e) => {
                    warn!(
                        local_job = local_job_id,
                        error = %e,
                        "Failed to read local job state"
                    );
                    self.report(job, CloudJobState::Aborted(AbortReason::Other), pages)
                        .await;
                    self.record_error();
                    return;
                }
            };

            if last_state != Some(state) || latest_pages != pages {
                last_state = Some(state);
                cloud_state = state.cloud_state();
                pages = latest_pages;
                self.report(job, cloud_state, pages).await;
                debug!(
                    job = %job.cloud_job_id,
                    local_state = %state,
                    cloud_state = %cloud_state,
                    pages,
                    "Job state changed"
                );
            }

            match cloud_state {
                CloudJobState::InProgress => {}
                CloudJobState::Done => {
                    self.record_done();
                    info!(job = %job.cloud_job_id, pages, "Job done");
                    return;
                }
                CloudJobState::Aborted(reason) => {
                    self.record_error();
                    info!(job = %job.cloud_job_id, reason = %reason, "Job aborted");
                    return;
                }
            }
        }
    }

    async fn report(&self, job: &Job, state: CloudJobState, pages: u32) {
        if let Err(e) = self.cloud.control(&job.cloud_job_id, state, pages).await {
            error!(job = %job.cloud_job_id, error = %e, "Failed to report job state");
        }
    }
}

/// Builds the title submitted to the local spooler.
///
/// The cloud job id is prefixed so local queues can be traced back, and the
/// whole title is capped at [`MAX_TITLE_BYTES`] without splitting a
/// character.
fn job_title(cloud_job_id: &str, title: &str) -> String {
    let full = format!("gcp:{cloud_job_id} {title}");
    if full.len() <= MAX_TITLE_BYTES {
        return full;
    }
    let mut end = MAX_TITLE_BYTES;
    while !full.is_char_boundary(end) {
        end -= 1;
    }
    full[..end].to_string()
}

/// Strips the owner id down to the local part unless full usernames are
/// configured.
fn normalize_owner(owner_id: &str, full_username: bool) -> String {
    if full_username {
        owner_id.to_string()
    } else {
        owner_id.split('@').next().unwrap_or_default().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_carries_the_job_id_prefix() {
        assert_eq!(job_title("j123", "quarterly report"), "gcp:j123 quarterly report");
    }

    #[test]
    fn title_is_capped_at_255_bytes() {
        let long = "x".repeat(400);
        let title = job_title("j123", &long);
        assert_eq!(title.len(), MAX_TITLE_BYTES);
        assert!(title.starts_with("gcp:j123 "));
    }

    #[test]
    fn title_truncation_respects_char_boundaries() {
        // Multibyte characters positioned to straddle the byte cap.
        let long = "é".repeat(200);
        let title = job_title("j", &long);
        assert!(title.len() <= MAX_TITLE_BYTES);
        assert!(title.chars().all(|c| c == 'é' || c.is_ascii()));
    }

    #[test]
    fn owner_is_stripped_at_the_first_at_sign() {
        assert_eq!(normalize_owner("user@example.com", false), "user");
        assert_eq!(normalize_owner("user@a@b", false), "user");
        assert_eq!(normalize_owner("user", false), "user");
        assert_eq!(normalize_owner("", false), "");
    }

    #[test]
    fn full_usernames_pass_through() {
        assert_eq!(
            normalize_owner("user@example.com", true),
            "user@example.com"
        );
    }
}
