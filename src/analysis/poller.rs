use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::twelvelabs::JobStatus;
use crate::utils::format_elapsed;
use crate::{AnalyzerError, JobKind, Result};

/// Outcome of a job that reached `ready`
#[derive(Debug, Clone)]
pub struct PollReport {
    /// Number of status checks made, including the final one
    pub checks: u32,
    pub elapsed: Duration,
    /// Status that ended the wait
    pub last_status: JobStatus,
}

/// Fixed-interval wait for a remote job to reach a terminal status.
///
/// `ready` ends the wait, `failed` aborts it without further checks, and every
/// other status (including ones the service may add later) keeps polling until
/// the check or time budget runs out or the token is cancelled.
#[derive(Debug, Clone)]
pub struct JobPoller {
    interval: Duration,
    max_wait: Duration,
    max_checks: u32,
    cancel: CancellationToken,
    show_progress: bool,
}

impl JobPoller {
    pub fn new(interval: Duration, max_wait: Duration, max_checks: u32) -> Self {
        Self {
            interval,
            max_wait,
            max_checks: max_checks.max(1),
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.max_wait(), config.max_checks)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Call `fetch_status` until it reports a terminal status
    pub async fn await_terminal<F, Fut>(&self, job: JobKind, mut fetch_status: F) -> Result<PollReport>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobStatus>>,
    {
        let progress = self.progress_bar(job);
        let started = Instant::now();
        let mut checks = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                progress.abandon_with_message(format!("{} cancelled", job));
                return Err(AnalyzerError::Cancelled { job });
            }

            checks += 1;
            let status = tokio::select! {
                _ = self.cancel.cancelled() => {
                    progress.abandon_with_message(format!("{} cancelled", job));
                    return Err(AnalyzerError::Cancelled { job });
                }
                status = fetch_status() => status?,
            };

            match status {
                JobStatus::Ready => {
                    let elapsed = started.elapsed();
                    progress.finish_with_message(format!("{} complete", job));
                    tracing::info!(
                        "{} ready after {} check(s) in {}",
                        job,
                        checks,
                        format_elapsed(elapsed)
                    );
                    return Ok(PollReport {
                        checks,
                        elapsed,
                        last_status: status,
                    });
                }
                JobStatus::Failed => {
                    progress.abandon_with_message(format!("{} failed", job));
                    return Err(AnalyzerError::JobFailed {
                        job,
                        status: status.to_string(),
                    });
                }
                in_transit => {
                    if in_transit.is_unrecognized() {
                        tracing::warn!("{}: unrecognized status '{}', still waiting", job, in_transit);
                    } else {
                        tracing::debug!("{}: status '{}' (check #{})", job, in_transit, checks);
                    }

                    let elapsed = started.elapsed();
                    if checks >= self.max_checks || elapsed + self.interval > self.max_wait {
                        progress.abandon_with_message(format!("{} timed out", job));
                        return Err(AnalyzerError::JobTimedOut {
                            job,
                            checks,
                            waited_secs: elapsed.as_secs(),
                            last_status: in_transit.to_string(),
                        });
                    }

                    progress.set_message(format!(
                        "{}: {} ({} elapsed, check #{})",
                        job,
                        in_transit,
                        format_elapsed(elapsed),
                        checks
                    ));

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            progress.abandon_with_message(format!("{} cancelled", job));
                            return Err(AnalyzerError::Cancelled { job });
                        }
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
            }
        }
    }

    fn progress_bar(&self, job: JobKind) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(format!("Waiting for {}...", job.to_string().to_lowercase()));
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_poller() -> JobPoller {
        JobPoller::new(Duration::from_millis(1), Duration::from_secs(5), 50)
    }

    /// Replays `statuses`, repeating the last one, and counts calls
    fn scripted(statuses: Vec<&'static str>) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<JobStatus>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let fetch = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            let raw = statuses[n.min(statuses.len() - 1)];
            std::future::ready(Ok(JobStatus::parse(Some(raw))))
        };
        (calls, fetch)
    }

    #[tokio::test]
    async fn test_returns_on_first_ready() {
        let (calls, fetch) = scripted(vec!["ready"]);

        let report = fast_poller().await_terminal(JobKind::AssetProcessing, fetch).await.unwrap();

        assert_eq!(report.checks, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_polls_through_in_transit_statuses() {
        let (calls, fetch) = scripted(vec!["pending", "indexing", "ready"]);

        let report = fast_poller().await_terminal(JobKind::Indexing, fetch).await.unwrap();

        assert_eq!(report.checks, 3);
        assert_eq!(report.last_status, JobStatus::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_stops_immediately() {
        let (calls, fetch) = scripted(vec!["processing", "failed", "ready"]);

        let err = fast_poller().await_terminal(JobKind::AssetProcessing, fetch).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            AnalyzerError::JobFailed { job, status } => {
                assert_eq!(job, JobKind::AssetProcessing);
                assert_eq!(status, "failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_status_keeps_polling() {
        let (calls, fetch) = scripted(vec!["throttled", "", "ready"]);

        tokio_test::assert_ok!(fast_poller().await_terminal(JobKind::Indexing, fetch).await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_check_cap_times_out() {
        let (calls, fetch) = scripted(vec!["processing"]);
        let poller = JobPoller::new(Duration::from_millis(1), Duration::from_secs(5), 4);

        let err = poller.await_terminal(JobKind::Indexing, fetch).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            err,
            AnalyzerError::JobTimedOut { checks: 4, ref last_status, .. } if last_status == "processing"
        ));
    }

    #[tokio::test]
    async fn test_wait_budget_times_out() {
        let (calls, fetch) = scripted(vec!["processing"]);
        let poller = JobPoller::new(Duration::from_secs(10), Duration::from_secs(1), 100);

        let err = poller.await_terminal(JobKind::AssetProcessing, fetch).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AnalyzerError::JobTimedOut { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_calls() {
        let (calls, fetch) = scripted(vec!["ready"]);
        let token = CancellationToken::new();
        token.cancel();

        let err = fast_poller()
            .with_cancellation(token)
            .await_terminal(JobKind::Indexing, fetch)
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err, AnalyzerError::Cancelled { job: JobKind::Indexing }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let (calls, fetch) = scripted(vec!["processing"]);
        let token = CancellationToken::new();
        let poller = JobPoller::new(Duration::from_secs(3600), Duration::from_secs(7200), 10)
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = poller.await_terminal(JobKind::AssetProcessing, fetch).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AnalyzerError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_fetch_error_is_propagated() {
        let fetch = || {
            std::future::ready(Err::<JobStatus, _>(AnalyzerError::Remote {
                status: 503,
                body: "busy".to_string(),
            }))
        };

        let err = fast_poller().await_terminal(JobKind::Indexing, fetch).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Remote { status: 503, .. }));
    }
}
