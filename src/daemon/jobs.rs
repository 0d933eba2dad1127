//! Background scrape job management
//!
//! One job per competitor-scrape invocation, identified by a job id handed
//! back to the caller immediately. Progress is polled through the job info;
//! cancellation is cooperative via a token the runner checks between pages.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::scraping::{ScrapeRunner, ScrapeStats};
use crate::store::CompetitorStore;
use crate::types::{Competitor, CompetitorId};

/// How long to retain completed/failed/cancelled jobs before cleanup
const JOB_RETENTION_SECS: i64 = 3600;

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Job information, snapshot-cloneable for the progress endpoint
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub competitor_id: CompetitorId,
    pub competitor_name: String,
    pub state: JobState,
    /// Live counts while running, final stats afterwards
    pub stats: ScrapeStats,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    cancel: CancellationToken,
}

/// Tracks and controls background scrape jobs
pub struct JobManager {
    jobs: Arc<DashMap<Uuid, JobInfo>>,
    runner: Arc<ScrapeRunner>,
    competitors: Arc<CompetitorStore>,
}

impl JobManager {
    pub fn new(runner: Arc<ScrapeRunner>, competitors: Arc<CompetitorStore>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            runner,
            competitors,
        }
    }

    /// Start a scrape job for one competitor and return its id immediately.
    pub fn start_scrape(&self, competitor: Competitor) -> Uuid {
        self.cleanup_old_jobs();
        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        self.jobs.insert(
            job_id,
            JobInfo {
                id: job_id,
                competitor_id: competitor.id,
                competitor_name: competitor.name.clone(),
                state: JobState::Running,
                stats: ScrapeStats::default(),
                error: None,
                started_at: Utc::now(),
                completed_at: None,
                cancel: cancel.clone(),
            },
        );

        let jobs = Arc::clone(&self.jobs);
        let runner = Arc::clone(&self.runner);
        let competitors = Arc::clone(&self.competitors);

        tokio::spawn(async move {
            info!(job_id = %job_id, competitor = %competitor.name, "scrape job started");

            let progress_jobs = Arc::clone(&jobs);
            let on_progress = move |stats: &ScrapeStats| {
                if let Some(mut job) = progress_jobs.get_mut(&job_id) {
                    job.stats = stats.clone();
                }
            };

            let result = runner.run(&competitor, cancel.clone(), &on_progress).await;

            if let Some(mut job) = jobs.get_mut(&job_id) {
                job.completed_at = Some(Utc::now());
                match result {
                    Ok(stats) => {
                        job.stats = stats;
                        job.state = if cancel.is_cancelled() {
                            JobState::Cancelled
                        } else {
                            JobState::Completed
                        };
                        competitors.set_last_scraped(&competitor.id);
                        info!(job_id = %job_id, "scrape job finished");
                    }
                    Err(e) => {
                        job.state = JobState::Failed;
                        job.error = Some(e.to_string());
                        warn!(job_id = %job_id, error = %e, "scrape job failed");
                    }
                }
            }
        });

        job_id
    }

    /// Snapshot of one job
    pub fn get(&self, job_id: &Uuid) -> Option<JobInfo> {
        self.jobs.get(job_id).map(|job| job.clone())
    }

    /// Cancel a running job. Listings already upserted stay in place as a
    /// stale-but-consistent snapshot.
    pub fn cancel(&self, job_id: &Uuid) -> bool {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            if job.state == JobState::Running {
                job.cancel.cancel();
                job.state = JobState::Cancelled;
                return true;
            }
        }
        false
    }

    /// Whether the job id is known at all (for 404 vs "not cancellable")
    pub fn exists(&self, job_id: &Uuid) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Running)
            .count()
    }

    /// Drop finished jobs older than the retention window.
    fn cleanup_old_jobs(&self) {
        let cutoff = Utc::now() - Duration::seconds(JOB_RETENTION_SECS);
        self.jobs.retain(|_, job| {
            job.state == JobState::Running
                || job.completed_at.map(|t| t > cutoff).unwrap_or(true)
        });
    }
}
