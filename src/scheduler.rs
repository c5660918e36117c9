//! Background maintenance scheduler. Constructed and started explicitly
//! during bootstrap; exactly one instance runs per process and `stop()`
//! ends it for graceful shutdown. The sweeps are idempotent, so a
//! redundant run only deletes rows that are already gone.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::state::SharedState;

pub struct Scheduler {
    state: SharedState,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(state: SharedState, config: SchedulerConfig) -> Self {
        Self {
            state,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let max_age_hours = self.config.temp_image_max_age_hours;

        let state_for_job = self.state.clone();
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let state = state_for_job.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                sweep(&state, max_age_hours).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let session_mins = self.config.session_sweep_interval_minutes.max(1);
        let image_mins = self.config.temp_image_sweep_interval_minutes.max(1);
        let max_age_hours = self.config.temp_image_max_age_hours;

        info!(
            "Scheduler running: session sweep every {}m, temp image sweep every {}m",
            session_mins, image_mins
        );

        let mut session_interval = interval(Duration::from_secs(u64::from(session_mins) * 60));
        let mut image_interval = interval(Duration::from_secs(u64::from(image_mins) * 60));

        // First tick of a tokio interval fires immediately; skip it so the
        // startup cleanup in bootstrap is not duplicated.
        session_interval.tick().await;
        image_interval.tick().await;

        loop {
            tokio::select! {
                _ = session_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    let start = std::time::Instant::now();
                    info!(event = "job_started", job_name = "sweep_sessions", "Starting session sweep");

                    if let Err(e) = self.state.sessions.cleanup_expired().await {
                        error!(event = "job_failed", job_name = "sweep_sessions", error = %e, "Session sweep failed");
                    }

                    info!(
                        event = "job_finished",
                        job_name = "sweep_sessions",
                        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Session sweep finished"
                    );
                }
                _ = image_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    let start = std::time::Instant::now();
                    info!(event = "job_started", job_name = "sweep_temp_images", "Starting temp image sweep");

                    if let Err(e) = self.state.images.cleanup_temp(max_age_hours).await {
                        error!(event = "job_failed", job_name = "sweep_temp_images", error = %e, "Temp image sweep failed");
                    }

                    info!(
                        event = "job_finished",
                        job_name = "sweep_temp_images",
                        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "Temp image sweep finished"
                    );
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run both sweeps once, outside any timer.
    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual sweep...");

        self.state.sessions.cleanup_expired().await?;
        self.state
            .images
            .cleanup_temp(self.config.temp_image_max_age_hours)
            .await?;

        Ok(())
    }
}

async fn sweep(state: &SharedState, max_age_hours: i64) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "sweep", "Starting maintenance sweep");

    if let Err(e) = state.sessions.cleanup_expired().await {
        error!(event = "job_failed", job_name = "sweep_sessions", error = %e, "Session sweep failed");
    }

    if let Err(e) = state.images.cleanup_temp(max_age_hours).await {
        error!(event = "job_failed", job_name = "sweep_temp_images", error = %e, "Temp image sweep failed");
    }

    info!(
        event = "job_finished",
        job_name = "sweep",
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Maintenance sweep finished"
    );
}
