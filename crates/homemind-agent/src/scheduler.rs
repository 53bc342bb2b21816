//! Cron-driven scheduled prompts.
//!
//! Each configured task runs the agent loop with a canned prompt and no
//! prior history, routing the resulting text to the notification
//! destination. A task failure is caught and reported the same way —
//! scheduling never crashes on a single task's failure.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use homemind_core::config::ScheduleTask;
use homemind_core::{Error, Result};

use crate::agent::run_scheduled_prompt;
use crate::context::AgentContext;

/// Destination for scheduled-task output and failure reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

/// A validated, enabled schedule entry.
#[derive(Debug)]
pub struct ScheduledJob {
    pub name: String,
    pub prompt: String,
    schedule: Schedule,
}

/// The `cron` crate parses six/seven-field expressions (with seconds);
/// config uses the classic five-field form.
fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Parse config schedules into jobs. A malformed expression is a
/// configuration error — fatal at startup, never a degraded start.
pub fn build_jobs(tasks: &[ScheduleTask]) -> Result<Vec<ScheduledJob>> {
    tasks
        .iter()
        .filter(|task| {
            if !task.enabled {
                info!("skipping disabled schedule: {}", task.name);
            }
            task.enabled
        })
        .map(|task| {
            let schedule = Schedule::from_str(&normalize_cron(&task.cron)).map_err(|e| {
                Error::config(format!(
                    "invalid cron '{}' for schedule '{}': {e}",
                    task.cron, task.name
                ))
            })?;
            Ok(ScheduledJob {
                name: task.name.clone(),
                prompt: task.prompt.clone(),
                schedule,
            })
        })
        .collect()
}

/// Spawn one long-lived tokio task per job.
pub fn run_scheduler(ctx: Arc<AgentContext>, jobs: Vec<ScheduledJob>, notifier: Arc<dyn Notifier>) {
    for job in jobs {
        info!("scheduled '{}'", job.name);
        tokio::spawn(run_job(ctx.clone(), job, notifier.clone()));
    }
}

async fn run_job(ctx: Arc<AgentContext>, job: ScheduledJob, notifier: Arc<dyn Notifier>) {
    loop {
        let Some(next) = job.schedule.upcoming(Utc).next() else {
            warn!("schedule '{}' has no upcoming occurrence, stopping", job.name);
            return;
        };
        let delay = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(delay).await;
        execute_job(&ctx, &job, notifier.as_ref()).await;
    }
}

pub(crate) async fn execute_job(ctx: &AgentContext, job: &ScheduledJob, notifier: &dyn Notifier) {
    info!("running scheduled task: {}", job.name);
    match run_scheduled_prompt(ctx, &job.prompt).await {
        Ok(response) => {
            notifier
                .notify(&format!("Scheduled: {}\n\n{response}", job.name))
                .await;
            info!("completed scheduled task: {}", job.name);
        }
        Err(e) => {
            error!("scheduled task '{}' failed: {e}", job.name);
            notifier
                .notify(&format!("Scheduled task failed: {}\n\nError: {e}", job.name))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::harness;
    use homemind_llm::TokenUsage;
    use std::sync::Mutex;

    fn task(name: &str, cron: &str, enabled: bool) -> ScheduleTask {
        ScheduleTask {
            name: name.to_string(),
            cron: cron.to_string(),
            prompt: "Summarize the house status.".to_string(),
            enabled,
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_normalize_five_field_cron() {
        assert_eq!(normalize_cron("0 21 * * *"), "0 0 21 * * *");
        assert_eq!(normalize_cron("*/15 * * * *"), "0 */15 * * *");
        // Six-field expressions pass through unchanged.
        assert_eq!(normalize_cron("0 0 7 * * 1-5"), "0 0 7 * * 1-5");
    }

    #[test]
    fn test_build_jobs_accepts_standard_expressions() {
        let jobs = build_jobs(&[task("nightly", "0 21 * * *", true)]).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "nightly");
    }

    #[test]
    fn test_build_jobs_skips_disabled() {
        let jobs = build_jobs(&[
            task("on", "0 7 * * *", true),
            task("off", "0 8 * * *", false),
        ])
        .unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn test_malformed_cron_is_fatal() {
        let err = build_jobs(&[task("bad", "not a cron", true)]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_execute_job_routes_response() {
        let h = harness(vec![]).await;
        h.llm
            .push_text("All doors locked.", TokenUsage::new(50, 10));
        let jobs = build_jobs(&[task("night check", "0 21 * * *", true)]).unwrap();
        let notifier = RecordingNotifier::default();

        execute_job(&h.ctx, &jobs[0], &notifier).await;

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Scheduled: night check"));
        assert!(messages[0].contains("All doors locked."));
    }

    #[tokio::test]
    async fn test_execute_job_reports_failure() {
        let h = harness(vec![]).await;
        // No scripted responses: the backend call errors.
        let jobs = build_jobs(&[task("night check", "0 21 * * *", true)]).unwrap();
        let notifier = RecordingNotifier::default();

        execute_job(&h.ctx, &jobs[0], &notifier).await;

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Scheduled task failed: night check"));
    }
}
