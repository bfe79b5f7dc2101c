//! Trigger sources: when does a job fire next.
//!
//! Both cron and interval triggers are driven by the same arming loop in
//! [`run_trigger`]. Only cron triggers feed the missed-window sweep.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cronrelay_core::parse_cron;
use cronrelay_protocols::{Job, ScheduleKind, ValidationError};

/// Computes fire times for an armed job.
pub trait TriggerSource: Send + Sync {
    /// First fire time strictly after `after`.
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Whether executions record `nextTriggerTime` for missed-fire detection.
    fn tracks_missed_fires(&self) -> bool;

    /// Short label for logs and events.
    fn kind(&self) -> &'static str;
}

/// Cron expression driven trigger.
pub struct CronTrigger {
    schedule: Schedule,
    expression: String,
}

impl CronTrigger {
    pub fn new(expression: &str) -> Result<Self, cron::error::Error> {
        Ok(Self {
            schedule: parse_cron(expression)?,
            expression: expression.to_string(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl TriggerSource for CronTrigger {
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    fn tracks_missed_fires(&self) -> bool {
        true
    }

    fn kind(&self) -> &'static str {
        "cron"
    }
}

/// Fixed interval ticker.
pub struct IntervalTrigger {
    interval: Duration,
}

impl IntervalTrigger {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl TriggerSource for IntervalTrigger {
    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let step = chrono::Duration::from_std(self.interval).ok()?;
        after.checked_add_signed(step)
    }

    fn tracks_missed_fires(&self) -> bool {
        false
    }

    fn kind(&self) -> &'static str {
        "interval"
    }
}

/// Build the trigger for a job. Chain jobs have none.
pub fn trigger_for(job: &Job) -> Result<Option<Arc<dyn TriggerSource>>, ValidationError> {
    match job.schedule_kind()? {
        ScheduleKind::Cron(expr) => {
            let trigger = CronTrigger::new(&expr).map_err(|e| ValidationError::InvalidCron {
                job_id: job.job_id.clone(),
                expression: expr.clone(),
                reason: e.to_string(),
            })?;
            Ok(Some(Arc::new(trigger)))
        }
        ScheduleKind::Interval(interval) => Ok(Some(Arc::new(IntervalTrigger::new(interval)))),
        ScheduleKind::Chain => Ok(None),
    }
}

/// Sleep until each fire time and invoke `on_fire`, until cancelled or the
/// source yields no further fire time.
///
/// Fire times are computed from the previous target, not from wall-clock
/// after the callback, so a slow callback does not skip a cron slot.
pub async fn run_trigger<F, Fut>(
    job_id: String,
    source: Arc<dyn TriggerSource>,
    cancel: CancellationToken,
    on_fire: F,
) where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    let mut last = Utc::now();
    loop {
        let Some(next) = source.next_fire_after(last) else {
            warn!("Trigger for job {} has no further fire times", job_id);
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Trigger for job {} cancelled", job_id);
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        last = next;
        if !on_fire().await {
            debug!("Trigger for job {} disarmed by its callback", job_id);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_cron_next_fire() {
        let trigger = CronTrigger::new("*/5 * * * *").unwrap();
        let after = DateTime::parse_from_rfc3339("2024-01-01T10:02:30Z")
            .unwrap()
            .with_timezone(&Utc);
        let next = trigger.next_fire_after(after).unwrap();
        assert_eq!(next.minute(), 5);
        assert_eq!(next.second(), 0);
        assert!(trigger.tracks_missed_fires());
        assert_eq!(trigger.kind(), "cron");
    }

    #[test]
    fn test_cron_six_field() {
        let trigger = CronTrigger::new("*/10 * * * * *").unwrap();
        let after = DateTime::parse_from_rfc3339("2024-01-01T10:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(trigger.next_fire_after(after).unwrap().second(), 10);
    }

    #[test]
    fn test_cron_invalid() {
        assert!(CronTrigger::new("every day").is_err());
    }

    #[test]
    fn test_interval_next_fire() {
        let trigger = IntervalTrigger::new(Duration::from_secs(90));
        let after = Utc::now();
        assert_eq!(
            trigger.next_fire_after(after).unwrap(),
            after + chrono::Duration::seconds(90)
        );
        assert!(!trigger.tracks_missed_fires());
    }

    #[test]
    fn test_trigger_for_job_kinds() {
        let cron = Job::new("a", "m", "f").with_schedule("* * * * *");
        let interval = Job::new("b", "m", "f").with_interval(Duration::from_secs(1));
        let chain = Job::new("c", "m", "f").chained();

        assert_eq!(trigger_for(&cron).unwrap().unwrap().kind(), "cron");
        assert_eq!(trigger_for(&interval).unwrap().unwrap().kind(), "interval");
        assert!(trigger_for(&chain).unwrap().is_none());
        assert!(trigger_for(&Job::new("d", "m", "f").with_schedule("bad")).is_err());
    }

    #[tokio::test]
    async fn test_run_trigger_fires_until_cancelled() {
        let fired = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let source: Arc<dyn TriggerSource> =
            Arc::new(IntervalTrigger::new(Duration::from_millis(20)));

        let counter = fired.clone();
        let handle = tokio::spawn(run_trigger("JOB5".to_string(), source, cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        }));

        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        let count = fired.load(Ordering::SeqCst);
        assert!(count >= 2, "expected several fires, got {}", count);
    }

    #[tokio::test]
    async fn test_run_trigger_stops_when_callback_disarms() {
        let fired = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn TriggerSource> =
            Arc::new(IntervalTrigger::new(Duration::from_millis(5)));

        let counter = fired.clone();
        run_trigger("JOB5".to_string(), source, CancellationToken::new(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }
        })
        .await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
