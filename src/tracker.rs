use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::attendance::{seconds_between, Session, WeeklySummary, WorkStatus, WORKDAY_SECS};
use crate::error::{StoreError, TrackerError};
use crate::store::TimeStore;

/// Source of the current instant.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Attendance operations for one user at a time, backed by the shared [`TimeStore`].
pub struct Tracker {
    store: TimeStore,
    tz: Tz,
    clock: Clock,
}

impl Tracker {
    pub fn new(store: TimeStore, tz: Tz) -> Self {
        Self {
            store,
            tz,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Tz> {
        (self.clock)().with_timezone(&self.tz)
    }

    pub async fn clock_in(
        &self,
        user_id: &str,
        now: DateTime<Tz>,
    ) -> Result<DateTime<FixedOffset>, TrackerError> {
        let entry = self
            .store
            .update(user_id, |record| Ok::<_, TrackerError>(record.clock_in(&now)?))
            .await?;
        info!(user_id, entry = %entry, "clocked in");
        Ok(entry)
    }

    pub async fn clock_out(&self, user_id: &str, now: DateTime<Tz>) -> Result<Session, TrackerError> {
        let session = self
            .store
            .update(user_id, |record| Ok::<_, TrackerError>(record.clock_out(&now)?))
            .await?;
        info!(user_id, exit = %session.exit_time, duration_secs = session.duration_secs, "clocked out");
        Ok(session)
    }

    /// Clock-out triggered by the workday reminder. `Some` means this call closed
    /// the session and the user should be told; `None` means they already left.
    pub async fn auto_clock_out(
        &self,
        user_id: &str,
        now: DateTime<Tz>,
    ) -> Result<Option<Session>, StoreError> {
        match self.clock_out(user_id, now).await {
            Ok(session) => Ok(Some(session)),
            Err(TrackerError::Attendance(reason)) => {
                debug!(user_id, %reason, "auto clock-out: nothing to do");
                Ok(None)
            }
            Err(TrackerError::Storage(err)) => Err(err),
        }
    }

    pub async fn status(&self, user_id: &str, now: DateTime<Tz>) -> WorkStatus {
        self.store.read(user_id).await.status(&now)
    }

    pub async fn weekly_summary(
        &self,
        user_id: &str,
        now: DateTime<Tz>,
    ) -> Result<WeeklySummary, TrackerError> {
        Ok(self.store.read(user_id).await.weekly_summary(&now)?)
    }

    /// Time left until the workday of a session started at `entry` is complete.
    pub fn reminder_delay(&self, entry: DateTime<FixedOffset>, now: DateTime<Tz>) -> Duration {
        let left = WORKDAY_SECS - seconds_between(entry, now.fixed_offset());
        Duration::from_secs_f64(left.max(0.0))
    }
}
