use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, SubsecRound, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;

/// Target length of a workday, in seconds (8 h).
pub const WORKDAY_SECS: f64 = 28_800.0;

/// Per-user attendance state, stored as one entry of the JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default)]
    pub entry_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub is_working: bool,
    /// Worked seconds per zone-local calendar date.
    #[serde(default)]
    pub daily_logs: BTreeMap<NaiveDate, f64>,
}

/// A finished work session, returned by [`AttendanceRecord::clock_out`].
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub entry_time: DateTime<FixedOffset>,
    pub exit_time: DateTime<FixedOffset>,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkStatus {
    Working {
        entry_time: DateTime<FixedOffset>,
        elapsed_secs: f64,
        remaining_secs: f64,
    },
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayTotal {
    pub weekday: Weekday,
    pub date: NaiveDate,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    /// Days with logged work, Monday first. Empty days are left out.
    pub days: Vec<DayTotal>,
    pub total_secs: f64,
}

impl AttendanceRecord {
    /// Entry instant of the running session. A record flagged as working without
    /// an entry time counts as idle.
    pub fn active_entry(&self) -> Option<DateTime<FixedOffset>> {
        if self.is_working {
            self.entry_time
        } else {
            None
        }
    }

    pub fn is_working(&self) -> bool {
        self.active_entry().is_some()
    }

    pub fn clock_in(&mut self, now: &DateTime<Tz>) -> Result<DateTime<FixedOffset>, AttendanceError> {
        if self.is_working() {
            return Err(AttendanceError::AlreadyWorking);
        }
        let entry = instant(now);
        self.entry_time = Some(entry);
        self.is_working = true;
        Ok(entry)
    }

    /// Closes the running session and books its duration on `now`'s local date.
    pub fn clock_out(&mut self, now: &DateTime<Tz>) -> Result<Session, AttendanceError> {
        let entry_time = self.active_entry().ok_or(AttendanceError::NotWorking)?;
        let exit_time = instant(now);
        let duration_secs = seconds_between(entry_time, exit_time);

        *self.daily_logs.entry(now.date_naive()).or_insert(0.0) += duration_secs;
        self.is_working = false;
        self.entry_time = None;

        Ok(Session {
            entry_time,
            exit_time,
            duration_secs,
        })
    }

    pub fn status(&self, now: &DateTime<Tz>) -> WorkStatus {
        match self.active_entry() {
            Some(entry_time) => {
                let elapsed_secs = seconds_between(entry_time, instant(now));
                WorkStatus::Working {
                    entry_time,
                    elapsed_secs,
                    remaining_secs: WORKDAY_SECS - elapsed_secs,
                }
            }
            None => WorkStatus::Idle,
        }
    }

    pub fn weekly_summary(&self, now: &DateTime<Tz>) -> Result<WeeklySummary, AttendanceError> {
        if self.daily_logs.is_empty() {
            return Err(AttendanceError::NoRecords);
        }

        let today = now.date_naive();
        let week_start = today - Days::new(u64::from(today.weekday().num_days_from_monday()));

        let days: Vec<DayTotal> = week_start
            .iter_days()
            .take(7)
            .filter_map(|date| {
                let seconds = self.daily_logs.get(&date).copied().unwrap_or(0.0);
                (seconds > 0.0).then(|| DayTotal {
                    weekday: date.weekday(),
                    date,
                    seconds,
                })
            })
            .collect();
        let total_secs = days.iter().map(|d| d.seconds).sum();

        Ok(WeeklySummary {
            week_start,
            days,
            total_secs,
        })
    }
}

/// `now` as stored in the record: fixed offset, microsecond precision.
fn instant(now: &DateTime<Tz>) -> DateTime<FixedOffset> {
    now.fixed_offset().trunc_subsecs(6)
}

/// Signed number of seconds from `from` to `to`, microsecond precision.
pub fn seconds_between(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Madrid;

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Tz> {
        // 2024-05-06 is a Monday.
        Madrid.with_ymd_and_hms(2024, 5, day, h, m, s).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn clock_in_sets_entry_and_rejects_second_attempt() {
        let mut record = AttendanceRecord::default();
        let entry = record.clock_in(&at(6, 9, 0, 0)).unwrap();

        assert!(record.is_working);
        assert_eq!(record.entry_time, Some(entry));
        assert!(record.daily_logs.is_empty());

        let before = record.clone();
        assert_eq!(record.clock_in(&at(6, 10, 0, 0)), Err(AttendanceError::AlreadyWorking));
        assert_eq!(record, before);
    }

    #[test]
    fn full_day_session_is_booked_on_exit_date() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 9, 0, 0)).unwrap();
        let session = record.clock_out(&at(6, 17, 30, 0)).unwrap();

        assert_eq!(session.duration_secs, 30_600.0);
        assert_eq!(record.daily_logs.get(&date(6)), Some(&30_600.0));
        assert!(!record.is_working);
        assert_eq!(record.entry_time, None);
    }

    #[test]
    fn sub_second_precision_is_kept_to_microseconds() {
        let mut record = AttendanceRecord::default();
        let entry = record
            .clock_in(&(at(6, 9, 0, 0) + chrono::Duration::nanoseconds(100)))
            .unwrap();
        assert_eq!(entry, at(6, 9, 0, 0).fixed_offset());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["entry_time"], "2024-05-06T09:00:00+02:00");

        let session = record
            .clock_out(&(at(6, 9, 0, 0) + chrono::Duration::nanoseconds(999_900_000)))
            .unwrap();
        assert_eq!(session.duration_secs, 0.9999);
        assert_eq!(record.daily_logs.get(&date(6)), Some(&0.9999));
    }

    #[test]
    fn second_clock_out_is_a_no_op() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 9, 0, 0)).unwrap();
        record.clock_out(&at(6, 10, 0, 0)).unwrap();
        let after_first = record.clone();

        assert_eq!(record.clock_out(&at(6, 11, 0, 0)), Err(AttendanceError::NotWorking));
        assert_eq!(record, after_first);
    }

    #[test]
    fn sessions_on_same_date_accumulate() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 9, 0, 0)).unwrap();
        assert_eq!(record.clock_out(&at(6, 10, 0, 0)).unwrap().duration_secs, 3_600.0);
        record.clock_in(&at(6, 11, 0, 0)).unwrap();
        assert_eq!(record.clock_out(&at(6, 11, 30, 0)).unwrap().duration_secs, 1_800.0);

        assert_eq!(record.daily_logs.get(&date(6)), Some(&5_400.0));
    }

    #[test]
    fn session_crossing_midnight_goes_to_exit_date() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 22, 0, 0)).unwrap();
        record.clock_out(&at(7, 1, 0, 0)).unwrap();

        assert_eq!(record.daily_logs.get(&date(6)), None);
        assert_eq!(record.daily_logs.get(&date(7)), Some(&10_800.0));
    }

    #[test]
    fn status_reports_elapsed_and_remaining() {
        let mut record = AttendanceRecord::default();
        assert_eq!(record.status(&at(6, 9, 0, 0)), WorkStatus::Idle);

        let entry = record.clock_in(&at(6, 9, 0, 0)).unwrap();
        assert_eq!(
            record.status(&at(6, 10, 0, 0)),
            WorkStatus::Working {
                entry_time: entry,
                elapsed_secs: 3_600.0,
                remaining_secs: 25_200.0,
            }
        );
    }

    #[test]
    fn remaining_goes_negative_after_overtime() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 8, 0, 0)).unwrap();
        match record.status(&at(6, 17, 0, 0)) {
            WorkStatus::Working { remaining_secs, .. } => assert_eq!(remaining_secs, -3_600.0),
            WorkStatus::Idle => panic!("expected working"),
        }
    }

    #[test]
    fn working_flag_without_entry_counts_as_idle() {
        let mut record = AttendanceRecord {
            is_working: true,
            ..Default::default()
        };
        assert_eq!(record.status(&at(6, 9, 0, 0)), WorkStatus::Idle);
        assert_eq!(record.clock_out(&at(6, 9, 0, 0)), Err(AttendanceError::NotWorking));
        assert!(record.clock_in(&at(6, 9, 0, 0)).is_ok());
        assert!(record.entry_time.is_some());
    }

    #[test]
    fn weekly_summary_without_logs_signals_no_records() {
        let record = AttendanceRecord::default();
        assert_eq!(record.weekly_summary(&at(8, 12, 0, 0)), Err(AttendanceError::NoRecords));
    }

    #[test]
    fn weekly_summary_covers_monday_to_sunday() {
        let mut record = AttendanceRecord::default();
        record.daily_logs.insert(date(5), 9_999.0); // previous Sunday
        record.daily_logs.insert(date(6), 28_800.0);
        record.daily_logs.insert(date(7), 0.0);
        record.daily_logs.insert(date(9), 1_800.0);
        record.daily_logs.insert(date(12), 600.0); // this Sunday
        record.daily_logs.insert(date(13), 7_777.0); // next Monday

        let summary = record.weekly_summary(&at(8, 12, 0, 0)).unwrap();

        assert_eq!(summary.week_start, date(6));
        let weekdays: Vec<Weekday> = summary.days.iter().map(|d| d.weekday).collect();
        assert_eq!(weekdays, vec![Weekday::Mon, Weekday::Thu, Weekday::Sun]);
        assert_eq!(summary.total_secs, 31_200.0);
        assert_eq!(summary.total_secs, summary.days.iter().map(|d| d.seconds).sum::<f64>());
    }

    #[test]
    fn weekly_summary_on_sunday_looks_back_to_monday() {
        let mut record = AttendanceRecord::default();
        record.daily_logs.insert(date(6), 3_600.0);

        let summary = record.weekly_summary(&at(12, 23, 59, 0)).unwrap();
        assert_eq!(summary.week_start, date(6));
        assert_eq!(summary.total_secs, 3_600.0);
    }

    #[test]
    fn weekly_summary_outside_window_is_empty_but_not_no_records() {
        let mut record = AttendanceRecord::default();
        record.daily_logs.insert(date(1), 3_600.0);

        let summary = record.weekly_summary(&at(8, 12, 0, 0)).unwrap();
        assert!(summary.days.is_empty());
        assert_eq!(summary.total_secs, 0.0);
    }

    #[test]
    fn record_json_matches_persisted_layout() {
        let raw = r#"{
            "entry_time": "2024-05-06T09:00:00.123456+02:00",
            "is_working": true,
            "daily_logs": {"2024-05-03": 30600.5, "2024-05-02": 100}
        }"#;
        let record: AttendanceRecord = serde_json::from_str(raw).unwrap();

        assert!(record.is_working());
        assert_eq!(record.daily_logs.get(&date(3)), Some(&30_600.5));
        assert_eq!(record.daily_logs.get(&date(2)), Some(&100.0));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["entry_time"], "2024-05-06T09:00:00.123456+02:00");
        assert_eq!(value["daily_logs"]["2024-05-03"], 30_600.5);
    }

    #[test]
    fn idle_record_serializes_null_entry_time() {
        let mut record = AttendanceRecord::default();
        record.clock_in(&at(6, 9, 0, 0)).unwrap();
        record.clock_out(&at(6, 9, 1, 30)).unwrap();

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["entry_time"].is_null());
        assert_eq!(value["is_working"], false);

        let back: AttendanceRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.is_working, back.entry_time.is_some());
    }
}
