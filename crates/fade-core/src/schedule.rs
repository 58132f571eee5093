//! # Slot Calculation
//!
//! Computes bookable start times for one barber on one day.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Working window  09:00 ─────────────────────────────────────── 12:00    │
//! │  Grid (30 min)   09:00  09:30  10:00  10:30  11:00  11:30               │
//! │  Busy            ░░░░░░░░░░░░░ [10:00 ▓▓▓▓ 10:30) ░░░░░░░░░░░░░░░░░░░    │
//! │                                                                         │
//! │  For each grid start s (30-min service):                                │
//! │    s < now                     → skip (past)                            │
//! │    [s, s+d) ∩ busy ≠ ∅         → skip (overlap)                         │
//! │    s + d > close               → skip (runs past closing)               │
//! │                                                                         │
//! │  Result          09:00  09:30         10:30  11:00  11:30               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`SlotPlan`] captures every input (including "now"), so the same plan
//! always yields the same slots. [`SlotPlan::slots`] returns a fresh lazy
//! iterator on every call.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{Appointment, Organization, WorkingHours};
use crate::validation::parse_slot_time;
use crate::SLOT_INTERVAL_MINUTES;

// =============================================================================
// Slot Time
// =============================================================================

/// A shop-local start time on the slot grid, rendered as `HH:mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    /// Wraps a time. Seconds are dropped.
    pub fn new(time: NaiveTime) -> Self {
        SlotTime(time.with_second(0).unwrap_or(time).with_nanosecond(0).unwrap_or(time))
    }

    #[inline]
    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slot_time(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(slot: SlotTime) -> Self {
        slot.to_string()
    }
}

// =============================================================================
// Working Window
// =============================================================================

/// Converts a shop's minute offset into a chrono offset.
pub fn shop_offset(utc_offset_minutes: i32) -> Result<FixedOffset, ValidationError> {
    FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| ValidationError::OutOfRange {
        field: "utc_offset_minutes".to_string(),
        min: -(24 * 60 - 1),
        max: 24 * 60 - 1,
    })
}

/// The shop-local calendar date of an instant.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// UTC `[start, end)` of a shop-local calendar date.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = to_utc(date.and_time(NaiveTime::MIN), offset);
    (start, start + Duration::days(1))
}

/// A barber's resolved working window for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySchedule {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

impl DaySchedule {
    /// Plain opening window without a break.
    pub fn new(opens_at: NaiveTime, closes_at: NaiveTime) -> Self {
        DaySchedule {
            opens_at,
            closes_at,
            break_start: None,
            break_end: None,
        }
    }

    /// Adds a break.
    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.break_start = Some(start);
        self.break_end = Some(end);
        self
    }

    /// Resolves the window for `date` from organization defaults and the
    /// barber's weekly overrides.
    ///
    /// Returns `None` when the barber is marked as not working that weekday.
    /// Missing override fields fall back to the organization hours.
    pub fn resolve(org: &Organization, week: &[WorkingHours], date: NaiveDate) -> Option<Self> {
        let weekday = date.weekday().num_days_from_monday() as i64;

        let Some(hours) = week.iter().find(|h| h.weekday == weekday) else {
            return Some(DaySchedule::new(org.opens_at, org.closes_at));
        };

        if !hours.is_working {
            return None;
        }

        let mut day = DaySchedule::new(
            hours.starts_at.unwrap_or(org.opens_at),
            hours.ends_at.unwrap_or(org.closes_at),
        );
        if let (Some(start), Some(end)) = (hours.break_start, hours.break_end) {
            if start < end {
                day = day.with_break(start, end);
            }
        }
        Some(day)
    }
}

/// A half-open `[start, end)` range during which the barber is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// `s < end && e > start`
    #[inline]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

// =============================================================================
// Slot Plan
// =============================================================================

/// Every input of the slot calculation for one barber, date and service.
#[derive(Debug, Clone)]
pub struct SlotPlan {
    date: NaiveDate,
    offset: FixedOffset,
    day: Option<DaySchedule>,
    duration: Duration,
    busy: Vec<BusyInterval>,
    now: DateTime<Utc>,
}

impl SlotPlan {
    /// Builds a plan.
    ///
    /// `day = None` means the barber does not work that date (no slots).
    /// Appointments in a non-blocking status (cancelled, no-show) are
    /// ignored; the break, if any, is treated as a booking.
    pub fn new(
        date: NaiveDate,
        offset: FixedOffset,
        day: Option<DaySchedule>,
        duration: Duration,
        appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Self {
        let mut busy: Vec<BusyInterval> = appointments
            .iter()
            .filter(|a| a.status.blocks_slot())
            .map(|a| BusyInterval {
                start: a.starts_at,
                end: a.ends_at,
            })
            .collect();

        if let Some(DaySchedule {
            break_start: Some(start),
            break_end: Some(end),
            ..
        }) = day
        {
            busy.push(BusyInterval {
                start: to_utc(date.and_time(start), offset),
                end: to_utc(date.and_time(end), offset),
            });
        }

        busy.sort_by_key(|b| b.start);

        SlotPlan {
            date,
            offset,
            day,
            duration,
            busy,
            now,
        }
    }

    /// Lazy iterator over the bookable starts, earliest first.
    ///
    /// Each call starts over from opening time.
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            plan: self,
            cursor: self.day.map(|d| first_grid_point(self.date.and_time(d.opens_at))),
        }
    }

    /// Whether `start` would be offered by [`slots`](Self::slots).
    pub fn is_available(&self, start: SlotTime) -> bool {
        let Some(day) = self.day else {
            return false;
        };

        let local = self.date.and_time(start.time());
        let on_grid = start.time().minute() as i64 % SLOT_INTERVAL_MINUTES == 0;
        let in_window = start.time() >= day.opens_at && start.time() < day.closes_at;

        on_grid && in_window && self.accepts(local, day)
    }

    /// UTC `[start, end)` of a booking starting at `start` on this date.
    pub fn interval(&self, start: SlotTime) -> (DateTime<Utc>, DateTime<Utc>) {
        let begins = to_utc(self.date.and_time(start.time()), self.offset);
        (begins, begins + self.duration)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn accepts(&self, local_start: NaiveDateTime, day: DaySchedule) -> bool {
        let local_end = local_start + self.duration;
        if local_end > self.date.and_time(day.closes_at) {
            return false;
        }

        let start = to_utc(local_start, self.offset);
        if start < self.now {
            return false;
        }

        let end = start + self.duration;
        !self.busy.iter().any(|b| b.overlaps(start, end))
    }
}

/// Iterator returned by [`SlotPlan::slots`].
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    plan: &'a SlotPlan,
    cursor: Option<NaiveDateTime>,
}

impl Iterator for Slots<'_> {
    type Item = SlotTime;

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.plan.day?;
        let closes = self.plan.date.and_time(day.closes_at);

        while let Some(candidate) = self.cursor {
            if candidate >= closes {
                self.cursor = None;
                return None;
            }

            self.cursor = Some(candidate + Duration::minutes(SLOT_INTERVAL_MINUTES));
            if self.plan.accepts(candidate, day) {
                return Some(SlotTime::new(candidate.time()));
            }
        }

        None
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn to_utc(local: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// Rounds an opening time up to the next grid point.
fn first_grid_point(opens: NaiveDateTime) -> NaiveDateTime {
    let minutes = opens.time().num_seconds_from_midnight() as i64 / 60;
    let rem = minutes % SLOT_INTERVAL_MINUTES;
    let aligned = opens
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(opens);
    if rem == 0 && aligned == opens {
        opens
    } else {
        aligned + Duration::minutes(SLOT_INTERVAL_MINUTES - rem)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppointmentStatus;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn utc(date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(t(h, m)))
    }

    fn appointment(start: DateTime<Utc>, minutes: i64, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: "a1".to_string(),
            organization_id: "org".to_string(),
            client_id: "c1".to_string(),
            service_id: "s1".to_string(),
            barber_id: "b1".to_string(),
            starts_at: start,
            ends_at: start + Duration::minutes(minutes),
            price_cents: 5000,
            commission_cents: 2000,
            status,
            payment_id: None,
            payment_method: None,
            started_at: None,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    fn org() -> Organization {
        Organization {
            id: "org".to_string(),
            name: "Fade Club".to_string(),
            opens_at: t(9, 0),
            closes_at: t(18, 0),
            utc_offset_minutes: 0,
            created_at: utc(monday(), 0, 0),
        }
    }

    fn render(plan: &SlotPlan) -> Vec<String> {
        plan.slots().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_morning_with_one_booking() {
        let date = monday();
        let existing = [appointment(utc(date, 10, 0), 30, AppointmentStatus::Scheduled)];
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(12, 0))),
            Duration::minutes(30),
            &existing,
            utc(date, 7, 0),
        );

        assert_eq!(render(&plan), ["09:00", "09:30", "10:30", "11:00", "11:30"]);
    }

    #[test]
    fn test_slots_are_restartable_and_deterministic() {
        let date = monday();
        let existing = [appointment(utc(date, 10, 0), 30, AppointmentStatus::Confirmed)];
        let build = || {
            SlotPlan::new(
                date,
                shop_offset(0).unwrap(),
                Some(DaySchedule::new(t(9, 0), t(12, 0))),
                Duration::minutes(30),
                &existing,
                utc(date, 7, 0),
            )
        };

        let plan = build();
        let first = render(&plan);
        assert_eq!(render(&plan), first);
        assert_eq!(render(&build()), first);

        let mut partial = plan.slots();
        assert_eq!(partial.next().map(|s| s.to_string()).as_deref(), Some("09:00"));
        assert_eq!(plan.slots().count(), 5);
    }

    #[test]
    fn test_cancelled_and_no_show_free_the_slot() {
        let date = monday();
        let existing = [
            appointment(utc(date, 9, 0), 30, AppointmentStatus::Cancelled),
            appointment(utc(date, 9, 30), 30, AppointmentStatus::NoShow),
        ];
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(10, 0))),
            Duration::minutes(30),
            &existing,
            utc(date, 7, 0),
        );

        assert_eq!(render(&plan), ["09:00", "09:30"]);
    }

    #[test]
    fn test_long_service_respects_closing_and_neighbours() {
        let date = monday();
        let existing = [appointment(utc(date, 11, 0), 30, AppointmentStatus::InProgress)];
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(12, 0))),
            Duration::minutes(60),
            &existing,
            utc(date, 7, 0),
        );

        // 10:30 would run into 11:00; 11:30 would run past closing.
        assert_eq!(render(&plan), ["09:00", "09:30", "10:00"]);
    }

    #[test]
    fn test_past_slots_are_skipped() {
        let date = monday();
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(12, 0))),
            Duration::minutes(30),
            &[],
            utc(date, 10, 10),
        );

        assert_eq!(render(&plan), ["10:30", "11:00", "11:30"]);
    }

    #[test]
    fn test_break_blocks_like_a_booking() {
        let date = monday();
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(11, 0), t(14, 0)).with_break(t(12, 0), t(13, 0))),
            Duration::minutes(30),
            &[],
            utc(date, 7, 0),
        );

        assert_eq!(render(&plan), ["11:00", "11:30", "13:00", "13:30"]);
    }

    #[test]
    fn test_day_off_has_no_slots() {
        let plan = SlotPlan::new(
            monday(),
            shop_offset(0).unwrap(),
            None,
            Duration::minutes(30),
            &[],
            utc(monday(), 7, 0),
        );

        assert_eq!(plan.slots().count(), 0);
        assert!(!plan.is_available("09:00".parse().unwrap()));
    }

    #[test]
    fn test_shop_offset_shifts_instants() {
        // UTC-3: 09:00 local is 12:00 UTC.
        let date = monday();
        let existing = [appointment(utc(date, 12, 0), 30, AppointmentStatus::Scheduled)];
        let plan = SlotPlan::new(
            date,
            shop_offset(-180).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(10, 0))),
            Duration::minutes(30),
            &existing,
            utc(date, 0, 0),
        );

        assert_eq!(render(&plan), ["09:30"]);
        let (start, end) = plan.interval("09:30".parse().unwrap());
        assert_eq!(start, utc(date, 12, 30));
        assert_eq!(end, utc(date, 13, 0));

        let (day_start, day_end) = day_bounds(date, shop_offset(-180).unwrap());
        assert_eq!(day_start, utc(date, 3, 0));
        assert_eq!(day_end - day_start, Duration::days(1));
    }

    #[test]
    fn test_off_grid_opening_rounds_up() {
        let date = monday();
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 15), t(10, 30))),
            Duration::minutes(30),
            &[],
            utc(date, 7, 0),
        );

        assert_eq!(render(&plan), ["09:30", "10:00"]);
    }

    #[test]
    fn test_is_available_matches_slots() {
        let date = monday();
        let existing = [appointment(utc(date, 10, 0), 30, AppointmentStatus::Scheduled)];
        let plan = SlotPlan::new(
            date,
            shop_offset(0).unwrap(),
            Some(DaySchedule::new(t(9, 0), t(12, 0))),
            Duration::minutes(30),
            &existing,
            utc(date, 7, 0),
        );

        for hour in 8..13 {
            for minute in [0, 30] {
                let slot = SlotTime::new(t(hour, minute));
                let listed = plan.slots().any(|s| s == slot);
                assert_eq!(plan.is_available(slot), listed, "{}", slot);
            }
        }
    }

    #[test]
    fn test_resolve_day_schedule() {
        let org = org();
        let week = vec![
            WorkingHours {
                organization_id: "org".to_string(),
                barber_id: "b1".to_string(),
                weekday: 0,
                is_working: true,
                starts_at: Some(t(10, 0)),
                ends_at: None,
                break_start: Some(t(13, 0)),
                break_end: Some(t(14, 0)),
            },
            WorkingHours {
                organization_id: "org".to_string(),
                barber_id: "b1".to_string(),
                weekday: 1,
                is_working: false,
                starts_at: None,
                ends_at: None,
                break_start: None,
                break_end: None,
            },
        ];

        let monday_hours = DaySchedule::resolve(&org, &week, monday()).unwrap();
        assert_eq!(monday_hours.opens_at, t(10, 0));
        assert_eq!(monday_hours.closes_at, t(18, 0));
        assert_eq!(monday_hours.break_start, Some(t(13, 0)));

        let tuesday = monday().succ_opt().unwrap();
        assert!(DaySchedule::resolve(&org, &week, tuesday).is_none());

        let wednesday = tuesday.succ_opt().unwrap();
        assert_eq!(
            DaySchedule::resolve(&org, &week, wednesday),
            Some(DaySchedule::new(t(9, 0), t(18, 0)))
        );
    }

    #[test]
    fn test_slot_time_serde_is_hh_mm() {
        let slot: SlotTime = "14:30".parse().unwrap();
        assert_eq!(serde_json::to_string(&slot).unwrap(), "\"14:30\"");
        let back: SlotTime = serde_json::from_str("\"14:30\"").unwrap();
        assert_eq!(back, slot);
        assert!(serde_json::from_str::<SlotTime>("\"14:10\"").is_err());
    }

    #[test]
    fn test_local_date_uses_offset() {
        let late = utc(monday(), 1, 0);
        assert_eq!(local_date(late, shop_offset(-180).unwrap()), monday().pred_opt().unwrap());
        assert_eq!(local_date(late, shop_offset(0).unwrap()), monday());
    }
}
