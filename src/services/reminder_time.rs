//! Reminder date/time resolution.
//!
//! Converts a stored reminder instant into the user's local date and time for
//! prefilling the editor, and converts editor input back into an instant.
//! Everything here is a pure function of its arguments.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::bookmark::Bookmark;

/// Largest DST gap we step over when a local time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// Local reminder fields to prefill the editor with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedReminder {
    pub date: NaiveDate,
    /// Minute precision.
    pub time: NaiveTime,
    pub at: DateTime<Utc>,
}

/// Time of day used when the user picks a date but no time.
pub fn default_reminder_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

/// Parses an IANA timezone name. Absent, blank or unknown names fall back to UTC.
pub fn parse_timezone(name: Option<&str>) -> Tz {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        None => {
            debug!("no user timezone set, interpreting reminders as UTC");
            Tz::UTC
        }
        Some(name) => name.parse::<Tz>().unwrap_or_else(|e| {
            warn!(timezone = name, error = %e, "unknown user timezone, falling back to UTC");
            Tz::UTC
        }),
    }
}

/// Current date in the user's timezone; the earliest date a reminder may use.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Converts a local date and time in `tz` to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap move forward to the first local minute that exists.
pub fn local_datetime_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            for step in 1..=MAX_GAP_MINUTES {
                let candidate = naive + Duration::minutes(step);
                if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&naive)
        }
    }
}

pub struct ReminderTimeResolver;

impl ReminderTimeResolver {
    /// Local date/time to prefill for `bookmark`, or `None` for no prefill.
    ///
    /// Only a persisted bookmark (one with an ID) that carries a reminder
    /// yields a value.
    pub fn resolve(bookmark: &Bookmark, user_timezone: Option<&str>) -> Option<ResolvedReminder> {
        if bookmark.id.is_none() {
            return None;
        }
        let at = bookmark.reminder_at?;
        Some(Self::local_parts(at, parse_timezone(user_timezone)))
    }

    /// Same as [`resolve`](Self::resolve) with an already parsed timezone.
    pub fn resolve_in(bookmark: &Bookmark, tz: Tz) -> Option<ResolvedReminder> {
        if bookmark.id.is_none() {
            return None;
        }
        bookmark.reminder_at.map(|at| Self::local_parts(at, tz))
    }

    /// Splits an instant into local date and minute-precision time.
    pub fn local_parts(at: DateTime<Utc>, tz: Tz) -> ResolvedReminder {
        let local = at.with_timezone(&tz);
        let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or_default();
        ResolvedReminder {
            date: local.date_naive(),
            time,
            at,
        }
    }
}
