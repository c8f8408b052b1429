//! Unit tests for reminder prefill resolution and local-to-UTC conversion.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rstest::rstest;

use bookmark_modal::services::reminder_time::{
    default_reminder_time, local_datetime_to_utc, ReminderTimeResolver,
};
use bookmark_modal::types::bookmark::{AutoDeletePreference, Bookmark, BookmarkableType};

fn with_reminder(id: Option<i64>) -> Bookmark {
    let mut bookmark = Bookmark::create_for(BookmarkableType::Post, 1, AutoDeletePreference::Never);
    bookmark.id = id;
    bookmark.reminder_at = Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
    bookmark
}

#[test]
fn test_existing_reminder_resolves_in_user_timezone() {
    let resolved = ReminderTimeResolver::resolve(&with_reminder(Some(3)), Some("America/New_York"))
        .expect("persisted bookmark with reminder resolves");

    assert_eq!(resolved.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    assert_eq!(resolved.time, NaiveTime::from_hms_opt(4, 0, 0).unwrap());
    assert_eq!(resolved.at, Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
}

#[test]
fn test_unsaved_bookmark_has_no_prefill() {
    assert_eq!(ReminderTimeResolver::resolve(&with_reminder(None), Some("UTC")), None);
}

#[test]
fn test_bookmark_without_reminder_has_no_prefill() {
    let mut bookmark = with_reminder(Some(3));
    bookmark.reminder_at = None;
    assert_eq!(ReminderTimeResolver::resolve(&bookmark, Some("UTC")), None);
}

#[rstest]
#[case("UTC", 2024, 1, 15, "09:00")]
#[case("Europe/Berlin", 2024, 1, 15, "10:00")]
#[case("Asia/Kolkata", 2024, 1, 15, "14:30")]
#[case("Pacific/Honolulu", 2024, 1, 14, "23:00")]
#[case("Not/AZone", 2024, 1, 15, "09:00")]
fn test_resolution_across_timezones(
    #[case] tz: &str,
    #[case] y: i32,
    #[case] m: u32,
    #[case] d: u32,
    #[case] hhmm: &str,
) {
    let resolved = ReminderTimeResolver::resolve(&with_reminder(Some(1)), Some(tz)).unwrap();

    assert_eq!(resolved.date, NaiveDate::from_ymd_opt(y, m, d).unwrap());
    assert_eq!(resolved.time.format("%H:%M").to_string(), hhmm);
}

#[test]
fn test_seconds_are_dropped_from_time() {
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 42).unwrap();
    let parts = ReminderTimeResolver::local_parts(at, Tz::UTC);
    assert_eq!(parts.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
}

#[test]
fn test_local_input_converts_back_to_instant() {
    let tz: Tz = "America/New_York".parse().unwrap();
    let at = local_datetime_to_utc(
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        tz,
    );
    assert_eq!(at, Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());
}

#[test]
fn test_default_time_is_eight_am() {
    assert_eq!(default_reminder_time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
}
