use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use nudge_engine::channel::truncate_message;
use nudge_engine::llm::extract_json_object;
use nudge_engine::reminder::dates::{month_range, week_range, weekday_date, WeekdayQualifier};
use nudge_engine::reminder::{
    clarification_question, missing_fields, DraftUpdate, MissingField, Recurrence, ReminderDraft,
    ReminderTime,
};
use nudge_engine::secrets::scrub;
use proptest::prelude::*;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|offset| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset))
}

fn any_weekday() -> impl Strategy<Value = Weekday> {
    prop::sample::select(vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ])
}

fn any_recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        Just(Recurrence::None),
        Just(Recurrence::Hourly),
        Just(Recurrence::Daily),
        Just(Recurrence::Weekly),
        Just(Recurrence::Monthly),
        Just(Recurrence::Yearly),
        Just(Recurrence::Custom),
    ]
}

fn any_time() -> impl Strategy<Value = ReminderTime> {
    prop_oneof![
        Just(ReminderTime::Skip),
        (0u32..24, 0u32..60).prop_map(|(h, m)| ReminderTime::At(NaiveTime::from_hms_opt(h, m, 0).unwrap())),
    ]
}

fn any_update() -> impl Strategy<Value = DraftUpdate> {
    (
        proptest::option::of("[a-z]{1,12}( [a-z]{1,8})?"),
        proptest::option::of(any_date()),
        proptest::option::of(any_time()),
        proptest::option::of(any_recurrence()),
        proptest::option::of("(Monday|Friday)"),
        proptest::option::of("[a-z ]{1,20}"),
    )
        .prop_map(|(task, date, time, recurrence, day_of_week, notes)| DraftUpdate {
            task,
            date,
            time,
            recurrence,
            day_of_week,
            notes,
        })
}

proptest! {
    #[test]
    fn test_weekday_resolution_lands_on_target(today in any_date(), target in any_weekday()) {
        let next = weekday_date(today, target, WeekdayQualifier::Next);
        prop_assert_eq!(next.weekday(), target);
        prop_assert!(next > today && next <= today + Duration::days(7));

        let bare = weekday_date(today, target, WeekdayQualifier::Bare);
        prop_assert_eq!(bare.weekday(), target);
        prop_assert!(bare > today);

        let this = weekday_date(today, target, WeekdayQualifier::This);
        prop_assert_eq!(this.weekday(), target);
        prop_assert!(this >= today && this < today + Duration::days(7));

        let last = weekday_date(today, target, WeekdayQualifier::Last);
        prop_assert_eq!(last.weekday(), target);
        prop_assert!(last < today && last >= today - Duration::days(7));
    }

    #[test]
    fn test_week_range_is_monday_to_sunday(today in any_date(), shift in -3i64..4) {
        let range = week_range(today, shift);
        prop_assert_eq!(range.start.weekday(), Weekday::Mon);
        prop_assert_eq!(range.end - range.start, Duration::days(6));
        if shift == 0 {
            prop_assert!(range.contains(today));
        }
    }

    #[test]
    fn test_month_range_covers_whole_month(today in any_date(), shift in -13i32..14) {
        let range = month_range(today, shift);
        prop_assert_eq!(range.start.day(), 1);
        prop_assert_eq!(range.start.month(), range.end.month());
        prop_assert_eq!((range.end + Duration::days(1)).day(), 1);
        if shift == 0 {
            prop_assert!(range.contains(today));
        }
    }

    #[test]
    fn test_merge_is_idempotent(prior in any_update(), update in any_update()) {
        let base = ReminderDraft::merged(None, prior);
        let once = ReminderDraft::merged(Some(&base), update.clone());
        let twice = ReminderDraft::merged(Some(&once), update);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.task.as_deref(), once.title.as_deref());
    }

    #[test]
    fn test_merge_with_empty_update_keeps_draft(prior in any_update()) {
        let base = ReminderDraft::merged(None, prior);
        let again = ReminderDraft::merged(Some(&base), DraftUpdate::default());
        prop_assert_eq!(base, again);
    }

    #[test]
    fn test_completion_invariants(update in any_update(), today in any_date()) {
        let draft = ReminderDraft::merged(None, update);
        let missing = missing_fields(&draft);

        let mut sorted = missing.clone();
        sorted.sort();
        prop_assert_eq!(&sorted, &missing);

        if draft.recurrence.is_recurring() {
            prop_assert!(!missing.contains(&MissingField::Date));
            prop_assert!(!missing.contains(&MissingField::Time));
        }
        prop_assert_eq!(missing.contains(&MissingField::Task), draft.task_text().is_none());
        if missing.contains(&MissingField::Time) {
            prop_assert!(draft.date.is_some());
        }
        prop_assert_eq!(clarification_question(&missing, today).is_none(), missing.is_empty());
    }

    #[test]
    fn test_json_object_survives_wrapping(
        fields in proptest::collection::btree_map("[a-z_]{1,10}", "[A-Za-z0-9 ]{0,16}", 1..6),
        prose in "[A-Za-z ,.!]{0,30}",
    ) {
        let object = serde_json::to_string(&fields).unwrap();
        let expected: serde_json::Value = serde_json::from_str(&object).unwrap();

        for wrapped in [
            object.clone(),
            format!("```json\n{}\n```", object),
            format!("```\n{}\n```\n{}", object, prose),
            format!("{} {} {}", prose, object, prose),
        ] {
            let recovered = extract_json_object(&wrapped);
            prop_assert!(recovered.is_some(), "lost object in {:?}", wrapped);
            let value: serde_json::Value = serde_json::from_str(recovered.unwrap()).unwrap();
            prop_assert_eq!(&value, &expected);
        }
    }

    #[test]
    fn test_google_api_keys_never_survive_scrub(key in "[0-9A-Za-z_-]{35}", before in "[a-z ]{0,20}") {
        let text = format!("{}AIza{} trailing", before, key);
        let scrubbed = scrub(&text);
        let needle = format!("AIza{}", key);
        prop_assert!(!scrubbed.contains(&needle));
        prop_assert!(scrubbed.contains("[REDACTED]"));
    }

    #[test]
    fn test_truncation_respects_limit(text in "\\PC{0,200}", max in 3usize..120) {
        let truncated = truncate_message(&text, max);
        prop_assert!(truncated.chars().count() <= max);
        if text.chars().count() <= max {
            prop_assert_eq!(truncated, text);
        } else {
            prop_assert!(truncated.ends_with("..."));
        }
    }
}
