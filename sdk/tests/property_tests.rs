use proptest::prelude::*;
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{EventPatch, EventTime};

proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "\\PC*") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::Calendar(error_str.clone()),
            EngineError::Network(error_str.clone()),
            EngineError::SecretMissing(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            // Hints are static text and never echo the raw detail
            if error_str.len() > 12 {
                prop_assert!(!hint.contains(error_str.as_str()));
            }
        }
    }
}

proptest! {
    #[test]
    fn test_normalized_patch_never_has_start_without_end(
        hour in 0u32..24,
        minute in 0u32..60,
        with_end in any::<bool>(),
        with_summary in any::<bool>(),
    ) {
        let start = EventTime::Timed {
            date_time: format!("2025-06-12T{:02}:{:02}:00", hour, minute),
            time_zone: Some("UTC".to_string()),
        };
        let end = with_end.then(|| EventTime::Timed {
            date_time: "2025-06-12T23:59:00".to_string(),
            time_zone: Some("UTC".to_string()),
        });
        let patch = EventPatch {
            summary: with_summary.then(|| "task".to_string()),
            start: Some(start.clone()),
            end: end.clone(),
            recurrence: None,
        }
        .normalized();

        prop_assert!(patch.end.is_some());
        if !with_end {
            prop_assert_eq!(patch.end, Some(start));
        } else {
            prop_assert_eq!(patch.end, end);
        }
    }
}
