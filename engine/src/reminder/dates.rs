//! Natural-language date resolution
//!
//! Turns fuzzy references such as "next friday", "in 3 days", "this month" or
//! "Dec 15th" into a concrete local date or an inclusive date range. All math
//! happens on the local calendar date of `now` in the configured timezone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Kind of span a [`DateRange`] covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeKind {
    Week,
    Month,
}

/// Inclusive `[start, end]` span of local dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: RangeKind,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Outcome of resolving a date reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resolved {
    Day { date: NaiveDate },
    Range { range: DateRange },
}

/// Qualifier preceding a weekday name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekdayQualifier {
    /// "next friday": strictly in a future week
    Next,
    /// "this friday" / "coming friday": today if it matches, else the next occurrence
    This,
    /// "last friday" / "previous friday": strictly in the past
    Last,
    /// "friday": next future occurrence, never today
    Bare,
}

/// Resolves date references in a fixed timezone
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    tz: Tz,
}

struct Patterns {
    relative_day: Regex,
    qualified_weekday: Regex,
    bare_weekday: Regex,
    span: Regex,
    days_ago: Regex,
    days_ahead: Regex,
    numeric: Vec<(NumericForm, Regex)>,
    month_first: Regex,
    day_first: Regex,
}

#[derive(Debug, Clone, Copy)]
enum NumericForm {
    YearMonthDay,
    MonthDayYear,
    MonthDay,
}

const WEEKDAY_ALTERNATION: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thu|fri|sat|sun";
const MONTH_ALTERNATION: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("date pattern");
        Patterns {
            relative_day: compile(r"\b(today|tomorrow|yesterday)\b"),
            qualified_weekday: compile(&format!(
                r"\b(next|this|coming|last|previous)\s+({})\b",
                WEEKDAY_ALTERNATION
            )),
            bare_weekday: compile(&format!(r"\b({})\b", WEEKDAY_ALTERNATION)),
            span: compile(r"\b(this|next|last)\s+(week|month)\b"),
            days_ago: compile(r"\b(\d{1,4})\s+days?\s+ago\b"),
            days_ahead: compile(r"\b(?:in\s+)?(\d{1,4})\s+days?\b"),
            numeric: vec![
                (NumericForm::YearMonthDay, compile(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b")),
                (NumericForm::MonthDayYear, compile(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")),
                (NumericForm::MonthDay, compile(r"\b(\d{1,2})/(\d{1,2})\b")),
                (NumericForm::MonthDayYear, compile(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b")),
                (NumericForm::MonthDay, compile(r"\b(\d{1,2})-(\d{1,2})\b")),
            ],
            month_first: compile(&format!(
                r"\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:\s*,?\s*(\d{{4}})\b)?",
                MONTH_ALTERNATION
            )),
            day_first: compile(&format!(
                r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({})\b(?:\s*,?\s*(\d{{4}})\b)?",
                MONTH_ALTERNATION
            )),
        }
    })
}

/// Parse a full or abbreviated weekday name
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.trim().to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tues" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thurs" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse a full or abbreviated month name to 1..=12
pub fn parse_month(name: &str) -> Option<u32> {
    let month = match name.trim().trim_end_matches('.').to_lowercase().as_str() {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Date of `target` relative to `today` under a qualifier
pub fn weekday_date(today: NaiveDate, target: Weekday, qualifier: WeekdayQualifier) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let ahead = (wanted - current).rem_euclid(7);

    let offset = match qualifier {
        WeekdayQualifier::Next | WeekdayQualifier::Bare => {
            if ahead == 0 {
                7
            } else {
                ahead
            }
        }
        WeekdayQualifier::This => ahead,
        WeekdayQualifier::Last => {
            let back = (current - wanted).rem_euclid(7);
            -(if back == 0 { 7 } else { back })
        }
    };
    today + Duration::days(offset)
}

/// Monday-start week containing `today`, shifted by `weeks`
pub fn week_range(today: NaiveDate, weeks: i64) -> DateRange {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64)
        + Duration::weeks(weeks);
    DateRange {
        start: monday,
        end: monday + Duration::days(6),
        kind: RangeKind::Week,
    }
}

/// Calendar month containing `today`, shifted by `months`
pub fn month_range(today: NaiveDate, months: i32) -> DateRange {
    let index = today.year() * 12 + today.month0() as i32 + months;
    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12) as u32);
    let start = NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(today);
    let next_index = index + 1;
    let next_start = NaiveDate::from_ymd_opt(
        next_index.div_euclid(12),
        next_index.rem_euclid(12) as u32 + 1,
        1,
    )
    .unwrap_or(start);
    DateRange {
        start,
        end: next_start - Duration::days(1),
        kind: RangeKind::Month,
    }
}

/// A yearless month/day in the current year, or next year if it already passed
fn infer_year(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

impl DateResolver {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Local calendar date of `now`
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Resolve the first date reference found in `text`
    pub fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<Resolved> {
        self.resolve_on(text, self.today(now))
    }

    /// Resolve relative to an explicit local date
    pub fn resolve_on(&self, text: &str, today: NaiveDate) -> Option<Resolved> {
        let text = text.to_lowercase();
        let p = patterns();
        let day = |date: NaiveDate| Some(Resolved::Day { date });

        if let Some(caps) = p.relative_day.captures(&text) {
            return match &caps[1] {
                "today" => day(today),
                "tomorrow" => day(today + Duration::days(1)),
                _ => day(today - Duration::days(1)),
            };
        }

        if let Some(caps) = p.qualified_weekday.captures(&text) {
            let qualifier = match &caps[1] {
                "next" => WeekdayQualifier::Next,
                "this" | "coming" => WeekdayQualifier::This,
                _ => WeekdayQualifier::Last,
            };
            if let Some(weekday) = parse_weekday(&caps[2]) {
                return day(weekday_date(today, weekday, qualifier));
            }
        }

        if let Some(caps) = p.bare_weekday.captures(&text) {
            if let Some(weekday) = parse_weekday(&caps[1]) {
                return day(weekday_date(today, weekday, WeekdayQualifier::Bare));
            }
        }

        if let Some(caps) = p.span.captures(&text) {
            let shift = match &caps[1] {
                "this" => 0,
                "next" => 1,
                _ => -1,
            };
            let range = if &caps[2] == "week" {
                week_range(today, shift as i64)
            } else {
                month_range(today, shift)
            };
            return Some(Resolved::Range { range });
        }

        if let Some(caps) = p.days_ago.captures(&text) {
            if let Ok(days) = caps[1].parse::<i64>() {
                return day(today - Duration::days(days));
            }
        }

        if let Some(caps) = p.days_ahead.captures(&text) {
            if let Ok(days) = caps[1].parse::<i64>() {
                return day(today + Duration::days(days));
            }
        }

        for (form, regex) in &p.numeric {
            for caps in regex.captures_iter(&text) {
                let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
                let date = match form {
                    NumericForm::YearMonthDay => match (num(1), num(2), num(3)) {
                        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d),
                        _ => None,
                    },
                    NumericForm::MonthDayYear => match (num(1), num(2), num(3)) {
                        (Some(m), Some(d), Some(y)) => NaiveDate::from_ymd_opt(y as i32, m, d),
                        _ => None,
                    },
                    NumericForm::MonthDay => match (num(1), num(2)) {
                        (Some(m), Some(d)) => infer_year(today, m, d),
                        _ => None,
                    },
                };
                if let Some(date) = date {
                    return day(date);
                }
            }
        }

        for (month_first, regex) in [(true, &p.month_first), (false, &p.day_first)] {
            for caps in regex.captures_iter(&text) {
                let (month_name, day_str) = if month_first {
                    (&caps[1], &caps[2])
                } else {
                    (&caps[2], &caps[1])
                };
                let (Some(month), Ok(day_num)) = (parse_month(month_name), day_str.parse::<u32>())
                else {
                    continue;
                };
                let date = match caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok()) {
                    Some(year) => NaiveDate::from_ymd_opt(year, month, day_num),
                    None => infer_year(today, month, day_num),
                };
                if let Some(date) = date {
                    return day(date);
                }
            }
        }

        None
    }
}
